use crate::{
    FaucetError,
    Result,
    address::{
        Address,
        sha512_256,
    },
    config::{
        FaucetConfig,
        Network,
    },
    fee_payer::program_address,
    node::{
        AccountInfo,
        BlockHeader,
        ChainQuery,
        CompiledProgram,
        NodeStatus,
        PendingTransaction,
        TransactionParams,
    },
    protocol::FAUCET_APP_ID,
    transaction::{
        Blob,
        Transaction,
        TxnHeader,
        TxnKind,
    },
    wallet::{
        SignRequest,
        WalletId,
        WalletSigner,
    },
};
use std::{
    collections::{
        BTreeMap,
        HashMap,
    },
    sync::{
        Arc,
        Mutex,
    },
};

pub const MAINNET_GENESIS_HASH: &str = "wGHE2Pwdvd7S12BL5FaOP20EGYesN73ktiC1qzkkit8=";

pub fn test_config() -> FaucetConfig {
    FaucetConfig::new(Network::MainNet)
}

pub fn user_address() -> Address {
    Address::new([5; 32])
}

fn unavailable(context: &str) -> FaucetError {
    FaucetError::Node {
        context: context.to_owned(),
        status: Some(503),
        message: "service unavailable".to_owned(),
    }
}

struct PendingPlan {
    polls_left: u32,
    round: u64,
    error: Option<String>,
}

struct NodeState {
    last_round: u64,
    genesis_id: String,
    status_failures: u32,
    status_calls: u32,
    seeds: HashMap<u64, Option<Vec<u8>>>,
    accounts: HashMap<Address, (u64, u64)>,
    account_failure: bool,
    boxes: BTreeMap<(u64, Vec<u8>), Vec<u8>>,
    compile_calls: u32,
    compile_hash: Option<String>,
    broadcasts: Vec<Vec<Vec<u8>>>,
    broadcast_error: Option<String>,
    auto_confirm: bool,
    pending: HashMap<String, PendingPlan>,
    pending_polls: u32,
}

/// In-memory chain. Blocks without an explicit seed get their round number
/// as an eight byte big-endian seed.
#[derive(Clone)]
pub struct FakeNode {
    state: Arc<Mutex<NodeState>>,
}

impl FakeNode {
    pub fn mainnet(last_round: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(NodeState {
                last_round,
                genesis_id: "mainnet-v1.0".to_owned(),
                status_failures: 0,
                status_calls: 0,
                seeds: HashMap::new(),
                accounts: HashMap::new(),
                account_failure: false,
                boxes: BTreeMap::new(),
                compile_calls: 0,
                compile_hash: None,
                broadcasts: Vec::new(),
                broadcast_error: None,
                auto_confirm: true,
                pending: HashMap::new(),
                pending_polls: 0,
            })),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut NodeState) -> T) -> T {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn set_round(&self, round: u64) {
        self.with(|s| s.last_round = round);
    }

    pub fn set_genesis(&self, genesis_id: &str) {
        self.with(|s| s.genesis_id = genesis_id.to_owned());
    }

    pub fn fail_status(&self, times: u32) {
        self.with(|s| s.status_failures = times);
    }

    pub fn set_block(&self, round: u64, seed: Option<Vec<u8>>) {
        self.with(|s| s.seeds.insert(round, seed));
    }

    pub fn set_account(&self, address: &Address, amount: u64, min_balance: u64) {
        self.with(|s| s.accounts.insert(*address, (amount, min_balance)));
    }

    pub fn set_balance(&self, address: &Address, amount: u64) {
        self.set_account(address, amount, 100_000);
    }

    pub fn fail_accounts(&self) {
        self.with(|s| s.account_failure = true);
    }

    pub fn set_claim_record(&self, address: &Address, round: u64) {
        self.with(|s| {
            s.boxes.insert(
                (FAUCET_APP_ID, address.public_key().to_vec()),
                round.to_be_bytes().to_vec(),
            )
        });
    }

    pub fn report_compile_hash(&self, hash: &str) {
        self.with(|s| s.compile_hash = Some(hash.to_owned()));
    }

    pub fn fail_broadcast(&self, message: &str) {
        self.with(|s| s.broadcast_error = Some(message.to_owned()));
    }

    pub fn hold_confirmations(&self) {
        self.with(|s| s.auto_confirm = false);
    }

    pub fn confirm_after_polls(&self, txid: &str, polls: u32, round: u64) {
        self.with(|s| {
            s.pending.insert(
                txid.to_owned(),
                PendingPlan {
                    polls_left: polls,
                    round,
                    error: None,
                },
            )
        });
    }

    pub fn reject_pending(&self, txid: &str, error: &str) {
        self.with(|s| {
            s.pending.insert(
                txid.to_owned(),
                PendingPlan {
                    polls_left: u32::MAX,
                    round: 0,
                    error: Some(error.to_owned()),
                },
            )
        });
    }

    pub fn status_calls(&self) -> u32 {
        self.with(|s| s.status_calls)
    }

    pub fn compile_calls(&self) -> u32 {
        self.with(|s| s.compile_calls)
    }

    pub fn pending_polls(&self) -> u32 {
        self.with(|s| s.pending_polls)
    }

    pub fn broadcasts(&self) -> Vec<Vec<Vec<u8>>> {
        self.with(|s| s.broadcasts.clone())
    }

    pub fn broadcast_count(&self) -> usize {
        self.with(|s| s.broadcasts.len())
    }
}

impl ChainQuery for FakeNode {
    async fn status(&self) -> Result<NodeStatus> {
        self.with(|s| {
            s.status_calls += 1;
            if s.status_failures > 0 {
                if s.status_failures != u32::MAX {
                    s.status_failures -= 1;
                }
                return Err(unavailable("/v2/status"));
            }
            Ok(NodeStatus {
                last_round: s.last_round,
            })
        })
    }

    async fn status_after_block(&self, round: u64) -> Result<NodeStatus> {
        self.with(|s| {
            s.last_round = s.last_round.max(round + 1);
            Ok(NodeStatus {
                last_round: s.last_round,
            })
        })
    }

    async fn account_info(&self, address: &Address) -> Result<AccountInfo> {
        self.with(|s| {
            if s.account_failure {
                return Err(unavailable("/v2/accounts"));
            }
            let (amount, min_balance) = s.accounts.get(address).copied().unwrap_or((0, 0));
            Ok(AccountInfo {
                address: *address,
                amount,
                min_balance,
            })
        })
    }

    async fn application_boxes(&self, app_id: u64) -> Result<Vec<Vec<u8>>> {
        self.with(|s| {
            Ok(s.boxes
                .keys()
                .filter(|(app, _)| *app == app_id)
                .map(|(_, name)| name.clone())
                .collect())
        })
    }

    async fn box_by_name(&self, app_id: u64, name: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with(|s| Ok(s.boxes.get(&(app_id, name.to_vec())).cloned()))
    }

    async fn block(&self, round: u64) -> Result<BlockHeader> {
        self.with(|s| {
            let seed = match s.seeds.get(&round) {
                Some(seed) => seed.clone(),
                None => Some(round.to_be_bytes().to_vec()),
            };
            Ok(BlockHeader { round, seed })
        })
    }

    async fn transaction_params(&self) -> Result<TransactionParams> {
        self.with(|s| {
            Ok(TransactionParams {
                fee: 0,
                min_fee: 1_000,
                last_round: s.last_round,
                genesis_id: s.genesis_id.clone(),
                genesis_hash: MAINNET_GENESIS_HASH.to_owned(),
            })
        })
    }

    async fn compile_program(&self, source: &str) -> Result<CompiledProgram> {
        self.with(|s| {
            s.compile_calls += 1;
            let mut bytecode = vec![0x06];
            bytecode.extend_from_slice(&sha512_256(&[source.as_bytes()]));
            let hash = s
                .compile_hash
                .clone()
                .unwrap_or_else(|| program_address(&bytecode).to_string());
            Ok(CompiledProgram { bytecode, hash })
        })
    }

    async fn broadcast(&self, signed: &[Vec<u8>]) -> Result<String> {
        self.with(|s| {
            s.broadcasts.push(signed.to_vec());
            if let Some(message) = &s.broadcast_error {
                return Err(FaucetError::Rejected(message.clone()));
            }
            let txid = format!("TX{}", s.broadcasts.len());
            if s.auto_confirm {
                let round = s.last_round + 1;
                s.pending.insert(
                    txid.clone(),
                    PendingPlan {
                        polls_left: 1,
                        round,
                        error: None,
                    },
                );
            }
            Ok(txid)
        })
    }

    async fn pending_transaction(&self, txid: &str) -> Result<PendingTransaction> {
        self.with(|s| {
            s.pending_polls += 1;
            let Some(plan) = s.pending.get_mut(txid) else {
                return Ok(PendingTransaction::default());
            };
            if let Some(error) = &plan.error {
                return Ok(PendingTransaction {
                    confirmed_round: None,
                    pool_error: error.clone(),
                });
            }
            if plan.polls_left <= 1 {
                return Ok(PendingTransaction {
                    confirmed_round: Some(plan.round),
                    pool_error: String::new(),
                });
            }
            plan.polls_left -= 1;
            Ok(PendingTransaction::default())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignCall {
    Group { indices: Vec<usize> },
    Requests { skipped: Vec<bool> },
}

struct WalletState {
    address: Option<Address>,
    calls: Vec<SignCall>,
    reject: Option<String>,
    dropped: Vec<usize>,
    sign_everything: bool,
}

/// Signs by prefixing the canonical encoding, so both request shapes yield
/// the same bytes for the same member.
#[derive(Clone)]
pub struct FakeWallet {
    id: WalletId,
    state: Arc<Mutex<WalletState>>,
}

impl FakeWallet {
    pub fn new(id: WalletId) -> Self {
        Self {
            id,
            state: Arc::new(Mutex::new(WalletState {
                address: Some(user_address()),
                calls: Vec::new(),
                reject: None,
                dropped: Vec::new(),
                sign_everything: false,
            })),
        }
    }

    pub fn disconnected(id: WalletId) -> Self {
        let wallet = Self::new(id);
        wallet.with(|s| s.address = None);
        wallet
    }

    fn with<T>(&self, f: impl FnOnce(&mut WalletState) -> T) -> T {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn calls(&self) -> Vec<SignCall> {
        self.with(|s| s.calls.clone())
    }

    pub fn reject_with(&self, message: &str) {
        self.with(|s| s.reject = Some(message.to_owned()));
    }

    pub fn drop_signature(&self, index: usize) {
        self.with(|s| s.dropped.push(index));
    }

    pub fn sign_everything(&self) {
        self.with(|s| s.sign_everything = true);
    }

    pub fn signature(txn: &Transaction) -> Vec<u8> {
        let mut blob = b"signed:".to_vec();
        blob.extend(txn.encode().unwrap_or_default());
        blob
    }

    fn respond(
        &self,
        call: SignCall,
        members: &[(usize, &Transaction, bool)],
    ) -> Result<Vec<Option<Vec<u8>>>> {
        self.with(|s| {
            s.calls.push(call);
            if let Some(message) = &s.reject {
                return Err(FaucetError::Wallet(message.clone()));
            }
            Ok(members
                .iter()
                .map(|(i, txn, wanted)| {
                    let sign = (*wanted || s.sign_everything) && !s.dropped.contains(i);
                    sign.then(|| Self::signature(txn))
                })
                .collect())
        })
    }
}

impl WalletSigner for FakeWallet {
    fn wallet_id(&self) -> WalletId {
        self.id.clone()
    }

    fn active_address(&self) -> Option<Address> {
        self.with(|s| s.address)
    }

    async fn connect(&self) -> Result<Address> {
        self.with(|s| {
            let address = user_address();
            s.address = Some(address);
            Ok(address)
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.with(|s| s.address = None);
        Ok(())
    }

    async fn sign_group(
        &self,
        group: &[Transaction],
        indices_to_sign: &[usize],
    ) -> Result<Vec<Option<Vec<u8>>>> {
        let members: Vec<_> = group
            .iter()
            .enumerate()
            .map(|(i, txn)| (i, txn, indices_to_sign.contains(&i)))
            .collect();
        self.respond(
            SignCall::Group {
                indices: indices_to_sign.to_vec(),
            },
            &members,
        )
    }

    async fn sign_requests(&self, requests: &[SignRequest]) -> Result<Vec<Option<Vec<u8>>>> {
        let members: Vec<_> = requests
            .iter()
            .enumerate()
            .map(|(i, r)| (i, &r.txn, !r.is_skipped()))
            .collect();
        self.respond(
            SignCall::Requests {
                skipped: requests.iter().map(SignRequest::is_skipped).collect(),
            },
            &members,
        )
    }
}

/// `members` distinct zero-fee application calls from the test user.
pub fn sample_group(members: usize) -> Vec<Transaction> {
    (0..members)
        .map(|i| Transaction {
            header: TxnHeader {
                sender: user_address(),
                fee: 0,
                first_valid: 1_000,
                last_valid: 1_050,
                genesis_id: "mainnet-v1.0".to_owned(),
                genesis_hash: MAINNET_GENESIS_HASH.to_owned(),
                note: Blob::from("AFCaptcha"),
                group: None,
            },
            kind: TxnKind::Appl {
                app_id: 1,
                args: vec![Blob::from(i.to_string().as_str())],
                boxes: vec![],
            },
        })
        .collect()
}
