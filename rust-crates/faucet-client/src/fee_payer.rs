use crate::{
    FaucetError,
    Result,
    address::{
        Address,
        sha512_256,
    },
    node::ChainQuery,
    protocol::CLAIM_SELECTOR,
    redact::mask,
    transaction::{
        Blob,
        LogicSig,
        LogicSigTransaction,
        Transaction,
        TxnHeader,
        TxnKind,
    },
};
use tokio::sync::OnceCell;
use tracing::{
    info,
    warn,
};

const PROGRAM_PREFIX: &[u8] = b"Program";

/// Lowest fee the program lets the payer declare.
pub const FEE_PAYER_MIN_FEE: u64 = 3_000;

/// Stateless program that pays the group fee for a `claim` call.
///
/// It approves only a zero-amount payment to itself, with no rekey or close,
/// declaring at least [`FEE_PAYER_MIN_FEE`], placed directly after a zero-fee
/// call to `claim_app_id` whose first argument is `"claim"`.
pub fn fee_payer_source(claim_app_id: u64) -> String {
    format!(
        r#"#pragma version 6
txn TypeEnum
int pay
==

txn Receiver
txn Sender
==
&&

txn Amount
int 0
==
&&

txn RekeyTo
global ZeroAddress
==
&&

txn CloseRemainderTo
global ZeroAddress
==
&&

txn Fee
int {FEE_PAYER_MIN_FEE}
>=
&&

txn GroupIndex
int 1
-
store 0

load 0
gtxns TypeEnum
int appl
==
&&

load 0
gtxns ApplicationID
int {claim_app_id}
==
&&

load 0
gtxns Fee
int 0
==
&&

load 0
gtxns NumAppArgs
int 1
>=
&&

load 0
gtxnsa ApplicationArgs 0
byte "claim"
==
&&

return"#
    )
}

/// Account controlled by `bytecode`.
pub fn program_address(bytecode: &[u8]) -> Address {
    Address::new(sha512_256(&[PROGRAM_PREFIX, bytecode]))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeePayer {
    claim_app_id: u64,
    program: Vec<u8>,
    address: Address,
}

impl FeePayer {
    pub fn from_bytecode(claim_app_id: u64, program: Vec<u8>) -> Self {
        let address = program_address(&program);
        Self {
            claim_app_id,
            program,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn program(&self) -> &[u8] {
        &self.program
    }

    /// Zero-amount self payment carrying `fee` for the whole group.
    pub fn payment(&self, mut header: TxnHeader, fee: u64) -> Transaction {
        header.sender = self.address;
        header.fee = fee;
        header.note = Blob::default();
        Transaction {
            header,
            kind: TxnKind::Pay {
                receiver: self.address,
                amount: 0,
            },
        }
    }

    /// Mirrors the program's checks for member `index` of `group`.
    pub fn authorizes(&self, group: &[Transaction], index: usize) -> bool {
        let Some(txn) = group.get(index) else {
            return false;
        };
        let TxnKind::Pay { receiver, amount } = &txn.kind else {
            return false;
        };
        if *txn.sender() != self.address
            || *receiver != self.address
            || *amount != 0
            || txn.fee() < FEE_PAYER_MIN_FEE
        {
            return false;
        }
        let Some(claim) = index.checked_sub(1).and_then(|i| group.get(i)) else {
            return false;
        };
        claim.app_id() == Some(self.claim_app_id)
            && claim.fee() == 0
            && claim
                .app_args()
                .first()
                .is_some_and(|arg| arg.as_bytes() == CLAIM_SELECTOR)
    }

    /// Authorizes member `index` locally. No network round trip is involved.
    pub fn sign(&self, group: &[Transaction], index: usize) -> Result<Vec<u8>> {
        if !self.authorizes(group, index) {
            return Err(FaucetError::Rejected(format!(
                "fee payer program would reject group member {index}"
            )));
        }
        LogicSigTransaction {
            lsig: LogicSig {
                program: Blob(self.program.clone()),
            },
            txn: group[index].clone(),
        }
        .to_bytes()
    }
}

/// Compiles the fee payer once per session.
pub struct FeePayerCache {
    claim_app_id: u64,
    cell: OnceCell<FeePayer>,
}

impl FeePayerCache {
    pub fn new(claim_app_id: u64) -> Self {
        Self {
            claim_app_id,
            cell: OnceCell::new(),
        }
    }

    pub fn cached(&self) -> Option<&FeePayer> {
        self.cell.get()
    }

    pub async fn get_or_compile<N: ChainQuery>(&self, node: &N) -> Result<&FeePayer> {
        self.cell
            .get_or_try_init(|| async {
                let compiled = node
                    .compile_program(&fee_payer_source(self.claim_app_id))
                    .await?;
                let payer = FeePayer::from_bytecode(self.claim_app_id, compiled.bytecode);
                let derived = payer.address().to_string();
                if compiled.hash != derived {
                    warn!(
                        node_hash = %mask(&compiled.hash),
                        derived = %mask(&derived),
                        "node reported a different program address, using the derived one"
                    );
                }
                info!(address = %mask(&derived), "fee payer compiled");
                Ok(payer)
            })
            .await
    }
}
