use crate::{
    FaucetError,
    PreconditionError,
    Result,
    address::Address,
    config::AppIds,
    fee_payer::{
        FeePayer,
        FeePayerCache,
    },
    node::{
        ChainQuery,
        Confirmation,
        TransactionParams,
    },
    protocol::{
        AFCAPTCHA_NOTE,
        CAPTCHA_CONFIRMATION_ROUNDS,
        CAPTCHA_VALIDITY_SPAN,
        CLAIM_CONFIRMATION_ROUNDS,
        CLAIM_SELECTOR,
        CLAIM_VALIDITY_SPAN,
        FAUCET_NOTE,
        GOAL_STATE,
        PING_SELECTOR,
        SOLVE_SELECTOR,
        group_fee,
    },
    redact::mask,
    transaction::{
        Blob,
        BoxRef,
        GroupId,
        Transaction,
        TxnHeader,
        TxnKind,
        assign_group_id,
    },
    verification::VerificationClient,
    wallet::{
        SigningStrategy,
        WalletSigner,
    },
};
use afcaptcha::SolvePayload;
use tracing::{
    error,
    info,
};

/// Rounds during which a group may be committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidityWindow {
    pub first: u64,
    pub last: u64,
}

impl ValidityWindow {
    /// Starts right after the challenge's reference round so the verifier can
    /// still read that round's seed.
    pub fn after_reference(reference_round: u64) -> Self {
        let first = reference_round.saturating_add(1);
        Self {
            first,
            last: first.saturating_add(CAPTCHA_VALIDITY_SPAN),
        }
    }

    pub fn from_params(params: &TransactionParams) -> Self {
        let first = params.last_round;
        Self {
            first,
            last: first.saturating_add(CLAIM_VALIDITY_SPAN),
        }
    }
}

/// A grouped, unsigned submission and which members the wallet signs.
#[derive(Clone, Debug)]
pub struct AssembledGroup {
    pub txns: Vec<Transaction>,
    pub group_id: GroupId,
    pub window: ValidityWindow,
    pub user_indices: Vec<usize>,
    pub fee_payer_index: usize,
    pub confirmation_rounds: u64,
}

struct GroupBuilder<'a> {
    sender: Address,
    params: &'a TransactionParams,
    window: ValidityWindow,
}

impl GroupBuilder<'_> {
    fn header(&self, note: &[u8]) -> TxnHeader {
        TxnHeader {
            sender: self.sender,
            fee: 0,
            first_valid: self.window.first,
            last_valid: self.window.last,
            genesis_id: self.params.genesis_id.clone(),
            genesis_hash: self.params.genesis_hash.clone(),
            note: Blob::from(note),
            group: None,
        }
    }

    fn call(&self, app_id: u64, args: Vec<Blob>, boxes: Vec<BoxRef>, note: &[u8]) -> Transaction {
        Transaction {
            header: self.header(note),
            kind: TxnKind::Appl {
                app_id,
                args,
                boxes,
            },
        }
    }

    fn claim(&self, apps: &AppIds) -> Transaction {
        self.call(
            apps.faucet,
            vec![Blob::from(CLAIM_SELECTOR)],
            vec![BoxRef {
                app_id: apps.faucet,
                name: Blob::from(self.sender.public_key().as_slice()),
            }],
            FAUCET_NOTE,
        )
    }

    fn finish(
        self,
        mut txns: Vec<Transaction>,
        fee_payer: &FeePayer,
        confirmation_rounds: u64,
    ) -> Result<AssembledGroup> {
        let members = txns.len() + 1;
        let fee = group_fee(members, self.params.min_fee);
        txns.push(fee_payer.payment(self.header(&[]), fee));
        let group_id = assign_group_id(&mut txns)?;
        let fee_payer_index = txns.len() - 1;
        Ok(AssembledGroup {
            txns,
            group_id,
            window: self.window,
            user_indices: (0..fee_payer_index).collect(),
            fee_payer_index,
            confirmation_rounds,
        })
    }
}

/// `[solve, ping 1, ping 2, claim, fee payment]` for a first-time claimant.
pub fn build_captcha_group(
    sender: Address,
    payload: &SolvePayload,
    params: &TransactionParams,
    fee_payer: &FeePayer,
    apps: &AppIds,
) -> Result<AssembledGroup> {
    payload.validate().map_err(PreconditionError::from)?;
    let builder = GroupBuilder {
        sender,
        params,
        window: ValidityWindow::after_reference(payload.reference_round),
    };
    let solve = builder.call(
        apps.captcha,
        vec![
            Blob::from(SOLVE_SELECTOR),
            Blob(payload.reference_round.to_be_bytes().to_vec()),
            Blob::from(payload.initial_state.as_str()),
            Blob::from(payload.moves_ascii().as_str()),
            Blob::from(GOAL_STATE),
        ],
        vec![],
        AFCAPTCHA_NOTE,
    );
    let ping = |n: &str| {
        builder.call(
            apps.captcha,
            vec![Blob::from(PING_SELECTOR), Blob::from(n)],
            vec![],
            AFCAPTCHA_NOTE,
        )
    };
    let txns = vec![solve, ping("1"), ping("2"), builder.claim(apps)];
    builder.finish(txns, fee_payer, CAPTCHA_CONFIRMATION_ROUNDS)
}

/// `[claim, fee payment]` for a returning claimant.
pub fn build_claim_group(
    sender: Address,
    params: &TransactionParams,
    fee_payer: &FeePayer,
    apps: &AppIds,
) -> Result<AssembledGroup> {
    let builder = GroupBuilder {
        sender,
        params,
        window: ValidityWindow::from_params(params),
    };
    let txns = vec![builder.claim(apps)];
    builder.finish(txns, fee_payer, CLAIM_CONFIRMATION_ROUNDS)
}

/// Every member of a group, signed and ready for broadcast.
#[derive(Clone, Debug)]
pub struct SignedGroup {
    pub blobs: Vec<Vec<u8>>,
    pub confirmation_rounds: u64,
}

/// Builds, signs and relays claim groups. A failed broadcast is returned to
/// the caller, never resent.
pub struct ClaimSubmitter<'a, N, W> {
    verifier: &'a VerificationClient<N>,
    wallet: &'a W,
    fee_payers: &'a FeePayerCache,
}

impl<'a, N: ChainQuery, W: WalletSigner> ClaimSubmitter<'a, N, W> {
    pub fn new(
        verifier: &'a VerificationClient<N>,
        wallet: &'a W,
        fee_payers: &'a FeePayerCache,
    ) -> Self {
        Self {
            verifier,
            wallet,
            fee_payers,
        }
    }

    fn sender(&self) -> Result<Address> {
        Ok(self
            .wallet
            .active_address()
            .ok_or(PreconditionError::NoSigner)?)
    }

    /// Everything up to the broadcast. Nothing reaches the network's
    /// transaction pool if this fails.
    pub async fn prepare_captcha_claim(&self, payload: &SolvePayload) -> Result<SignedGroup> {
        let sender = self.sender()?;
        payload.validate().map_err(PreconditionError::from)?;
        let params = self.verifier.verify_network().await?;
        let fee_payer = self.fee_payers.get_or_compile(self.verifier.node()).await?;
        let group = build_captcha_group(
            sender,
            payload,
            &params,
            fee_payer,
            &self.verifier.apps(),
        )?;
        info!(
            sender = %mask(&sender.to_string()),
            round = payload.reference_round,
            catalog_index = payload.catalog_index,
            moves = %payload.moves_ascii(),
            "submitting captcha claim"
        );
        self.sign(&group, fee_payer).await
    }

    pub async fn submit_captcha_claim(&self, payload: &SolvePayload) -> Result<Confirmation> {
        let signed = self.prepare_captcha_claim(payload).await?;
        self.send(&signed).await
    }

    pub async fn prepare_claim(&self) -> Result<SignedGroup> {
        let sender = self.sender()?;
        let params = self.verifier.verify_network().await?;
        let fee_payer = self.fee_payers.get_or_compile(self.verifier.node()).await?;
        let group = build_claim_group(sender, &params, fee_payer, &self.verifier.apps())?;
        info!(sender = %mask(&sender.to_string()), "submitting claim");
        self.sign(&group, fee_payer).await
    }

    pub async fn submit_claim(&self) -> Result<Confirmation> {
        let signed = self.prepare_claim().await?;
        self.send(&signed).await
    }

    async fn sign(&self, group: &AssembledGroup, fee_payer: &FeePayer) -> Result<SignedGroup> {
        let strategy = SigningStrategy::for_wallet(&self.wallet.wallet_id());
        let mut signed = strategy
            .sign(self.wallet, &group.txns, &group.user_indices)
            .await?;
        signed[group.fee_payer_index] = Some(fee_payer.sign(&group.txns, group.fee_payer_index)?);
        let blobs = signed
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or(FaucetError::Unsigned)?;
        Ok(SignedGroup {
            blobs,
            confirmation_rounds: group.confirmation_rounds,
        })
    }

    /// Broadcasts once and waits for the commit.
    pub async fn send(&self, signed: &SignedGroup) -> Result<Confirmation> {
        let node = self.verifier.node();
        let members = signed.blobs.len();
        let txid = match node.broadcast(&signed.blobs).await {
            Ok(txid) => txid,
            Err(err) => {
                error!(%err, members, "group broadcast failed");
                return Err(err);
            }
        };
        info!(%txid, members, "group broadcast");
        let confirmation = node
            .await_confirmation(&txid, signed.confirmation_rounds)
            .await
            .inspect_err(|err| error!(%txid, %err, "group not confirmed"))?;
        info!(%txid, round = confirmation.confirmed_round, "claim confirmed");
        Ok(confirmation)
    }
}

#[cfg(test)]
mod tests;
