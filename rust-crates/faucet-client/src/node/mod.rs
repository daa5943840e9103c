use crate::{
    FaucetError,
    Result,
    address::Address,
};
use tracing::debug;

pub mod algod;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    pub last_round: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountInfo {
    pub address: Address,
    pub amount: u64,
    pub min_balance: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub round: u64,
    /// `None` when the node returned no seed or one that did not decode.
    pub seed: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionParams {
    pub fee: u64,
    pub min_fee: u64,
    pub last_round: u64,
    pub genesis_id: String,
    pub genesis_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledProgram {
    pub bytecode: Vec<u8>,
    /// Program address as reported by the node.
    pub hash: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingTransaction {
    pub confirmed_round: Option<u64>,
    pub pool_error: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    pub txid: String,
    pub confirmed_round: u64,
}

/// Read and relay access to a chain node.
pub trait ChainQuery: Send + Sync {
    fn status(&self) -> impl Future<Output = Result<NodeStatus>> + Send;

    /// Returns once the node has seen a block after `round`.
    fn status_after_block(&self, round: u64)
    -> impl Future<Output = Result<NodeStatus>> + Send;

    fn account_info(
        &self,
        address: &Address,
    ) -> impl Future<Output = Result<AccountInfo>> + Send;

    /// Names of every box held by an application.
    fn application_boxes(
        &self,
        app_id: u64,
    ) -> impl Future<Output = Result<Vec<Vec<u8>>>> + Send;

    /// Value of one box, `None` when it does not exist.
    fn box_by_name(
        &self,
        app_id: u64,
        name: &[u8],
    ) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    fn block(&self, round: u64) -> impl Future<Output = Result<BlockHeader>> + Send;

    fn transaction_params(&self) -> impl Future<Output = Result<TransactionParams>> + Send;

    fn compile_program(
        &self,
        source: &str,
    ) -> impl Future<Output = Result<CompiledProgram>> + Send;

    /// Sends the signed members of one group as a single submission.
    fn broadcast(&self, signed: &[Vec<u8>]) -> impl Future<Output = Result<String>> + Send;

    fn pending_transaction(
        &self,
        txid: &str,
    ) -> impl Future<Output = Result<PendingTransaction>> + Send;

    /// Polls once per round until `txid` is committed, the pool drops it, or
    /// `max_rounds` rounds pass.
    fn await_confirmation(
        &self,
        txid: &str,
        max_rounds: u64,
    ) -> impl Future<Output = Result<Confirmation>> + Send {
        async move {
            let start = self.status().await?.last_round;
            let mut round = start;
            while round < start + max_rounds {
                let pending = self.pending_transaction(txid).await?;
                if let Some(confirmed_round) = pending.confirmed_round.filter(|r| *r > 0) {
                    return Ok(Confirmation {
                        txid: txid.to_owned(),
                        confirmed_round,
                    });
                }
                if !pending.pool_error.is_empty() {
                    return Err(FaucetError::Rejected(pending.pool_error));
                }
                debug!(txid, round, "waiting for confirmation");
                round = self.status_after_block(round).await?.last_round.max(round + 1);
            }
            Err(FaucetError::Unconfirmed {
                txid: txid.to_owned(),
                rounds: max_rounds,
            })
        }
    }
}
