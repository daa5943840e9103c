use crate::{
    FaucetError,
    Result,
    address::Address,
    config::{
        AppIds,
        FaucetConfig,
        Network,
    },
    node::{
        AccountInfo,
        ChainQuery,
        TransactionParams,
    },
    protocol::BLOCKS_BETWEEN_CLAIMS,
    redact::mask,
    retry::RetryPolicy,
};
use std::sync::atomic::{
    AtomicU64,
    Ordering,
};
use tracing::{
    debug,
    warn,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimAvailability {
    Available,
    Wait { remaining: u64, next_round: u64 },
}

impl ClaimAvailability {
    /// Rate-limit state for an account whose last claim landed at `last_claim`.
    pub fn at_height(last_claim: Option<u64>, height: u64) -> Self {
        let Some(last) = last_claim else {
            return ClaimAvailability::Available;
        };
        let next_round = last.saturating_add(BLOCKS_BETWEEN_CLAIMS);
        if height >= next_round {
            ClaimAvailability::Available
        } else {
            ClaimAvailability::Wait {
                remaining: next_round - height,
                next_round,
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ClaimAvailability::Available)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FaucetBalance {
    pub amount: u64,
    pub min_balance: u64,
}

impl FaucetBalance {
    pub fn spendable(&self) -> u64 {
        self.amount.saturating_sub(self.min_balance)
    }
}

/// Chain reads the faucet flow depends on, each wrapped in the retry policy.
pub struct VerificationClient<N> {
    node: N,
    retry: RetryPolicy,
    apps: AppIds,
    network: Network,
    last_height: AtomicU64,
}

impl<N: ChainQuery> VerificationClient<N> {
    pub fn new(node: N, config: &FaucetConfig) -> Self {
        Self {
            node,
            retry: config.retry,
            apps: config.apps,
            network: config.network,
            last_height: AtomicU64::new(0),
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    pub fn apps(&self) -> AppIds {
        self.apps
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Latest round, or the last one seen (zero before any success) when the
    /// node cannot be reached.
    pub async fn current_height(&self) -> u64 {
        match self.retry.run("status", || self.node.status()).await {
            Ok(status) => {
                self.last_height.fetch_max(status.last_round, Ordering::Relaxed);
                status.last_round
            }
            Err(err) => {
                let stale = self.last_height.load(Ordering::Relaxed);
                warn!(%err, stale, "height unavailable, using last known value");
                stale
            }
        }
    }

    pub async fn block_randomness(&self, round: u64) -> Result<Vec<u8>> {
        let block = self.retry.run("block", || self.node.block(round)).await?;
        block.seed.ok_or(FaucetError::MissingSeed { round })
    }

    /// Round of the account's last claim, `None` when it never claimed.
    pub async fn claim_record(&self, address: &Address) -> Result<Option<u64>> {
        let app_id = self.apps.faucet;
        let name = address.public_key();
        let value = self
            .retry
            .run("claim record", || self.node.box_by_name(app_id, name))
            .await?;
        Ok(value.map(|bytes| decode_round(&bytes)))
    }

    pub async fn account_has_claimed(&self, address: &Address) -> Result<bool> {
        Ok(self.claim_record(address).await?.is_some())
    }

    pub async fn claim_availability(
        &self,
        address: &Address,
        height: u64,
    ) -> Result<ClaimAvailability> {
        let last = self.claim_record(address).await?;
        Ok(ClaimAvailability::at_height(last, height))
    }

    /// Number of accounts holding a claim record.
    pub async fn claimant_count(&self) -> Result<usize> {
        let app_id = self.apps.faucet;
        let names = self
            .retry
            .run("claim records", || self.node.application_boxes(app_id))
            .await?;
        Ok(names.len())
    }

    pub async fn account_info(&self, address: &Address) -> Result<AccountInfo> {
        self.retry
            .run("account", || self.node.account_info(address))
            .await
    }

    /// Faucet escrow balance; zeroes when the node cannot be reached.
    pub async fn faucet_balance(&self) -> FaucetBalance {
        let escrow = Address::application(self.apps.faucet);
        match self.account_info(&escrow).await {
            Ok(info) => FaucetBalance {
                amount: info.amount,
                min_balance: info.min_balance,
            },
            Err(err) => {
                warn!(%err, "faucet balance unavailable");
                FaucetBalance::default()
            }
        }
    }

    /// First-time claimants must pass the captcha: no claim record and an
    /// empty account. Lookup failures count as returning claimants.
    pub async fn is_new_beneficiary(&self, address: &Address) -> bool {
        let claimed = match self.account_has_claimed(address).await {
            Ok(claimed) => claimed,
            Err(err) => {
                warn!(%err, address = %mask(&address.to_string()), "claim record lookup failed");
                return false;
            }
        };
        if claimed {
            return false;
        }
        match self.account_info(address).await {
            Ok(info) => {
                debug!(address = %mask(&address.to_string()), amount = info.amount, "beneficiary check");
                info.amount == 0
            }
            Err(err) => {
                warn!(%err, address = %mask(&address.to_string()), "account lookup failed");
                false
            }
        }
    }

    pub async fn transaction_params(&self) -> Result<TransactionParams> {
        self.retry
            .run("transaction params", || self.node.transaction_params())
            .await
    }

    pub fn ensure_network(&self, params: &TransactionParams) -> Result<()> {
        if self.network.accepts_genesis(&params.genesis_id) {
            Ok(())
        } else {
            Err(FaucetError::WrongNetwork {
                genesis_id: params.genesis_id.clone(),
            })
        }
    }

    /// Fetches parameters and checks them against the configured network.
    pub async fn verify_network(&self) -> Result<TransactionParams> {
        let params = self.transaction_params().await?;
        self.ensure_network(&params)?;
        Ok(params)
    }
}

/// Claim records hold the claim round as a big-endian u64.
fn decode_round(bytes: &[u8]) -> u64 {
    let take = bytes.len().min(8);
    let mut buf = [0u8; 8];
    buf[8 - take..].copy_from_slice(&bytes[..take]);
    u64::from_be_bytes(buf)
}
