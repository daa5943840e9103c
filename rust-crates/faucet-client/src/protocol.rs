//! Values shared bit-for-bit with the on-chain faucet and AFCaptcha verifier.

pub use afcaptcha::{
    CATALOG_LEN,
    GOAL_STATE,
    MAX_MOVES,
};

pub const FAUCET_APP_ID: u64 = 3_054_946_205;
pub const AFCAPTCHA_APP_ID: u64 = 3_371_668_755;

pub const FAUCET_NOTE: &[u8] = b"AlgoFaucet";
pub const AFCAPTCHA_NOTE: &[u8] = b"AFCaptcha";

pub const CLAIM_SELECTOR: &[u8] = b"claim";
pub const SOLVE_SELECTOR: &[u8] = b"solve";
pub const PING_SELECTOR: &[u8] = b"ping";

pub const MIN_FEE: u64 = 1_000;
/// The faucet's `claim` pays out through one inner transaction.
pub const CLAIM_INNER_TXNS: u64 = 1;

pub const CAPTCHA_GROUP_SIZE: usize = 5;
pub const CLAIM_GROUP_SIZE: usize = 2;

pub const CAPTCHA_VALIDITY_SPAN: u64 = 50;
pub const CLAIM_VALIDITY_SPAN: u64 = 1_000;

pub const CAPTCHA_CONFIRMATION_ROUNDS: u64 = 6;
pub const CLAIM_CONFIRMATION_ROUNDS: u64 = 4;

pub const BLOCKS_BETWEEN_CLAIMS: u64 = 10_000;

pub const MAINNET_GENESIS_PREFIX: &str = "mainnet";

/// Fee the delegated payer must cover for a group of `group_size` members.
pub fn group_fee(group_size: usize, min_fee: u64) -> u64 {
    min_fee.max(MIN_FEE) * (group_size as u64 + CLAIM_INNER_TXNS)
}
