pub mod address;
pub mod assembler;
pub mod challenge;
pub mod config;
pub mod error;
pub mod events;
pub mod fee_payer;
pub mod node;
pub mod poller;
pub mod protocol;
pub mod redact;
pub mod retry;
pub mod session;
pub mod transaction;
pub mod verification;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{
    FaucetError,
    PreconditionError,
};

pub type Result<T, E = FaucetError> = std::result::Result<T, E>;

pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
