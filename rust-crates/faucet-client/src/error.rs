use afcaptcha::SubmitRejection;
use thiserror::Error;

/// Failures detected locally, before anything is sent to the node.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("no wallet is connected")]
    NoSigner,
    #[error("captcha not ready for submission: {0}")]
    Captcha(#[from] SubmitRejection),
    #[error("claim not available yet, {remaining} blocks remaining")]
    ClaimNotAvailable { remaining: u64 },
    #[error("the captcha is not open")]
    CaptchaClosed,
}

#[derive(Debug, Error)]
pub enum FaucetError {
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("connected to {genesis_id}, please switch to MainNet")]
    WrongNetwork { genesis_id: String },
    #[error("node request {context} failed: {message}")]
    Node {
        context: String,
        status: Option<u16>,
        message: String,
    },
    #[error("{0} timed out")]
    Timeout(String),
    #[error("block {round} has no usable seed")]
    MissingSeed { round: u64 },
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("wallet did not sign required transactions")]
    Unsigned,
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("transaction {txid} not confirmed after {rounds} rounds")]
    Unconfirmed { txid: String, rounds: u64 },
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("transaction encoding error: {0}")]
    WireEncoding(#[from] rmp_serde::encode::Error),
    #[error("could not decode {0}")]
    Decode(String),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl FaucetError {
    pub fn node(context: impl Into<String>, message: impl ToString) -> Self {
        FaucetError::Node {
            context: context.into(),
            status: None,
            message: message.to_string(),
        }
    }

    /// Whether a read may be attempted again under the retry policy.
    pub fn is_transient(&self) -> bool {
        match self {
            FaucetError::Timeout(_) => true,
            FaucetError::Node { status: None, .. } => true,
            FaucetError::Node {
                status: Some(code),
                ..
            } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FaucetError {
    fn from(err: reqwest::Error) -> Self {
        let context = err
            .url()
            .map(|url| url.path().to_owned())
            .unwrap_or_else(|| "request".to_owned());
        if err.is_timeout() {
            return FaucetError::Timeout(context);
        }
        FaucetError::Node {
            context,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}
