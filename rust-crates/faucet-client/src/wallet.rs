use crate::{
    FaucetError,
    Result,
    address::Address,
    transaction::Transaction,
};
use std::{
    fmt,
    str::FromStr,
};
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletId {
    Pera,
    Defly,
    Exodus,
    Kibisis,
    Lute,
    Other(String),
}

impl FromStr for WalletId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "pera" => WalletId::Pera,
            "defly" => WalletId::Defly,
            "exodus" => WalletId::Exodus,
            "kibisis" => WalletId::Kibisis,
            "lute" => WalletId::Lute,
            other => WalletId::Other(other.to_owned()),
        })
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletId::Pera => f.write_str("pera"),
            WalletId::Defly => f.write_str("defly"),
            WalletId::Exodus => f.write_str("exodus"),
            WalletId::Kibisis => f.write_str("kibisis"),
            WalletId::Lute => f.write_str("lute"),
            WalletId::Other(name) => f.write_str(name),
        }
    }
}

/// One member of a per-transaction sign request.
///
/// `signers: None` lets the wallet sign as the sender; `Some(vec![])` tells
/// it to leave the member alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignRequest {
    pub txn: Transaction,
    pub signers: Option<Vec<Address>>,
}

impl SignRequest {
    pub fn sign(txn: Transaction) -> Self {
        Self { txn, signers: None }
    }

    pub fn skip(txn: Transaction) -> Self {
        Self {
            txn,
            signers: Some(Vec::new()),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.signers.as_ref().is_some_and(|s| s.is_empty())
    }
}

/// A connected wallet able to sign on behalf of its active account.
pub trait WalletSigner: Send + Sync {
    fn wallet_id(&self) -> WalletId;

    fn active_address(&self) -> Option<Address>;

    fn connect(&self) -> impl Future<Output = Result<Address>> + Send;

    fn disconnect(&self) -> impl Future<Output = Result<()>> + Send;

    /// Signs the members of `group` listed in `indices_to_sign`; the result
    /// has one entry per member, `None` where nothing was signed.
    fn sign_group(
        &self,
        group: &[Transaction],
        indices_to_sign: &[usize],
    ) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>>> + Send;

    /// Lower-level request with explicit per-member signer lists.
    fn sign_requests(
        &self,
        requests: &[SignRequest],
    ) -> impl Future<Output = Result<Vec<Option<Vec<u8>>>>> + Send;
}

/// How to ask a particular wallet for signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigningStrategy {
    Group,
    /// Per-member requests that mark skipped members explicitly. Pera drops
    /// the skip hint on the group call.
    ExplicitSigners,
}

impl SigningStrategy {
    pub fn for_wallet(id: &WalletId) -> Self {
        match id {
            WalletId::Pera => SigningStrategy::ExplicitSigners,
            _ => SigningStrategy::Group,
        }
    }

    /// Signed blobs for `indices_to_sign`, `None` for every other member.
    pub async fn sign<W: WalletSigner>(
        &self,
        wallet: &W,
        group: &[Transaction],
        indices_to_sign: &[usize],
    ) -> Result<Vec<Option<Vec<u8>>>> {
        debug!(strategy = ?self, members = group.len(), ?indices_to_sign, "requesting signatures");
        let raw = match self {
            SigningStrategy::Group => wallet.sign_group(group, indices_to_sign).await?,
            SigningStrategy::ExplicitSigners => {
                let requests: Vec<SignRequest> = group
                    .iter()
                    .enumerate()
                    .map(|(i, txn)| {
                        if indices_to_sign.contains(&i) {
                            SignRequest::sign(txn.clone())
                        } else {
                            SignRequest::skip(txn.clone())
                        }
                    })
                    .collect();
                wallet.sign_requests(&requests).await?
            }
        };
        normalize(raw, group.len(), indices_to_sign)
    }
}

fn normalize(
    mut raw: Vec<Option<Vec<u8>>>,
    members: usize,
    indices_to_sign: &[usize],
) -> Result<Vec<Option<Vec<u8>>>> {
    raw.resize(members, None);
    let mut out = Vec::with_capacity(members);
    for (i, blob) in raw.into_iter().enumerate() {
        if indices_to_sign.contains(&i) {
            match blob {
                Some(bytes) if !bytes.is_empty() => out.push(Some(bytes)),
                _ => return Err(FaucetError::Unsigned),
            }
        } else {
            out.push(None);
        }
    }
    Ok(out)
}
