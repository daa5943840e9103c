use crate::{
    FaucetError,
    Result,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
    de,
};
use sha2::{
    Digest,
    Sha512_256,
};
use std::{
    fmt,
    str::FromStr,
};

pub const PUBLIC_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;
pub const ADDRESS_LEN: usize = 58;

const APP_ID_PREFIX: &[u8] = b"appID";
const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// SHA-512/256 over the concatenation of `parts`.
pub fn sha512_256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// A 32-byte account public key, displayed in the chain's checksummed base32 form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; PUBLIC_KEY_LEN]);

impl Address {
    pub const fn new(public_key: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(public_key)
    }

    pub const fn zero() -> Self {
        Self([0; PUBLIC_KEY_LEN])
    }

    /// Escrow account controlled by an application.
    pub fn application(app_id: u64) -> Self {
        Self(sha512_256(&[APP_ID_PREFIX, &app_id.to_be_bytes()]))
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; PUBLIC_KEY_LEN]
    }

    fn checksum(&self) -> [u8; CHECKSUM_LEN] {
        let digest = sha512_256(&[&self.0]);
        let mut out = [0; CHECKSUM_LEN];
        out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut raw = Vec::with_capacity(PUBLIC_KEY_LEN + CHECKSUM_LEN);
        raw.extend_from_slice(&self.0);
        raw.extend_from_slice(&self.checksum());
        f.write_str(&base32_encode(&raw))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = FaucetError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.len() != ADDRESS_LEN {
            return Err(FaucetError::InvalidAddress(format!(
                "expected {ADDRESS_LEN} characters, got {}",
                trimmed.len()
            )));
        }
        let raw = base32_decode(trimmed)
            .ok_or_else(|| FaucetError::InvalidAddress(format!("{trimmed} is not base32")))?;
        if raw.len() < PUBLIC_KEY_LEN + CHECKSUM_LEN {
            return Err(FaucetError::InvalidAddress(format!("{trimmed} is truncated")));
        }
        let mut key = [0; PUBLIC_KEY_LEN];
        key.copy_from_slice(&raw[..PUBLIC_KEY_LEN]);
        let address = Address(key);
        if raw[PUBLIC_KEY_LEN..PUBLIC_KEY_LEN + CHECKSUM_LEN] != address.checksum() {
            return Err(FaucetError::InvalidAddress(format!(
                "{trimmed} has a bad checksum"
            )));
        }
        Ok(address)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

pub(crate) fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(5) * 8);
    let mut buffer: u16 = 0;
    let mut bits = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u16;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(BASE32_ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

fn base32_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(text.len() * 5 / 8);
    let mut buffer: u16 = 0;
    let mut bits = 0;
    for c in text.bytes() {
        let value = BASE32_ALPHABET.iter().position(|&a| a == c)? as u16;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Some(out)
}
