use crate::puzzle::PuzzleState;

pub const CATALOG_LEN: usize = 30;

/// Start states accepted by the AFCaptcha verifier, in verifier order.
///
/// Every entry is at most four slides away from the goal and the hardest ones
/// are exactly four, which is where the move budget comes from. The list is
/// part of the on-chain protocol and must stay byte-identical to it.
pub const CATALOG: [&str; CATALOG_LEN] = [
    "123450786",
    "123456708",
    "120453786",
    "123405786",
    "123406758",
    "123456078",
    "102453786",
    "103425786",
    "103426758",
    "123045786",
    "123046758",
    "123056478",
    "123460758",
    "123485706",
    "012453786",
    "013425786",
    "013426758",
    "023145786",
    "023146758",
    "023156478",
    "120463758",
    "123468750",
    "123485076",
    "123485760",
    "123506478",
    "123745086",
    "123746058",
    "130425786",
    "130426758",
    "152403786",
];

const SEED_PREFIX_LEN: usize = 8;

pub fn catalog_entry(index: usize) -> Option<&'static str> {
    CATALOG.get(index).copied()
}

pub fn catalog_state(index: usize) -> Option<PuzzleState> {
    catalog_entry(index).and_then(|entry| entry.parse().ok())
}

/// Reduces a block seed to a catalog index.
///
/// The first eight bytes are read as a big-endian integer and taken modulo
/// the catalog length. Shorter seeds use whatever bytes are present; an empty
/// seed yields `None`.
pub fn index_from_seed(seed: &[u8]) -> Option<usize> {
    if seed.is_empty() {
        return None;
    }
    let take = seed.len().min(SEED_PREFIX_LEN);
    let mut prefix = [0u8; SEED_PREFIX_LEN];
    prefix[SEED_PREFIX_LEN - take..].copy_from_slice(&seed[..take]);
    let value = u64::from_be_bytes(prefix);
    Some((value % CATALOG_LEN as u64) as usize)
}
