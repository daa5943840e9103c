use crate::{
    catalog::{
        CATALOG,
        catalog_state,
        index_from_seed,
    },
    puzzle::PuzzleState,
};
use tracing::warn;

/// A live captcha instance: which historical round seeded it and the board it starts from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Challenge {
    reference_round: u64,
    catalog_index: usize,
    initial_state: PuzzleState,
}

impl Challenge {
    /// The newest round whose seed is already final at `height`.
    pub fn reference_round_for(height: u64) -> u64 {
        height.saturating_sub(1).max(1)
    }

    pub fn at_index(reference_round: u64, catalog_index: usize) -> Option<Self> {
        let initial_state = catalog_state(catalog_index)?;
        Some(Self {
            reference_round,
            catalog_index,
            initial_state,
        })
    }

    /// Picks the catalog entry selected by a block seed, falling back to the
    /// first entry when the seed is unusable.
    pub fn from_seed(reference_round: u64, seed: &[u8]) -> Self {
        match index_from_seed(seed).and_then(|index| Self::at_index(reference_round, index)) {
            Some(challenge) => challenge,
            None => {
                warn!(
                    round = reference_round,
                    seed_len = seed.len(),
                    "unusable block seed, falling back to catalog entry 0"
                );
                Self::fallback(reference_round)
            }
        }
    }

    pub fn fallback(reference_round: u64) -> Self {
        Self {
            reference_round,
            catalog_index: 0,
            initial_state: catalog_state(0).unwrap_or_default(),
        }
    }

    pub fn reference_round(&self) -> u64 {
        self.reference_round
    }

    pub fn catalog_index(&self) -> usize {
        self.catalog_index
    }

    pub fn initial_state(&self) -> PuzzleState {
        self.initial_state
    }

    /// Catalog text of the start state, as sent to the verifier.
    pub fn initial_state_str(&self) -> &'static str {
        CATALOG[self.catalog_index]
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn reference_round_for__typical_height__is_previous_round() {
        assert_eq!(Challenge::reference_round_for(1_000_000), 999_999);
    }

    #[test]
    fn reference_round_for__genesis_heights__never_drops_below_one() {
        assert_eq!(Challenge::reference_round_for(0), 1);
        assert_eq!(Challenge::reference_round_for(1), 1);
        assert_eq!(Challenge::reference_round_for(2), 1);
    }

    #[test]
    fn from_seed__seed_prefix_eight__opens_entry_eight() {
        // given
        let reference = Challenge::reference_round_for(1_000_000);
        let seed = [0, 0, 0, 0, 0, 0, 0, 8, 42, 42];

        // when
        let challenge = Challenge::from_seed(reference, &seed);

        // then
        assert_eq!(challenge.reference_round(), 999_999);
        assert_eq!(challenge.catalog_index(), 8);
        assert_eq!(challenge.initial_state_str(), "103426758");
        assert_eq!(challenge.initial_state().to_string(), "103426758");
    }

    #[test]
    fn from_seed__empty_seed__falls_back_to_first_entry() {
        let challenge = Challenge::from_seed(77, &[]);

        assert_eq!(challenge, Challenge::fallback(77));
        assert_eq!(challenge.catalog_index(), 0);
        assert_eq!(challenge.initial_state_str(), "123450786");
    }

    #[test]
    fn at_index__outside_catalog__is_none() {
        assert!(Challenge::at_index(5, 30).is_none());
        assert!(Challenge::at_index(5, 29).is_some());
    }
}
