//! AFCaptcha: the sliding-tile proof of play that gates first-time faucet claims.
//!
//! Everything here is pure: deriving a board from a block seed, playing it
//! within the move budget, and packaging the evidence for the verifier.

pub mod catalog;
pub mod challenge;
pub mod puzzle;
pub mod recorder;

pub use catalog::{
    CATALOG,
    CATALOG_LEN,
    catalog_entry,
    catalog_state,
    index_from_seed,
};
pub use challenge::Challenge;
pub use puzzle::{
    GOAL_STATE,
    MoveError,
    PuzzleError,
    PuzzleState,
};
pub use recorder::{
    CaptchaBoard,
    MAX_MOVES,
    MoveTrail,
    SolvePayload,
    SubmitRejection,
    TapOutcome,
    TapRejection,
};
