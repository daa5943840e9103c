use crate::{
    challenge::Challenge,
    puzzle::{
        GOAL_STATE,
        MoveError,
        PuzzleState,
    },
};
use std::fmt;
use thiserror::Error;

/// Slides allowed per captcha; equals the distance of the hardest catalog entries.
pub const MAX_MOVES: usize = 4;

/// Face values of the tiles slid so far, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveTrail {
    moves: Vec<u8>,
}

impl MoveTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn moves(&self) -> &[u8] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.moves.len() >= MAX_MOVES
    }

    pub fn remaining(&self) -> usize {
        MAX_MOVES.saturating_sub(self.moves.len())
    }

    /// One ASCII digit per move, e.g. `"258"`.
    pub fn to_ascii(&self) -> String {
        self.to_string()
    }

    fn push(&mut self, tile: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.moves.push(tile);
        true
    }
}

impl fmt::Display for MoveTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tile in &self.moves {
            write!(f, "{tile}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TapOutcome {
    Moved { tile: u8 },
    Ignored(TapRejection),
}

impl TapOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, TapOutcome::Moved { .. })
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TapRejection {
    #[error("the captcha is closed")]
    Closed,
    #[error("a submission is in progress")]
    Submitting,
    #[error("the puzzle is already solved")]
    Solved,
    #[error("no moves left")]
    BudgetExhausted,
    #[error(transparent)]
    Illegal(#[from] MoveError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmitRejection {
    #[error("the captcha is closed")]
    Closed,
    #[error("a submission is already in progress")]
    AlreadySubmitting,
    #[error("the puzzle is not solved")]
    NotSolved,
    #[error("no moves were recorded")]
    EmptyTrail,
    #[error("{0} moves recorded, at most {MAX_MOVES} are allowed")]
    TrailTooLong(usize),
    #[error("missing challenge reference round")]
    MissingReference,
    #[error("invalid initial state {0:?}")]
    InvalidInitialState(String),
    #[error("recorded moves do not replay: {0}")]
    IllegalTrail(MoveError),
}

/// Evidence sent to the verifier for one solved captcha.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolvePayload {
    pub catalog_index: usize,
    pub reference_round: u64,
    pub initial_state: String,
    pub moves: Vec<u8>,
}

impl SolvePayload {
    pub fn new(challenge: &Challenge, trail: &MoveTrail) -> Self {
        Self {
            catalog_index: challenge.catalog_index(),
            reference_round: challenge.reference_round(),
            initial_state: challenge.initial_state_str().to_owned(),
            moves: trail.moves().to_vec(),
        }
    }

    pub fn moves_ascii(&self) -> String {
        self.moves.iter().map(|tile| char::from(b'0' + tile % 10)).collect()
    }

    pub fn goal(&self) -> &'static str {
        GOAL_STATE
    }

    /// Checks everything the verifier will check that can be checked locally.
    pub fn validate(&self) -> Result<(), SubmitRejection> {
        if self.reference_round == 0 {
            return Err(SubmitRejection::MissingReference);
        }
        let initial: PuzzleState = self
            .initial_state
            .parse()
            .map_err(|_| SubmitRejection::InvalidInitialState(self.initial_state.clone()))?;
        if self.moves.is_empty() {
            return Err(SubmitRejection::EmptyTrail);
        }
        if self.moves.len() > MAX_MOVES {
            return Err(SubmitRejection::TrailTooLong(self.moves.len()));
        }
        let end = initial
            .replay(&self.moves)
            .map_err(SubmitRejection::IllegalTrail)?;
        if !end.is_solved() {
            return Err(SubmitRejection::NotSolved);
        }
        Ok(())
    }
}

/// The interactive board behind one captcha opening.
#[derive(Clone, Debug)]
pub struct CaptchaBoard {
    challenge: Challenge,
    state: PuzzleState,
    trail: MoveTrail,
    open: bool,
    submitting: bool,
}

impl CaptchaBoard {
    pub fn new(challenge: Challenge) -> Self {
        Self {
            challenge,
            state: challenge.initial_state(),
            trail: MoveTrail::new(),
            open: true,
            submitting: false,
        }
    }

    /// Starts over on a freshly derived challenge.
    pub fn reset(&mut self, challenge: Challenge) {
        *self = Self::new(challenge);
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn state(&self) -> &PuzzleState {
        &self.state
    }

    pub fn trail(&self) -> &MoveTrail {
        &self.trail
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn is_solved(&self) -> bool {
        self.state.is_solved()
    }

    pub fn moves_remaining(&self) -> usize {
        self.trail.remaining()
    }

    /// Handles a tap on a board position.
    pub fn tap(&mut self, position: usize) -> TapOutcome {
        match self.try_tap(position) {
            Ok(tile) => TapOutcome::Moved { tile },
            Err(rejection) => TapOutcome::Ignored(rejection),
        }
    }

    fn try_tap(&mut self, position: usize) -> Result<u8, TapRejection> {
        if !self.open {
            return Err(TapRejection::Closed);
        }
        if self.submitting {
            return Err(TapRejection::Submitting);
        }
        if self.state.is_solved() {
            return Err(TapRejection::Solved);
        }
        if self.trail.is_full() {
            return Err(TapRejection::BudgetExhausted);
        }
        let mut next = self.state;
        let tile = next.slide(position)?;
        if self.trail.push(tile) {
            self.state = next;
        }
        Ok(tile)
    }

    /// Locks the board and hands out the solve evidence.
    pub fn begin_submission(&mut self) -> Result<SolvePayload, SubmitRejection> {
        if !self.open {
            return Err(SubmitRejection::Closed);
        }
        if self.submitting {
            return Err(SubmitRejection::AlreadySubmitting);
        }
        if !self.state.is_solved() {
            return Err(SubmitRejection::NotSolved);
        }
        let payload = SolvePayload::new(&self.challenge, &self.trail);
        payload.validate()?;
        self.submitting = true;
        Ok(payload)
    }

    /// Releases the busy flag; a successful submission also closes the board.
    pub fn finish_submission(&mut self, succeeded: bool) {
        self.submitting = false;
        if succeeded {
            self.open = false;
        }
    }
}
