use rand::{
    Rng,
    seq::SliceRandom,
};
use std::{
    fmt,
    str::FromStr,
};
use thiserror::Error;

/// Serialized solved board, shared with the on-chain verifier.
pub const GOAL_STATE: &str = "123456780";
pub const GRID_SIDE: usize = 3;
pub const TILE_COUNT: usize = GRID_SIDE * GRID_SIDE;

const BLANK: u8 = 0;
const GOAL_TILES: [u8; TILE_COUNT] = [1, 2, 3, 4, 5, 6, 7, 8, BLANK];

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PuzzleError {
    #[error("puzzle state must have {TILE_COUNT} tiles, got {0}")]
    WrongLength(usize),
    #[error("invalid tile {0:?}, expected a digit between 0 and 8")]
    InvalidTile(char),
    #[error("tile {0} appears more than once")]
    DuplicateTile(u8),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("position {0} is outside the board")]
    OutOfBounds(usize),
    #[error("position {0} is the empty slot")]
    Blank(usize),
    #[error("position {position} is not adjacent to the empty slot at {blank}")]
    NotAdjacent { position: usize, blank: usize },
    #[error("tile {0} is not on the board")]
    UnknownTile(u8),
}

/// A 3x3 sliding-tile board. `0` marks the empty slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PuzzleState {
    tiles: [u8; TILE_COUNT],
    blank: usize,
}

impl PuzzleState {
    pub fn goal() -> Self {
        Self {
            tiles: GOAL_TILES,
            blank: TILE_COUNT - 1,
        }
    }

    pub fn from_tiles(tiles: [u8; TILE_COUNT]) -> Result<Self, PuzzleError> {
        let mut seen = [false; TILE_COUNT];
        // nine distinct tiles in 0..=8 always include the blank
        let mut blank = 0;
        for (index, &tile) in tiles.iter().enumerate() {
            let slot = seen
                .get_mut(tile as usize)
                .ok_or(PuzzleError::InvalidTile(char::from(b'0' + tile.min(9))))?;
            if *slot {
                return Err(PuzzleError::DuplicateTile(tile));
            }
            *slot = true;
            if tile == BLANK {
                blank = index;
            }
        }
        Ok(Self { tiles, blank })
    }

    /// Produces a random board that is guaranteed to be solvable.
    ///
    /// A uniformly shuffled board is solvable half of the time; when the
    /// inversion count over the numbered tiles is odd, swapping the first two
    /// numbered tiles flips the parity.
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut tiles = GOAL_TILES;
        tiles.shuffle(rng);
        if inversions(&tiles) % 2 == 1 {
            let mut numbered = tiles
                .iter()
                .enumerate()
                .filter(|(_, t)| **t != BLANK)
                .map(|(i, _)| i);
            if let (Some(i), Some(j)) = (numbered.next(), numbered.next()) {
                tiles.swap(i, j);
            }
        }
        let blank = tiles.iter().position(|&t| t == BLANK).unwrap_or(TILE_COUNT - 1);
        Self { tiles, blank }
    }

    pub fn tiles(&self) -> &[u8; TILE_COUNT] {
        &self.tiles
    }

    pub fn blank_index(&self) -> usize {
        self.blank
    }

    pub fn tile_at(&self, position: usize) -> Option<u8> {
        self.tiles.get(position).copied()
    }

    pub fn position_of(&self, tile: u8) -> Option<usize> {
        self.tiles.iter().position(|&t| t == tile)
    }

    pub fn is_adjacent_to_blank(&self, position: usize) -> bool {
        neighbors(self.blank).contains(&position)
    }

    pub fn is_solved(&self) -> bool {
        self.tiles == GOAL_TILES
    }

    /// Slides the tile at `position` into the empty slot and returns its face value.
    pub fn slide(&mut self, position: usize) -> Result<u8, MoveError> {
        let tile = self
            .tile_at(position)
            .ok_or(MoveError::OutOfBounds(position))?;
        if tile == BLANK {
            return Err(MoveError::Blank(position));
        }
        if !self.is_adjacent_to_blank(position) {
            return Err(MoveError::NotAdjacent {
                position,
                blank: self.blank,
            });
        }
        self.tiles.swap(self.blank, position);
        self.blank = position;
        Ok(tile)
    }

    /// Slides the tile showing `tile` into the empty slot.
    pub fn slide_tile(&mut self, tile: u8) -> Result<(), MoveError> {
        if tile == BLANK {
            return Err(MoveError::Blank(self.blank));
        }
        let position = self.position_of(tile).ok_or(MoveError::UnknownTile(tile))?;
        self.slide(position).map(|_| ())
    }

    /// Replays a sequence of face values, failing on the first illegal one.
    pub fn replay(&self, moves: &[u8]) -> Result<Self, MoveError> {
        let mut state = *self;
        for &tile in moves {
            state.slide_tile(tile)?;
        }
        Ok(state)
    }

    pub fn inversions(&self) -> usize {
        inversions(&self.tiles)
    }

    /// Odd-width boards are solvable exactly when the inversion count is even.
    pub fn is_solvable(&self) -> bool {
        self.inversions() % 2 == 0
    }
}

impl Default for PuzzleState {
    fn default() -> Self {
        Self::goal()
    }
}

impl FromStr for PuzzleState {
    type Err = PuzzleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != TILE_COUNT {
            return Err(PuzzleError::WrongLength(chars.len()));
        }
        let mut tiles = [BLANK; TILE_COUNT];
        for (slot, c) in tiles.iter_mut().zip(chars) {
            *slot = match c.to_digit(10) {
                Some(d) if (d as usize) < TILE_COUNT => d as u8,
                _ => return Err(PuzzleError::InvalidTile(c)),
            };
        }
        Self::from_tiles(tiles)
    }
}

impl fmt::Display for PuzzleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for tile in self.tiles {
            write!(f, "{tile}")?;
        }
        Ok(())
    }
}

/// Orthogonal neighbours of a board position.
pub fn neighbors(position: usize) -> Vec<usize> {
    let row = position / GRID_SIDE;
    let col = position % GRID_SIDE;
    let mut out = Vec::with_capacity(4);
    if row > 0 {
        out.push(position - GRID_SIDE);
    }
    if row + 1 < GRID_SIDE {
        out.push(position + GRID_SIDE);
    }
    if col > 0 {
        out.push(position - 1);
    }
    if col + 1 < GRID_SIDE {
        out.push(position + 1);
    }
    out
}

fn inversions(tiles: &[u8]) -> usize {
    let numbered: Vec<u8> = tiles.iter().copied().filter(|&t| t != BLANK).collect();
    let mut count = 0;
    for (i, a) in numbered.iter().enumerate() {
        count += numbered[i + 1..].iter().filter(|b| a > *b).count();
    }
    count
}
