pub mod forbidden;
pub mod priority;
pub mod zobrist;

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use anyhow::{anyhow, bail};
use strum_macros::EnumIter;
use thiserror::Error;

use crate::board::zobrist::ZOBRIST;
use crate::core::common::Res;
use crate::core::hash::Hash128;
use crate::rules::BasicRule;

pub use priority::MovePriority;

/// Maximum edge length allowed for the board.
pub const MAX_LEN: usize = 20;
/// Maximum number of playable spaces.
pub const MAX_PLAY_SIZE: usize = MAX_LEN * MAX_LEN;
/// Maximum size of the flat cell array, including the wall border.
pub const MAX_ARR_SIZE: usize = (MAX_LEN + 1) * (MAX_LEN + 2) + 1;

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, EnumIter)]
#[must_use]
pub enum Player {
    #[default]
    Black,
    White,
}

impl Player {
    pub fn opponent(self) -> Player {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    pub fn color(self) -> Color {
        match self {
            Player::Black => Color::Black,
            Player::White => Color::White,
        }
    }

    /// Index into per-player tables.
    pub fn idx(self) -> usize {
        self as usize
    }
}

impl Display for Player {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "black"),
            Player::White => write!(f, "white"),
        }
    }
}

impl FromStr for Player {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "b" | "x" | "black" => Ok(Player::Black),
            "w" | "o" | "white" => Ok(Player::White),
            _ => Err(anyhow!("Could not parse player: '{s}'")),
        }
    }
}

/// Contents of one cell of the flat array. `Wall` bounds the playable area
/// so that line scans never need an explicit range check.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum Color {
    #[default]
    Empty = 0,
    Black = 1,
    White = 2,
    Wall = 3,
}

impl Color {
    pub fn player(self) -> Option<Player> {
        match self {
            Color::Black => Some(Player::Black),
            Color::White => Some(Player::White),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Color::Empty => '.',
            Color::Black => 'X',
            Color::White => 'O',
            Color::Wall => '$',
        }
    }
}

/// Location of a point on the board. `(x,y)` is represented as
/// `(x+1) + (y+1)*(x_size+1)` so that the wall border is addressable.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct Loc(u16);

impl Loc {
    /// Indicates an invalid spot on the board.
    pub const NULL: Loc = Loc(0);
    /// Indicates that a pass is desired.
    pub const PASS: Loc = Loc(1);

    pub fn from_xy(x: usize, y: usize, x_size: usize) -> Loc {
        debug_assert!(x < x_size && y < MAX_LEN);
        Loc(((x + 1) + (y + 1) * (x_size + 1)) as u16)
    }

    pub fn x(self, x_size: usize) -> usize {
        (self.0 as usize) % (x_size + 1) - 1
    }

    pub fn y(self, x_size: usize) -> usize {
        (self.0 as usize) / (x_size + 1) - 1
    }

    pub fn idx(self) -> usize {
        self.0 as usize
    }

    /// Rebuilds a `Loc` from a raw index, e.g. out of a packed cache entry.
    pub fn from_idx(idx: u16) -> Loc {
        debug_assert!((idx as usize) < MAX_ARR_SIZE);
        Loc(idx)
    }

    pub fn offset(self, delta: isize) -> Loc {
        Loc((self.0 as isize + delta) as u16)
    }

    pub fn is_real(self) -> bool {
        self != Loc::NULL && self != Loc::PASS
    }
}

/// Simple structure for storing moves.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Move {
    pub loc: Loc,
    pub pla: Player,
}

impl Move {
    pub fn new(loc: Loc, pla: Player) -> Self {
        Self { loc, pla }
    }
}

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
pub enum PlayError {
    #[error("location is outside the board")]
    OffBoard,
    #[error("cell is already occupied")]
    Occupied,
    #[error("move is forbidden for black under renju rules")]
    Forbidden,
}

/// Fast lightweight board designed for search descents, where speed is
/// essential. Does not enforce player turn order and knows nothing about
/// game termination; that is [`crate::history::BoardHistory`]'s job.
#[derive(Clone)]
pub struct Board {
    pub x_size: usize,
    pub y_size: usize,
    colors: [Color; MAX_ARR_SIZE],
    pub movenum: usize,
    /// Zobrist hash of the stones and board size. Does not include the side
    /// to move; see [`Board::position_hash`].
    pub pos_hash: Hash128,
    /// Indices 0-3: offsets to orthogonally adjacent points (2 and 3 are +x
    /// and +y). Indices 4-7: offsets to diagonal points.
    pub adj_offsets: [isize; 8],
    pub rule: BasicRule,
}

impl Board {
    pub fn new(x_size: usize, y_size: usize, rule: BasicRule) -> Res<Board> {
        if x_size < 5 || y_size < 5 || x_size > MAX_LEN || y_size > MAX_LEN {
            bail!("Board size {x_size}x{y_size} must be between 5x5 and {MAX_LEN}x{MAX_LEN}");
        }
        let mut colors = [Color::Wall; MAX_ARR_SIZE];
        for y in 0..y_size {
            for x in 0..x_size {
                colors[Loc::from_xy(x, y, x_size).idx()] = Color::Empty;
            }
        }
        let stride = (x_size + 1) as isize;
        let adj_offsets = [-stride, -1, 1, stride, -stride - 1, -stride + 1, stride - 1, stride + 1];
        Ok(Board {
            x_size,
            y_size,
            colors,
            movenum: 0,
            pos_hash: ZOBRIST.size_x[x_size] ^ ZOBRIST.size_y[y_size],
            adj_offsets,
            rule,
        })
    }

    pub fn get(&self, loc: Loc) -> Color {
        self.colors[loc.idx()]
    }

    pub(crate) fn colors(&self) -> &[Color; MAX_ARR_SIZE] {
        &self.colors
    }

    pub fn is_on_board(&self, loc: Loc) -> bool {
        loc.is_real() && loc.idx() < MAX_ARR_SIZE && self.colors[loc.idx()] != Color::Wall
    }

    pub fn is_empty(&self) -> bool {
        self.movenum == 0 && self.locs().all(|loc| self.get(loc) == Color::Empty)
    }

    pub fn area(&self) -> usize {
        self.x_size * self.y_size
    }

    /// All on-board locations in row-major order.
    pub fn locs(&self) -> impl Iterator<Item = Loc> + '_ {
        let x_size = self.x_size;
        (0..self.y_size).flat_map(move |y| (0..x_size).map(move |x| Loc::from_xy(x, y, x_size)))
    }

    pub fn empty_locs(&self) -> impl Iterator<Item = Loc> + '_ {
        self.locs().filter(|&loc| self.get(loc) == Color::Empty)
    }

    /// Whether a line of six or more counts as a win under the current rule.
    /// Under renju this only ever applies to white, because the black
    /// overline move is forbidden and can never be played.
    pub fn six_wins(&self) -> bool {
        match self.rule {
            BasicRule::Freestyle | BasicRule::Renju => true,
            BasicRule::Standard => false,
        }
    }

    /// Sets a stone for initial position setup. Rejects occupied cells.
    pub fn set_stone(&mut self, loc: Loc, pla: Player) -> Result<(), PlayError> {
        if !self.is_on_board(loc) {
            return Err(PlayError::OffBoard);
        }
        if self.get(loc) != Color::Empty {
            return Err(PlayError::Occupied);
        }
        self.colors[loc.idx()] = pla.color();
        self.pos_hash ^= ZOBRIST.board[loc.idx()][pla.color() as usize];
        Ok(())
    }

    /// Removes a stone again; only for setup and the speculative scans in
    /// the forbidden-point test.
    pub fn clear_stone(&mut self, loc: Loc) {
        if let Some(pla) = self.get(loc).player() {
            self.colors[loc.idx()] = Color::Empty;
            self.pos_hash ^= ZOBRIST.board[loc.idx()][pla.color() as usize];
        }
    }

    /// Plays the specified move, assuming it is legal.
    pub fn play_move_assume_legal(&mut self, loc: Loc, pla: Player) {
        debug_assert!(self.get(loc) == Color::Empty, "playing on a non-empty cell");
        self.colors[loc.idx()] = pla.color();
        self.pos_hash ^= ZOBRIST.board[loc.idx()][pla.color() as usize];
        self.movenum += 1;
    }

    pub fn play_move(&mut self, loc: Loc, pla: Player) -> Result<(), PlayError> {
        if !self.is_legal(loc, pla) {
            if !self.is_on_board(loc) {
                return Err(PlayError::OffBoard);
            }
            if self.get(loc) != Color::Empty {
                return Err(PlayError::Occupied);
            }
            return Err(PlayError::Forbidden);
        }
        self.play_move_assume_legal(loc, pla);
        Ok(())
    }

    /// Strict legality: on-board, empty, and not a renju forbidden point.
    pub fn is_legal(&self, loc: Loc, pla: Player) -> bool {
        self.is_legal_ignoring_forbidden(loc)
            && !(self.rule == BasicRule::Renju && pla == Player::Black && self.is_forbidden(loc))
    }

    pub fn is_legal_ignoring_forbidden(&self, loc: Loc) -> bool {
        self.is_on_board(loc) && self.get(loc) == Color::Empty
    }

    /// What the position hash would be if this move were played. Assumes the
    /// location is empty.
    pub fn pos_hash_after_move(&self, loc: Loc, pla: Player) -> Hash128 {
        debug_assert!(self.get(loc) == Color::Empty);
        self.pos_hash ^ ZOBRIST.board[loc.idx()][pla.color() as usize]
    }

    /// The full position key including the side to move. Two positions
    /// differing only in whose turn it is hash differently.
    pub fn position_hash(&self, next_pla: Player) -> Hash128 {
        self.pos_hash ^ ZOBRIST.player[next_pla.idx()]
    }

    /// Recomputes the hash from scratch and checks the wall border.
    /// For tests and debugging.
    pub fn check_consistency(&self) -> Res<()> {
        let mut hash = ZOBRIST.size_x[self.x_size] ^ ZOBRIST.size_y[self.y_size];
        let mut stones = 0;
        for loc in self.locs() {
            match self.get(loc) {
                Color::Wall => bail!("wall inside the playable area at {loc:?}"),
                Color::Empty => {}
                c => {
                    hash ^= ZOBRIST.board[loc.idx()][c as usize];
                    stones += 1;
                }
            }
        }
        if hash != self.pos_hash {
            bail!("position hash out of sync: stored {} recomputed {hash}", self.pos_hash);
        }
        if stones > self.movenum && self.movenum != 0 {
            bail!("{stones} stones on board but movenum is {}", self.movenum);
        }
        Ok(())
    }

    /// Parses a board from the row-wise text form produced by `Display`,
    /// e.g. `".....\n..X..\n..O..\n.....\n....."`.
    pub fn parse_board(x_size: usize, y_size: usize, s: &str, rule: BasicRule) -> Res<Board> {
        let mut board = Board::new(x_size, y_size, rule)?;
        let rows: Vec<&str> = s.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if rows.len() != y_size {
            bail!("Expected {y_size} rows, got {}", rows.len());
        }
        for (y, row) in rows.iter().enumerate() {
            let cells: Vec<char> = row.chars().filter(|c| !c.is_whitespace()).collect();
            if cells.len() != x_size {
                bail!("Expected {x_size} cells in row {y}, got {}", cells.len());
            }
            for (x, &c) in cells.iter().enumerate() {
                let loc = Loc::from_xy(x, y, x_size);
                match c {
                    '.' | '-' => {}
                    'x' | 'X' | 'b' | 'B' => board.set_stone(loc, Player::Black).map_err(|e| anyhow!(e))?,
                    'o' | 'O' | 'w' | 'W' => board.set_stone(loc, Player::White).map_err(|e| anyhow!(e))?,
                    _ => bail!("Unknown board character '{c}'"),
                }
            }
        }
        board.movenum = board.locs().filter(|&l| board.get(l) != Color::Empty).count();
        Ok(board)
    }
}

impl Display for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for y in 0..self.y_size {
            for x in 0..self.x_size {
                if x > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", self.get(Loc::from_xy(x, y, self.x_size)).to_char())?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Board {}x{} movenum {} hash {}", self.x_size, self.y_size, self.movenum, self.pos_hash)?;
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_round_trips() {
        for x_size in [5usize, 15, 20] {
            for y in 0..x_size {
                for x in 0..x_size {
                    let loc = Loc::from_xy(x, y, x_size);
                    assert_eq!(loc.x(x_size), x);
                    assert_eq!(loc.y(x_size), y);
                }
            }
        }
    }

    #[test]
    fn play_toggles_hash() {
        let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let empty_hash = board.pos_hash;
        let loc = Loc::from_xy(7, 7, 15);
        board.play_move_assume_legal(loc, Player::Black);
        assert_ne!(board.pos_hash, empty_hash);
        board.clear_stone(loc);
        assert_eq!(board.pos_hash, empty_hash);
        board.check_consistency().unwrap();
    }

    #[test]
    fn side_to_move_changes_position_hash() {
        let board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        assert_ne!(board.position_hash(Player::Black), board.position_hash(Player::White));
    }

    #[test]
    fn set_stone_rejects_occupied() {
        let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let loc = Loc::from_xy(3, 4, 15);
        board.set_stone(loc, Player::Black).unwrap();
        assert_eq!(board.set_stone(loc, Player::White), Err(PlayError::Occupied));
    }

    #[test]
    fn walls_bound_the_grid() {
        let board = Board::new(5, 5, BasicRule::Freestyle).unwrap();
        let corner = Loc::from_xy(0, 0, 5);
        for &off in &board.adj_offsets[..2] {
            assert_eq!(board.get(corner.offset(off)), Color::Wall);
        }
        assert!(!board.is_on_board(Loc::NULL));
        assert!(!board.is_on_board(Loc::PASS));
    }

    #[test]
    fn same_position_same_hash_regardless_of_order() {
        let mut a = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let mut b = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let l1 = Loc::from_xy(3, 3, 15);
        let l2 = Loc::from_xy(11, 4, 15);
        a.play_move_assume_legal(l1, Player::Black);
        a.play_move_assume_legal(l2, Player::White);
        b.play_move_assume_legal(l2, Player::White);
        b.play_move_assume_legal(l1, Player::Black);
        assert_eq!(a.pos_hash, b.pos_hash);
    }

    #[test]
    fn parse_and_display_round_trip() {
        let s = "\
            . . . . .\n\
            . X . . .\n\
            . . O . .\n\
            . . . X .\n\
            . . . . .\n";
        let board = Board::parse_board(5, 5, s, BasicRule::Freestyle).unwrap();
        assert_eq!(board.get(Loc::from_xy(1, 1, 5)), Color::Black);
        assert_eq!(board.get(Loc::from_xy(2, 2, 5)), Color::White);
        assert_eq!(board.movenum, 3);
        let printed = board.to_string();
        let reparsed = Board::parse_board(5, 5, &printed, BasicRule::Freestyle).unwrap();
        assert_eq!(reparsed.pos_hash, board.pos_hash);
    }
}
