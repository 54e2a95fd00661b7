use anyhow::bail;

use crate::board::{Board, Loc, Move, MovePriority, Player};
use crate::core::common::Res;
use crate::rules::Rules;

/// How many past boards are kept for the evaluator's recent-move channels.
pub const NUM_RECENT_BOARDS: usize = 6;

/// The slack under which a nearly full board is declared a no-result. Kept
/// from the ancestral engine rather than waiting for the last empty cell;
/// games this long are dead draws either way.
pub const NO_RESULT_SLACK: usize = 10;

/// A board plus everything the game state needs beyond stone placement:
/// the move list that produced it, a ring buffer of recent boards for the
/// evaluator, and the result flags.
#[derive(Clone)]
pub struct BoardHistory {
    pub rules: Rules,
    pub initial_board: Board,
    pub initial_pla: Player,
    pub move_history: Vec<Move>,
    recent_boards: [Board; NUM_RECENT_BOARDS],
    current_recent_board_idx: usize,
    pub presumed_next_move_pla: Player,
    pub is_game_finished: bool,
    /// `Some(pla)` once won; `None` while running or when the game ended
    /// with no winner (see [`BoardHistory::is_no_result`]).
    pub winner: Option<Player>,
    pub is_no_result: bool,
    pub is_resignation: bool,
}

impl BoardHistory {
    pub fn new(board: &Board, pla: Player, rules: Rules) -> Self {
        BoardHistory {
            rules,
            initial_board: board.clone(),
            initial_pla: pla,
            move_history: vec![],
            recent_boards: std::array::from_fn(|_| board.clone()),
            current_recent_board_idx: 0,
            presumed_next_move_pla: pla,
            is_game_finished: false,
            winner: None,
            is_no_result: false,
            is_resignation: false,
        }
    }

    pub fn clear(&mut self, board: &Board, pla: Player) {
        *self = BoardHistory::new(board, pla, self.rules);
    }

    /// The board as it was `moves_ago` moves ago, saturating at the oldest
    /// retained board.
    pub fn get_recent_board(&self, moves_ago: usize) -> &Board {
        let moves_ago = moves_ago.min(NUM_RECENT_BOARDS - 1);
        let idx = (self.current_recent_board_idx + NUM_RECENT_BOARDS - moves_ago) % NUM_RECENT_BOARDS;
        &self.recent_boards[idx]
    }

    pub fn is_legal(&self, board: &Board, loc: Loc, pla: Player) -> bool {
        !self.is_game_finished && board.is_legal(loc, pla)
    }

    pub fn make_board_move_tolerant(&mut self, board: &mut Board, loc: Loc, pla: Player) -> bool {
        if self.is_game_finished || !board.is_legal_ignoring_forbidden(loc) {
            return false;
        }
        self.make_board_move_assume_legal(board, loc, pla);
        true
    }

    /// Plays the move, updates the ring buffer and the move list, and runs
    /// terminal detection. A move on a finished game is a caller bug;
    /// checked in debug, ignored in release.
    pub fn make_board_move_assume_legal(&mut self, board: &mut Board, loc: Loc, pla: Player) {
        debug_assert!(!self.is_game_finished, "move on a finished game");
        if self.is_game_finished {
            return;
        }
        board.play_move_assume_legal(loc, pla);

        self.current_recent_board_idx = (self.current_recent_board_idx + 1) % NUM_RECENT_BOARDS;
        self.recent_boards[self.current_recent_board_idx] = board.clone();
        self.move_history.push(Move::new(loc, pla));
        self.presumed_next_move_pla = pla.opponent();

        if board.get_move_priority_assume_legal(pla, loc) == MovePriority::Five {
            self.end_game(Some(pla));
        } else if board.movenum + NO_RESULT_SLACK >= board.area() {
            self.end_game(None);
        }
    }

    pub fn end_game(&mut self, winner: Option<Player>) {
        self.is_game_finished = true;
        self.winner = winner;
        self.is_no_result = winner.is_none();
        self.is_resignation = false;
    }

    pub fn set_winner_by_resignation(&mut self, pla: Player) {
        self.is_game_finished = true;
        self.winner = Some(pla);
        self.is_no_result = false;
        self.is_resignation = true;
    }

    /// Takes back the last move by replaying the rest from the initial
    /// position. Restores the board, the hash and the ring buffer exactly.
    pub fn undo(&mut self, board: &mut Board) -> Res<()> {
        let Some(_) = self.move_history.pop() else {
            bail!("No move to undo");
        };
        let moves: Vec<Move> = self.move_history.drain(..).collect();
        *board = self.initial_board.clone();
        let initial_pla = self.initial_pla;
        self.clear(&board.clone(), initial_pla);
        for mv in moves {
            self.make_board_move_assume_legal(board, mv.loc, mv.pla);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::BasicRule;

    fn setup() -> (Board, BoardHistory) {
        let board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let hist = BoardHistory::new(&board, Player::Black, Rules::freestyle());
        (board, hist)
    }

    fn loc(x: usize, y: usize) -> Loc {
        Loc::from_xy(x, y, 15)
    }

    #[test]
    fn five_in_a_row_ends_the_game() {
        let (mut board, mut hist) = setup();
        for i in 0..4 {
            hist.make_board_move_assume_legal(&mut board, loc(7, 7 + i), Player::Black);
            hist.make_board_move_assume_legal(&mut board, loc(0, i), Player::White);
        }
        assert!(!hist.is_game_finished);
        hist.make_board_move_assume_legal(&mut board, loc(7, 11), Player::Black);
        assert!(hist.is_game_finished);
        assert_eq!(hist.winner, Some(Player::Black));
        assert!(!hist.is_no_result);
    }

    #[test]
    fn undo_restores_board_and_hash() {
        let (mut board, mut hist) = setup();
        hist.make_board_move_assume_legal(&mut board, loc(7, 7), Player::Black);
        let hash_before = board.pos_hash;
        let movenum_before = board.movenum;
        hist.make_board_move_assume_legal(&mut board, loc(8, 8), Player::White);
        hist.undo(&mut board).unwrap();
        assert_eq!(board.pos_hash, hash_before);
        assert_eq!(board.movenum, movenum_before);
        assert_eq!(hist.move_history.len(), 1);
        assert!(hist.undo(&mut board).is_ok());
        assert!(hist.undo(&mut board).is_err());
    }

    #[test]
    fn recent_boards_track_positions() {
        let (mut board, mut hist) = setup();
        let empty_hash = board.pos_hash;
        hist.make_board_move_assume_legal(&mut board, loc(3, 3), Player::Black);
        let after_one = board.pos_hash;
        hist.make_board_move_assume_legal(&mut board, loc(4, 4), Player::White);
        assert_eq!(hist.get_recent_board(0).pos_hash, board.pos_hash);
        assert_eq!(hist.get_recent_board(1).pos_hash, after_one);
        assert_eq!(hist.get_recent_board(2).pos_hash, empty_hash);
        // saturates rather than wrapping
        assert_eq!(hist.get_recent_board(100).pos_hash, empty_hash);
    }

    #[test]
    fn replay_reproduces_hash() {
        let (mut board, mut hist) = setup();
        let moves = [(7usize, 7usize), (8, 8), (7, 8), (8, 7), (7, 9)];
        let mut pla = Player::Black;
        for &(x, y) in &moves {
            hist.make_board_move_assume_legal(&mut board, loc(x, y), pla);
            pla = pla.opponent();
        }
        let mut replayed = hist.initial_board.clone();
        for mv in &hist.move_history {
            replayed.play_move_assume_legal(mv.loc, mv.pla);
        }
        assert_eq!(replayed.pos_hash, board.pos_hash);
    }
}
