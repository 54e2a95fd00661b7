use goban::board::{Board, Color, Loc, Player};
use goban::history::BoardHistory;
use goban::rules::{BasicRule, Rules};
use proptest::prelude::*;

fn arbitrary_game(max_moves: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0usize..15, 0usize..15), 0..max_moves)
}

proptest! {
    /// Replaying the recorded move list always reproduces the position hash.
    #[test]
    fn hash_equals_replay_hash(moves in arbitrary_game(60)) {
        let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let mut hist = BoardHistory::new(&board, Player::Black, Rules::freestyle());
        let mut pla = Player::Black;
        for (x, y) in moves {
            let loc = Loc::from_xy(x, y, 15);
            if hist.make_board_move_tolerant(&mut board, loc, pla) {
                pla = pla.opponent();
            }
            if hist.is_game_finished {
                break;
            }
        }
        let mut replayed = hist.initial_board.clone();
        for mv in &hist.move_history {
            replayed.play_move_assume_legal(mv.loc, mv.pla);
        }
        prop_assert_eq!(replayed.pos_hash, board.pos_hash);
        board.check_consistency().unwrap();
    }

    /// Undo after a move restores the exact previous board.
    #[test]
    fn play_then_undo_is_identity(moves in arbitrary_game(30), extra in (0usize..15, 0usize..15)) {
        let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let mut hist = BoardHistory::new(&board, Player::Black, Rules::freestyle());
        let mut pla = Player::Black;
        for (x, y) in moves {
            if hist.is_game_finished {
                break;
            }
            if hist.make_board_move_tolerant(&mut board, Loc::from_xy(x, y, 15), pla) {
                pla = pla.opponent();
            }
        }
        let extra_loc = Loc::from_xy(extra.0, extra.1, 15);
        if !hist.is_game_finished && board.get(extra_loc) == Color::Empty {
            let hash_before = board.pos_hash;
            let moves_before = hist.move_history.len();
            hist.make_board_move_assume_legal(&mut board, extra_loc, pla);
            hist.undo(&mut board).unwrap();
            prop_assert_eq!(board.pos_hash, hash_before);
            prop_assert_eq!(hist.move_history.len(), moves_before);
        }
    }

    /// Five-priority exactly characterizes the winning moves, and under
    /// renju a five is never forbidden.
    #[test]
    fn five_iff_wins_and_never_forbidden(moves in arbitrary_game(40)) {
        let mut board = Board::new(15, 15, BasicRule::Renju).unwrap();
        let mut hist = BoardHistory::new(&board, Player::Black, Rules::renju());
        let mut pla = Player::Black;
        for (x, y) in moves {
            if hist.is_game_finished {
                break;
            }
            if hist.make_board_move_tolerant(&mut board, Loc::from_xy(x, y, 15), pla) {
                pla = pla.opponent();
            }
        }
        if hist.is_game_finished {
            return Ok(());
        }
        for loc in board.locs() {
            if board.get(loc) != Color::Empty {
                continue;
            }
            let priority = board.get_move_priority(Player::Black, loc);
            if priority == goban::board::MovePriority::Five {
                prop_assert!(!board.is_forbidden(loc));
                // playing it must end the game with black winning
                let mut b2 = board.clone();
                let mut h2 = hist.clone();
                h2.make_board_move_assume_legal(&mut b2, loc, Player::Black);
                prop_assert!(h2.is_game_finished);
                prop_assert_eq!(h2.winner, Some(Player::Black));
            }
        }
    }
}
