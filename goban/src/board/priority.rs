use crate::board::{Board, Color, Loc, Player};
use crate::rules::BasicRule;

/// How urgent a candidate move is, highest severity first. Move generation
/// sorts ascending, so completing a five always comes before defending one.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[must_use]
pub enum MovePriority {
    /// Completes five in a row and wins on the spot.
    Five,
    /// Blocks a five the opponent could complete next turn.
    OppFour,
    /// Creates a four with two distinct completions.
    MyLifeFour,
    /// A move on a proven consecutive-four winning line. Assigned by the
    /// threat solver, never by the board scan itself.
    Vcf,
    Normal,
    /// A pass or a move that cannot affect the outcome.
    Useless,
    Illegal,
}

impl MovePriority {
    pub fn is_winning(self) -> bool {
        self == MovePriority::Five
    }
}

impl Board {
    /// The four positive line offsets: -, |, \ and /.
    pub(crate) fn line_offsets(&self) -> [isize; 4] {
        let stride = (self.x_size + 1) as isize;
        [1, stride, stride + 1, stride - 1]
    }

    /// Number of consecutive `pla` stones starting at `loc + off` and walking
    /// in that direction, plus the first location past the run. The wall
    /// border guarantees the walk terminates.
    fn run_one_direction(&self, pla: Player, loc: Loc, off: isize) -> (usize, Loc) {
        let color = pla.color();
        let mut count = 0;
        let mut cur = loc.offset(off);
        while self.get(cur) == color {
            count += 1;
            cur = cur.offset(off);
        }
        (count, cur)
    }

    /// Classifies the line through `loc` along one direction, treating `loc`
    /// as occupied by `pla` whether or not the stone is actually placed yet.
    fn priority_one_direction(&self, pla: Player, loc: Loc, off: isize, six_win: bool) -> MovePriority {
        let (c_plus, stop_plus) = self.run_one_direction(pla, loc, off);
        let (c_minus, stop_minus) = self.run_one_direction(pla, loc, -off);
        let len = 1 + c_plus + c_minus;
        if if six_win { len >= 5 } else { len == 5 } {
            return MovePriority::Five;
        }
        if len >= 5 {
            // an overline that doesn't win can't be extended into a five either
            return MovePriority::Normal;
        }
        let mut completions = 0;
        for (stop, o) in [(stop_plus, off), (stop_minus, -off)] {
            if self.get(stop) == Color::Empty {
                let (beyond, _) = self.run_one_direction(pla, stop, o);
                let total = len + 1 + beyond;
                if if six_win { total >= 5 } else { total == 5 } {
                    completions += 1;
                }
            }
        }
        if completions >= 2 { MovePriority::MyLifeFour } else { MovePriority::Normal }
    }

    /// Classifies `loc` for `pla` assuming the move is legal. Works both
    /// before the stone is placed and immediately after, since only the
    /// neighboring cells are scanned.
    pub fn get_move_priority_assume_legal(&self, pla: Player, loc: Loc) -> MovePriority {
        if loc == Loc::PASS {
            return MovePriority::Useless;
        }
        let six_win = self.six_wins();
        let mut best = MovePriority::Normal;
        for off in self.line_offsets() {
            let p = self.priority_one_direction(pla, loc, off, six_win);
            if p == MovePriority::Five {
                return MovePriority::Five;
            }
            best = best.min(p);
        }
        let opp = pla.opponent();
        for off in self.line_offsets() {
            if self.priority_one_direction(opp, loc, off, six_win) == MovePriority::Five {
                best = best.min(MovePriority::OppFour);
                break;
            }
        }
        best
    }

    /// Classifies `loc` for `pla`, including legality. A renju forbidden
    /// point is `Illegal` for black unless it completes a five, which always
    /// takes precedence.
    pub fn get_move_priority(&self, pla: Player, loc: Loc) -> MovePriority {
        if loc == Loc::PASS {
            return MovePriority::Useless;
        }
        if !self.is_legal_ignoring_forbidden(loc) {
            return MovePriority::Illegal;
        }
        let priority = self.get_move_priority_assume_legal(pla, loc);
        if priority == MovePriority::Five {
            return MovePriority::Five;
        }
        if self.rule == BasicRule::Renju && pla == Player::Black && self.is_forbidden(loc) {
            return MovePriority::Illegal;
        }
        priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::rules::BasicRule;

    fn loc(x: usize, y: usize) -> Loc {
        Loc::from_xy(x, y, 15)
    }

    fn board_with(stones: &[(usize, usize, Player)], rule: BasicRule) -> Board {
        let mut board = Board::new(15, 15, rule).unwrap();
        for &(x, y, pla) in stones {
            board.set_stone(loc(x, y), pla).unwrap();
        }
        board
    }

    #[test]
    fn completing_five_is_five() {
        let board = board_with(
            &[(7, 7, Player::Black), (7, 8, Player::Black), (7, 9, Player::Black), (7, 10, Player::Black)],
            BasicRule::Freestyle,
        );
        assert_eq!(board.get_move_priority(Player::Black, loc(7, 11)), MovePriority::Five);
        assert_eq!(board.get_move_priority(Player::Black, loc(7, 6)), MovePriority::Five);
        assert_eq!(board.get_move_priority(Player::Black, loc(0, 0)), MovePriority::Normal);
    }

    #[test]
    fn gap_fill_making_five_is_five() {
        // X X . X X with the gap at (7,9)
        let board = board_with(
            &[(7, 7, Player::Black), (7, 8, Player::Black), (7, 10, Player::Black), (7, 11, Player::Black)],
            BasicRule::Freestyle,
        );
        assert_eq!(board.get_move_priority(Player::Black, loc(7, 9)), MovePriority::Five);
    }

    #[test]
    fn blocking_opponent_five_is_opp_four() {
        let board = board_with(
            &[(3, 3, Player::White), (4, 4, Player::White), (5, 5, Player::White), (6, 6, Player::White)],
            BasicRule::Freestyle,
        );
        assert_eq!(board.get_move_priority(Player::Black, loc(7, 7)), MovePriority::OppFour);
        assert_eq!(board.get_move_priority(Player::Black, loc(2, 2)), MovePriority::OppFour);
    }

    #[test]
    fn open_four_is_life_four() {
        // . X X X . -> playing either end empty would give a four with two
        // completions only for the open-four construction below
        let board = board_with(
            &[(6, 7, Player::Black), (7, 7, Player::Black), (8, 7, Player::Black)],
            BasicRule::Freestyle,
        );
        // playing at (5,7) makes .XXXX. : both (4,7) and (9,7) complete five
        assert_eq!(board.get_move_priority(Player::Black, loc(5, 7)), MovePriority::MyLifeFour);
    }

    #[test]
    fn exact_five_rule_ignores_overline() {
        let board = board_with(
            &[
                (7, 6, Player::Black),
                (7, 7, Player::Black),
                (7, 8, Player::Black),
                (7, 9, Player::Black),
                (7, 11, Player::Black),
            ],
            BasicRule::Standard,
        );
        // filling (7,10) would make six in a row, which is dead under standard
        assert_eq!(board.get_move_priority(Player::Black, loc(7, 10)), MovePriority::Normal);
        let freestyle = board_with(
            &[
                (7, 6, Player::Black),
                (7, 7, Player::Black),
                (7, 8, Player::Black),
                (7, 9, Player::Black),
                (7, 11, Player::Black),
            ],
            BasicRule::Freestyle,
        );
        assert_eq!(freestyle.get_move_priority(Player::Black, loc(7, 10)), MovePriority::Five);
    }

    #[test]
    fn occupied_is_illegal() {
        let board = board_with(&[(7, 7, Player::Black)], BasicRule::Freestyle);
        assert_eq!(board.get_move_priority(Player::White, loc(7, 7)), MovePriority::Illegal);
    }
}
