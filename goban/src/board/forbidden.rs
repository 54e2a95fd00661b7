//! Renju forbidden-point detection for black: double-threes, double-fours
//! and overlines, with the rulebook precedence that an immediate five is
//! never forbidden.
//!
//! The definitions are mutually recursive: an open three is a three whose
//! four-completion would itself be a legal (non-forbidden) open four. The
//! checks therefore place speculative stones on a scratch copy of the grid
//! and recurse. Termination holds because every nested check fills another
//! empty cell.

use crate::board::{Board, Color, Loc, MAX_ARR_SIZE, Player};

impl Board {
    /// Whether placing a black stone at `loc` is forbidden under renju.
    /// Always false for occupied cells and for cells completing a five.
    pub fn is_forbidden(&self, loc: Loc) -> bool {
        if !self.is_on_board(loc) || self.get(loc) != Color::Empty {
            return false;
        }
        // Cheap filter: a forbidden shape needs at least two black stones
        // within the surrounding 5x5 box, not counting knight-distance cells.
        let x = loc.x(self.x_size) as isize;
        let y = loc.y(self.x_size) as isize;
        let mut nearby_black = 0;
        for dy in -2isize..=2 {
            for dx in -2isize..=2 {
                if dx == 0 && dy == 0 || dx.abs() + dy.abs() == 3 {
                    continue;
                }
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= self.x_size as isize || ny >= self.y_size as isize {
                    continue;
                }
                if self.get(Loc::from_xy(nx as usize, ny as usize, self.x_size)) == Color::Black {
                    nearby_black += 1;
                }
            }
        }
        if nearby_black < 2 {
            return false;
        }
        let mut finder = Finder::new(self);
        finder.is_forbidden_no_nearby_check(loc)
    }
}

struct Finder {
    colors: [Color; MAX_ARR_SIZE],
    offs: [isize; 4],
}

impl Finder {
    fn new(board: &Board) -> Self {
        Self { colors: *board.colors(), offs: board.line_offsets() }
    }

    fn get(&self, loc: Loc) -> Color {
        self.colors[loc.idx()]
    }

    fn set(&mut self, loc: Loc, color: Color) {
        self.colors[loc.idx()] = color;
    }

    /// Consecutive stones of `color` walking from `loc + off` onward, plus
    /// the first cell past the run.
    fn run(&self, loc: Loc, off: isize, color: Color) -> (usize, Loc) {
        let mut count = 0;
        let mut cur = loc.offset(off);
        while self.get(cur) == color {
            count += 1;
            cur = cur.offset(off);
        }
        (count, cur)
    }

    /// Line length through `loc` along `off` if a stone of `color` stood there.
    fn line_len(&self, loc: Loc, off: isize, color: Color) -> usize {
        let (a, _) = self.run(loc, off, color);
        let (b, _) = self.run(loc, -off, color);
        1 + a + b
    }

    /// Would this move complete a five? Exactly five for black, five or
    /// more for white.
    fn is_five(&self, loc: Loc, pla: Player) -> bool {
        if self.get(loc) != Color::Empty {
            return false;
        }
        let color = pla.color();
        self.offs.iter().any(|&off| {
            let len = self.line_len(loc, off, color);
            if pla == Player::Black { len == 5 } else { len >= 5 }
        })
    }

    /// Exactly five along one particular direction; the completion test used
    /// inside the four/open-four scans for both colors.
    fn is_five_in_dir(&self, loc: Loc, off: isize, color: Color) -> bool {
        self.get(loc) == Color::Empty && self.line_len(loc, off, color) == 5
    }

    /// A black overline, unless some direction makes an exact five, which
    /// takes precedence.
    fn is_overline(&self, loc: Loc) -> bool {
        if self.get(loc) != Color::Empty {
            return false;
        }
        let mut overline = false;
        for &off in &self.offs {
            let len = self.line_len(loc, off, Color::Black);
            if len == 5 {
                return false;
            }
            overline |= len >= 6;
        }
        overline
    }

    /// Walks outward from `loc` over black stones along `off`; applies `check`
    /// to the first empty cell on each side. Expects the stone at `loc` to
    /// already be placed by the caller.
    fn first_empty_each_side(&self, loc: Loc, off: isize) -> [Option<Loc>; 2] {
        let mut res = [None, None];
        for (slot, o) in [(0usize, off), (1, -off)] {
            let (_, stop) = self.run(loc, o, Color::Black);
            if self.get(stop) == Color::Empty {
                res[slot] = Some(stop);
            }
        }
        res
    }

    /// A four: some single follow-up completes an exact five in this
    /// direction. Not itself a five or an overline.
    fn is_four(&mut self, loc: Loc, off: isize) -> bool {
        if self.get(loc) != Color::Empty || self.is_five(loc, Player::Black) || self.is_overline(loc) {
            return false;
        }
        self.set(loc, Color::Black);
        let found = self
            .first_empty_each_side(loc, off)
            .into_iter()
            .flatten()
            .any(|e| self.is_five_in_dir(e, off, Color::Black));
        self.set(loc, Color::Empty);
        found
    }

    /// 0: not an open four. 1: a true open four (a straight four with both
    /// ends completing five). 2: a shape whose both-sided completions come
    /// from a longer broken line, which renju counts as two fours.
    fn is_open_four(&mut self, loc: Loc, off: isize) -> u32 {
        if self.get(loc) != Color::Empty || self.is_five(loc, Player::Black) || self.is_overline(loc) {
            return 0;
        }
        self.set(loc, Color::Black);
        let (back, back_stop) = self.run(loc, -off, Color::Black);
        let (fwd, fwd_stop) = self.run(loc, off, Color::Black);
        let result = if self.get(back_stop) == Color::Empty
            && self.get(fwd_stop) == Color::Empty
            && self.is_five_in_dir(back_stop, off, Color::Black)
            && self.is_five_in_dir(fwd_stop, off, Color::Black)
        {
            if 1 + back + fwd == 4 { 1 } else { 2 }
        } else {
            0
        };
        self.set(loc, Color::Empty);
        result
    }

    fn is_double_four(&mut self, loc: Loc) -> bool {
        if self.get(loc) != Color::Empty || self.is_five(loc, Player::Black) {
            return false;
        }
        let mut fours = 0;
        for off in self.offs {
            match self.is_open_four(loc, off) {
                2 => fours += 2,
                _ if self.is_four(loc, off) => fours += 1,
                _ => {}
            }
        }
        fours >= 2
    }

    /// An open three: extending it at the right empty cell yields a clean
    /// open four that is not itself forbidden as a double-four or
    /// double-three for black.
    fn is_open_three(&mut self, loc: Loc, off: isize) -> bool {
        if self.get(loc) != Color::Empty || self.is_five(loc, Player::Black) || self.is_overline(loc) {
            return false;
        }
        self.set(loc, Color::Black);
        let mut found = false;
        for e in self.first_empty_each_side(loc, off).into_iter().flatten() {
            if self.is_open_four(e, off) == 1 && !self.is_double_four(e) && !self.is_double_three(e) {
                found = true;
                break;
            }
        }
        self.set(loc, Color::Empty);
        found
    }

    fn is_double_three(&mut self, loc: Loc) -> bool {
        if self.get(loc) != Color::Empty || self.is_five(loc, Player::Black) {
            return false;
        }
        let mut threes = 0;
        for off in self.offs {
            if self.is_open_three(loc, off) {
                threes += 1;
            }
        }
        threes >= 2
    }

    fn is_forbidden_no_nearby_check(&mut self, loc: Loc) -> bool {
        self.is_double_three(loc) || self.is_double_four(loc) || self.is_overline(loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{MovePriority, Player};
    use crate::rules::BasicRule;

    fn loc(x: usize, y: usize) -> Loc {
        Loc::from_xy(x, y, 15)
    }

    fn renju_board(black: &[(usize, usize)], white: &[(usize, usize)]) -> Board {
        let mut board = Board::new(15, 15, BasicRule::Renju).unwrap();
        for &(x, y) in black {
            board.set_stone(loc(x, y), Player::Black).unwrap();
        }
        for &(x, y) in white {
            board.set_stone(loc(x, y), Player::White).unwrap();
        }
        board
    }

    #[test]
    fn empty_area_is_never_forbidden() {
        let board = renju_board(&[(7, 7)], &[]);
        assert!(!board.is_forbidden(loc(0, 0)));
        assert!(!board.is_forbidden(loc(7, 8)));
    }

    #[test]
    fn double_three_is_forbidden() {
        // playing (7,7): row 7 becomes X X X open on both sides, column 7
        // likewise, two open threes in different lines
        let board = renju_board(&[(6, 7), (8, 7), (7, 6), (7, 8)], &[]);
        assert!(board.is_forbidden(loc(7, 7)));
        // a single diagonal three is not a double-three and stays legal
        let single = renju_board(&[(7, 7), (8, 8)], &[(0, 0)]);
        assert!(!single.is_forbidden(loc(6, 6)));
    }

    #[test]
    fn double_four_is_forbidden() {
        // two crossing closed fours completed by the same point
        let board = renju_board(
            &[(7, 6), (7, 5), (7, 4), (6, 7), (5, 7), (4, 7)],
            &[(7, 3), (3, 7)],
        );
        // (7,7) completes a four downward in the column and a four leftward
        // in the row; each is blocked on the far side so neither is a five
        assert!(board.is_forbidden(loc(7, 7)));
    }

    #[test]
    fn overline_is_forbidden() {
        let board = renju_board(&[(4, 7), (5, 7), (6, 7), (8, 7), (9, 7)], &[]);
        assert!(board.is_forbidden(loc(7, 7)));
    }

    #[test]
    fn five_takes_precedence_over_forbidden() {
        // completing five and an overline shape in another direction at once
        let board = renju_board(
            &[
                (2, 7),
                (3, 7),
                (4, 7),
                (5, 7),
                // column: four black stones so (6,7) also makes five vertically
                (6, 5),
                (6, 6),
                (6, 8),
                (6, 9),
            ],
            &[],
        );
        assert!(!board.is_forbidden(loc(6, 7)));
        assert_eq!(board.get_move_priority(Player::Black, loc(6, 7)), MovePriority::Five);
    }

    #[test]
    fn white_is_never_forbidden() {
        let board = renju_board(&[], &[(6, 7), (8, 7), (7, 6), (7, 8)]);
        // the forbidden test only looks at black shapes
        assert!(!board.is_forbidden(loc(7, 7)));
        assert!(board.is_legal(loc(7, 7), Player::White));
    }

    #[test]
    fn broken_three_is_forbidden_with_crossing_three() {
        // X . X shapes: (5,7),(7,7) row gap at (6,7) plus (6,5),(6,6) column
        let board = renju_board(&[(5, 7), (7, 7), (6, 5), (6, 6)], &[]);
        // playing (6,7): row becomes X X X with open ends at (4,7),(8,7);
        // column becomes three in a row open at (6,4) and (6,8)
        assert!(board.is_forbidden(loc(6, 7)));
    }
}
