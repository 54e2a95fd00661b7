//! Victory-by-Continuous-Fours solver.
//!
//! Proves or disproves a forced win where every attacking move makes a
//! four, so the defender has exactly one reply each turn. The pruning is
//! extreme by construction: attacker candidates come only from the
//! eligible-three list (windows holding exactly three attacker stones and
//! no defender stones), and the defender's reply is always the unique
//! five-completion point of the four just made.
//!
//! The board is kept in attacker/defender perspective with per-window
//! stone counters, five cells per window in each of the four line
//! directions. A window that ever contains both colors is dead and never
//! becomes eligible again.

pub mod table;

use std::sync::LazyLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

use arrayvec::ArrayVec;
use goban::board::{Board, Loc, MAX_LEN, Player};
use goban::board::zobrist::ZOBRIST;
use goban::core::hash::Hash128;
use goban::core::rand::Rand;
use goban::rules::BasicRule;

use table::{CachedResult, VcfTable};

const SZ: usize = MAX_LEN;

/// Default budget when the caller doesn't care; roughly a millisecond of
/// work on a full board.
pub const DEFAULT_NODE_BUDGET: u64 = 20_000;

/// Outcome of a solver run. `Aborted` means the node budget ran out before
/// a proof either way; callers must treat it as "unknown", never as a
/// disproof.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub enum VcfResult {
    ProvenWin(Loc),
    Disproven,
    Aborted,
}

impl VcfResult {
    pub fn winning_move(self) -> Option<Loc> {
        match self {
            VcfResult::ProvenWin(loc) => Some(loc),
            _ => None,
        }
    }
}

/// Lifetime counters across all solver runs in the process, for the
/// benchmark report.
pub static TOTAL_SOLVED: AtomicU64 = AtomicU64::new(0);
pub static TOTAL_ABORTED: AtomicU64 = AtomicU64::new(0);
pub static TOTAL_NODES: AtomicU64 = AtomicU64::new(0);

struct VcfZobrist {
    /// Indexed by `[side][y][x]` where side 0 is the attacker.
    stone: [[[Hash128; SZ]; SZ]; 2],
    attacker_black: Hash128,
}

static ZOB: LazyLock<VcfZobrist> = LazyLock::new(|| {
    let mut rand = Rand::from_seed(0x7c5f_0000_c4f5);
    let mut stone = [[[Hash128::ZERO; SZ]; SZ]; 2];
    for side in &mut stone {
        for row in side.iter_mut() {
            for h in row.iter_mut() {
                *h = Hash128::new(rand.next_u64(), rand.next_u64());
            }
        }
    }
    VcfZobrist { stone, attacker_black: Hash128::new(rand.next_u64(), rand.next_u64()) }
});

static TABLE: LazyLock<VcfTable> = LazyLock::new(|| VcfTable::new(20));

const EM: u8 = 0;
const MY: u8 = 1;
const OPP: u8 = 2;

/// Poison added to a window count when a same-colored stone sits just
/// outside the window, which would turn the five into an overline. Large
/// enough that the count can never read as an eligible 3 or 4 again.
const SIX_POISON: u8 = 6;

/// (dx, dy) per direction: -, |, \ and /.
const DIRS: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Pt {
    x: u8,
    y: u8,
}

enum Outcome {
    Win { mov: Pt, plies: u32 },
    Fail,
    Abort,
}

pub struct VcfSolver {
    x_size: usize,
    y_size: usize,
    rule: BasicRule,
    attacker: Player,
    cells: [[u8; SZ]; SZ],
    my_count: [[[u8; SZ]; SZ]; 4],
    opp_count: [[[u8; SZ]; SZ]; 4],
    /// Windows that held exactly three attacker stones when appended.
    /// Entries can go stale; they are revalidated against the counters at
    /// use, and truncated back on undo.
    threes: Vec<(u8, Pt)>,
    /// The real board, kept in sync so renju forbidden tests are exact.
    mirror: Board,
    hash: Hash128,
    nodes: u64,
    node_budget: u64,
    /// Plies of the shortest proven line, counting both sides' moves.
    pub best_move_num: u32,
}

impl VcfSolver {
    /// One-shot convenience over [`VcfSolver::solve`].
    pub fn run(board: &Board, pla: Player, node_budget: u64) -> VcfResult {
        VcfSolver::new(board, pla, node_budget).solve()
    }

    pub fn new(board: &Board, attacker: Player, node_budget: u64) -> Self {
        let mut solver = VcfSolver {
            x_size: board.x_size,
            y_size: board.y_size,
            rule: board.rule,
            attacker,
            cells: [[EM; SZ]; SZ],
            my_count: [[[0; SZ]; SZ]; 4],
            opp_count: [[[0; SZ]; SZ]; 4],
            threes: Vec::with_capacity(4 * SZ * SZ),
            mirror: board.clone(),
            hash: ZOBRIST.size_x[board.x_size]
                ^ ZOBRIST.size_y[board.y_size]
                ^ ZOBRIST.rule[board.rule as usize],
            nodes: 0,
            node_budget,
            best_move_num: 0,
        };
        if attacker == Player::Black {
            solver.hash ^= ZOB.attacker_black;
        }
        solver.set_board(board);
        solver
    }

    pub fn nodes_used(&self) -> u64 {
        self.nodes
    }

    /// Runs the proof search. The result for the root position also lands
    /// in the process-wide transposition table.
    pub fn solve(&mut self) -> VcfResult {
        let result = self.solve_root();
        TOTAL_NODES.fetch_add(self.nodes, Relaxed);
        match result {
            VcfResult::Aborted => TOTAL_ABORTED.fetch_add(1, Relaxed),
            _ => TOTAL_SOLVED.fetch_add(1, Relaxed),
        };
        result
    }

    fn solve_root(&mut self) -> VcfResult {
        // immediate completions first: any attacker four already on the board
        let mut root_my_fives: ArrayVec<Pt, 8> = ArrayVec::new();
        let mut root_opp_fives: ArrayVec<Pt, 8> = ArrayVec::new();
        self.for_each_window(|solver, t, anchor| {
            if solver.my_count[t][anchor.y as usize][anchor.x as usize] == 4
                && solver.opp_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON == 0
            {
                if let Some(p) = solver.window_single_empty(t, anchor) {
                    if !solver.forbidden_for(solver.attacker, p) && !root_my_fives.is_full() {
                        root_my_fives.push(p);
                    }
                }
            }
            if solver.opp_count[t][anchor.y as usize][anchor.x as usize] == 4
                && solver.my_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON == 0
            {
                if let Some(p) = solver.window_single_empty(t, anchor) {
                    if !solver.forbidden_for(solver.attacker.opponent(), p) && !root_opp_fives.is_full() {
                        root_opp_fives.push(p);
                    }
                }
            }
        });
        if let Some(&p) = root_my_fives.first() {
            self.best_move_num = 1;
            return VcfResult::ProvenWin(self.to_loc(p));
        }
        let mut distinct_opp: ArrayVec<Pt, 8> = ArrayVec::new();
        for p in root_opp_fives {
            if !distinct_opp.contains(&p) && !distinct_opp.is_full() {
                distinct_opp.push(p);
            }
        }
        if distinct_opp.len() >= 2 {
            // two defender fives and no attacker five: nothing forces here
            return VcfResult::Disproven;
        }
        match self.solve_iter(distinct_opp.first().copied()) {
            Outcome::Win { mov, plies } => {
                self.best_move_num = plies;
                VcfResult::ProvenWin(self.to_loc(mov))
            }
            Outcome::Fail => VcfResult::Disproven,
            Outcome::Abort => VcfResult::Aborted,
        }
    }

    /// One attacker-to-move node. `forced_block` is the defender's live
    /// five-completion, which any candidate must occupy to survive.
    fn solve_iter(&mut self, forced_block: Option<Pt>) -> Outcome {
        self.nodes += 1;
        if self.nodes > self.node_budget {
            return Outcome::Abort;
        }
        if let Some(cached) = TABLE.probe(self.hash) {
            match cached {
                CachedResult::Win { loc, plies } => {
                    return Outcome::Win { mov: self.from_loc(loc), plies };
                }
                CachedResult::Disproven => return Outcome::Fail,
            }
        }

        let snapshot = self.threes.len();
        let mut tried = [false; SZ * SZ];
        let mut best: Option<(Pt, u32)> = None;
        let mut aborted = false;

        'candidates: for i in 0..snapshot {
            let (t, anchor) = self.threes[i];
            let t = t as usize;
            if self.my_count[t][anchor.y as usize][anchor.x as usize] != 3
                || self.opp_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON != 0
            {
                continue;
            }
            let empties = self.window_empties(t, anchor);
            for &m in &empties {
                if tried[m.y as usize * SZ + m.x as usize] {
                    continue;
                }
                tried[m.y as usize * SZ + m.x as usize] = true;
                if let Some(block) = forced_block {
                    if m != block {
                        continue;
                    }
                }
                if self.forbidden_for(self.attacker, m) {
                    continue;
                }

                let undo_len = self.threes.len();
                self.play(m, MY);
                let outcome = self.after_attacker_move(m);
                self.unplay(m, MY, undo_len);

                match outcome {
                    Outcome::Win { plies, .. } => {
                        let candidate = (m, plies);
                        if best.is_none_or(|(_, b)| plies < b) {
                            best = Some(candidate);
                        }
                        if plies <= 3 {
                            // nothing at a non-terminal node can be shorter
                            break 'candidates;
                        }
                    }
                    Outcome::Fail => {}
                    Outcome::Abort => {
                        aborted = true;
                        break 'candidates;
                    }
                }
            }
        }

        if let Some((mov, plies)) = best {
            TABLE.store(self.hash, CachedResult::Win { loc: self.to_loc(mov), plies });
            return Outcome::Win { mov, plies };
        }
        if aborted {
            return Outcome::Abort;
        }
        TABLE.store(self.hash, CachedResult::Disproven);
        Outcome::Fail
    }

    /// The attacker stone at `m` is on the board. Resolve the forced
    /// exchange: count the fours the move created, make the defender block,
    /// recurse.
    fn after_attacker_move(&mut self, m: Pt) -> Outcome {
        let mut four_points: ArrayVec<Pt, 8> = ArrayVec::new();
        self.for_each_window_through(m, |solver, t, anchor| {
            if solver.my_count[t][anchor.y as usize][anchor.x as usize] == 4
                && solver.opp_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON == 0
            {
                if let Some(p) = solver.window_single_empty(t, anchor) {
                    if !solver.forbidden_for(solver.attacker, p)
                        && !four_points.contains(&p)
                        && !four_points.is_full()
                    {
                        four_points.push(p);
                    }
                }
            }
        });

        match four_points.len() {
            // the eligible-three entry went stale, this wasn't a four
            0 => Outcome::Fail,
            1 => {
                let f = four_points[0];
                if self.forbidden_for(self.attacker.opponent(), f) {
                    // the defender may not occupy the blocking point
                    return Outcome::Win { mov: m, plies: 3 };
                }
                let undo_len = self.threes.len();
                self.play(f, OPP);
                let mut opp_fives: ArrayVec<Pt, 8> = ArrayVec::new();
                self.for_each_window_through(f, |solver, t, anchor| {
                    if solver.opp_count[t][anchor.y as usize][anchor.x as usize] == 4
                        && solver.my_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON == 0
                    {
                        if let Some(p) = solver.window_single_empty(t, anchor) {
                            if !solver.forbidden_for(solver.attacker.opponent(), p)
                                && !opp_fives.contains(&p)
                                && !opp_fives.is_full()
                            {
                                opp_fives.push(p);
                            }
                        }
                    }
                });
                let outcome = if opp_fives.len() >= 2 {
                    // a counter-four pair the attacker cannot answer
                    Outcome::Fail
                } else {
                    match self.solve_iter(opp_fives.first().copied()) {
                        Outcome::Win { plies, .. } => Outcome::Win { mov: m, plies: plies + 2 },
                        other => other,
                    }
                };
                self.unplay(f, OPP, undo_len);
                outcome
            }
            // a double four: the defender can only block one point
            _ => Outcome::Win { mov: m, plies: 3 },
        }
    }

    // -- board plumbing ----------------------------------------------------

    fn set_board(&mut self, board: &Board) {
        for y in 0..self.y_size {
            for x in 0..self.x_size {
                let loc = Loc::from_xy(x, y, board.x_size);
                let cell = match board.get(loc).player() {
                    Some(p) if p == self.attacker => MY,
                    Some(_) => OPP,
                    None => EM,
                };
                if cell != EM {
                    self.cells[y][x] = cell;
                    let side = (cell - 1) as usize;
                    self.hash ^= ZOB.stone[side][y][x];
                }
            }
        }
        // raw window counts
        self.for_each_window_mut(|solver, t, anchor| {
            let (mut my, mut opp) = (0u8, 0u8);
            for i in 0..5 {
                match solver.cell_at_offset(anchor, t, i) {
                    MY => my += 1,
                    OPP => opp += 1,
                    _ => {}
                }
            }
            solver.my_count[t][anchor.y as usize][anchor.x as usize] = my;
            solver.opp_count[t][anchor.y as usize][anchor.x as usize] = opp;
        });
        // overline poison from stones already adjacent to a window
        for y in 0..self.y_size {
            for x in 0..self.x_size {
                let cell = self.cells[y][x];
                if cell != EM && self.poison_applies(cell) {
                    self.apply_neighbor_six(Pt { x: x as u8, y: y as u8 }, cell, true);
                }
            }
        }
        // eligible threes
        let mut found = vec![];
        self.for_each_window(|solver, t, anchor| {
            if solver.my_count[t][anchor.y as usize][anchor.x as usize] == 3
                && solver.opp_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON == 0
            {
                found.push((t as u8, anchor));
            }
        });
        self.threes = found;
    }

    fn play(&mut self, p: Pt, who: u8) {
        debug_assert_eq!(self.cells[p.y as usize][p.x as usize], EM);
        self.cells[p.y as usize][p.x as usize] = who;
        self.hash ^= ZOB.stone[(who - 1) as usize][p.y as usize][p.x as usize];
        let pla = self.side_player(who);
        let loc = self.to_loc(p);
        let _ = self.mirror.set_stone(loc, pla);

        for t in 0..4 {
            for anchor in self.anchors_through(p, t) {
                if who == MY {
                    self.my_count[t][anchor.y as usize][anchor.x as usize] += 1;
                    if self.my_count[t][anchor.y as usize][anchor.x as usize] == 3
                        && self.opp_count[t][anchor.y as usize][anchor.x as usize] % SIX_POISON == 0
                    {
                        self.threes.push((t as u8, anchor));
                    }
                } else {
                    self.opp_count[t][anchor.y as usize][anchor.x as usize] += 1;
                }
            }
        }
        if self.poison_applies(who) {
            self.apply_neighbor_six(p, who, true);
        }
    }

    fn unplay(&mut self, p: Pt, who: u8, threes_len: usize) {
        if self.poison_applies(who) {
            self.apply_neighbor_six(p, who, false);
        }
        for t in 0..4 {
            for anchor in self.anchors_through(p, t) {
                if who == MY {
                    self.my_count[t][anchor.y as usize][anchor.x as usize] -= 1;
                } else {
                    self.opp_count[t][anchor.y as usize][anchor.x as usize] -= 1;
                }
            }
        }
        self.threes.truncate(threes_len);
        self.cells[p.y as usize][p.x as usize] = EM;
        self.hash ^= ZOB.stone[(who - 1) as usize][p.y as usize][p.x as usize];
        self.mirror.clear_stone(self.to_loc(p));
    }

    /// Marks the windows that a stone at `p` turns into would-be overlines:
    /// the two windows in each direction whose end lies directly adjacent
    /// to `p`.
    fn apply_neighbor_six(&mut self, p: Pt, who: u8, add: bool) {
        for (t, &(dx, dy)) in DIRS.iter().enumerate() {
            for anchor in [
                self.offset_pt(p, dx, dy),
                self.offset_pt(p, -5 * dx, -5 * dy),
            ]
            .into_iter()
            .flatten()
            {
                if !self.window_valid(t, anchor) {
                    continue;
                }
                let count = if who == MY {
                    &mut self.my_count[t][anchor.y as usize][anchor.x as usize]
                } else {
                    &mut self.opp_count[t][anchor.y as usize][anchor.x as usize]
                };
                if add {
                    *count += SIX_POISON;
                } else {
                    *count -= SIX_POISON;
                }
            }
        }
    }

    fn poison_applies(&self, who: u8) -> bool {
        match self.rule {
            BasicRule::Freestyle => false,
            BasicRule::Standard => true,
            // only black is barred from overlines
            BasicRule::Renju => self.side_player(who) == Player::Black,
        }
    }

    fn side_player(&self, who: u8) -> Player {
        if who == MY { self.attacker } else { self.attacker.opponent() }
    }

    fn forbidden_for(&self, pla: Player, p: Pt) -> bool {
        self.rule == BasicRule::Renju && pla == Player::Black && self.mirror.is_forbidden(self.to_loc(p))
    }

    fn to_loc(&self, p: Pt) -> Loc {
        Loc::from_xy(p.x as usize, p.y as usize, self.x_size)
    }

    fn from_loc(&self, loc: Loc) -> Pt {
        Pt { x: loc.x(self.x_size) as u8, y: loc.y(self.x_size) as u8 }
    }

    fn offset_pt(&self, p: Pt, dx: isize, dy: isize) -> Option<Pt> {
        let x = p.x as isize + dx;
        let y = p.y as isize + dy;
        if x < 0 || y < 0 || x >= self.x_size as isize || y >= self.y_size as isize {
            None
        } else {
            Some(Pt { x: x as u8, y: y as u8 })
        }
    }

    fn window_valid(&self, t: usize, anchor: Pt) -> bool {
        let (dx, dy) = DIRS[t];
        let ex = anchor.x as isize + 4 * dx;
        let ey = anchor.y as isize + 4 * dy;
        (anchor.x as usize) < self.x_size
            && (anchor.y as usize) < self.y_size
            && ex >= 0
            && ey >= 0
            && (ex as usize) < self.x_size
            && (ey as usize) < self.y_size
    }

    fn cell_at_offset(&self, anchor: Pt, t: usize, i: isize) -> u8 {
        let (dx, dy) = DIRS[t];
        let x = anchor.x as isize + dx * i;
        let y = anchor.y as isize + dy * i;
        self.cells[y as usize][x as usize]
    }

    fn pt_at_offset(&self, anchor: Pt, t: usize, i: isize) -> Pt {
        let (dx, dy) = DIRS[t];
        Pt { x: (anchor.x as isize + dx * i) as u8, y: (anchor.y as isize + dy * i) as u8 }
    }

    fn window_empties(&self, t: usize, anchor: Pt) -> ArrayVec<Pt, 5> {
        let mut res = ArrayVec::new();
        for i in 0..5 {
            if self.cell_at_offset(anchor, t, i) == EM {
                res.push(self.pt_at_offset(anchor, t, i));
            }
        }
        res
    }

    fn window_single_empty(&self, t: usize, anchor: Pt) -> Option<Pt> {
        let empties = self.window_empties(t, anchor);
        if empties.len() == 1 { Some(empties[0]) } else { None }
    }

    fn anchors_through(&self, p: Pt, t: usize) -> ArrayVec<Pt, 5> {
        let (dx, dy) = DIRS[t];
        let mut res = ArrayVec::new();
        for i in 0..5 {
            if let Some(anchor) = self.offset_pt(p, -dx * i, -dy * i) {
                if self.window_valid(t, anchor) {
                    res.push(anchor);
                }
            }
        }
        res
    }

    fn for_each_window(&self, mut f: impl FnMut(&Self, usize, Pt)) {
        for t in 0..4 {
            for y in 0..self.y_size {
                for x in 0..self.x_size {
                    let anchor = Pt { x: x as u8, y: y as u8 };
                    if self.window_valid(t, anchor) {
                        f(self, t, anchor);
                    }
                }
            }
        }
    }

    fn for_each_window_mut(&mut self, mut f: impl FnMut(&mut Self, usize, Pt)) {
        for t in 0..4 {
            for y in 0..self.y_size {
                for x in 0..self.x_size {
                    let anchor = Pt { x: x as u8, y: y as u8 };
                    if self.window_valid(t, anchor) {
                        f(self, t, anchor);
                    }
                }
            }
        }
    }

    fn for_each_window_through(&mut self, p: Pt, mut f: impl FnMut(&Self, usize, Pt)) {
        for t in 0..4 {
            for anchor in self.anchors_through(p, t) {
                f(self, t, anchor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban::rules::BasicRule;

    fn loc(x: usize, y: usize) -> Loc {
        Loc::from_xy(x, y, 15)
    }

    fn board_with(black: &[(usize, usize)], white: &[(usize, usize)], rule: BasicRule) -> Board {
        let mut board = Board::new(15, 15, rule).unwrap();
        for &(x, y) in black {
            board.set_stone(loc(x, y), Player::Black).unwrap();
        }
        for &(x, y) in white {
            board.set_stone(loc(x, y), Player::White).unwrap();
        }
        board
    }

    #[test]
    fn immediate_five_is_proven_in_one() {
        let board = board_with(&[(7, 7), (7, 8), (7, 9), (7, 10)], &[], BasicRule::Freestyle);
        let mut solver = VcfSolver::new(&board, Player::Black, DEFAULT_NODE_BUDGET);
        let result = solver.solve();
        assert!(matches!(result, VcfResult::ProvenWin(l) if l == loc(7, 11) || l == loc(7, 6)));
        assert_eq!(solver.best_move_num, 1);
    }

    #[test]
    fn open_three_wins_by_open_four() {
        // completing the open three to an open four gives two completions
        let board = board_with(&[(7, 6), (7, 7), (7, 8)], &[], BasicRule::Freestyle);
        let mut solver = VcfSolver::new(&board, Player::Black, DEFAULT_NODE_BUDGET);
        let result = solver.solve();
        assert!(matches!(result, VcfResult::ProvenWin(_)));
        assert!(solver.best_move_num <= 3);
    }

    #[test]
    fn forced_four_sequence_within_five_plies() {
        // one blocked four forces the defender, then the diagonal three
        // converts into a double four
        let board = board_with(
            &[(7, 7), (7, 8), (7, 9), (5, 5), (6, 6)],
            &[(7, 6), (0, 0), (1, 0)],
            BasicRule::Freestyle,
        );
        let mut solver = VcfSolver::new(&board, Player::Black, DEFAULT_NODE_BUDGET);
        let result = solver.solve();
        assert!(matches!(result, VcfResult::ProvenWin(_)), "expected a proven win, got {result:?}");
        assert!(solver.best_move_num <= 5, "win should take at most 5 plies, took {}", solver.best_move_num);
    }

    #[test]
    fn quiet_position_is_disproven() {
        let board = board_with(&[(7, 7)], &[(8, 8)], BasicRule::Freestyle);
        assert_eq!(VcfSolver::run(&board, Player::Black, DEFAULT_NODE_BUDGET), VcfResult::Disproven);
    }

    #[test]
    fn zero_budget_aborts() {
        let board = board_with(&[(7, 6), (7, 7), (7, 8)], &[], BasicRule::Freestyle);
        // a position that needs at least one node of search
        assert_eq!(VcfSolver::run(&board, Player::Black, 0), VcfResult::Aborted);
    }

    #[test]
    fn defender_five_pair_disproves() {
        // the defender threatens five on two separate points and the
        // attacker has no five of their own
        let board = board_with(
            &[(0, 14), (1, 14), (2, 14)],
            &[(4, 4), (5, 5), (6, 6), (7, 7)],
            BasicRule::Freestyle,
        );
        assert_eq!(VcfSolver::run(&board, Player::Black, DEFAULT_NODE_BUDGET), VcfResult::Disproven);
    }

    #[test]
    fn overline_completion_is_no_four_under_standard() {
        // X X X X . X : filling the gap makes six, dead under standard
        let board = board_with(
            &[(2, 7), (3, 7), (4, 7), (5, 7), (7, 7)],
            &[(1, 7), (8, 7), (6, 2)],
            BasicRule::Standard,
        );
        // the only "four" completions either make six or are blocked
        let result = VcfSolver::run(&board, Player::Black, DEFAULT_NODE_BUDGET);
        assert_eq!(result, VcfResult::Disproven);
    }

    #[test]
    fn white_can_attack_in_renju() {
        let board = board_with(&[(0, 0)], &[(7, 6), (7, 7), (7, 8)], BasicRule::Renju);
        let result = VcfSolver::run(&board, Player::White, DEFAULT_NODE_BUDGET);
        assert!(matches!(result, VcfResult::ProvenWin(_)));
    }

    #[test]
    fn same_position_hits_the_cache() {
        let board = board_with(&[(7, 6), (7, 7), (7, 8)], &[], BasicRule::Freestyle);
        let first = VcfSolver::run(&board, Player::Black, DEFAULT_NODE_BUDGET);
        let mut second = VcfSolver::new(&board, Player::Black, DEFAULT_NODE_BUDGET);
        let second_result = second.solve();
        assert_eq!(first, second_result);
        // the cached proof resolves the root without exploring the subtree
        assert!(second.nodes_used() <= 2, "expected a cache hit, used {} nodes", second.nodes_used());
    }
}
