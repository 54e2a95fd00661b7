//! PUCT tree search over the evaluator. Many workers descend the shared
//! tree concurrently; virtual losses steer them apart, per-node mutexes
//! keep the counter updates consistent, and the first visitor of any leaf
//! evaluates it while later arrivals block on the node's gate.

pub mod tree;

use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, Mutex};

use anyhow::bail;
use goban::board::zobrist::ZOBRIST;
use goban::board::{Board, Loc, MovePriority, Player};
use goban::core::common::Res;
use goban::core::math::winrate_lcb_radius;
use goban::core::rand::Rand;
use goban::history::{BoardHistory, NO_RESULT_SLACK};

use crate::nn::NnEvaluator;
use crate::nn::inputs::{NnInputParams, VcfFeed};
use crate::nn::output::NnOutput;
use tree::{ChildEdge, EvalGate, Node, NodeState};

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub num_search_threads: usize,
    pub max_visits: u64,
    pub max_playouts: u64,
    pub max_time: f64,
    pub cpuct: f64,
    pub fpu_reduction: f64,
    pub virtual_loss_count: u32,
    pub root_policy_temperature: f64,
    pub root_noise_weight: f64,
    pub root_dirichlet_concentration: f64,
    pub wide_root_noise: f64,
    pub playout_doubling_advantage: f64,
    pub no_result_utility: f64,
    pub lcb_z: f64,
    pub rand_seed: Option<u64>,
    pub pondering_enabled: bool,
    pub lag_buffer: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        SearchParams {
            num_search_threads: 4,
            max_visits: u64::MAX,
            max_playouts: u64::MAX,
            max_time: 1e20,
            cpuct: 1.1,
            fpu_reduction: 0.2,
            virtual_loss_count: 1,
            root_policy_temperature: 1.0,
            root_noise_weight: 0.0,
            root_dirichlet_concentration: 10.83,
            wide_root_noise: 0.0,
            playout_doubling_advantage: 0.0,
            no_result_utility: 0.0,
            lcb_z: 1.6,
            rand_seed: None,
            pondering_enabled: false,
            lag_buffer: 0.1,
        }
    }
}

/// One row of the periodic analysis report for a root child.
#[derive(Debug, Clone)]
pub struct AnalysisData {
    pub loc: Loc,
    pub visits: u64,
    /// Winrate from the root player's perspective, in `[0, 1]`.
    pub winrate: f64,
    pub prior: f64,
    pub lcb: f64,
    /// Rank by visit count, 0 being the most visited.
    pub order: usize,
    pub pv: Vec<Loc>,
}

struct RootState {
    node: Option<Arc<Node>>,
    board: Board,
    hist: BoardHistory,
    pla: Player,
}

pub struct Search {
    pub params: SearchParams,
    pub evaluator: Arc<NnEvaluator>,
    root: Mutex<RootState>,
    rand: Mutex<Rand>,
    playouts: AtomicU64,
    /// Per color: moves the root may not play before the given move number.
    avoid_until: Mutex<[Vec<(Loc, usize)>; 2]>,
}

impl Search {
    pub fn new(evaluator: Arc<NnEvaluator>, params: SearchParams, board: Board, pla: Player) -> Self {
        let rand = match params.rand_seed {
            Some(seed) => Rand::from_seed(seed),
            None => Rand::new(),
        };
        let hist = BoardHistory::new(&board, pla, goban::rules::Rules::new(board.rule));
        Search {
            params,
            evaluator,
            root: Mutex::new(RootState { node: None, board, hist, pla }),
            rand: Mutex::new(rand),
            playouts: AtomicU64::new(0),
            avoid_until: Mutex::new([vec![], vec![]]),
        }
    }

    fn nn_params(&self) -> NnInputParams {
        NnInputParams {
            no_result_utility: self.params.no_result_utility,
            playout_doubling_advantage: self.params.playout_doubling_advantage,
            policy_temperature: 1.0,
            use_vcf: true,
            symmetry_override: None,
        }
    }

    // -- root management ---------------------------------------------------

    /// Installs a new root position. If the new position is a descendant of
    /// the current root (same game, a few more moves), the matching subtree
    /// is reparented with all its statistics; otherwise the tree is rebuilt.
    pub fn set_position(&self, pla: Player, board: Board, hist: BoardHistory) {
        let mut rs = self.root.lock().unwrap();
        let old = rs.node.take();
        rs.node = old.and_then(|old| find_descendant(&old, &rs.hist, &hist));
        rs.board = board;
        rs.hist = hist;
        rs.pla = pla;
    }

    /// Plays a move at the root, reusing the matching subtree. Returns
    /// false and changes nothing if the move is illegal.
    pub fn make_move(&self, loc: Loc, pla: Player) -> bool {
        let mut rs = self.root.lock().unwrap();
        if rs.pla != pla || !rs.hist.is_legal(&rs.board, loc, pla) {
            return false;
        }
        let mut board = rs.board.clone();
        let mut hist = rs.hist.clone();
        hist.make_board_move_assume_legal(&mut board, loc, pla);
        rs.node = rs.node.take().and_then(|old| {
            let state = old.state.lock().unwrap();
            state.children.iter().find(|c| c.loc == loc).and_then(|c| c.node.clone())
        });
        rs.board = board;
        rs.hist = hist;
        rs.pla = pla.opponent();
        true
    }

    pub fn clear_search(&self) {
        self.root.lock().unwrap().node = None;
    }

    pub fn set_avoid_move_until_by_loc(&self, black: Vec<(Loc, usize)>, white: Vec<(Loc, usize)>) {
        *self.avoid_until.lock().unwrap() = [black, white];
    }

    pub fn root_board(&self) -> Board {
        self.root.lock().unwrap().board.clone()
    }

    pub fn root_hist(&self) -> BoardHistory {
        self.root.lock().unwrap().hist.clone()
    }

    pub fn root_player(&self) -> Player {
        self.root.lock().unwrap().pla
    }

    pub fn begin_search(&self) {
        self.playouts.store(0, Relaxed);
    }

    pub fn num_playouts(&self) -> u64 {
        self.playouts.load(Relaxed)
    }

    pub fn root_visits(&self) -> u64 {
        let rs = self.root.lock().unwrap();
        rs.node.as_ref().map_or(0, |n| n.visits())
    }

    // -- the playout -------------------------------------------------------

    /// Runs one descent from the root. Returns false if there is nothing to
    /// search (the game at the root is over).
    pub fn run_playout(&self) -> Res<bool> {
        let (root, mut board, mut hist) = {
            let mut rs = self.root.lock().unwrap();
            if rs.hist.is_game_finished {
                return Ok(false);
            }
            if rs.node.is_none() {
                let hash = rs.board.position_hash(rs.pla) ^ ZOBRIST.rule[rs.board.rule as usize];
                rs.node = Some(Node::new(Loc::NULL, rs.pla, hash, None));
            }
            (rs.node.clone().unwrap(), rs.board.clone(), rs.hist.clone())
        };
        self.visit(&root, &mut board, &mut hist, true)?;
        self.playouts.fetch_add(1, Relaxed);
        Ok(true)
    }

    /// One visit to `node`; returns the backed-up value from the
    /// perspective of the player to move at `node`.
    fn visit(&self, node: &Arc<Node>, board: &mut Board, hist: &mut BoardHistory, is_root: bool) -> Res<f64> {
        let mut state = node.state.lock().unwrap();

        if let Some(v) = state.terminal {
            state.visits += 1;
            state.winloss_sum += v;
            return Ok(v);
        }

        if state.nn_output.is_none() {
            if let Some(gate) = state.eval_gate.clone() {
                // someone else is evaluating this exact position; share the result
                drop(state);
                gate.wait();
                let mut state = node.state.lock().unwrap();
                let Some(out) = state.nn_output.clone() else {
                    // the evaluation failed; the search is going down anyway
                    bail!("evaluation failed on a sibling worker");
                };
                let v = out.value();
                state.visits += 1;
                state.winloss_sum += v;
                state.score_sum += out.score_mean as f64;
                return Ok(v);
            }
            let gate = Arc::new(EvalGate::new());
            state.eval_gate = Some(gate.clone());
            drop(state);

            let result = self.evaluator.evaluate(
                board,
                hist,
                node.next_pla,
                &self.nn_params(),
                false,
                false,
                VcfFeed::default(),
            );

            let mut state = node.state.lock().unwrap();
            state.eval_gate = None;
            gate.open();
            let out = result?;
            let v = out.value();
            state.children = make_children(board, &out);
            if is_root {
                self.apply_root_adjustments(&mut state);
            }
            state.nn_output = Some(out.clone());
            state.visits += 1;
            state.winloss_sum += v;
            state.score_sum += out.score_mean as f64;
            return Ok(v);
        }

        // selection
        let (idx, child_loc, child_node) = {
            if is_root && !state.root_adjustments_applied {
                self.apply_root_adjustments(&mut state);
            }
            let Some(idx) = self.select_child(&state, is_root, hist) else {
                // every child is currently banned; treat like a terminal draw
                state.visits += 1;
                return Ok(0.0);
            };
            let mover = node.next_pla;
            let child = &mut state.children[idx];
            child.virtual_losses += self.params.virtual_loss_count;
            if child.node.is_none() {
                let terminal = child_terminal_value(board, mover, child.loc, self.params.no_result_utility);
                let hash = board.pos_hash_after_move(child.loc, mover)
                    ^ ZOBRIST.player[mover.opponent().idx()]
                    ^ ZOBRIST.rule[board.rule as usize];
                child.node = Some(Node::new(child.loc, mover.opponent(), hash, terminal));
            }
            (idx, child.loc, child.node.clone().unwrap())
        };
        let mover = node.next_pla;
        drop(state);

        hist.make_board_move_assume_legal(board, child_loc, mover);
        let child_result = self.visit(&child_node, board, hist, false);

        let mut state = node.state.lock().unwrap();
        let edge = &mut state.children[idx];
        edge.virtual_losses = edge.virtual_losses.saturating_sub(self.params.virtual_loss_count);
        let child_value = child_result?;
        let value = -child_value;
        edge.visits += 1;
        edge.winloss_sum += value;
        state.visits += 1;
        state.winloss_sum += value;
        Ok(value)
    }

    /// PUCT: `Q + c_puct * P * sqrt(sum N) / (1 + N)`, ties broken by the
    /// lower child index.
    fn select_child(&self, state: &NodeState, is_root: bool, hist: &BoardHistory) -> Option<usize> {
        let sqrt_total = (state.visits.max(1) as f64).sqrt();
        let parent_q = if state.visits == 0 { 0.0 } else { state.winloss_sum / state.visits as f64 };
        let fpu = parent_q - self.params.fpu_reduction;

        let mut choice = None;
        let mut best_score = f64::NEG_INFINITY;
        let mut any_banned = false;
        for (i, child) in state.children.iter().enumerate() {
            if is_root && self.is_root_banned(child.loc, hist) {
                any_banned = true;
                continue;
            }
            let n_eff = child.effective_visits();
            let q = child.effective_q(fpu);
            let u = self.params.cpuct * child.prior as f64 * sqrt_total / (1.0 + n_eff as f64);
            let score = q + u;
            if score > best_score {
                best_score = score;
                choice = Some(i);
            }
        }
        if choice.is_none() && any_banned && !state.children.is_empty() {
            // a fully banned root still has to produce some legal move
            return Some(0);
        }
        choice
    }

    fn is_root_banned(&self, loc: Loc, hist: &BoardHistory) -> bool {
        let pla = hist.presumed_next_move_pla;
        let avoid = self.avoid_until.lock().unwrap();
        avoid[pla.idx()]
            .iter()
            .any(|&(banned, until)| banned == loc && hist.move_history.len() < until)
    }

    /// Policy temperature, wide-root widening and Dirichlet noise, applied
    /// exactly once per root installation.
    fn apply_root_adjustments(&self, state: &mut NodeState) {
        if state.root_adjustments_applied || state.children.is_empty() {
            return;
        }
        state.root_adjustments_applied = true;
        let n = state.children.len();

        let temp = self.params.root_policy_temperature;
        if (temp - 1.0).abs() > 1e-9 && temp > 0.0 {
            for child in &mut state.children {
                child.prior = child.prior.max(1e-30).powf(1.0 / temp as f32);
            }
        }
        let wide = self.params.wide_root_noise;
        if wide > 0.0 {
            let uniform = 1.0 / n as f32;
            for child in &mut state.children {
                child.prior = (child.prior + wide as f32 * uniform) / (1.0 + wide as f32);
            }
        }
        let weight = self.params.root_noise_weight;
        if weight > 0.0 {
            let alpha = self.params.root_dirichlet_concentration / n as f64;
            let mut rand = self.rand.lock().unwrap();
            let gammas: Vec<f64> = (0..n).map(|_| rand.next_gamma(alpha)).collect();
            let total: f64 = gammas.iter().sum();
            if total > 0.0 {
                for (child, g) in state.children.iter_mut().zip(gammas) {
                    child.prior =
                        ((1.0 - weight) * child.prior as f64 + weight * g / total) as f32;
                }
            }
        }
        let sum: f32 = state.children.iter().map(|c| c.prior).sum();
        if sum > 0.0 {
            for child in &mut state.children {
                child.prior /= sum;
            }
        }
    }

    // -- results -----------------------------------------------------------

    /// The move to play: most visits, ties broken by higher mean value.
    pub fn select_best_move(&self) -> Option<Loc> {
        let rs = self.root.lock().unwrap();
        let node = rs.node.as_ref()?;
        let state = node.state.lock().unwrap();
        let mut best: Option<(&ChildEdge, u64, f64)> = None;
        for child in &state.children {
            if self.is_root_banned(child.loc, &rs.hist) {
                continue;
            }
            let key = (child.visits, child.mean_value());
            match best {
                Some((_, bv, bm)) if key.0 < bv || (key.0 == bv && key.1 <= bm) => {}
                _ => best = Some((child, key.0, key.1)),
            }
        }
        let by_visits = best.map(|(c, _, _)| c.loc);
        by_visits.or_else(|| state.children.first().map(|c| c.loc))
    }

    /// Snapshot of the root children for analysis output, most visited
    /// first. Taken under the root lock so the numbers are consistent.
    pub fn get_analysis(&self, max_pv_len: usize) -> Vec<AnalysisData> {
        let (node, hist) = {
            let rs = self.root.lock().unwrap();
            match &rs.node {
                Some(n) => (n.clone(), rs.hist.clone()),
                None => return vec![],
            }
        };
        let state = node.state.lock().unwrap();
        let mut rows: Vec<AnalysisData> = state
            .children
            .iter()
            .filter(|c| c.visits > 0 && !self.is_root_banned(c.loc, &hist))
            .map(|c| {
                let winrate = (c.mean_value() + 1.0) / 2.0;
                let lcb = winrate - winrate_lcb_radius(winrate, c.visits as f64, self.params.lcb_z);
                AnalysisData {
                    loc: c.loc,
                    visits: c.visits,
                    winrate,
                    prior: c.prior as f64,
                    lcb,
                    order: 0,
                    pv: extract_pv(c, max_pv_len),
                }
            })
            .collect();
        drop(state);
        rows.sort_by(|a, b| b.visits.cmp(&a.visits).then(b.winrate.total_cmp(&a.winrate)));
        for (i, row) in rows.iter_mut().enumerate() {
            row.order = i;
        }
        rows
    }
}

/// Expands the legal-move policy into child edges, highest prior first.
/// Slots the evaluator marked illegal (occupied or forbidden) are skipped,
/// and so is the pass slot: a stone is always preferred to passing.
fn make_children(board: &Board, out: &NnOutput) -> Vec<ChildEdge> {
    let mut children: Vec<ChildEdge> = vec![];
    let mut sum = 0.0f32;
    for pos in 0..out.pass_pos() {
        let p = out.policy[pos];
        if p < 0.0 {
            continue;
        }
        let loc = out.loc_of_pos(pos).expect("pos in range");
        if !board.is_legal_ignoring_forbidden(loc) {
            continue;
        }
        sum += p;
        children.push(ChildEdge::new(loc, p));
    }
    if sum > 0.0 {
        for child in &mut children {
            child.prior /= sum;
        }
    }
    children.sort_by(|a, b| b.prior.total_cmp(&a.prior));
    children
}

/// Exact value of the position after `mover` plays `loc`, from the
/// perspective of the player to move next, if the move ends the game.
fn child_terminal_value(board: &Board, mover: Player, loc: Loc, no_result_utility: f64) -> Option<f64> {
    if board.get_move_priority_assume_legal(mover, loc) == MovePriority::Five {
        return Some(-1.0);
    }
    if board.movenum + 1 + NO_RESULT_SLACK >= board.area() {
        return Some(no_result_utility);
    }
    None
}

/// Follows the most-visited line downward.
fn extract_pv(edge: &ChildEdge, max_len: usize) -> Vec<Loc> {
    let mut pv = vec![edge.loc];
    let mut cursor = edge.node.clone();
    while pv.len() < max_len {
        let Some(node) = cursor else { break };
        let state = node.state.lock().unwrap();
        let next = state
            .children
            .iter()
            .filter(|c| c.visits > 0)
            .max_by(|a, b| a.visits.cmp(&b.visits).then(a.mean_value().total_cmp(&b.mean_value())));
        match next {
            Some(c) => {
                pv.push(c.loc);
                let n = c.node.clone();
                drop(state);
                cursor = n;
            }
            None => break,
        }
    }
    pv
}

/// Walks from the old root along the extra moves of the new history,
/// returning the node for the new position when the whole path exists.
fn find_descendant(old_root: &Arc<Node>, old_hist: &BoardHistory, new_hist: &BoardHistory) -> Option<Arc<Node>> {
    if old_hist.initial_board.pos_hash != new_hist.initial_board.pos_hash {
        return None;
    }
    let old_moves = &old_hist.move_history;
    let new_moves = &new_hist.move_history;
    if new_moves.len() < old_moves.len() || new_moves[..old_moves.len()] != old_moves[..] {
        return None;
    }
    let mut extra: VecDeque<_> = new_moves[old_moves.len()..].iter().collect();
    let mut cursor = old_root.clone();
    while let Some(mv) = extra.pop_front() {
        if cursor.next_pla != mv.pla {
            return None;
        }
        let state = cursor.state.lock().unwrap();
        let next = state.children.iter().find(|c| c.loc == mv.loc).and_then(|c| c.node.clone());
        drop(state);
        cursor = next?;
    }
    Some(cursor)
}
