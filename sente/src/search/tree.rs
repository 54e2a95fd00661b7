//! Tree storage for the search. Nodes own their children through `Arc`s
//! inside a per-node mutex; workers clone the `Arc` of the child they
//! descend into and release the parent lock, so the critical sections stay
//! as short as the counter updates themselves. Requests never own nodes
//! and nodes never own requests; evaluation results come back through the
//! evaluator's cache and the per-node gate below.

use std::sync::{Arc, Condvar, Mutex};

use goban::board::{Loc, Player};
use goban::core::hash::Hash128;

use crate::nn::NnOutput;

/// Blocks later workers that reach a node while its first visitor is still
/// waiting on the evaluator. One-shot: opens once, stays open.
pub struct EvalGate {
    done: Mutex<bool>,
    cond: Condvar,
}

impl EvalGate {
    pub fn new() -> Self {
        EvalGate { done: Mutex::new(false), cond: Condvar::new() }
    }

    pub fn wait(&self) {
        let mut done = self.done.lock().unwrap();
        while !*done {
            done = self.cond.wait(done).unwrap();
        }
    }

    pub fn open(&self) {
        let mut done = self.done.lock().unwrap();
        *done = true;
        self.cond.notify_all();
    }
}

impl Default for EvalGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-child accumulators, all from the parent's side-to-move perspective.
/// A virtual loss counts as a full loss in the selection formula until the
/// backup removes it.
#[derive(Clone)]
pub struct ChildEdge {
    pub loc: Loc,
    pub prior: f32,
    pub visits: u64,
    pub winloss_sum: f64,
    pub score_sum: f64,
    pub virtual_losses: u32,
    pub node: Option<Arc<Node>>,
}

impl ChildEdge {
    pub fn new(loc: Loc, prior: f32) -> Self {
        ChildEdge { loc, prior, visits: 0, winloss_sum: 0.0, score_sum: 0.0, virtual_losses: 0, node: None }
    }

    /// Mean value including virtual losses, or `fpu` when unvisited.
    pub fn effective_q(&self, fpu: f64) -> f64 {
        let n = self.visits + self.virtual_losses as u64;
        if n == 0 {
            fpu
        } else {
            (self.winloss_sum - self.virtual_losses as f64) / n as f64
        }
    }

    pub fn effective_visits(&self) -> u64 {
        self.visits + self.virtual_losses as u64
    }

    pub fn mean_value(&self) -> f64 {
        if self.visits == 0 { 0.0 } else { self.winloss_sum / self.visits as f64 }
    }
}

pub struct NodeState {
    pub visits: u64,
    /// Sum of backed-up values from this node's side-to-move perspective.
    pub winloss_sum: f64,
    pub score_sum: f64,
    /// Exact value when the position is decided; set at node creation and
    /// never re-evaluated.
    pub terminal: Option<f64>,
    pub nn_output: Option<Arc<NnOutput>>,
    /// Present while the first visitor is off evaluating this position.
    pub eval_gate: Option<Arc<EvalGate>>,
    pub children: Vec<ChildEdge>,
    /// Root noise and temperature are applied at most once per node.
    pub root_adjustments_applied: bool,
}

pub struct Node {
    /// The move that reached this node; `Loc::NULL` for a fresh root.
    pub move_loc: Loc,
    /// The player to move in this node's position.
    pub next_pla: Player,
    pub pos_hash: Hash128,
    pub state: Mutex<NodeState>,
}

impl Node {
    pub fn new(move_loc: Loc, next_pla: Player, pos_hash: Hash128, terminal: Option<f64>) -> Arc<Self> {
        Arc::new(Node {
            move_loc,
            next_pla,
            pos_hash,
            state: Mutex::new(NodeState {
                visits: 0,
                winloss_sum: 0.0,
                score_sum: 0.0,
                terminal,
                nn_output: None,
                eval_gate: None,
                children: vec![],
                root_adjustments_applied: false,
            }),
        })
    }

    pub fn visits(&self) -> u64 {
        self.state.lock().unwrap().visits
    }
}
