//! The asynchronous bot: owns the search, a pool of worker threads that
//! descend the tree in parallel, and the run/stop machinery between them.
//!
//! Workers park on a gate condvar between searches. Starting a search
//! publishes the limits and opens the gate; each worker then runs playouts
//! until the wall clock, the visit budget, the playout budget or the stop
//! flag says otherwise. Stopping never abandons an in-flight descent, it
//! only waits for the backup to finish.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use colored::Colorize;
use threadpool::ThreadPool;
use goban::board::{Board, Loc, Player};
use goban::history::BoardHistory;
use goban::timecontrols::TimeControls;

use crate::search::{AnalysisData, Search};
use crate::time::target_search_seconds;

/// Streaming consumer for analysis snapshots. Called from a dedicated
/// emitter thread, never from search workers, so a slow consumer can only
/// delay its own snapshots.
pub type AnalysisCallback = Arc<dyn Fn(&[AnalysisData]) + Send + Sync>;

const ANALYSIS_PV_LEN: usize = 12;
const CONTROLLER_TICK: Duration = Duration::from_millis(5);

#[derive(Debug, Copy, Clone)]
struct Limits {
    target_time: f64,
    max_visits: u64,
    max_playouts: u64,
}

struct GateInner {
    running: bool,
    quit: bool,
    active: usize,
    limits: Limits,
    started_at: Instant,
}

struct Gate {
    inner: Mutex<GateInner>,
    start_cond: Condvar,
    idle_cond: Condvar,
    should_stop: AtomicBool,
}

impl Gate {
    fn new() -> Self {
        Gate {
            inner: Mutex::new(GateInner {
                running: false,
                quit: false,
                active: 0,
                limits: Limits { target_time: 0.0, max_visits: u64::MAX, max_playouts: u64::MAX },
                started_at: Instant::now(),
            }),
            start_cond: Condvar::new(),
            idle_cond: Condvar::new(),
            should_stop: AtomicBool::new(false),
        }
    }
}

pub struct AsyncBot {
    pub search: Arc<Search>,
    gate: Arc<Gate>,
    pool: ThreadPool,
    analyzer: Mutex<Option<(Arc<AtomicBool>, JoinHandle<()>)>>,
}

impl AsyncBot {
    pub fn new(search: Search) -> Self {
        let search = Arc::new(search);
        let gate = Arc::new(Gate::new());
        let num_workers = search.params.num_search_threads.max(1);
        let pool = ThreadPool::with_name("search".to_string(), num_workers);
        for _ in 0..num_workers {
            let search = search.clone();
            let gate = gate.clone();
            pool.execute(move || worker_loop(&search, &gate));
        }
        AsyncBot { search, gate, pool, analyzer: Mutex::new(None) }
    }

    // -- position management ----------------------------------------------

    pub fn set_position(&self, pla: Player, board: Board, hist: BoardHistory) {
        self.stop_and_wait();
        self.search.set_position(pla, board, hist);
    }

    /// Plays a move on the internal board; false if it was illegal.
    pub fn make_move(&self, loc: Loc, pla: Player) -> bool {
        self.stop_and_wait();
        self.search.make_move(loc, pla)
    }

    pub fn clear_search(&self) {
        self.stop_and_wait();
        self.search.clear_search();
    }

    pub fn set_avoid_move_until_by_loc(&self, black: Vec<(Loc, usize)>, white: Vec<(Loc, usize)>) {
        self.search.set_avoid_move_until_by_loc(black, white);
    }

    // -- searching ---------------------------------------------------------

    /// Blocks until the budget is spent, then returns the chosen move.
    /// Returns `Loc::PASS` only when the game is over or the board is full.
    pub fn gen_move_synchronous(&self, pla: Player, tc: TimeControls, search_factor: f64) -> Loc {
        self.gen_move_inner(pla, tc, search_factor, None, None)
    }

    /// Like [`AsyncBot::gen_move_synchronous`], streaming analysis rows
    /// every `interval` seconds while the search runs.
    pub fn gen_move_synchronous_analyze(
        &self,
        pla: Player,
        tc: TimeControls,
        search_factor: f64,
        interval: f64,
        callback: AnalysisCallback,
    ) -> Loc {
        self.gen_move_inner(pla, tc, search_factor, Some(interval), Some(callback))
    }

    fn gen_move_inner(
        &self,
        pla: Player,
        tc: TimeControls,
        search_factor: f64,
        interval: Option<f64>,
        callback: Option<AnalysisCallback>,
    ) -> Loc {
        self.stop_and_wait();
        if self.search.root_player() != pla {
            // the caller wants the other side to move in the same position
            let board = self.search.root_board();
            let hist = self.search.root_hist();
            self.search.set_position(pla, board, hist);
        }
        let moves_played = self.search.root_hist().move_history.len();
        let target = target_search_seconds(&tc, moves_played, &self.search.params, search_factor);
        let limits = Limits {
            target_time: target.max(0.01),
            max_visits: self.search.params.max_visits,
            max_playouts: self.search.params.max_playouts,
        };
        self.start(limits);

        let started = Instant::now();
        let mut next_emit = interval.map(|iv| started + Duration::from_secs_f64(iv.max(0.01)));
        loop {
            std::thread::sleep(CONTROLLER_TICK);
            if let (Some(at), Some(cb)) = (next_emit, callback.as_ref()) {
                if Instant::now() >= at {
                    cb(&self.search.get_analysis(ANALYSIS_PV_LEN));
                    next_emit = Some(at + Duration::from_secs_f64(interval.unwrap().max(0.01)));
                }
            }
            if started.elapsed().as_secs_f64() >= limits.target_time
                || self.search.root_visits() >= limits.max_visits
                || self.search.num_playouts() >= limits.max_playouts
                || self.all_idle()
            {
                break;
            }
        }
        self.stop_and_wait();
        if let Some(cb) = callback {
            cb(&self.search.get_analysis(ANALYSIS_PV_LEN));
        }
        self.search.select_best_move().unwrap_or(Loc::PASS)
    }

    /// Starts an open-ended analysis of the current position. Snapshots go
    /// to `callback` every `interval` seconds until [`AsyncBot::stop_and_wait`].
    pub fn analyze_async(&self, pla: Player, search_factor: f64, interval: f64, callback: AnalysisCallback) {
        self.stop_and_wait();
        if self.search.root_player() != pla {
            let board = self.search.root_board();
            let hist = self.search.root_hist();
            self.search.set_position(pla, board, hist);
        }
        let max_time = self.search.params.max_time * search_factor.max(0.0);
        self.start(Limits {
            target_time: max_time.max(1.0),
            max_visits: self.search.params.max_visits,
            max_playouts: self.search.params.max_playouts,
        });

        let stop = Arc::new(AtomicBool::new(false));
        let emitter_stop = stop.clone();
        let search = self.search.clone();
        let interval = interval.max(0.01);
        let handle = std::thread::Builder::new()
            .name("analysis-emitter".to_string())
            .spawn(move || {
                while !emitter_stop.load(Acquire) {
                    std::thread::sleep(Duration::from_secs_f64(interval));
                    if emitter_stop.load(Acquire) {
                        break;
                    }
                    callback(&search.get_analysis(ANALYSIS_PV_LEN));
                }
            })
            .expect("failed to spawn analysis emitter");
        *self.analyzer.lock().unwrap() = Some((stop, handle));
    }

    /// Searches the current position on the opponent's time. No result is
    /// extracted; the grown tree simply makes the next genmove cheaper.
    pub fn ponder(&self, search_factor: f64) {
        if !self.search.params.pondering_enabled {
            return;
        }
        self.stop_and_wait();
        let max_time = (self.search.params.max_time * search_factor.max(0.0)).max(1.0);
        self.start(Limits {
            target_time: max_time,
            max_visits: self.search.params.max_visits,
            max_playouts: self.search.params.max_playouts,
        });
    }

    /// Stops any running search or analysis and blocks until every worker
    /// has parked again. Idempotent.
    pub fn stop_and_wait(&self) {
        if let Some((stop, handle)) = self.analyzer.lock().unwrap().take() {
            stop.store(true, Release);
            let _ = handle.join();
        }
        self.gate.should_stop.store(true, Release);
        {
            let mut inner = self.gate.inner.lock().unwrap();
            inner.running = false;
            while inner.active > 0 {
                inner = self.gate.idle_cond.wait(inner).unwrap();
            }
        }
        self.gate.should_stop.store(false, Release);
    }

    fn start(&self, limits: Limits) {
        self.search.begin_search();
        let mut inner = self.gate.inner.lock().unwrap();
        inner.limits = limits;
        inner.started_at = Instant::now();
        inner.running = true;
        drop(inner);
        self.gate.start_cond.notify_all();
    }

    fn all_idle(&self) -> bool {
        let inner = self.gate.inner.lock().unwrap();
        !inner.running && inner.active == 0
    }
}

impl Drop for AsyncBot {
    fn drop(&mut self) {
        self.stop_and_wait();
        {
            let mut inner = self.gate.inner.lock().unwrap();
            inner.quit = true;
        }
        self.gate.start_cond.notify_all();
        self.pool.join();
    }
}

fn worker_loop(search: &Arc<Search>, gate: &Arc<Gate>) {
    loop {
        let (limits, started_at) = {
            let mut inner = gate.inner.lock().unwrap();
            while !inner.running && !inner.quit {
                inner = gate.start_cond.wait(inner).unwrap();
            }
            if inner.quit {
                return;
            }
            inner.active += 1;
            (inner.limits, inner.started_at)
        };

        loop {
            // cancellation is a monotonic flag checked at every descent start
            if gate.should_stop.load(Acquire) {
                break;
            }
            if started_at.elapsed().as_secs_f64() >= limits.target_time
                || search.root_visits() >= limits.max_visits
                || search.num_playouts() >= limits.max_playouts
            {
                break;
            }
            match search.run_playout() {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => {
                    // an evaluator failure is fatal for this search
                    eprintln!("{} {err:#}", "search worker error:".red());
                    gate.should_stop.store(true, Release);
                    break;
                }
            }
        }

        let mut inner = gate.inner.lock().unwrap();
        inner.active -= 1;
        inner.running = false;
        if inner.active == 0 {
            gate.idle_cond.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{NnEvaluator, PatternBackend};
    use crate::search::SearchParams;
    use goban::rules::BasicRule;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::Relaxed;

    fn make_bot(num_threads: usize, max_visits: u64) -> AsyncBot {
        let board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let evaluator = NnEvaluator::new(Arc::new(PatternBackend::new(16)), 14, 4, 1);
        let params = SearchParams {
            num_search_threads: num_threads,
            max_visits,
            rand_seed: Some(17),
            ..SearchParams::default()
        };
        AsyncBot::new(Search::new(evaluator, params, board, Player::Black))
    }

    fn loc(x: usize, y: usize) -> Loc {
        Loc::from_xy(x, y, 15)
    }

    #[test]
    fn genmove_returns_a_legal_move() {
        let bot = make_bot(2, 200);
        let tc = TimeControls { per_move_time: 5.0, main_time_left: 60.0 };
        let mv = bot.gen_move_synchronous(Player::Black, tc, 1.0);
        assert!(mv.is_real());
        let board = bot.search.root_board();
        assert!(board.is_legal(mv, Player::Black));
    }

    #[test]
    fn make_move_rejects_illegal() {
        let bot = make_bot(1, 50);
        assert!(bot.make_move(loc(7, 7), Player::Black));
        assert!(!bot.make_move(loc(7, 7), Player::White), "occupied cell accepted");
        assert!(bot.make_move(loc(8, 8), Player::White));
    }

    #[test]
    fn respects_per_move_time() {
        let bot = make_bot(8, u64::MAX);
        // past the first-move warmup debit so the per-move cap is binding
        assert!(bot.make_move(loc(7, 7), Player::Black));
        assert!(bot.make_move(loc(8, 8), Player::White));
        let tc = TimeControls { per_move_time: 1.0 + bot.search.params.lag_buffer, main_time_left: 1e9 };
        let start = Instant::now();
        let mv = bot.gen_move_synchronous(Player::Black, tc, 1.0);
        let elapsed = start.elapsed().as_secs_f64();
        assert!(mv.is_real());
        assert!(elapsed <= 1.1, "took {elapsed}s for a 1s budget");
        assert!(elapsed >= 0.5, "budget ignored, returned after {elapsed}s");
    }

    #[test]
    fn stop_and_wait_parks_all_workers() {
        let bot = make_bot(4, u64::MAX);
        let callback: AnalysisCallback = Arc::new(|_| {});
        bot.analyze_async(Player::Black, 1.0, 0.05, callback);
        std::thread::sleep(Duration::from_millis(100));
        bot.stop_and_wait();
        assert!(bot.all_idle());
        // idempotent
        bot.stop_and_wait();
        assert!(bot.all_idle());
    }

    #[test]
    fn analyze_streams_snapshots() {
        let bot = make_bot(2, u64::MAX);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bot.analyze_async(Player::Black, 1.0, 0.02, Arc::new(move |rows| {
            if !rows.is_empty() {
                c.fetch_add(1, Relaxed);
            }
        }));
        std::thread::sleep(Duration::from_millis(300));
        bot.stop_and_wait();
        assert!(count.load(Relaxed) >= 2, "expected several analysis snapshots");
    }

    #[test]
    fn visit_budget_bounds_the_search() {
        let bot = make_bot(2, 64);
        let tc = TimeControls { per_move_time: 30.0, main_time_left: 1e9 };
        let _ = bot.gen_move_synchronous(Player::Black, tc, 1.0);
        // a small overshoot is allowed: each worker finishes its descent
        assert!(bot.search.root_visits() <= 64 + 16);
    }
}
