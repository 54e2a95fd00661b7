//! The evaluator service: batches evaluation requests from any number of
//! search workers into single backend calls, and caches results under the
//! canonical input hash so different symmetries of one board still hit.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, bounded};
use goban::board::{Board, Player};
use goban::core::common::Res;
use goban::history::BoardHistory;

use crate::nn::backend::{NnBackend, RawOutput};
use crate::nn::cache::NnCache;
use crate::nn::inputs::{
    self, EncodedInput, NnInputParams, VcfFeed, chan, invert_symmetry_plane, invert_symmetry_policy,
};
use crate::nn::output::{NnOutput, POLICY_ILLEGAL};

/// How long a server keeps draining the queue once it holds at least one
/// request. A few hundred microseconds trades a little latency for much
/// bigger batches under load.
const BATCH_DRAIN_TIMEOUT: Duration = Duration::from_micros(300);
const QUEUE_CAPACITY: usize = 1 << 12;

struct Request {
    input: EncodedInput,
    include_ownership: bool,
    done: Sender<Arc<NnOutput>>,
}

struct Shared {
    backend: Arc<dyn NnBackend>,
    rx: Receiver<Request>,
    shutdown: std::sync::atomic::AtomicBool,
    batches_run: AtomicU64,
    rows_evaluated: AtomicU64,
}

pub struct NnEvaluator {
    shared: Arc<Shared>,
    tx: Sender<Request>,
    cache: NnCache,
    servers: Mutex<Vec<JoinHandle<()>>>,
    queries: AtomicU64,
}

impl NnEvaluator {
    pub fn new(
        backend: Arc<dyn NnBackend>,
        cache_size_pow_of_two: u32,
        mutex_pool_size_pow_of_two: u32,
        num_server_threads: usize,
    ) -> Arc<Self> {
        let (tx, rx) = bounded(QUEUE_CAPACITY);
        let shared = Arc::new(Shared {
            backend,
            rx,
            shutdown: std::sync::atomic::AtomicBool::new(false),
            batches_run: AtomicU64::new(0),
            rows_evaluated: AtomicU64::new(0),
        });
        let evaluator = Arc::new(NnEvaluator {
            shared,
            tx,
            cache: NnCache::new(cache_size_pow_of_two, mutex_pool_size_pow_of_two),
            servers: Mutex::new(vec![]),
            queries: AtomicU64::new(0),
        });
        evaluator.spawn_server_threads(num_server_threads);
        evaluator
    }

    /// Evaluates one position, blocking until the result is available.
    /// Safe to call from any number of threads.
    pub fn evaluate(
        &self,
        board: &Board,
        hist: &BoardHistory,
        next_pla: Player,
        params: &NnInputParams,
        skip_cache: bool,
        include_ownership: bool,
        vcf: VcfFeed,
    ) -> Res<Arc<NnOutput>> {
        self.queries.fetch_add(1, Relaxed);
        let hash = inputs::get_hash(board, hist, next_pla, params);
        if !skip_cache {
            if let Some(out) = self.cache.get(hash) {
                if !include_ownership || out.ownership.is_some() {
                    return Ok(out);
                }
            }
        }

        let symmetry = params
            .symmetry_override
            .unwrap_or_else(|| {
                let n = if board.x_size == board.y_size { 8 } else { 4 };
                (hash.hash1 % n) as u8
            });
        let input = inputs::encode(board, hist, next_pla, params, symmetry, vcf);

        let output = if self.num_server_threads() == 0 {
            // no servers running (tuning code between kill and respawn):
            // evaluate inline on the caller thread
            let raw = self
                .shared
                .backend
                .evaluate_batch(std::slice::from_ref(&input), include_ownership)
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("backend returned no output"))?;
            Arc::new(finalize(&input, raw))
        } else {
            let (done_tx, done_rx) = bounded(1);
            self.tx
                .send(Request { input, include_ownership, done: done_tx })
                .map_err(|_| anyhow!("evaluator request queue is closed"))?;
            done_rx.recv().map_err(|_| anyhow!("evaluator server threads died"))?
        };

        if !skip_cache {
            self.cache.put(hash, output.clone());
        }
        Ok(output)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache.hits()
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache.misses()
    }

    pub fn num_queries(&self) -> u64 {
        self.queries.load(Relaxed)
    }

    pub fn num_batches_run(&self) -> u64 {
        self.shared.batches_run.load(Relaxed)
    }

    pub fn max_batch_size(&self) -> usize {
        self.shared.backend.max_batch_size()
    }

    pub fn num_server_threads(&self) -> usize {
        self.servers.lock().unwrap().len()
    }

    /// Stops and joins all inference servers. In-flight batches complete
    /// and their results are still delivered.
    pub fn kill_server_threads(&self) {
        self.shared.shutdown.store(true, Relaxed);
        let handles: Vec<_> = self.servers.lock().unwrap().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }
        self.shared.shutdown.store(false, Relaxed);
    }

    pub fn spawn_server_threads(&self, count: usize) {
        let mut servers = self.servers.lock().unwrap();
        for i in 0..count {
            let shared = self.shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("nnserver-{i}"))
                .spawn(move || server_loop(&shared))
                .expect("failed to spawn evaluator server thread");
            servers.push(handle);
        }
    }

    /// Reconfigures the server pool; used by tuning code.
    pub fn set_num_threads(&self, counts: &[usize]) {
        self.kill_server_threads();
        self.spawn_server_threads(counts.iter().sum());
    }
}

impl Drop for NnEvaluator {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Relaxed);
        for handle in self.servers.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
    }
}

fn server_loop(shared: &Shared) {
    let max_batch = shared.backend.max_batch_size().max(1);
    loop {
        if shared.shutdown.load(Relaxed) {
            return;
        }
        let first = match shared.rx.recv_timeout(Duration::from_millis(10)) {
            Ok(req) => req,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        };
        let mut batch = vec![first];
        let deadline = Instant::now() + BATCH_DRAIN_TIMEOUT;
        while batch.len() < max_batch {
            match shared.rx.try_recv() {
                Ok(req) => batch.push(req),
                Err(_) => {
                    if Instant::now() >= deadline {
                        break;
                    }
                    std::hint::spin_loop();
                }
            }
        }

        let include_ownership = batch.iter().any(|r| r.include_ownership);
        let inputs: Vec<EncodedInput> = batch.iter().map(|r| r.input.clone()).collect();
        let raws = shared.backend.evaluate_batch(&inputs, include_ownership);
        shared.batches_run.fetch_add(1, Relaxed);
        shared.rows_evaluated.fetch_add(batch.len() as u64, Relaxed);
        for (req, raw) in batch.into_iter().zip(raws) {
            let mut output = finalize(&req.input, raw);
            if !req.include_ownership {
                output.ownership = None;
            }
            // completion order is unspecified; per-request correctness rides
            // on this one-shot. The requester may have been cancelled, in
            // which case the result is simply dropped.
            let _ = req.done.send(Arc::new(output));
        }
    }
}

/// Un-symmetrises a raw backend result and applies the legality sentinel
/// based on the encoded planes, producing the canonical-orientation output.
fn finalize(input: &EncodedInput, raw: RawOutput) -> NnOutput {
    let x_size = input.x_size;
    let y_size = input.y_size;
    let area = x_size * y_size;
    let mut policy = invert_symmetry_policy(&raw.policy, input.symmetry, x_size, y_size);
    let own = invert_symmetry_plane(input.plane(chan::OWN_STONES), input.symmetry, x_size, y_size);
    let opp = invert_symmetry_plane(input.plane(chan::OPP_STONES), input.symmetry, x_size, y_size);
    let own_forbidden =
        invert_symmetry_plane(input.plane(chan::OWN_FORBIDDEN), input.symmetry, x_size, y_size);
    let mut legal_mass = 0.0f32;
    for pos in 0..area {
        if own[pos] > 0.5 || opp[pos] > 0.5 || own_forbidden[pos] > 0.5 {
            policy[pos] = POLICY_ILLEGAL;
        } else {
            legal_mass += policy[pos];
        }
    }
    legal_mass += policy[area];
    if legal_mass > 0.0 {
        for p in policy.iter_mut() {
            if *p >= 0.0 {
                *p /= legal_mass;
            }
        }
    }
    let ownership =
        raw.ownership.map(|o| invert_symmetry_plane(&o, input.symmetry, x_size, y_size));
    NnOutput {
        nn_hash: input.hash,
        win_prob: raw.win_prob,
        loss_prob: raw.loss_prob,
        no_result_prob: raw.no_result_prob,
        score_mean: raw.score_mean,
        score_stdev: raw.score_stdev,
        lead: raw.lead,
        policy,
        ownership,
        x_size,
        y_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::backend::PatternBackend;
    use goban::board::Loc;
    use goban::rules::{BasicRule, Rules};

    fn setup() -> (Board, BoardHistory) {
        let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let mut hist = BoardHistory::new(&board, Player::Black, Rules::freestyle());
        hist.make_board_move_assume_legal(&mut board, Loc::from_xy(7, 7, 15), Player::Black);
        hist.make_board_move_assume_legal(&mut board, Loc::from_xy(8, 8, 15), Player::White);
        (board, hist)
    }

    fn params() -> NnInputParams {
        NnInputParams { use_vcf: false, ..NnInputParams::default() }
    }

    #[test]
    fn evaluate_round_trips_through_servers() {
        let evaluator = NnEvaluator::new(Arc::new(PatternBackend::new(8)), 12, 4, 1);
        let (board, hist) = setup();
        let out = evaluator
            .evaluate(&board, &hist, Player::Black, &params(), false, false, VcfFeed::default())
            .unwrap();
        assert!(out.check_invariants());
        // occupied cells carry the illegal sentinel
        assert_eq!(out.policy_at(Loc::from_xy(7, 7, 15)), POLICY_ILLEGAL);
        let legal_sum: f32 = out.policy.iter().filter(|&&p| p >= 0.0).sum();
        assert!((legal_sum - 1.0).abs() < 1e-3, "legal mass {legal_sum}");
        evaluator.kill_server_threads();
    }

    #[test]
    fn second_evaluate_hits_the_cache() {
        let evaluator = NnEvaluator::new(Arc::new(PatternBackend::new(8)), 12, 4, 1);
        let (board, hist) = setup();
        let p = params();
        let first = evaluator
            .evaluate(&board, &hist, Player::Black, &p, false, false, VcfFeed::default())
            .unwrap();
        let hits_before = evaluator.cache_hits();
        let second = evaluator
            .evaluate(&board, &hist, Player::Black, &p, false, false, VcfFeed::default())
            .unwrap();
        assert!(evaluator.cache_hits() > hits_before);
        assert_eq!(first.nn_hash, second.nn_hash);
        assert_eq!(first.policy, second.policy);
        evaluator.kill_server_threads();
    }

    #[test]
    fn symmetries_cache_under_one_canonical_hash() {
        let evaluator = NnEvaluator::new(Arc::new(PatternBackend::new(8)), 12, 4, 1);
        let (board, hist) = setup();
        let mut reference: Option<Arc<NnOutput>> = None;
        for sym in 0..8u8 {
            let p = NnInputParams { symmetry_override: Some(sym), ..params() };
            let out = evaluator
                .evaluate(&board, &hist, Player::Black, &p, true, false, VcfFeed::default())
                .unwrap();
            if let Some(ref r) = reference {
                assert_eq!(r.nn_hash, out.nn_hash, "symmetry {sym} changed the hash");
                for (a, b) in r.policy.iter().zip(out.policy.iter()) {
                    assert!((a - b).abs() < 1e-4, "symmetry {sym} changed the policy");
                }
            } else {
                reference = Some(out);
            }
        }
        evaluator.kill_server_threads();
    }

    #[test]
    fn inline_path_works_with_no_servers() {
        let evaluator = NnEvaluator::new(Arc::new(PatternBackend::new(8)), 10, 2, 0);
        let (board, hist) = setup();
        let out = evaluator
            .evaluate(&board, &hist, Player::White, &params(), false, true, VcfFeed::default())
            .unwrap();
        assert!(out.ownership.is_some());
        assert!(out.check_invariants());
    }

    #[test]
    fn clear_cache_is_idempotent() {
        let evaluator = NnEvaluator::new(Arc::new(PatternBackend::new(8)), 10, 2, 0);
        let (board, hist) = setup();
        let _ = evaluator.evaluate(&board, &hist, Player::Black, &params(), false, false, VcfFeed::default());
        evaluator.clear_cache();
        evaluator.clear_cache();
        assert!(evaluator.num_queries() >= 1);
    }
}
