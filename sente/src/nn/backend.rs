//! The inference seam. Real deployments plug a GPU/CPU tensor backend in
//! behind [`NnBackend`]; the built-in [`PatternBackend`] is a deterministic
//! line-pattern evaluator so the full engine runs, tests and benchmarks
//! without a weights file.

use crate::nn::inputs::{EncodedInput, chan, gchan};

/// Raw per-position results in the symmetrised frame. The evaluator service
/// un-symmetrises and publishes them as [`crate::nn::NnOutput`]s.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub win_prob: f32,
    pub loss_prob: f32,
    pub no_result_prob: f32,
    pub score_mean: f32,
    pub score_stdev: f32,
    pub lead: f32,
    /// Probabilities over `area + 1` slots (pass last); not yet masked
    /// against legality.
    pub policy: Vec<f32>,
    pub ownership: Option<Vec<f32>>,
}

pub trait NnBackend: Send + Sync {
    fn name(&self) -> &str;
    fn max_batch_size(&self) -> usize;
    /// Evaluates a whole batch in one call. Implementations own their device
    /// context; the service guarantees a single in-flight call per server.
    fn evaluate_batch(&self, batch: &[EncodedInput], include_ownership: bool) -> Vec<RawOutput>;
}

/// Shape-counting evaluator in the spirit of the simple m,n,k line evals:
/// each potential move scores `4^run` for every line it would extend, the
/// position value compares the best follow-ups of both sides.
#[derive(Debug, Default, Clone)]
pub struct PatternBackend {
    pub batch_size: usize,
}

impl PatternBackend {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size: batch_size.max(1) }
    }

    fn eval_single(&self, input: &EncodedInput, include_ownership: bool) -> RawOutput {
        let x_size = input.x_size;
        let y_size = input.y_size;
        let area = x_size * y_size;
        let own = input.plane(chan::OWN_STONES);
        let opp = input.plane(chan::OPP_STONES);
        let own_forbidden = input.plane(chan::OWN_FORBIDDEN);
        let own_vcf = input.plane(chan::OWN_VCF_MOVE);
        let opp_vcf = input.plane(chan::OPP_VCF_MOVE);

        let occupied = |x: isize, y: isize, side: &[f32]| -> bool {
            if x < 0 || y < 0 || x >= x_size as isize || y >= y_size as isize {
                return false;
            }
            side[y as usize * x_size + x as usize] > 0.5
        };
        // longest run this cell would join, per side, over the four lines
        let move_strength = |pos: usize, side: &[f32], other: &[f32]| -> f32 {
            let x = (pos % x_size) as isize;
            let y = (pos / x_size) as isize;
            let mut strength = 0.0f32;
            for (dx, dy) in [(1isize, 0isize), (0, 1), (1, 1), (1, -1)] {
                let mut run = 0usize;
                for dir in [1isize, -1] {
                    let (mut cx, mut cy) = (x + dx * dir, y + dy * dir);
                    while occupied(cx, cy, side) {
                        run += 1;
                        cx += dx * dir;
                        cy += dy * dir;
                    }
                }
                // a line walled in on both immediate sides is worth little
                let open = !occupied(x + dx, y + dy, other) || !occupied(x - dx, y - dy, other);
                if open || run >= 3 {
                    strength += (1u32 << (2 * run.min(4))) as f32;
                }
            }
            strength
        };

        let mut logits = vec![f32::NEG_INFINITY; area + 1];
        let mut best_own = 0.0f32;
        let mut best_opp = 0.0f32;
        for pos in 0..area {
            if own[pos] > 0.5 || opp[pos] > 0.5 || input.plane(chan::ON_BOARD)[pos] < 0.5 {
                continue;
            }
            let attack = move_strength(pos, own, opp);
            let defend = move_strength(pos, opp, own);
            best_own = best_own.max(attack);
            best_opp = best_opp.max(defend);
            let mut logit = (attack + 0.5 * defend + 1.0).ln();
            if own_vcf[pos] > 0.5 {
                logit += 8.0;
            }
            if opp_vcf[pos] > 0.5 {
                logit += 4.0;
            }
            if own_forbidden[pos] > 0.5 {
                logit = f32::NEG_INFINITY;
            }
            logits[pos] = logit;
        }
        // the pass slot exists but passing never beats playing a stone
        logits[area] = -20.0;

        let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut policy = vec![0.0f32; area + 1];
        let mut total = 0.0f32;
        for (p, &l) in policy.iter_mut().zip(logits.iter()) {
            if l > f32::NEG_INFINITY {
                let e = (l - max_logit).exp();
                *p = e;
                total += e;
            }
        }
        if total > 0.0 {
            for p in &mut policy {
                *p /= total;
            }
        }

        // value from the side to move: they get the first shot at the best point
        let own_vcf_exists = input.global[gchan::OWN_VCF_EXISTS] > 0.5;
        let opp_vcf_exists = input.global[gchan::OPP_VCF_EXISTS] > 0.5;
        let mut edge = ((best_own * 1.4 - best_opp) / 300.0).tanh();
        if own_vcf_exists {
            edge = 0.98;
        } else if opp_vcf_exists {
            edge = edge.min(-0.6);
        }
        let win_prob = 0.5 * (1.0 + edge) * 0.995;
        let loss_prob = 0.5 * (1.0 - edge) * 0.995;
        let no_result_prob = 1.0 - win_prob - loss_prob;

        let ownership = include_ownership.then(|| {
            (0..area)
                .map(|pos| {
                    if own[pos] > 0.5 {
                        1.0
                    } else if opp[pos] > 0.5 {
                        -1.0
                    } else {
                        edge * 0.1
                    }
                })
                .collect()
        });

        RawOutput {
            win_prob,
            loss_prob,
            no_result_prob,
            score_mean: edge * 5.0,
            score_stdev: 2.0,
            lead: edge * 5.0,
            policy,
            ownership,
        }
    }
}

impl NnBackend for PatternBackend {
    fn name(&self) -> &str {
        "pattern"
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn evaluate_batch(&self, batch: &[EncodedInput], include_ownership: bool) -> Vec<RawOutput> {
        batch.iter().map(|input| self.eval_single(input, include_ownership)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::inputs::{NnInputParams, VcfFeed, encode};
    use goban::board::{Board, Loc, Player};
    use goban::history::BoardHistory;
    use goban::rules::{BasicRule, Rules};

    fn encoded(stones: &[(usize, usize, Player)]) -> EncodedInput {
        let mut board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        for &(x, y, pla) in stones {
            board.set_stone(Loc::from_xy(x, y, 15), pla).unwrap();
        }
        let hist = BoardHistory::new(&board, Player::Black, Rules::freestyle());
        let params = NnInputParams { use_vcf: false, ..NnInputParams::default() };
        encode(&board, &hist, Player::Black, &params, 0, VcfFeed::default())
    }

    #[test]
    fn policy_is_a_distribution() {
        let backend = PatternBackend::new(8);
        let input = encoded(&[(7, 7, Player::Black), (8, 8, Player::White)]);
        let out = &backend.evaluate_batch(std::slice::from_ref(&input), false)[0];
        let sum: f32 = out.policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "policy sums to {sum}");
        assert!(out.policy.iter().all(|&p| p >= 0.0));
        let total = out.win_prob + out.loss_prob + out.no_result_prob;
        assert!((total - 1.0).abs() < 1e-4);
    }

    #[test]
    fn occupied_cells_get_no_mass() {
        let backend = PatternBackend::new(8);
        let input = encoded(&[(7, 7, Player::Black)]);
        let out = &backend.evaluate_batch(std::slice::from_ref(&input), false)[0];
        assert_eq!(out.policy[7 * 15 + 7], 0.0);
    }

    #[test]
    fn extending_a_long_line_is_preferred() {
        let backend = PatternBackend::new(8);
        let input = encoded(&[
            (7, 7, Player::Black),
            (7, 8, Player::Black),
            (7, 9, Player::Black),
            (7, 10, Player::Black),
        ]);
        let out = &backend.evaluate_batch(std::slice::from_ref(&input), false)[0];
        let completion = out.policy[11 * 15 + 7];
        let random_corner = out.policy[0];
        assert!(completion > random_corner * 10.0);
    }

    #[test]
    fn deterministic_across_calls() {
        let backend = PatternBackend::new(8);
        let input = encoded(&[(3, 3, Player::Black), (4, 4, Player::White)]);
        let a = backend.evaluate_batch(std::slice::from_ref(&input), true);
        let b = backend.evaluate_batch(std::slice::from_ref(&input), true);
        assert_eq!(a[0].policy, b[0].policy);
        assert_eq!(a[0].win_prob, b[0].win_prob);
        assert_eq!(a[0].ownership, b[0].ownership);
    }
}
