use goban::board::Loc;
use goban::core::hash::Hash128;

/// Marks an illegal move slot in the policy array.
pub const POLICY_ILLEGAL: f32 = -1.0;

/// One evaluated position. All value channels are from the perspective of
/// the player to move at the time of the evaluation; the search flips signs
/// along every tree edge during backup.
#[derive(Debug, Clone)]
pub struct NnOutput {
    /// The input hash this output was produced from; the cache key.
    pub nn_hash: Hash128,
    pub win_prob: f32,
    pub loss_prob: f32,
    pub no_result_prob: f32,
    pub score_mean: f32,
    pub score_stdev: f32,
    pub lead: f32,
    /// Indexed by `y * x_size + x`, with one extra trailing slot for pass.
    /// Legal entries sum to 1; illegal entries hold [`POLICY_ILLEGAL`].
    pub policy: Vec<f32>,
    /// Expected final ownership per cell in `[-1, 1]`, if requested.
    pub ownership: Option<Vec<f32>>,
    pub x_size: usize,
    pub y_size: usize,
}

impl NnOutput {
    /// Expected value in `[-1, 1]` for the player to move.
    pub fn value(&self) -> f64 {
        (self.win_prob - self.loss_prob) as f64
    }

    pub fn policy_len(x_size: usize, y_size: usize) -> usize {
        x_size * y_size + 1
    }

    pub fn pass_pos(&self) -> usize {
        self.x_size * self.y_size
    }

    pub fn pos_of_loc(&self, loc: Loc) -> usize {
        loc.y(self.x_size) * self.x_size + loc.x(self.x_size)
    }

    pub fn loc_of_pos(&self, pos: usize) -> Option<Loc> {
        if pos >= self.x_size * self.y_size {
            return None;
        }
        Some(Loc::from_xy(pos % self.x_size, pos / self.x_size, self.x_size))
    }

    pub fn policy_at(&self, loc: Loc) -> f32 {
        self.policy[self.pos_of_loc(loc)]
    }

    /// The probability channels must form a distribution.
    pub fn check_invariants(&self) -> bool {
        let sum = self.win_prob + self.loss_prob + self.no_result_prob;
        self.win_prob >= 0.0
            && self.loss_prob >= 0.0
            && self.no_result_prob >= 0.0
            && (sum - 1.0).abs() <= 1e-4
            && self.policy.len() == Self::policy_len(self.x_size, self.y_size)
    }
}
