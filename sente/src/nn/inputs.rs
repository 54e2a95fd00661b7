//! Feature encoding: materializes the spatial and global tensors the
//! inference backend consumes, chooses board symmetries, and computes the
//! 128-bit input hash the evaluator caches under.

use goban::board::zobrist::ZOBRIST;
use goban::board::{Board, Color, Loc, Player};
use goban::core::hash::{Hash128, basic_lcong, basic_lcong2, split_mix64};
use goban::history::BoardHistory;
use goban::rules::BasicRule;

use crate::vcf::{VcfResult, VcfSolver};

pub const NUM_FEATURES_SPATIAL: usize = 22;
pub const NUM_FEATURES_GLOBAL: usize = 19;
pub const NUM_SYMMETRIES: u8 = 8;

/// The node budget for solver calls made on the encoder's behalf. Small:
/// the encoder only wants the cheap proofs, the search proper runs its own
/// deeper solves.
pub const ENCODER_VCF_BUDGET: u64 = 3_000;

/// Spatial feature planes, in channel order.
pub mod chan {
    pub const ON_BOARD: usize = 0;
    pub const OWN_STONES: usize = 1;
    pub const OPP_STONES: usize = 2;
    pub const OWN_FORBIDDEN: usize = 3;
    pub const OPP_FORBIDDEN: usize = 4;
    pub const OWN_VCF_MOVE: usize = 5;
    pub const OPP_VCF_MOVE: usize = 6;
    /// Six one-hot planes marking the last six moves, most recent first.
    pub const RECENT_MOVE_BASE: usize = 7;
    pub const NUM_RECENT: usize = 6;
    // the channels above 12 are zero; the tensor keeps the full width the
    // trained net layout expects
}

/// Global feature entries, in order.
pub mod gchan {
    pub const SIDE_TO_MOVE: usize = 0;
    pub const NO_RESULT_UTILITY: usize = 1;
    pub const OWN_VCF_EXISTS: usize = 2;
    pub const OWN_VCF_DISPROVEN: usize = 3;
    pub const OPP_VCF_EXISTS: usize = 4;
    pub const OPP_VCF_DISPROVEN: usize = 5;
    pub const PDA_MAGNITUDE: usize = 6;
    pub const PDA_FLAG: usize = 7;
    pub const RULE_STANDARD: usize = 8;
    pub const RULE_RENJU: usize = 9;
}

/// Side adjustments that change what the net should predict for the same
/// stones, so they are folded into the input hash.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct NnInputParams {
    pub no_result_utility: f64,
    pub playout_doubling_advantage: f64,
    pub policy_temperature: f32,
    pub use_vcf: bool,
    /// Fixed symmetry for deterministic runs; `None` lets the caller pick.
    pub symmetry_override: Option<u8>,
}

impl Default for NnInputParams {
    fn default() -> Self {
        NnInputParams {
            no_result_utility: 0.0,
            playout_doubling_advantage: 0.0,
            policy_temperature: 1.0,
            use_vcf: true,
            symmetry_override: None,
        }
    }
}

static ZOBRIST_PLAYOUT_DOUBLINGS: Hash128 = Hash128::new(0xa8e0_26f7_19c4_2f55, 0x77b9_3b2c_8f1a_d30e);
static ZOBRIST_POLICY_TEMP: Hash128 = Hash128::new(0x43c1_9af2_60d5_7e88, 0xee02_5b61_c4d9_1a37);

/// The canonical cache key: position, side to move, rule, termination and
/// the discretized evaluation adjustments.
pub fn get_hash(board: &Board, hist: &BoardHistory, next_pla: Player, params: &NnInputParams) -> Hash128 {
    let mut hash = board.position_hash(next_pla);
    hash ^= ZOBRIST.rule[board.rule as usize];
    if hist.is_game_finished {
        hash ^= ZOBRIST.game_is_over;
    }
    if params.playout_doubling_advantage != 0.0 {
        let discretized = (params.playout_doubling_advantage * 256.0) as i64 as u64;
        hash.hash0 = hash.hash0.wrapping_add(split_mix64(discretized));
        hash.hash1 = hash.hash1.wrapping_add(basic_lcong(discretized));
        hash ^= ZOBRIST_PLAYOUT_DOUBLINGS;
    }
    if params.policy_temperature != 1.0 {
        let discretized = (params.policy_temperature as f64 * 2048.0) as i64 as u64;
        hash.hash0 ^= basic_lcong2(discretized);
        hash.hash1 = split_mix64(hash.hash1.wrapping_add(discretized));
        hash.hash0 = hash.hash0.wrapping_add(hash.hash1);
        hash ^= ZOBRIST_POLICY_TEMP;
    }
    hash
}

/// Applies one of the eight board symmetries to a coordinate pair.
/// Bit 0 flips y, bit 1 flips x, bit 2 transposes; transposition is only
/// meaningful on square boards and is skipped otherwise.
pub fn symmetry_of_xy(x: usize, y: usize, symmetry: u8, x_size: usize, y_size: usize) -> (usize, usize) {
    let (mut x, mut y) = (x, y);
    if symmetry & 1 != 0 {
        y = y_size - 1 - y;
    }
    if symmetry & 2 != 0 {
        x = x_size - 1 - x;
    }
    if symmetry & 4 != 0 && x_size == y_size {
        std::mem::swap(&mut x, &mut y);
    }
    (x, y)
}

/// Undoes a policy array produced in the symmetrised frame back into the
/// canonical orientation. The pass slot is fixed under all symmetries.
pub fn invert_symmetry_policy(policy: &[f32], symmetry: u8, x_size: usize, y_size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; policy.len()];
    for y in 0..y_size {
        for x in 0..x_size {
            let (sx, sy) = symmetry_of_xy(x, y, symmetry, x_size, y_size);
            out[y * x_size + x] = policy[sy * x_size + sx];
        }
    }
    out[x_size * y_size] = policy[x_size * y_size];
    out
}

pub fn invert_symmetry_plane(plane: &[f32], symmetry: u8, x_size: usize, y_size: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; plane.len()];
    for y in 0..y_size {
        for x in 0..x_size {
            let (sx, sy) = symmetry_of_xy(x, y, symmetry, x_size, y_size);
            out[y * x_size + x] = plane[sy * x_size + sx];
        }
    }
    out
}

/// The tensors handed to a backend, already in the symmetrised frame.
#[derive(Debug, Clone)]
pub struct EncodedInput {
    /// CHW layout, `NUM_FEATURES_SPATIAL * y_size * x_size`.
    pub spatial: Vec<f32>,
    pub global: Vec<f32>,
    pub x_size: usize,
    pub y_size: usize,
    pub symmetry: u8,
    pub hash: Hash128,
}

impl EncodedInput {
    pub fn plane(&self, c: usize) -> &[f32] {
        let area = self.x_size * self.y_size;
        &self.spatial[c * area..(c + 1) * area]
    }
}

/// Results of the solver runs the encoder wants; callers that already ran
/// the solver pass them in so the work isn't repeated.
#[derive(Debug, Default, Copy, Clone)]
pub struct VcfFeed {
    pub own: Option<VcfResult>,
    pub opp: Option<VcfResult>,
}

pub fn encode(
    board: &Board,
    hist: &BoardHistory,
    next_pla: Player,
    params: &NnInputParams,
    symmetry: u8,
    vcf: VcfFeed,
) -> EncodedInput {
    let x_size = board.x_size;
    let y_size = board.y_size;
    let area = x_size * y_size;
    let mut spatial = vec![0.0f32; NUM_FEATURES_SPATIAL * area];
    let mut global = vec![0.0f32; NUM_FEATURES_GLOBAL];
    let hash = get_hash(board, hist, next_pla, params);

    let own_vcf = match (params.use_vcf, vcf.own) {
        (false, _) => None,
        (true, Some(r)) => Some(r),
        (true, None) => Some(VcfSolver::run(board, next_pla, ENCODER_VCF_BUDGET)),
    };
    let opp_vcf = match (params.use_vcf, vcf.opp) {
        (false, _) => None,
        (true, Some(r)) => Some(r),
        (true, None) => Some(VcfSolver::run(board, next_pla.opponent(), ENCODER_VCF_BUDGET)),
    };

    let mut set = |c: usize, x: usize, y: usize, v: f32| {
        let (sx, sy) = symmetry_of_xy(x, y, symmetry, x_size, y_size);
        spatial[c * area + sy * x_size + sx] = v;
    };

    let renju = board.rule == BasicRule::Renju;
    for y in 0..y_size {
        for x in 0..x_size {
            let loc = Loc::from_xy(x, y, x_size);
            set(chan::ON_BOARD, x, y, 1.0);
            match board.get(loc) {
                c if c == next_pla.color() => set(chan::OWN_STONES, x, y, 1.0),
                Color::Empty => {
                    if renju && board.is_forbidden(loc) {
                        if next_pla == Player::Black {
                            set(chan::OWN_FORBIDDEN, x, y, 1.0);
                        } else {
                            set(chan::OPP_FORBIDDEN, x, y, 1.0);
                        }
                    }
                }
                Color::Wall => {}
                _ => set(chan::OPP_STONES, x, y, 1.0),
            }
        }
    }

    if let Some(VcfResult::ProvenWin(loc)) = own_vcf {
        set(chan::OWN_VCF_MOVE, loc.x(x_size), loc.y(x_size), 1.0);
    }
    if let Some(VcfResult::ProvenWin(loc)) = opp_vcf {
        set(chan::OPP_VCF_MOVE, loc.x(x_size), loc.y(x_size), 1.0);
    }

    let num_recent = hist.move_history.len().min(chan::NUM_RECENT);
    for i in 0..num_recent {
        let mv = hist.move_history[hist.move_history.len() - 1 - i];
        if mv.loc.is_real() {
            set(chan::RECENT_MOVE_BASE + i, mv.loc.x(x_size), mv.loc.y(x_size), 1.0);
        }
    }

    global[gchan::SIDE_TO_MOVE] = if next_pla == Player::Black { 1.0 } else { -1.0 };
    global[gchan::NO_RESULT_UTILITY] = params.no_result_utility as f32;
    global[gchan::OWN_VCF_EXISTS] = matches!(own_vcf, Some(VcfResult::ProvenWin(_))) as u8 as f32;
    global[gchan::OWN_VCF_DISPROVEN] = matches!(own_vcf, Some(VcfResult::Disproven)) as u8 as f32;
    global[gchan::OPP_VCF_EXISTS] = matches!(opp_vcf, Some(VcfResult::ProvenWin(_))) as u8 as f32;
    global[gchan::OPP_VCF_DISPROVEN] = matches!(opp_vcf, Some(VcfResult::Disproven)) as u8 as f32;
    global[gchan::PDA_MAGNITUDE] = params.playout_doubling_advantage as f32;
    global[gchan::PDA_FLAG] = (params.playout_doubling_advantage != 0.0) as u8 as f32;
    global[gchan::RULE_STANDARD] = (board.rule == BasicRule::Standard) as u8 as f32;
    global[gchan::RULE_RENJU] = renju as u8 as f32;

    EncodedInput { spatial, global, x_size, y_size, symmetry, hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goban::rules::Rules;

    fn setup() -> (Board, BoardHistory) {
        let board = Board::new(15, 15, BasicRule::Freestyle).unwrap();
        let hist = BoardHistory::new(&board, Player::Black, Rules::freestyle());
        (board, hist)
    }

    #[test]
    fn hash_depends_on_side_and_params() {
        let (board, hist) = setup();
        let params = NnInputParams::default();
        let hb = get_hash(&board, &hist, Player::Black, &params);
        let hw = get_hash(&board, &hist, Player::White, &params);
        assert_ne!(hb, hw);
        let pda = NnInputParams { playout_doubling_advantage: 1.0, ..params };
        assert_ne!(get_hash(&board, &hist, Player::Black, &pda), hb);
        let temp = NnInputParams { policy_temperature: 1.5, ..params };
        assert_ne!(get_hash(&board, &hist, Player::Black, &temp), hb);
    }

    #[test]
    fn transposition_produces_same_hash() {
        let (board, _) = setup();
        let mut a = board.clone();
        let mut b = board.clone();
        let mut ha = BoardHistory::new(&a, Player::Black, Rules::freestyle());
        let mut hb = BoardHistory::new(&b, Player::Black, Rules::freestyle());
        let l1 = Loc::from_xy(3, 3, 15);
        let l2 = Loc::from_xy(5, 5, 15);
        let l3 = Loc::from_xy(7, 7, 15);
        let l4 = Loc::from_xy(9, 9, 15);
        // same position via two move orders
        ha.make_board_move_assume_legal(&mut a, l1, Player::Black);
        ha.make_board_move_assume_legal(&mut a, l2, Player::White);
        ha.make_board_move_assume_legal(&mut a, l3, Player::Black);
        ha.make_board_move_assume_legal(&mut a, l4, Player::White);
        hb.make_board_move_assume_legal(&mut b, l3, Player::Black);
        hb.make_board_move_assume_legal(&mut b, l4, Player::White);
        hb.make_board_move_assume_legal(&mut b, l1, Player::Black);
        hb.make_board_move_assume_legal(&mut b, l2, Player::White);
        let params = NnInputParams::default();
        assert_eq!(get_hash(&a, &ha, Player::Black, &params), get_hash(&b, &hb, Player::Black, &params));
    }

    #[test]
    fn symmetries_form_a_round_trip() {
        for sym in 0..NUM_SYMMETRIES {
            let mut policy = vec![0.0f32; 15 * 15 + 1];
            for (i, p) in policy.iter_mut().enumerate() {
                *p = i as f32;
            }
            // encoding writes canonical (x,y) into the symmetrised slot, so
            // inverting the symmetrised array must restore the original
            let mut symmetrised = vec![0.0f32; 15 * 15 + 1];
            for y in 0..15 {
                for x in 0..15 {
                    let (sx, sy) = symmetry_of_xy(x, y, sym, 15, 15);
                    symmetrised[sy * 15 + sx] = policy[y * 15 + x];
                }
            }
            symmetrised[15 * 15] = policy[15 * 15];
            let inverted = invert_symmetry_policy(&symmetrised, sym, 15, 15);
            assert_eq!(inverted, policy, "symmetry {sym}");
        }
    }

    #[test]
    fn encoder_marks_stones_and_mask() {
        let (mut board, mut hist) = setup();
        hist.make_board_move_assume_legal(&mut board, Loc::from_xy(7, 7, 15), Player::Black);
        let params = NnInputParams { use_vcf: false, ..NnInputParams::default() };
        let enc = encode(&board, &hist, Player::White, &params, 0, VcfFeed::default());
        assert_eq!(enc.plane(chan::ON_BOARD).iter().sum::<f32>(), 225.0);
        // black stone is the opponent's from white's perspective
        assert_eq!(enc.plane(chan::OPP_STONES)[7 * 15 + 7], 1.0);
        assert_eq!(enc.plane(chan::OWN_STONES).iter().sum::<f32>(), 0.0);
        assert_eq!(enc.plane(chan::RECENT_MOVE_BASE)[7 * 15 + 7], 1.0);
        assert_eq!(enc.global[gchan::SIDE_TO_MOVE], -1.0);
    }
}
