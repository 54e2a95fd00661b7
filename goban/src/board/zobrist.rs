use crate::board::{MAX_ARR_SIZE, MAX_LEN};
use crate::core::hash::Hash128;

/// A simple `const` random number generator, the pcg xsl rr 128 64 oneseq
/// variant from <https://www.pcg-random.org/>. Running it at compile time
/// means the tables below are plain statics with no runtime initialization
/// order to worry about.
struct PcgXslRr128_64Oneseq(u128);

const MULTIPLIER: u128 = (2_549_297_995_355_413_924 << 64) + 4_865_540_595_714_422_341;
const INCREMENT: u128 = (6_364_136_223_846_793_005 << 64) + 1_442_695_040_888_963_407;

impl PcgXslRr128_64Oneseq {
    const fn new(seed: u128) -> Self {
        Self(seed.wrapping_add(INCREMENT).wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT))
    }

    const fn generate_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(MULTIPLIER);
        self.0 = self.0.wrapping_add(INCREMENT);
        let upper = (self.0 >> 64) as u64;
        let xored = upper ^ (self.0 as u64);
        xored.rotate_right((upper >> (122 - 64)) as u32)
    }

    const fn generate(&mut self) -> Hash128 {
        let hash0 = self.generate_u64();
        let hash1 = self.generate_u64();
        Hash128::new(hash0, hash1)
    }
}

pub struct ZobristKeys {
    /// Indexed by `[loc][color as usize]`; the `Empty` and `Wall` rows exist
    /// only so indexing needs no branch, they are never folded into a hash.
    pub board: [[Hash128; 4]; MAX_ARR_SIZE],
    pub size_x: [Hash128; MAX_LEN + 1],
    pub size_y: [Hash128; MAX_LEN + 1],
    pub player: [Hash128; 2],
    pub rule: [Hash128; 3],
    pub game_is_over: Hash128,
}

pub const ZOBRIST: ZobristKeys = {
    let mut keys = ZobristKeys {
        board: [[Hash128::ZERO; 4]; MAX_ARR_SIZE],
        size_x: [Hash128::ZERO; MAX_LEN + 1],
        size_y: [Hash128::ZERO; MAX_LEN + 1],
        player: [Hash128::ZERO; 2],
        rule: [Hash128::ZERO; 3],
        game_is_over: Hash128::ZERO,
    };
    let mut generator = PcgXslRr128_64Oneseq::new(0x5eed_0f60_ba11);
    let mut loc = 0;
    while loc < MAX_ARR_SIZE {
        // only the two stone colors get real keys
        keys.board[loc][1] = generator.generate();
        keys.board[loc][2] = generator.generate();
        loc += 1;
    }
    let mut i = 0;
    while i < MAX_LEN + 1 {
        keys.size_x[i] = generator.generate();
        keys.size_y[i] = generator.generate();
        i += 1;
    }
    keys.player[0] = generator.generate();
    keys.player[1] = generator.generate();
    keys.rule[0] = generator.generate();
    keys.rule[1] = generator.generate();
    keys.rule[2] = generator.generate();
    keys.game_is_over = generator.generate();
    keys
};
