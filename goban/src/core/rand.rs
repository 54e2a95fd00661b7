use crate::core::hash::split_mix64;

const XORMULT_LEN: usize = 16;
const XORMULT_MULTIPLIER: u64 = 1_181_783_497_276_652_981;

/// xorshift1024* generator. Long period, cheap state advance.
#[derive(Debug, Clone)]
struct XorShift1024Mult {
    a: [u64; XORMULT_LEN],
    a_idx: usize,
}

impl XorShift1024Mult {
    fn new(init_a: [u64; XORMULT_LEN]) -> Self {
        debug_assert!(init_a.iter().any(|&x| x != 0));
        Self { a: init_a, a_idx: 0 }
    }

    fn next_u32(&mut self) -> u32 {
        let a0 = self.a[self.a_idx];
        self.a_idx = (self.a_idx + 1) & (XORMULT_LEN - 1);
        let mut a1 = self.a[self.a_idx];
        a1 ^= a1 << 31;
        a1 = a1 ^ a0 ^ (a1 >> 11) ^ (a0 >> 30);
        self.a[self.a_idx] = a1;
        (a1.wrapping_mul(XORMULT_MULTIPLIER) >> 32) as u32
    }
}

/// pcg32-oneseq. Used in combination with the xorshift so that a weakness
/// in either generator alone cannot correlate the output stream.
#[derive(Debug, Clone)]
struct Pcg32 {
    s: u64,
}

impl Pcg32 {
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    fn new(state: u64) -> Self {
        Self { s: state }
    }

    fn next_u32(&mut self) -> u32 {
        let x = self.s;
        self.s = x.wrapping_mul(Self::MULTIPLIER).wrapping_add(Self::INCREMENT);
        let xorshifted = (((x >> 18) ^ x) >> 27) as u32;
        let rot = (x >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

/// The engine's deterministic RNG: the sum of an xorshift1024* stream and a
/// pcg32 stream, both expanded from a single 64-bit seed. Every consumer of
/// randomness in the search goes through this type, so a fixed
/// `searchRandSeed` makes single-threaded runs reproducible.
#[derive(Debug, Clone)]
pub struct Rand {
    xorm: XorShift1024Mult,
    pcg: Pcg32,
    has_gaussian: bool,
    stored_gaussian: f64,
    init_seed: u64,
}

impl Rand {
    /// Seeded from OS entropy.
    pub fn new() -> Self {
        Self::from_seed(rand::random::<u64>())
    }

    pub fn from_seed(seed: u64) -> Self {
        let mut init_a = [0u64; XORMULT_LEN];
        let mut x = seed;
        for slot in &mut init_a {
            x = split_mix64(x);
            *slot = x;
        }
        // the all-zero state is the one invalid xorshift seed
        if init_a.iter().all(|&v| v == 0) {
            init_a[0] = 1;
        }
        x = split_mix64(x);
        Self {
            xorm: XorShift1024Mult::new(init_a),
            pcg: Pcg32::new(x),
            has_gaussian: false,
            stored_gaussian: 0.0,
            init_seed: seed,
        }
    }

    pub fn init_seed(&self) -> u64 {
        self.init_seed
    }

    pub fn next_u32(&mut self) -> u32 {
        self.xorm.next_u32().wrapping_add(self.pcg.next_u32())
    }

    pub fn next_u64(&mut self) -> u64 {
        ((self.next_u32() as u64) << 32) | self.next_u32() as u64
    }

    /// Uniform in `[0, n)`. Rejection-samples to avoid modulo bias.
    pub fn next_u32_bounded(&mut self, n: u32) -> u32 {
        assert!(n > 0, "bound must be positive");
        if n.is_power_of_two() {
            return self.next_u32() & (n - 1);
        }
        let limit = u32::MAX - u32::MAX % n;
        loop {
            let x = self.next_u32();
            if x < limit {
                return x % n;
            }
        }
    }

    /// Uniform in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Standard normal via Box-Muller, caching the spare draw.
    pub fn next_gaussian(&mut self) -> f64 {
        if self.has_gaussian {
            self.has_gaussian = false;
            return self.stored_gaussian;
        }
        loop {
            let u = 2.0 * self.next_f64() - 1.0;
            let v = 2.0 * self.next_f64() - 1.0;
            let s = u * u + v * v;
            if s > 0.0 && s < 1.0 {
                let scale = (-2.0 * s.ln() / s).sqrt();
                self.stored_gaussian = v * scale;
                self.has_gaussian = true;
                return u * scale;
            }
        }
    }

    /// Gamma(a, 1) by Marsaglia-Tsang squeeze, with the standard boost for a < 1.
    pub fn next_gamma(&mut self, a: f64) -> f64 {
        assert!(a > 0.0, "gamma shape must be positive");
        if a < 1.0 {
            // Gamma(a) = Gamma(a+1) * U^(1/a)
            let g = self.next_gamma(a + 1.0);
            let u = loop {
                let u = self.next_f64();
                if u > 0.0 {
                    break u;
                }
            };
            return g * u.powf(1.0 / a);
        }
        let d = a - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let x = self.next_gaussian();
            let v = 1.0 + c * x;
            if v <= 0.0 {
                continue;
            }
            let v = v * v * v;
            let u = self.next_f64();
            let x2 = x * x;
            if u < 1.0 - 0.0331 * x2 * x2 {
                return d * v;
            }
            if u > 0.0 && u.ln() < 0.5 * x2 + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }
}

impl Default for Rand {
    fn default() -> Self {
        Self::new()
    }
}
