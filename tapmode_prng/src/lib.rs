// Deterministic, portable pseudo-random number generator.
//
// Implements the ARC4-keyed generator of the `seedrandom` family: the seed
// text is folded into a key, the key schedules an RC4 permutation, the first
// 256 output bytes are discarded, and each uniform double is assembled from
// keystream bytes until it carries a full 52-bit mantissa. Integer rolls are
// `floor(random() * n)`, so a text seed names the same stream of rolls as the
// JavaScript tooling that popularised these riff tables.
//
// This crate is the single source of randomness for `tapmode_music`. The
// composer threads one `MusicRng` through every table roll and uniform
// sample in a fixed order, so a seed plus the structural parameters fully
// determine the generated piece.
//
// **Critical constraint: determinism.** Every method on `MusicRng` must
// produce identical output given the same prior state, regardless of
// platform, compiler version, or optimization level. Every sampling method
// consumes exactly one `next_f64` draw; callers rely on that to keep the
// consumption order stable.

/// Keystream bytes per initial draw (48 bits).
const CHUNKS: usize = 6;
/// 2^48, the denominator after the initial six bytes.
const START_DENOM: f64 = 281_474_976_710_656.0;
/// 2^52: draws keep pulling bytes until the numerator reaches this.
const SIGNIFICANCE: f64 = 4_503_599_627_370_496.0;
/// 2^53: numerators at or above this are halved back into range.
const OVERFLOW: f64 = 9_007_199_254_740_992.0;

/// Seeded uniform source: the engine's sole source of randomness.
#[derive(Clone, Debug)]
pub struct MusicRng {
    arc4: Arc4,
}

impl MusicRng {
    /// Create a new PRNG seeded from a `u64`.
    ///
    /// A numeric seed names the same stream as its decimal text.
    pub fn new(seed: u64) -> Self {
        Self::from_seed_str(&seed.to_string())
    }

    /// Create a PRNG from a text seed.
    pub fn from_seed_str(seed: &str) -> Self {
        Self {
            arc4: Arc4::new(&mix_key(seed)),
        }
    }

    /// Generate a uniform double in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        let mut n = self.arc4.take(CHUNKS) as f64;
        let mut d = START_DENOM;
        let mut x: u64 = 0;
        while n < SIGNIFICANCE {
            n = (n + x as f64) * 256.0;
            d *= 256.0;
            x = self.arc4.take(1);
        }
        while n >= OVERFLOW {
            n /= 2.0;
            d /= 2.0;
            x >>= 1;
        }
        (n + x as f64) / d
    }

    /// Generate a uniform integer in `[0, n)` as `floor(next_f64() * n)`.
    ///
    /// Panics if `n == 0`.
    pub fn roll(&mut self, n: u64) -> u64 {
        assert!(n > 0, "roll: n must be positive");
        let v = (self.next_f64() * n as f64).floor() as u64;
        v.min(n - 1)
    }

    /// `roll` for `usize` bounds, e.g. slice lengths.
    pub fn roll_usize(&mut self, n: usize) -> usize {
        self.roll(n as u64) as usize
    }
}

/// Fold seed text into an ARC4 key.
///
/// Works on UTF-16 code units; each unit is mixed into the key slot at its
/// index modulo 256, smeared with the slot's previous contents. An empty
/// seed yields the one-byte key `[0]`.
pub fn mix_key(seed: &str) -> Vec<u8> {
    let mut key: Vec<u8> = Vec::new();
    let mut smear: i32 = 0;
    for (j, unit) in seed.encode_utf16().enumerate() {
        let idx = j & 0xFF;
        let prev = key.get(idx).map_or(0, |&k| i32::from(k) * 19);
        smear ^= prev;
        let byte = (smear.wrapping_add(i32::from(unit)) & 0xFF) as u8;
        match key.get_mut(idx) {
            Some(slot) => *slot = byte,
            None => key.push(byte),
        }
    }
    if key.is_empty() {
        key.push(0);
    }
    key
}

/// RC4 state: a byte permutation plus its two cursors.
#[derive(Clone, Debug)]
struct Arc4 {
    i: u8,
    j: u8,
    s: [u8; 256],
}

impl Arc4 {
    fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, slot) in s.iter_mut().enumerate() {
            *slot = i as u8;
        }
        let mut j: u8 = 0;
        for i in 0..256 {
            let t = s[i];
            j = j.wrapping_add(key[i % key.len()]).wrapping_add(t);
            s[i] = s[j as usize];
            s[j as usize] = t;
        }
        let mut arc4 = Self { i: 0, j: 0, s };
        for _ in 0..256 {
            arc4.take(1);
        }
        arc4
    }

    /// Next `count` keystream bytes as a big-endian integer (`count <= 8`).
    fn take(&mut self, count: usize) -> u64 {
        let mut r: u64 = 0;
        for _ in 0..count {
            self.i = self.i.wrapping_add(1);
            let t = self.s[self.i as usize];
            self.j = self.j.wrapping_add(t);
            self.s[self.i as usize] = self.s[self.j as usize];
            self.s[self.j as usize] = t;
            let k = self.s[self.i as usize].wrapping_add(t);
            r = (r << 8) | u64::from(self.s[k as usize]);
        }
        r
    }
}
