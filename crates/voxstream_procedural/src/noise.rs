//! # Seeded Noise
//!
//! Deterministic noise sources for terrain generation.
//!
//! Every function in this module is a pure function of its `WorldSeed`
//! and inputs. The permutation table is built with a fixed xorshift
//! sequence, so the same seed yields the same table on every platform.

/// The integer a whole world is generated from.
///
/// Persisted by the chunk store on first use, so a world keeps its seed
/// across runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(u64);

impl WorldSeed {
    /// Wraps a raw seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// The raw value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for one purpose (heightmap, detail...).
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    /// Hashes an integer lattice point into 64 well-mixed bits.
    ///
    /// Used for per-block decisions that need no spatial smoothness.
    #[inline]
    #[must_use]
    pub const fn hash3(self, x: i64, y: i64, z: i64) -> u64 {
        // splitmix64 finalizer over the packed coordinate
        let mut h = self.0
            ^ (x as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
            ^ (y as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f)
            ^ (z as u64).wrapping_mul(0x1656_67b1_9e37_79f9);
        h ^= h >> 30;
        h = h.wrapping_mul(0xbf58_476d_1ce4_e5b9);
        h ^= h >> 27;
        h = h.wrapping_mul(0x94d0_49bb_1331_11eb);
        h ^= h >> 31;
        h
    }
}

impl Default for WorldSeed {
    fn default() -> Self {
        Self(0x5EED_0F_C0FFEE)
    }
}

/// Shuffled lattice hash table, built once per seed.
struct PermutationTable {
    /// 256 entries, doubled so `i + perm[j]` never needs a wrap.
    perm: [u8; 512],
}

impl PermutationTable {
    /// Eight unit-ish gradient directions for 2D simplex corners.
    const GRADIENTS: [[i8; 2]; 8] = [
        [1, 0], [1, 1], [0, 1], [-1, 1],
        [-1, 0], [-1, -1], [0, -1], [1, -1],
    ];

    fn new(seed: WorldSeed) -> Self {
        let mut perm = [0u8; 512];
        for (i, slot) in perm.iter_mut().take(256).enumerate() {
            *slot = i as u8;
        }

        // Fisher-Yates with xorshift64; a zero state would never advance
        let mut state = seed.value() | 1;
        for i in (1..256).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }

        let (low, high) = perm.split_at_mut(256);
        high.copy_from_slice(low);

        Self { perm }
    }

    #[inline]
    fn get(&self, index: usize) -> u8 {
        self.perm[index & 511]
    }

    #[inline]
    fn gradient(hash: u8) -> [i8; 2] {
        Self::GRADIENTS[(hash & 7) as usize]
    }
}

/// Seeded 2D simplex noise, smooth and bounded to `[-1, 1]`.
///
/// ```rust
/// use voxstream_procedural::{SimplexNoise, WorldSeed};
///
/// let field = SimplexNoise::new(WorldSeed::new(7));
/// let value = field.sample(100.5, -200.25);
/// assert!((-1.0..=1.0).contains(&value));
/// ```
pub struct SimplexNoise {
    perm_table: PermutationTable,
}

impl SimplexNoise {
    /// Skewing factor for 2D simplex grid: (sqrt(3) - 1) / 2.
    const F2: f64 = 0.366_025_403_784_438_6;
    /// Unskewing factor for 2D simplex grid: (3 - sqrt(3)) / 6.
    const G2: f64 = 0.211_324_865_405_187_1;

    /// Builds the lattice table for `seed`.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            perm_table: PermutationTable::new(seed),
        }
    }

    /// Samples 2D simplex noise, returning a value in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * Self::F2;
        let i = fast_floor(x + skew);
        let j = fast_floor(y + skew);

        let unskew = i.wrapping_add(j) as f64 * Self::G2;
        let x0 = x - (i as f64 - unskew);
        let y0 = y - (j as f64 - unskew);

        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1 as u8) + Self::G2;
        let y1 = y0 - f64::from(j1 as u8) + Self::G2;
        let x2 = x0 - 1.0 + 2.0 * Self::G2;
        let y2 = y0 - 1.0 + 2.0 * Self::G2;

        let ii = (i & 255) as usize;
        let jj = (j & 255) as usize;
        let table = &self.perm_table;

        let gi0 = table.get(ii + table.get(jj) as usize);
        let gi1 = table.get(ii + i1 + table.get(jj + j1) as usize);
        let gi2 = table.get(ii + 1 + table.get(jj + 1) as usize);

        let n = Self::corner(x0, y0, gi0) + Self::corner(x1, y1, gi1) + Self::corner(x2, y2, gi2);

        // 70 normalizes the corner sum to roughly [-1, 1]
        (70.0 * n).clamp(-1.0, 1.0)
    }

    #[inline]
    fn corner(x: f64, y: f64, gradient_index: u8) -> f64 {
        let t = 0.5 - x * x - y * y;
        if t < 0.0 {
            return 0.0;
        }
        let grad = PermutationTable::gradient(gradient_index);
        let t2 = t * t;
        t2 * t2 * (x * f64::from(grad[0]) + y * f64::from(grad[1]))
    }

    /// Fractal sum of `octaves` layers, normalized back to `[-1, 1]`.
    ///
    /// `persistence` scales amplitude per octave, `lacunarity` scales
    /// frequency per octave.
    #[must_use]
    pub fn octaved(&self, x: f64, y: f64, octaves: u32, persistence: f64, lacunarity: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut max_amplitude = 0.0;

        for _ in 0..octaves.max(1) {
            total += self.sample(x * frequency, y * frequency) * amplitude;
            max_amplitude += amplitude;
            amplitude *= persistence;
            frequency *= lacunarity;
        }

        total / max_amplitude
    }
}

/// Floors to a lattice index. Saturates outside the `i64` range.
#[inline]
fn fast_floor(x: f64) -> i64 {
    let xi = x as i64;
    if x < xi as f64 { xi.saturating_sub(1) } else { xi }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_points() -> impl Iterator<Item = (f64, f64)> {
        (0..2_000).map(|n| {
            let n = f64::from(n);
            (n * 0.37 - 400.0, n * -0.21 + 150.0)
        })
    }

    #[test]
    fn test_same_seed_same_field() {
        let a = SimplexNoise::new(WorldSeed::new(12345));
        let b = SimplexNoise::new(WorldSeed::new(12345));
        assert!(probe_points().all(|(x, y)| a.sample(x, y) == b.sample(x, y)));
    }

    #[test]
    fn test_seed_changes_field() {
        let a = SimplexNoise::new(WorldSeed::new(1));
        let b = SimplexNoise::new(WorldSeed::new(2));
        assert!(probe_points().any(|(x, y)| a.sample(x, y) != b.sample(x, y)));
    }

    #[test]
    fn test_output_bounded() {
        let field = SimplexNoise::new(WorldSeed::new(99));
        for (x, y) in probe_points() {
            let single = field.sample(x, y);
            let layered = field.octaved(x, y, 5, 0.5, 2.0);
            assert!((-1.0..=1.0).contains(&single), "{single} at ({x}, {y})");
            assert!((-1.0..=1.0).contains(&layered), "{layered} at ({x}, {y})");
        }
    }

    #[test]
    fn test_small_step_small_change() {
        let field = SimplexNoise::new(WorldSeed::new(5));
        for (x, y) in probe_points().take(200) {
            let delta = (field.sample(x, y) - field.sample(x + 0.001, y)).abs();
            assert!(delta < 0.01, "jump of {delta} at ({x}, {y})");
        }
    }

    #[test]
    fn test_far_samples_stay_bounded() {
        let field = SimplexNoise::new(WorldSeed::new(3));
        for (x, y) in [(1.7e10, -1.7e10), (-3.4e10, 2.7e8), (f64::MAX, f64::MIN)] {
            let value = field.sample(x, y);
            assert!((-1.0..=1.0).contains(&value), "{value} at ({x}, {y})");
        }
    }

    #[test]
    fn test_sub_seeds_are_stable_and_distinct() {
        let root = WorldSeed::new(42);
        assert_eq!(root.derive(1), root.derive(1));
        assert_ne!(root.derive(1), root.derive(2));
        assert_ne!(root.derive(1), root);
    }

    #[test]
    fn test_hash3_sensitive_to_each_axis() {
        let seed = WorldSeed::new(7);
        let origin = seed.hash3(0, 0, 0);
        assert_eq!(origin, seed.hash3(0, 0, 0));
        assert_ne!(origin, seed.hash3(1, 0, 0));
        assert_ne!(origin, seed.hash3(0, 1, 0));
        assert_ne!(origin, seed.hash3(0, 0, 1));
        assert_ne!(seed.hash3(-1, 0, 0), seed.hash3(1, 0, 0));
    }
}
