use ::noise::{NoiseFn, Seedable};

// splitmix64 finalizer, used for lattice values and per-chunk rng seeds
pub fn mix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Derive an independent seed for a sub-purpose (biome layer, chunk rng, ...).
pub fn derive_seed(seed: u64, purpose: u64) -> u64 {
    mix64(seed ^ mix64(purpose))
}

/// Hash a chunk coordinate into a seed for that chunk's rng.
pub fn chunk_seed(seed: u64, cx: i32, cy: i32) -> u64 {
    let packed = ((cx as u32 as u64) << 32) | (cy as u32 as u64);
    derive_seed(seed, packed)
}

/// 1D value noise: a pseudo-random value in [0, 1) at every integer lattice
/// point, linearly interpolated in between.
#[derive(Debug, Clone, Copy)]
pub struct ValueNoise {
    seed: u32
}

impl ValueNoise {
    pub fn new(seed: u32) -> ValueNoise {
        ValueNoise { seed }
    }

    fn lattice(&self, i: i64) -> f64 {
        let hash = mix64((self.seed as u64) << 32 ^ i as u64);
        // top 53 bits give an exact f64 in [0, 1)
        (hash >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl NoiseFn<f64> for ValueNoise {
    fn get(&self, x: f64) -> f64 {
        let floor = x.floor();
        let t = x - floor;
        let i = floor as i64;
        let a = self.lattice(i);
        let b = self.lattice(i.wrapping_add(1));
        a + (b - a) * t
    }
}

impl Seedable for ValueNoise {
    fn set_seed(self, seed: u32) -> Self {
        ValueNoise { seed }
    }

    fn seed(&self) -> u32 {
        self.seed
    }
}

/// Fractal sum of value noise octaves, each at double the frequency and half
/// the amplitude of the previous one. Output stays in [0, 1).
#[derive(Debug, Clone, Copy)]
pub struct Fbm {
    source: ValueNoise,
    octaves: u32,
    scale: f64
}

impl Fbm {
    pub fn new(seed: u32, octaves: u32, scale: f64) -> Fbm {
        Fbm { source: ValueNoise::new(seed), octaves: octaves.max(1), scale }
    }
}

impl NoiseFn<f64> for Fbm {
    fn get(&self, x: f64) -> f64 {
        let mut total = 0.0;
        let mut norm = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.scale;
        for octave in 0..self.octaves {
            // shift each octave so their lattices do not line up at the origin
            let offset = octave as f64 * 97.31;
            total += amplitude * self.source.get(x * frequency + offset);
            norm += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        total / norm
    }
}

impl Seedable for Fbm {
    fn set_seed(self, seed: u32) -> Self {
        Fbm { source: self.source.set_seed(seed), ..self }
    }

    fn seed(&self) -> u32 {
        self.source.seed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_noise_hits_lattice_values_and_interpolates() {
        let noise = ValueNoise::new(7);
        let a = noise.get(3.0);
        let b = noise.get(4.0);
        let mid = noise.get(3.5);
        assert!((mid - (a + b) / 2.0).abs() < 1e-12);
        assert!((0.0..1.0).contains(&a));
    }

    #[test]
    fn noise_is_deterministic_per_seed() {
        let a = Fbm::new(42, 4, 1.0 / 48.0);
        let b = Fbm::new(42, 4, 1.0 / 48.0);
        let c = a.set_seed(43);
        let xs = [-1000.5, -3.0, 0.0, 17.25, 123456.0];
        for x in xs.iter() {
            assert_eq!(a.get(*x), b.get(*x));
        }
        assert!(xs.iter().any(|x| a.get(*x) != c.get(*x)));
        assert_eq!(c.seed(), 43);
    }

    #[test]
    fn fbm_stays_in_unit_range() {
        let fbm = Fbm::new(1, 5, 1.0 / 16.0);
        for x in -500..500 {
            let v = fbm.get(x as f64);
            assert!(v >= 0.0 && v < 1.0, "{} out of range at {}", v, x);
        }
    }

    #[test]
    fn chunk_seeds_differ_by_coordinate() {
        assert_ne!(chunk_seed(1, 0, 1), chunk_seed(1, 1, 0));
        assert_ne!(chunk_seed(1, -1, 0), chunk_seed(1, 0, -1));
        assert_eq!(chunk_seed(9, 3, 4), chunk_seed(9, 3, 4));
    }
}
