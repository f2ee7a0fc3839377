//! Random stream seeding.
//!
//! Every device and every stack group draws from its own `StdRng`. The
//! `Seeder` hands out those streams, either reproducibly from a base seed
//! or from the wall clock.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::{SystemTime, UNIX_EPOCH};

/// Hands out independent random streams in construction order.
#[derive(Debug, Clone)]
pub struct Seeder {
    base: Option<u64>,
    next: u64,
}

impl Seeder {
    /// Creates a seeder. `Some(seed)` makes every stream reproducible.
    pub fn new(base: Option<u64>) -> Self {
        Self { base, next: 0 }
    }

    /// Creates a seeder that always produces the same streams for `seed`.
    pub fn fixed(seed: u64) -> Self {
        Self::new(Some(seed))
    }

    /// Returns the seed for the next stream and advances.
    pub fn next_seed(&mut self) -> u64 {
        let k = self.next;
        self.next += 1;
        let base = match self.base {
            Some(seed) => seed,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0),
        };
        splitmix64(base ^ k.wrapping_mul(0x9E37_79B9_7F4A_7C15))
    }

    /// Returns the next independent random stream.
    pub fn next_rng(&mut self) -> StdRng {
        StdRng::seed_from_u64(self.next_seed())
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
