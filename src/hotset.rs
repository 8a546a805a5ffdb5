// MIT License
//
// Copyright (c) 2020 Gregory Meyer
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation files
// (the "Software"), to deal in the Software without restriction,
// including without limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of the Software,
// and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Two-band skewed key generator.
//!
//! With probability `p_hot` a draw comes uniformly from the hot band
//! `[0, hot)`, otherwise uniformly from the cold band `[hot, universe)`.
//! Deterministic for a given seed. Benchmark threads each own a generator
//! with a distinct seed; sharing one would serialize the workload on the
//! generator's state.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

pub struct Hotset {
    universe: u64,
    hot: u64,
    p_hot: f64,
    rng: SmallRng,
}

impl Hotset {
    /// Creates a generator over `[0, universe)` whose hot band is
    /// `[0, hot)`. A hot band of zero is widened to one key; a hot band
    /// covering the whole universe makes every draw hot.
    ///
    /// # Panics
    ///
    /// Panics if `universe` is zero.
    pub fn new(universe: u64, hot: u64, p_hot: f64, seed: u64) -> Self {
        assert!(universe > 0, "key universe must be non-empty");

        Self {
            universe,
            hot: hot.clamp(1, universe),
            p_hot,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Draws the next key. Always in `[0, universe)`.
    pub fn draw(&mut self) -> u64 {
        if self.hot >= self.universe || self.rng.gen::<f64>() < self.p_hot {
            self.rng.gen_range(0..self.hot)
        } else {
            self.rng.gen_range(self.hot..self.universe)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_band_frequency_tracks_p_hot() {
        let mut hotset = Hotset::new(10_000, 1000, 0.9, 12345);
        let mut in_hot_band = 0usize;

        for _ in 0..100_000 {
            let key = hotset.draw();
            assert!(key < 10_000);

            if key < 1000 {
                in_hot_band += 1;
            }
        }

        assert!(
            (89_000..=91_000).contains(&in_hot_band),
            "{in_hot_band} hot draws out of 100000"
        );
    }

    #[test]
    fn hot_band_frequency_holds_at_a_million_draws() {
        let mut hotset = Hotset::new(10_000, 1000, 0.9, 98765);
        let in_hot_band = (0..1_000_000).filter(|_| hotset.draw() < 1000).count();

        assert!(
            (890_000..=910_000).contains(&in_hot_band),
            "{in_hot_band} hot draws out of 1000000"
        );
    }

    #[test]
    fn draws_are_deterministic_per_seed() {
        let mut first = Hotset::new(10_000, 1000, 0.7, 42);
        let mut second = Hotset::new(10_000, 1000, 0.7, 42);

        for _ in 0..10_000 {
            assert_eq!(first.draw(), second.draw());
        }
    }

    #[test]
    fn degenerate_bands_stay_in_range() {
        let mut all_hot = Hotset::new(10, 10, 0.0, 7);
        let mut tiny_hot = Hotset::new(10, 0, 1.0, 7);

        for _ in 0..1000 {
            assert!(all_hot.draw() < 10);
            assert_eq!(tiny_hot.draw(), 0);
        }
    }
}
