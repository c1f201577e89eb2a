//! Injected randomness.
//!
//! Every random draw the engine makes (price discovery, asking-price markup,
//! population generation) goes through a [`RandomSource`], so tests can
//! script the exact sequence of draws instead of relying on a global RNG.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MarketError, Result};

/// A stream of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// Production source backed by `rand`'s standard generator.
#[derive(Debug, Clone)]
pub struct StdRandom {
    rng: StdRng,
}

impl StdRandom {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
}

impl RandomSource for StdRandom {
    fn next_unit(&mut self) -> f64 {
        self.rng.random()
    }
}

/// Replays a fixed list of unit draws, cycling when exhausted.
///
/// An empty script always yields `0.0`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    draws: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().map(|d| d.clamp(0.0, 1.0 - f64::EPSILON)).collect(),
        }
    }

    /// A source that always draws the same fraction.
    pub fn constant(unit: f64) -> Self {
        Self::new([unit])
    }
}

impl RandomSource for ScriptedRandom {
    fn next_unit(&mut self) -> f64 {
        match self.draws.pop_front() {
            Some(d) => {
                self.draws.push_back(d);
                d
            }
            None => 0.0,
        }
    }
}

/// Uniform real in `[0, upper_bound)`.
pub fn uniform_real(source: &mut dyn RandomSource, upper_bound: f64) -> Result<f64> {
    if upper_bound < 0.0 {
        return Err(MarketError::NegativeBound(upper_bound));
    }
    Ok(source.next_unit() * upper_bound)
}

/// Uniform integer in `[0, upper_bound)`; a bound of zero always yields zero.
pub fn uniform_int(source: &mut dyn RandomSource, upper_bound: i64) -> Result<i64> {
    if upper_bound < 0 {
        return Err(MarketError::NegativeBound(upper_bound as f64));
    }
    Ok((source.next_unit() * upper_bound as f64) as i64)
}

/// Uniform value within `give_or_take` (a fraction) either side of `value`.
pub fn random_bracket(source: &mut dyn RandomSource, value: f64, give_or_take: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&give_or_take) {
        return Err(MarketError::InvalidPercentage(give_or_take));
    }
    let min = value - value * give_or_take;
    let max = value + value * give_or_take;
    Ok(min + (max - min) * source.next_unit())
}

/// Uniform index into a collection of `len` elements, `None` when empty.
pub(crate) fn pick_index(source: &mut dyn RandomSource, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let index = (source.next_unit() * len as f64) as usize;
    Some(index.min(len - 1))
}
