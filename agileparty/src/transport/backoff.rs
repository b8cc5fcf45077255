//! Exponential reconnect backoff with bounded jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Source of the random jitter added to each delay.
///
/// Returns a value in `[0, 1)`; the backoff scales it by the configured
/// maximum jitter.
pub trait Jitter: Send {
    /// Next sample in `[0, 1)`.
    fn sample(&mut self) -> f64;
}

/// Uniform jitter from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn sample(&mut self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Constant jitter, for deterministic schedules.
#[derive(Debug, Clone, Copy)]
pub struct FixedJitter(pub f64);

impl Jitter for FixedJitter {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// Delay before retry number `attempt` (1-based) without jitter:
/// `min(base * 2^(attempt-1), max_delay)`.
#[must_use]
pub fn base_delay(config: &ReconnectConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    config
        .base_delay
        .saturating_mul(1u32 << exponent)
        .min(config.max_delay)
}

/// Delay before retry number `attempt` (1-based):
/// `min(base * 2^(attempt-1) + jitter, max_delay)`.
#[must_use]
pub fn delay_for(config: &ReconnectConfig, attempt: u32, jitter: &mut dyn Jitter) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    let raw = config.base_delay.saturating_mul(1u32 << exponent);
    let extra = config.max_jitter.mul_f64(jitter.sample().clamp(0.0, 1.0));
    raw.saturating_add(extra).min(config.max_delay)
}
