use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rng::SamplerRng;

/// Bounds of the random pause taken after each successful attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PacingConfig {
    pub min_seconds: f64,
    pub max_seconds: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_seconds: 2.0,
            max_seconds: 10.0,
        }
    }
}

pub struct Pacer {
    config: PacingConfig,
    rng: SamplerRng,
}

impl Pacer {
    pub fn new(config: PacingConfig, rng: SamplerRng) -> Self {
        Self { config, rng }
    }

    pub fn next_delay(&mut self) -> Duration {
        let lo = self.config.min_seconds.max(0.0);
        let hi = self.config.max_seconds.max(lo);
        let secs = if hi > lo { self.rng.gen_range(lo..=hi) } else { lo };
        Duration::from_secs_f64(secs)
    }

    pub async fn pause(&mut self) {
        let delay = self.next_delay();
        debug!(?delay, "Pacing");
        tokio::time::sleep(delay).await;
    }
}
