//! Delays between record fetches

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

/// Delay to take before the next record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Random jitter within the configured window
    Short(Duration),
    /// Long cool-down after every `long_pause_every` commits
    Long(Duration),
}

impl Pause {
    pub fn duration(&self) -> Duration {
        match self {
            Pause::Short(d) | Pause::Long(d) => *d,
        }
    }

    pub async fn sleep(self) {
        match self {
            Pause::Long(d) => info!("Pausing {:?} after a batch of commits", d),
            Pause::Short(d) => debug!("Sleeping {:?}", d),
        }
        if !self.duration().is_zero() {
            tokio::time::sleep(self.duration()).await;
        }
    }
}

/// Pacing state for one ingest run
#[derive(Debug, Clone)]
pub struct Pacer {
    config: PacingConfig,
    committed: u64,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self {
            config,
            committed: 0,
        }
    }

    /// Records committed so far in this run
    pub fn committed(&self) -> u64 {
        self.committed
    }

    /// Count a committed record and return the pause to take before the next one
    pub fn record_committed(&mut self) -> Pause {
        self.committed += 1;
        let every = u64::from(self.config.long_pause_every.max(1));
        if self.committed % every == 0 {
            Pause::Long(Duration::from_millis(self.config.long_pause_ms))
        } else {
            self.jitter()
        }
    }

    /// Pause after a skipped or failed record
    pub fn record_skipped(&self) -> Pause {
        self.jitter()
    }

    fn jitter(&self) -> Pause {
        let (min, max) = (self.config.jitter_min_ms, self.config.jitter_max_ms);
        let ms = if min >= max {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Pause::Short(Duration::from_millis(ms))
    }
}
