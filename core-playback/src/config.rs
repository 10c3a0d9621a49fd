//! # Player Configuration
//!
//! Configuration for the playback state machine, interruption handling
//! and streaming-error recovery.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Player configuration.
///
/// Controls the tick quantum, rate clamping, the connectivity-recovery
/// grace period and the retry backoff schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Fixed quantum each playback tick represents.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_tick_quantum")]
    pub tick_quantum: Duration,

    /// Duration substituted when neither the episode nor the backend
    /// reports one (or reports zero).
    ///
    /// Default: 300 seconds.
    #[serde(default = "default_fallback_duration")]
    pub fallback_duration: Duration,

    /// Lower bound of the playback rate clamp.
    ///
    /// Default: 0.8.
    #[serde(default = "default_min_rate")]
    pub min_rate: f32,

    /// Upper bound of the playback rate clamp.
    ///
    /// Default: 5.0.
    #[serde(default = "default_max_rate")]
    pub max_rate: f32,

    /// Delay between connectivity recovery and auto-resume.
    ///
    /// Gives flaky connections a chance to drop again before playback
    /// restarts.
    ///
    /// Default: 3 seconds.
    #[serde(default = "default_grace_period")]
    pub grace_period: Duration,

    /// Backoff delay before the first retry attempt.
    ///
    /// Default: 5 seconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay: Duration,

    /// Multiplier applied to the backoff delay per attempt.
    ///
    /// With the defaults the schedule is 5 s, 15 s, 45 s.
    ///
    /// Default: 3.
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: u32,

    /// Maximum number of retry attempts before giving up.
    ///
    /// Default: 3.
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_quantum: default_tick_quantum(),
            fallback_duration: default_fallback_duration(),
            min_rate: default_min_rate(),
            max_rate: default_max_rate(),
            grace_period: default_grace_period(),
            retry_base_delay: default_retry_base_delay(),
            retry_multiplier: default_retry_multiplier(),
            max_retry_attempts: default_max_retry_attempts(),
        }
    }
}

impl PlayerConfig {
    /// Set the tick quantum.
    pub fn with_tick_quantum(mut self, quantum: Duration) -> Self {
        self.tick_quantum = quantum;
        self
    }

    /// Set the fallback duration.
    pub fn with_fallback_duration(mut self, duration: Duration) -> Self {
        self.fallback_duration = duration;
        self
    }

    /// Set the rate clamp bounds.
    pub fn with_rate_bounds(mut self, min: f32, max: f32) -> Self {
        self.min_rate = min;
        self.max_rate = max;
        self
    }

    /// Set the recovery grace period.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the retry backoff schedule.
    pub fn with_retry_schedule(mut self, base: Duration, multiplier: u32, max_attempts: u32) -> Self {
        self.retry_base_delay = base;
        self.retry_multiplier = multiplier;
        self.max_retry_attempts = max_attempts;
        self
    }

    /// Clamp a requested rate into the configured bounds.
    pub fn clamp_rate(&self, rate: f32) -> f32 {
        rate.clamp(self.min_rate, self.max_rate)
    }

    /// Backoff delay for a given attempt (attempts start at 1).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.retry_base_delay * self.retry_multiplier.saturating_pow(exponent)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_quantum.is_zero() {
            return Err("tick_quantum must be greater than zero".to_string());
        }
        if self.fallback_duration.is_zero() {
            return Err("fallback_duration must be greater than zero".to_string());
        }
        if !(self.min_rate > 0.0) {
            return Err(format!("min_rate must be positive, got {}", self.min_rate));
        }
        if self.max_rate < self.min_rate {
            return Err(format!(
                "max_rate ({}) must be >= min_rate ({})",
                self.max_rate, self.min_rate
            ));
        }
        if self.retry_multiplier == 0 {
            return Err("retry_multiplier must be at least 1".to_string());
        }
        if self.max_retry_attempts == 0 {
            return Err("max_retry_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

fn default_tick_quantum() -> Duration {
    Duration::from_millis(500)
}

fn default_fallback_duration() -> Duration {
    Duration::from_secs(300)
}

fn default_min_rate() -> f32 {
    0.8
}

fn default_max_rate() -> f32 {
    5.0
}

fn default_grace_period() -> Duration {
    Duration::from_secs(3)
}

fn default_retry_base_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_multiplier() -> u32 {
    3
}

fn default_max_retry_attempts() -> u32 {
    3
}
