//! Timing and threshold configuration for the automation pipeline.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use ovex_core::AutomationConfig;
//!
//! let config = AutomationConfig::builder()
//!     .webhook_timeout(Duration::from_secs(10))
//!     .max_failures(5)
//!     .build();
//! assert_eq!(config.breaker.max_failures, 5);
//! ```

use std::time::Duration;

/// Container detection timings.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Quiet period after a DOM mutation before checking (default: 100ms).
    pub mutation_debounce: Duration,
    /// Quiet period after a scroll before checking (default: 300ms).
    pub scroll_debounce: Duration,
    /// Delay before the first periodic check (default: 1s).
    pub poll_initial_delay: Duration,
    /// Interval of the periodic check (default: 2s).
    pub poll_interval: Duration,
    /// Delay before detection restarts after a failed hand-off (default: 2s).
    pub retry_delay: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mutation_debounce: Duration::from_millis(100),
            scroll_debounce: Duration::from_millis(300),
            poll_initial_delay: Duration::from_secs(1),
            poll_interval: Duration::from_secs(2),
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Overview expansion timings.
#[derive(Debug, Clone)]
pub struct OverviewConfig {
    /// Wait after clicking before the first confirmation check (default: 800ms).
    pub initial_delay: Duration,
    /// Interval between confirmation checks (default: 200ms).
    pub poll_interval: Duration,
    /// Confirmation checks before giving up (default: 25).
    pub max_polls: u32,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self { initial_delay: Duration::from_millis(800), poll_interval: Duration::from_millis(200), max_polls: 25 }
    }
}

/// Sources expansion timings.
#[derive(Debug, Clone)]
pub struct SourcesConfig {
    /// Upper bound on waiting for the overview stage (default: 30s).
    pub readiness_timeout: Duration,
    /// Wait after readiness before looking at the page (default: 500ms).
    pub settle_delay: Duration,
    /// Attempts to locate and activate the control (default: 10).
    pub max_attempts: u32,
    /// Pause between attempts (default: 500ms).
    pub attempt_interval: Duration,
    /// Pause after a dispatched activation (default: 200ms).
    pub click_settle: Duration,
    /// Wait before re-verifying a click took effect (default: 1s).
    pub verify_delay: Duration,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(500),
            max_attempts: 10,
            attempt_interval: Duration::from_millis(500),
            click_settle: Duration::from_millis(200),
            verify_delay: Duration::from_secs(1),
        }
    }
}

/// Webhook delivery timings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Timeout of one POST (default: 5s).
    pub timeout: Duration,
    /// Upper bound on waiting for the sources stage (default: 30s).
    pub readiness_timeout: Duration,
    /// Wait after readiness before extracting (default: 1s).
    pub settle_delay: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker (default: 3).
    pub max_failures: u32,
    /// Cooldown before an open breaker admits a trial (default: 60s).
    pub reset_timeout: Duration,
    /// Pause between retries (default: 2s).
    pub retry_delay: Duration,
    /// Half-open successes needed to close (default: 1).
    pub half_open_success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            reset_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(2),
            half_open_success_threshold: 1,
        }
    }
}

/// Configuration of the whole pipeline.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    pub detection: DetectionConfig,
    pub overview: OverviewConfig,
    pub sources: SourcesConfig,
    pub webhook: WebhookConfig,
    pub breaker: BreakerConfig,
    /// Retries per automation step on top of the first attempt (default: 1).
    pub step_retries: u32,
    /// Upper bound on one automation step, retries included (default: 60s).
    pub stage_timeout: Duration,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            overview: OverviewConfig::default(),
            sources: SourcesConfig::default(),
            webhook: WebhookConfig::default(),
            breaker: BreakerConfig::default(),
            step_retries: 1,
            stage_timeout: Duration::from_secs(60),
        }
    }
}

impl AutomationConfig {
    pub fn builder() -> AutomationConfigBuilder {
        AutomationConfigBuilder::new()
    }
}

/// Builder for AutomationConfig.
pub struct AutomationConfigBuilder {
    config: AutomationConfig,
}

impl AutomationConfigBuilder {
    pub fn new() -> Self {
        Self { config: AutomationConfig::default() }
    }

    pub fn detection(mut self, value: DetectionConfig) -> Self {
        self.config.detection = value;
        self
    }

    pub fn overview(mut self, value: OverviewConfig) -> Self {
        self.config.overview = value;
        self
    }

    pub fn sources(mut self, value: SourcesConfig) -> Self {
        self.config.sources = value;
        self
    }

    pub fn webhook(mut self, value: WebhookConfig) -> Self {
        self.config.webhook = value;
        self
    }

    pub fn breaker(mut self, value: BreakerConfig) -> Self {
        self.config.breaker = value;
        self
    }

    /// Sets the timeout of one webhook POST.
    pub fn webhook_timeout(mut self, value: Duration) -> Self {
        self.config.webhook.timeout = value;
        self
    }

    /// Sets how long a stage waits for its predecessor's readiness signal.
    pub fn readiness_timeout(mut self, value: Duration) -> Self {
        self.config.sources.readiness_timeout = value;
        self.config.webhook.readiness_timeout = value;
        self
    }

    pub fn max_failures(mut self, value: u32) -> Self {
        self.config.breaker.max_failures = value;
        self
    }

    pub fn step_retries(mut self, value: u32) -> Self {
        self.config.step_retries = value;
        self
    }

    pub fn stage_timeout(mut self, value: Duration) -> Self {
        self.config.stage_timeout = value;
        self
    }

    pub fn build(self) -> AutomationConfig {
        self.config
    }
}

impl Default for AutomationConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AutomationConfig::default();
        assert_eq!(config.detection.mutation_debounce, Duration::from_millis(100));
        assert_eq!(config.detection.scroll_debounce, Duration::from_millis(300));
        assert_eq!(config.detection.poll_interval, Duration::from_secs(2));
        assert_eq!(config.webhook.timeout, Duration::from_millis(5000));
        assert_eq!(config.breaker.max_failures, 3);
        assert_eq!(config.sources.max_attempts, 10);
    }

    #[test]
    fn test_builder_readiness_timeout_sets_both_stages() {
        let config = AutomationConfig::builder().readiness_timeout(Duration::from_secs(3)).build();
        assert_eq!(config.sources.readiness_timeout, Duration::from_secs(3));
        assert_eq!(config.webhook.readiness_timeout, Duration::from_secs(3));
    }
}
