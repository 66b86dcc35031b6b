use std::time::Duration;
use crate::registry::{DEFAULT_CAPACITY, DEFAULT_TTL};

/// What [`Engine::start`](super::Engine::start) does when the worker does not
/// come up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessPolicy {
    /// A load failure or readiness timeout fails `start`
    #[default]
    Strict,

    /// Log a warning and start anyway; requests then fail once the worker is gone
    Degraded,
}

/// Tuning knobs of an [`Engine`](super::Engine).
///
/// The model's own configuration is not part of this; it is the predictor's
/// [`Config`](crate::contract::BatchPredictor::Config) and is handed to the
/// engine separately.
///
/// ```rust
/// use std::time::Duration;
/// use batchbridge::EngineConfig;
///
/// let config = EngineConfig::default()
///     .with_batch_size(4)
///     .with_default_timeout(Duration::from_secs(1));
/// assert_eq!(config.capacity(), 8);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on items per batch
    pub batch_size: usize,

    /// Bound of the submission queue and of both link queues. `None` means twice the batch size
    pub channel_capacity: Option<usize>,

    /// How long `start` waits for the model to load
    pub startup_timeout: Duration,

    /// Deadline applied by `predict`
    pub default_timeout: Duration,

    /// How long the worker blocks for a first item before re-checking shutdown
    pub idle_wait: Duration,

    /// Pause between send attempts while the outbound queue is full
    pub backoff_interval: Duration,

    /// Pause between collector passes that found no replies
    pub poll_interval: Duration,

    /// Maximum number of in-flight requests tracked at once
    pub registry_capacity: usize,

    /// How long an unanswered request stays registered
    pub registry_ttl: Duration,

    /// How often expired registrations are swept
    pub sweep_interval: Duration,

    pub readiness: ReadinessPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            channel_capacity: None,
            startup_timeout: Duration::from_secs(30),
            default_timeout: Duration::from_secs(2),
            idle_wait: Duration::from_secs(1),
            backoff_interval: Duration::from_micros(500),
            poll_interval: Duration::from_micros(500),
            registry_capacity: DEFAULT_CAPACITY,
            registry_ttl: DEFAULT_TTL,
            sweep_interval: Duration::from_secs(1),
            readiness: ReadinessPolicy::Strict,
        }
    }
}

impl EngineConfig {
    /// Effective queue bound, never below one.
    pub fn capacity(&self) -> usize {
        self.channel_capacity
            .unwrap_or(self.batch_size.saturating_mul(2))
            .max(1)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    pub fn with_backoff_interval(mut self, interval: Duration) -> Self {
        self.backoff_interval = interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_registry_capacity(mut self, capacity: usize) -> Self {
        self.registry_capacity = capacity;
        self
    }

    pub fn with_registry_ttl(mut self, ttl: Duration) -> Self {
        self.registry_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }
}
