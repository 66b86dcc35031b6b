use std::thread;
use std::time::Duration;
use batchbridge::BatchPredictor;
use tracing::info;

pub struct UpperConfig {
    /// Simulated cost of one forward pass
    pub latency: Duration,
}

/// Stand-in for a real model: uppercases a batch of strings after a fixed delay.
pub struct Upper {
    latency: Duration,
    batches: usize,
}

impl BatchPredictor for Upper {
    type Config = UpperConfig;
    type Input = String;
    type Output = String;
    type Error = String;

    fn load(config: UpperConfig) -> Result<Self, String> {
        Ok(Self {
            latency: config.latency,
            batches: 0,
        })
    }

    fn predict_batch(&mut self, items: Vec<String>) -> Result<Vec<String>, String> {
        self.batches += 1;
        info!(batch = self.batches, size = items.len(), "forward pass");
        thread::sleep(self.latency);
        Ok(items.iter().map(|item| item.to_uppercase()).collect())
    }
}
