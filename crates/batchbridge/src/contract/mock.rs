use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use super::BatchPredictor;

/// Knobs for [`MockPredictor`]. Every batch the model sees is recorded in `batches`.
#[derive(Clone, Default)]
pub(crate) struct MockConfig {
    pub uppercase: bool,
    pub delay: Duration,
    pub load_delay: Duration,
    pub fail_load: bool,
    pub panic_on_load: bool,
    pub fail_on: Option<String>,
    pub panic_on: Option<String>,
    pub truncate: bool,
    pub batches: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockConfig {
    pub fn echo() -> Self {
        Self::default()
    }

    pub fn uppercase() -> Self {
        Self {
            uppercase: true,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn panicking_load(mut self) -> Self {
        self.panic_on_load = true;
        self
    }

    pub fn failing_on(mut self, item: &str) -> Self {
        self.fail_on = Some(item.to_string());
        self
    }

    pub fn panicking_on(mut self, item: &str) -> Self {
        self.panic_on = Some(item.to_string());
        self
    }

    pub fn truncating(mut self) -> Self {
        self.truncate = true;
        self
    }

    pub fn recorded_batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }
}

pub(crate) struct MockPredictor {
    config: MockConfig,
}

impl BatchPredictor for MockPredictor {
    type Config = MockConfig;
    type Input = String;
    type Output = String;
    type Error = String;

    fn load(config: Self::Config) -> Result<Self, Self::Error> {
        if !config.load_delay.is_zero() {
            thread::sleep(config.load_delay);
        }
        if config.panic_on_load {
            panic!("weights are corrupt");
        }
        if config.fail_load {
            return Err("weights not found".to_string());
        }
        Ok(Self { config })
    }

    fn predict_batch(&mut self, items: Vec<String>) -> Result<Vec<String>, String> {
        self.config.batches.lock().unwrap().push(items.clone());

        if !self.config.delay.is_zero() {
            thread::sleep(self.config.delay);
        }
        if let Some(poison) = &self.config.panic_on {
            if items.contains(poison) {
                panic!("poisoned input {poison}");
            }
        }
        if let Some(bad) = &self.config.fail_on {
            if items.contains(bad) {
                return Err(format!("cannot predict {bad}"));
            }
        }

        let mut outputs: Vec<String> = items
            .into_iter()
            .map(|item| if self.config.uppercase { item.to_uppercase() } else { item })
            .collect();
        if self.config.truncate {
            outputs.pop();
        }
        Ok(outputs)
    }
}
