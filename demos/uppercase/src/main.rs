mod model;

use std::sync::Arc;
use std::time::Duration;
use batchbridge::{AsyncPredictor, Engine, EngineConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use crate::model::{Upper, UpperConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let engine = Arc::new(Engine::<Upper>::with_config(
        EngineConfig::default().with_batch_size(4),
        UpperConfig {
            latency: Duration::from_millis(25),
        },
    ));
    if let Err(err) = engine.start().await {
        error!(error = %err, "engine failed to start");
        return;
    }

    let handles = ["a", "b", "c", "d", "e"]
        .into_iter()
        .map(|item| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let result = engine.predict(item.to_string()).await;
                (item, result)
            })
        })
        .collect::<Vec<_>>();

    for handle in futures::future::join_all(handles).await {
        match handle {
            Ok((item, Ok(output))) => info!(item, output = %output, "prediction"),
            Ok((item, Err(err))) => error!(item, error = %err, "prediction failed"),
            Err(err) => error!(error = %err, "task failed"),
        }
    }

    engine.stop().await;
}
