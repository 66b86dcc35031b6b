use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tracing::{error, info, warn};
use crate::bridge::{collect_loop, dispatch_loop, LoopHandle};
use crate::communication::{PendingReply, Slot, Submission};
use crate::contract::BatchPredictor;
use crate::registry::{sweep_loop, Registry};
use crate::transport::{InProcess, Transport};
use crate::worker::{spawn_worker, WorkerHandle, WorkerSettings};
use super::{AsyncPredictor, EngineConfig, EngineError, EngineState, ReadinessPolicy};

/// # Engine
///
/// Turns a [`BatchPredictor`] into a per-item async API.
///
/// Callers submit single items; the engine registers each under a fresh
/// correlation id, pushes it to a worker thread that batches whatever is
/// queued, and routes every reply back to the caller that asked for it.
///
/// ## Type Parameters
///
/// * `P` - The model behind the worker
/// * `T` - How items and replies cross to the worker, [`InProcess`] by default
///
/// ## Lifecycle
///
/// `Created → Starting → Running → Stopping → Stopped`. Only a running engine
/// accepts items. [`start`](Engine::start) and [`stop`](Engine::stop) are
/// idempotent, and a stopped engine cannot be started again.
///
/// Dropping the engine shuts its loops down and asks the worker to exit.
pub struct Engine<P, T = InProcess>
where
    P: BatchPredictor,
    T: Transport<P::Input, P::Output>,
{
    config: EngineConfig,
    registry: Arc<Registry<Slot<P::Output>>>,
    worker_alive: Arc<AtomicBool>,
    state: watch::Sender<EngineState>,
    /// Serializes lifecycle transitions and owns everything they create
    inner: Mutex<Inner<P>>,
    _transport: PhantomData<fn() -> T>,
}

struct Inner<P: BatchPredictor> {
    model_config: Option<P::Config>,
    submissions: Option<mpsc::Sender<Submission<P::Input, P::Output>>>,
    loops: Option<LoopHandle>,
    worker: Option<WorkerHandle>,
}

impl<P: BatchPredictor> Engine<P, InProcess> {
    /// An in-process engine with default tuning.
    pub fn new(model_config: P::Config) -> Self {
        Self::with_config(EngineConfig::default(), model_config)
    }

    /// An in-process engine with the given tuning.
    pub fn with_config(config: EngineConfig, model_config: P::Config) -> Self {
        Self::with_transport(config, model_config)
    }
}

impl<P, T> Engine<P, T>
where
    P: BatchPredictor,
    T: Transport<P::Input, P::Output>,
{
    /// An engine over an explicit transport.
    ///
    /// ```ignore
    /// let engine = Engine::<MyModel, Json>::with_transport(EngineConfig::default(), weights);
    /// ```
    pub fn with_transport(config: EngineConfig, model_config: P::Config) -> Self {
        let registry = Arc::new(Registry::new(config.registry_capacity, config.registry_ttl));
        let (state, _) = watch::channel(EngineState::Created);
        Self {
            config,
            registry,
            worker_alive: Arc::new(AtomicBool::new(false)),
            state,
            inner: Mutex::new(Inner {
                model_config: Some(model_config),
                submissions: None,
                loops: None,
                worker: None,
            }),
            _transport: PhantomData,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// A receiver that observes every lifecycle transition.
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Number of requests registered and still waiting for a reply.
    pub async fn pending(&self) -> usize {
        self.registry.len().await
    }

    /// Whether the worker thread is currently up. `false` before it has loaded
    /// the model and after it exits, whether cleanly or by panic.
    pub fn worker_alive(&self) -> bool {
        self.worker_alive.load(Ordering::SeqCst)
    }

    /// Spawns the worker, waits for it to load the model and starts the
    /// front-end loops.
    ///
    /// Returns once the worker reports ready. With [`ReadinessPolicy::Strict`]
    /// a load failure or a readiness timeout fails the call and leaves the
    /// engine stopped; with [`ReadinessPolicy::Degraded`] the engine runs anyway.
    ///
    /// Calling `start` on a starting or running engine does nothing.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().await;
        match self.state() {
            EngineState::Created => {}
            EngineState::Starting | EngineState::Running => return Ok(()),
            EngineState::Stopping | EngineState::Stopped => return Err(EngineError::Stopped),
        }
        let Some(model_config) = inner.model_config.take() else {
            return Err(EngineError::Stopped);
        };
        self.state.send_replace(EngineState::Starting);

        let capacity = self.config.capacity();
        info!(batch_size = self.config.batch_size, capacity, "starting engine");

        let (frontend, worker_link) = T::open(capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let settings = WorkerSettings {
            batch_size: self.config.batch_size,
            idle_wait: self.config.idle_wait,
        };
        let worker = match spawn_worker::<P, _>(
            worker_link,
            settings,
            model_config,
            ready_tx,
            self.worker_alive.clone(),
        ) {
            Ok(worker) => worker,
            Err(err) => {
                error!(error = %err, "failed to spawn worker");
                self.state.send_replace(EngineState::Stopped);
                return Err(err.into());
            }
        };

        let startup_timeout = self.config.startup_timeout;
        let readiness = match tokio::time::timeout(startup_timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(EngineError::ModelLoad(reason)),
            Ok(Err(_)) => Err(EngineError::ModelLoad(
                "worker exited before reporting readiness".to_string(),
            )),
            Err(_) => Err(EngineError::NotReady(startup_timeout)),
        };
        if let Err(err) = readiness {
            match self.config.readiness {
                ReadinessPolicy::Strict => {
                    error!(error = %err, "worker failed to start");
                    worker.request_shutdown();
                    self.state.send_replace(EngineState::Stopped);
                    return Err(err);
                }
                ReadinessPolicy::Degraded => {
                    warn!(error = %err, "worker is not ready; running degraded");
                }
            }
        }

        let frontend = Arc::new(frontend);
        let (submit_tx, submit_rx) = mpsc::channel(capacity);
        let mut loops = LoopHandle::new();
        loops.spawn({
            let link = frontend.clone();
            let registry = self.registry.clone();
            let backoff = self.config.backoff_interval;
            move |running, notifier| {
                dispatch_loop(link, registry, submit_rx, backoff, running, notifier)
            }
        });
        loops.spawn({
            let registry = self.registry.clone();
            let poll_interval = self.config.poll_interval;
            move |running, notifier| {
                collect_loop::<P::Input, P::Output, _>(
                    frontend,
                    registry,
                    poll_interval,
                    running,
                    notifier,
                )
            }
        });
        loops.spawn({
            let registry = self.registry.clone();
            let interval = self.config.sweep_interval;
            move |running, notifier| sweep_loop(registry, interval, running, notifier)
        });

        inner.submissions = Some(submit_tx);
        inner.loops = Some(loops);
        inner.worker = Some(worker);
        self.state.send_replace(EngineState::Running);
        info!("engine running");
        Ok(())
    }

    /// Halts the front-end loops and asks the worker to exit.
    ///
    /// The worker thread is not joined; it leaves once it sees the request or
    /// notices the link is gone. Requests still in flight fail with
    /// [`EngineError::Abandoned`].
    ///
    /// Calling `stop` on an engine that is not running does nothing.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if self.state() != EngineState::Running {
            return;
        }
        self.state.send_replace(EngineState::Stopping);
        info!("stopping engine");

        inner.submissions = None;
        if let Some(mut loops) = inner.loops.take() {
            loops.shutdown();
        }
        if let Some(worker) = inner.worker.take() {
            worker.request_shutdown();
        }
        let abandoned = self.registry.clear().await;
        if abandoned > 0 {
            warn!(abandoned, "in-flight requests abandoned by shutdown");
        }

        self.state.send_replace(EngineState::Stopped);
        info!("engine stopped");
    }

    /// Submits one item and returns the future of its reply, without a deadline.
    ///
    /// Waits while the submission queue is full. Fails with
    /// [`EngineError::NotRunning`] unless the engine is running.
    pub async fn submit(&self, item: P::Input) -> Result<PendingReply<P::Output>, EngineError> {
        if self.state() != EngineState::Running {
            return Err(EngineError::NotRunning);
        }
        let sender = self
            .inner
            .lock()
            .await
            .submissions
            .clone()
            .ok_or(EngineError::NotRunning)?;

        let (tx, rx) = oneshot::channel();
        sender
            .send(Submission::new(item, tx))
            .await
            .map_err(|_| EngineError::NotRunning)?;
        Ok(PendingReply::new(rx))
    }
}

#[async_trait]
impl<P, T> AsyncPredictor<P::Input, P::Output> for Engine<P, T>
where
    P: BatchPredictor,
    T: Transport<P::Input, P::Output> + 'static,
{
    async fn predict(&self, item: P::Input) -> Result<P::Output, EngineError> {
        self.predict_with_timeout(item, self.config.default_timeout).await
    }

    async fn predict_with_timeout(
        &self,
        item: P::Input,
        timeout: Duration,
    ) -> Result<P::Output, EngineError> {
        let reply = async { self.submit(item).await?.await };
        match tokio::time::timeout(timeout, reply).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use futures::future::join_all;
    use crate::contract::mock::{MockConfig, MockPredictor};

    const GENEROUS: Duration = Duration::from_secs(10);

    fn config() -> EngineConfig {
        EngineConfig::default()
            .with_batch_size(4)
            .with_idle_wait(Duration::from_millis(20))
    }

    async fn running(config: EngineConfig, model: MockConfig) -> Engine<MockPredictor> {
        let engine = Engine::with_config(config, model);
        engine.start().await.unwrap();
        engine
    }

    async fn wait_for_worker_exit(engine: &Engine<MockPredictor>) {
        let deadline = Instant::now() + GENEROUS;
        while engine.worker_alive() {
            assert!(Instant::now() < deadline, "Worker thread never exited");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_five_uppercase_items_with_batch_of_four() {
        let model = MockConfig::uppercase();
        let engine = running(config(), model.clone()).await;

        let results = join_all(
            ["a", "b", "c", "d", "e"]
                .into_iter()
                .map(|item| engine.predict_with_timeout(item.to_string(), GENEROUS)),
        )
        .await;

        let results: Vec<String> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(results, vec!["A", "B", "C", "D", "E"]);

        let batches = model.recorded_batches();
        assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), 5);
        assert!(batches.iter().all(|batch| batch.len() <= 4), "Batches never exceed batch_size");
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_callers_get_their_own_results() {
        let engine = running(config().with_channel_capacity(2), MockConfig::echo()).await;

        let items: Vec<String> = (0..200).map(|i| format!("item-{i}")).collect();
        let results = join_all(
            items
                .iter()
                .map(|item| engine.predict_with_timeout(item.clone(), GENEROUS)),
        )
        .await;

        for (item, result) in items.iter().zip(results) {
            assert_eq!(&result.unwrap(), item);
        }
        assert_eq!(engine.pending().await, 0);
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_order_within_a_batch_is_preserved() {
        let engine = running(config(), MockConfig::echo()).await;

        let results = join_all(
            ["a", "b", "c"]
                .into_iter()
                .map(|item| engine.predict_with_timeout(item.to_string(), GENEROUS)),
        )
        .await;

        let results: Vec<String> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(results, vec!["a", "b", "c"]);
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_does_not_outlast_deadline() {
        let engine = running(
            config(),
            MockConfig::echo().with_delay(Duration::from_millis(300)),
        )
        .await;

        let started = Instant::now();
        let result = engine
            .predict_with_timeout("slow".to_string(), Duration::from_millis(50))
            .await;

        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_millis(250));

        // the late reply is collected and dropped, freeing its registration
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(engine.pending().await, 0);
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_batch_reports_to_every_caller_and_worker_continues() {
        let model = MockConfig::echo()
            .failing_on("bad")
            .with_delay(Duration::from_millis(100));
        let engine = running(config().with_batch_size(8), model.clone()).await;

        // occupy the worker so the next five queue up and land in one batch
        let warmup = engine.submit("warmup".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let results = join_all(
            ["a", "b", "bad", "d", "e"]
                .into_iter()
                .map(|item| engine.predict_with_timeout(item.to_string(), GENEROUS)),
        )
        .await;
        assert_eq!(warmup.await.unwrap(), "warmup");
        assert_eq!(model.recorded_batches()[1].len(), 5);

        for result in results {
            match result {
                Err(EngineError::Inference(message)) => assert_eq!(message, "cannot predict bad"),
                other => panic!("expected an inference error, got {other:?}"),
            }
        }

        let after = engine.predict_with_timeout("fine".to_string(), GENEROUS).await;
        assert_eq!(after.unwrap(), "fine");
        assert!(engine.worker_alive());
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_batch_is_an_inference_error() {
        let engine = running(config(), MockConfig::echo().panicking_on("boom")).await;

        match engine.predict_with_timeout("boom".to_string(), GENEROUS).await {
            Err(EngineError::Inference(message)) => assert!(message.contains("panicked")),
            other => panic!("expected an inference error, got {other:?}"),
        }

        let after = engine.predict_with_timeout("calm".to_string(), GENEROUS).await;
        assert_eq!(after.unwrap(), "calm");
        assert!(engine.worker_alive());
        engine.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_lifecycle_is_idempotent() {
        let engine: Engine<MockPredictor> = Engine::with_config(config(), MockConfig::echo());
        assert_eq!(engine.state(), EngineState::Created);

        engine.stop().await;
        assert_eq!(engine.state(), EngineState::Created, "Stopping an unstarted engine is a no-op");

        engine.start().await.unwrap();
        engine.start().await.unwrap();
        assert_eq!(engine.state(), EngineState::Running);
        assert!(engine.worker_alive());

        engine.stop().await;
        engine.stop().await;
        assert_eq!(engine.state(), EngineState::Stopped);

        assert!(matches!(engine.start().await, Err(EngineError::Stopped)));
        wait_for_worker_exit(&engine).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribers_observe_transitions() {
        let engine: Engine<MockPredictor> = Engine::with_config(config(), MockConfig::echo());
        let mut states = engine.subscribe();

        engine.start().await.unwrap();
        states.changed().await.unwrap();
        assert_eq!(*states.borrow_and_update(), EngineState::Running);

        engine.stop().await;
        states.changed().await.unwrap();
        assert_eq!(*states.borrow_and_update(), EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_predict_requires_running_engine() {
        let engine: Engine<MockPredictor> = Engine::new(MockConfig::echo());

        let result = engine.predict("early".to_string()).await;
        assert!(matches!(result, Err(EngineError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_predict_after_stop_is_rejected() {
        let engine = running(config(), MockConfig::echo()).await;
        engine.stop().await;

        let result = engine.predict("late".to_string()).await;
        assert!(matches!(result, Err(EngineError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_abandons_in_flight_requests() {
        let engine = running(
            config(),
            MockConfig::echo().with_delay(Duration::from_millis(300)),
        )
        .await;

        let pending = engine.submit("in-flight".to_string()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.stop().await;

        assert!(matches!(pending.await, Err(EngineError::Abandoned)));
        assert_eq!(engine.pending().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_submissions_racing_stop_all_resolve() {
        for _ in 0..20 {
            let engine = Arc::new(
                running(config(), MockConfig::echo().with_delay(Duration::from_millis(5))).await,
            );

            let submitters = (0..16)
                .map(|i| {
                    let engine = engine.clone();
                    tokio::spawn(async move { engine.submit(format!("item-{i}")).await })
                })
                .collect::<Vec<_>>();
            engine.stop().await;

            for submitted in join_all(submitters).await {
                // rejected outright, or accepted and then answered or abandoned
                if let Ok(pending) = submitted.unwrap() {
                    let resolved = tokio::time::timeout(GENEROUS, pending).await;
                    assert!(resolved.is_ok(), "A submission accepted around stop never resolved");
                }
            }
            assert_eq!(engine.pending().await, 0);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_exits_after_stop() {
        let engine = running(config(), MockConfig::echo()).await;
        assert!(engine.worker_alive());

        engine.stop().await;
        wait_for_worker_exit(&engine).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_strict_start_fails_on_load_error() {
        let engine: Engine<MockPredictor> =
            Engine::with_config(config(), MockConfig::echo().failing_load());

        match engine.start().await {
            Err(EngineError::ModelLoad(reason)) => assert_eq!(reason, "weights not found"),
            other => panic!("expected a load failure, got {other:?}"),
        }
        assert_eq!(engine.state(), EngineState::Stopped);
        assert!(matches!(engine.predict("x".to_string()).await, Err(EngineError::NotRunning)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_strict_start_fails_on_load_panic() {
        let engine: Engine<MockPredictor> =
            Engine::with_config(config(), MockConfig::echo().panicking_load());

        match engine.start().await {
            Err(EngineError::ModelLoad(reason)) => assert!(reason.contains("weights are corrupt")),
            other => panic!("expected a load failure, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_strict_start_times_out_on_slow_load() {
        let startup = Duration::from_millis(50);
        let engine: Engine<MockPredictor> = Engine::with_config(
            config().with_startup_timeout(startup),
            MockConfig::echo().with_load_delay(Duration::from_millis(300)),
        );

        match engine.start().await {
            Err(EngineError::NotReady(waited)) => assert_eq!(waited, startup),
            other => panic!("expected a readiness timeout, got {other:?}"),
        }
        assert_eq!(engine.state(), EngineState::Stopped);
        // the worker finishes loading, sees the shutdown request and leaves
        wait_for_worker_exit(&engine).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_degraded_start_runs_without_a_worker() {
        let engine = running(
            config().with_readiness(ReadinessPolicy::Degraded),
            MockConfig::echo().failing_load(),
        )
        .await;
        assert_eq!(engine.state(), EngineState::Running);
        wait_for_worker_exit(&engine).await;

        let result = engine.predict_with_timeout("orphan".to_string(), GENEROUS).await;
        assert!(matches!(result, Err(EngineError::Abandoned)));
        engine.stop().await;
    }

    #[cfg(feature = "json")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_json_transport_end_to_end() {
        let engine = Engine::<MockPredictor, crate::transport::Json>::with_transport(
            config(),
            MockConfig::uppercase(),
        );
        engine.start().await.unwrap();

        let results = join_all(
            ["json", "frames"]
                .into_iter()
                .map(|item| engine.predict_with_timeout(item.to_string(), GENEROUS)),
        )
        .await;

        let results: Vec<String> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(results, vec!["JSON", "FRAMES"]);
        engine.stop().await;
    }
}
