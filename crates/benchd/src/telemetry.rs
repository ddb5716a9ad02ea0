//! Periodic telemetry generator.
//!
//! Every tick the generator snapshots the pump control state, draws a
//! [`TelemetrySample`] for it and broadcasts the sample to all subscribers.
//! A failing or panicking tick is logged and the loop carries on.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Panics raised inside a tick are caught and logged

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use bench_core::TelemetrySample;
use bench_protocol::ServerMessage;

use crate::control::PumpControl;
use crate::registry::BroadcastReport;

/// Work performed once per generator period.
#[async_trait]
pub trait TickSource: Send + 'static {
    async fn tick(&mut self);
}

/// Draws a sample from the current pump state and broadcasts it.
pub struct Generator {
    control: Arc<PumpControl>,
    rng: StdRng,
}

impl Generator {
    pub fn new(control: Arc<PumpControl>) -> Self {
        Self {
            control,
            rng: StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl TickSource for Generator {
    async fn tick(&mut self) {
        run_tick(&self.control, &mut self.rng).await;
    }
}

/// Handle to the running generator task.
///
/// Dropping the handle does not stop the task; call [`TelemetryTask::shutdown`].
pub struct TelemetryTask {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl TelemetryTask {
    /// Cancels the generator and waits for it to exit.
    ///
    /// Cancellation is the expected way to stop, so only a panic escaping
    /// the task is reported.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();

        match self.handle.await {
            Ok(()) => debug!("Telemetry generator joined"),
            Err(e) if e.is_cancelled() => debug!("Telemetry generator aborted"),
            Err(e) => error!(error = %e, "Telemetry generator task failed"),
        }
    }
}

/// Spawns the telemetry generator for `control`.
pub fn spawn_telemetry_task(
    control: Arc<PumpControl>,
    period: Duration,
    cancel_token: CancellationToken,
) -> TelemetryTask {
    spawn_ticker(Generator::new(control), period, cancel_token)
}

/// Runs `source` once per `period` until cancelled.
///
/// The task stops when `cancel_token` (or the handle's own child token) is
/// cancelled, including in the middle of a tick, so it exits within one
/// `period` of cancellation. A panicking tick is logged and the next one
/// runs on schedule.
pub fn spawn_ticker<S: TickSource>(
    mut source: S,
    period: Duration,
    cancel_token: CancellationToken,
) -> TelemetryTask {
    let task_token = cancel_token.child_token();
    let loop_token = task_token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_ms = period.as_millis() as u64, "Telemetry generator started");

        loop {
            tokio::select! {
                biased;

                _ = loop_token.cancelled() => {
                    info!("Telemetry generator shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let tick = AssertUnwindSafe(source.tick()).catch_unwind();

                    tokio::select! {
                        biased;

                        _ = loop_token.cancelled() => {
                            info!("Telemetry generator shutting down mid-tick");
                            break;
                        }

                        result = tick => {
                            if result.is_err() {
                                error!("Telemetry tick panicked; continuing");
                            }
                        }
                    }
                }
            }
        }

        debug!("Telemetry generator task completed");
    });

    TelemetryTask {
        handle,
        cancel_token: task_token,
    }
}

/// Generates and broadcasts one sample.
pub async fn run_tick(control: &PumpControl, rng: &mut StdRng) -> BroadcastReport {
    let snapshot = control.snapshot().await;
    let sample = TelemetrySample::generate(&snapshot, Utc::now().timestamp_millis(), rng);

    let report = control
        .registry()
        .broadcast(&ServerMessage::data(sample))
        .await;

    trace!(
        state = %snapshot.state,
        flow_rate = sample.flow_rate,
        delivered = report.delivered,
        removed = report.removed,
        "Telemetry tick"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::PumpState;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    use crate::registry::{ConnectionRegistry, DeliveryError, Payload};

    /// Panics on its first tick, then reports each tick number.
    struct PanicOnce {
        ticks: u32,
        tx: mpsc::UnboundedSender<u32>,
    }

    #[async_trait]
    impl TickSource for PanicOnce {
        async fn tick(&mut self) {
            self.ticks += 1;
            if self.ticks == 1 {
                panic!("sample source failed");
            }
            let _ = self.tx.send(self.ticks);
        }
    }

    /// Signals that a tick started, then never finishes it.
    struct Hang {
        started: mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl TickSource for Hang {
        async fn tick(&mut self) {
            let _ = self.started.send(());
            std::future::pending::<()>().await;
        }
    }

    fn setup() -> Arc<PumpControl> {
        Arc::new(PumpControl::new(Arc::new(ConnectionRegistry::default())))
    }

    fn decode(payload: &str) -> ServerMessage {
        serde_json::from_str(payload).unwrap()
    }

    #[tokio::test]
    async fn test_tick_without_subscribers() {
        let control = setup();
        let mut rng = StdRng::seed_from_u64(1);
        let report = run_tick(&control, &mut rng).await;
        assert_eq!(report, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_tick_respects_state() {
        let control = setup();
        let (sub, mut rx) = control.registry().new_subscriber();
        control.attach(sub).await.unwrap();
        let _greeting = rx.recv().await.unwrap();
        let mut rng = StdRng::seed_from_u64(2);

        run_tick(&control, &mut rng).await;
        match decode(&rx.recv().await.unwrap()) {
            ServerMessage::Data(sample) => assert_eq!(sample.flow_rate, 0.0),
            other => panic!("Expected data, got {other:?}"),
        }

        control.set_target_flow(40.0).await.unwrap();
        control.start().await;
        let _state = rx.recv().await.unwrap();

        run_tick(&control, &mut rng).await;
        match decode(&rx.recv().await.unwrap()) {
            ServerMessage::Data(sample) => {
                assert!(sample.flow_rate <= 44.0);
                assert!((20.0..=100.0).contains(&sample.pressure));
                assert!(sample.timestamp > 0);
            }
            other => panic!("Expected data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_task_emits_samples() {
        let control = setup();
        let (sub, mut rx) = control.registry().new_subscriber();
        control.attach(sub).await.unwrap();

        let task = spawn_telemetry_task(
            Arc::clone(&control),
            Duration::from_millis(20),
            CancellationToken::new(),
        );

        let greeting = decode(&rx.recv().await.unwrap());
        assert_eq!(greeting, ServerMessage::state(PumpState::Off));

        for _ in 0..3 {
            let msg = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
            assert_eq!(decode(&msg).kind(), "data");
        }

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_parent_cancel_stops_task() {
        let control = setup();
        let parent = CancellationToken::new();
        let task = spawn_telemetry_task(control, Duration::from_millis(500), parent.clone());

        parent.cancel();
        timeout(Duration::from_millis(500), task.shutdown())
            .await
            .expect("generator should stop within one period");
    }

    #[tokio::test]
    async fn test_panicking_tick_keeps_loop_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = spawn_ticker(
            PanicOnce { ticks: 0, tx },
            Duration::from_millis(10),
            CancellationToken::new(),
        );

        // Tick 1 panicked; later ticks still run
        for expected in [2, 3] {
            let tick = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
            assert_eq!(tick, Some(expected));
        }

        task.shutdown().await;
    }

    #[tokio::test]
    async fn test_cancel_interrupts_hung_tick() {
        let (started, mut started_rx) = mpsc::unbounded_channel();
        let period = Duration::from_millis(50);
        let task = spawn_ticker(Hang { started }, period, CancellationToken::new());

        timeout(Duration::from_secs(1), started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        timeout(period, task.shutdown())
            .await
            .expect("generator should stop mid-tick");
    }

    #[tokio::test]
    async fn test_stalled_subscriber_does_not_delay_shutdown() {
        let control = setup();
        let registry = Arc::clone(control.registry());
        let (stalled, _stalled_rx) = registry.new_subscriber();
        control.attach(stalled.clone()).await.unwrap();

        // Fill the queue without ever draining it
        let filler: Payload = Arc::from("{}");
        while stalled.deliver(Arc::clone(&filler)).is_ok() {}
        assert_eq!(stalled.deliver(filler), Err(DeliveryError::Full));

        let period = Duration::from_millis(50);
        let task = spawn_telemetry_task(Arc::clone(&control), period, CancellationToken::new());
        sleep(Duration::from_millis(20)).await;

        timeout(period, task.shutdown())
            .await
            .expect("generator should stop within one period");

        // The first tick found the queue full and evicted the subscriber
        assert!(!registry.contains(stalled.id()).await);
        assert!(!stalled.is_alive());
    }
}
