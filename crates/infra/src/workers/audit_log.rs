use std::io;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::info;

use tillpoint_events::{EventBus, EventEnvelope, Subscription};

/// Handle to stop and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<u64>>,
}

impl WorkerHandle {
    /// Ask the worker to stop and wait for it. Returns how many messages it handled.
    pub fn shutdown(mut self) -> u64 {
        let _ = self.shutdown.send(());
        self.join
            .take()
            .and_then(|j| j.join().ok())
            .unwrap_or(0)
    }
}

/// Writes one structured log line per committed event.
///
/// Read models are updated synchronously by the write path; this subscriber only
/// leaves an audit trail (`target = "audit"`) that can be filtered with `RUST_LOG`.
#[derive(Debug)]
pub struct AuditLogWorker;

impl AuditLogWorker {
    pub fn spawn<B>(bus: &B) -> io::Result<WorkerHandle>
    where
        B: EventBus<EventEnvelope<JsonValue>>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name("audit-log".to_string())
            .spawn(move || audit_loop(sub, shutdown_rx))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn audit_loop(sub: Subscription<EventEnvelope<JsonValue>>, shutdown_rx: mpsc::Receiver<()>) -> u64 {
    let tick = Duration::from_millis(250);
    let mut seen = 0u64;

    loop {
        if shutdown_rx.try_recv().is_ok() {
            // Drain what is already queued so nothing committed goes unlogged.
            while let Ok(env) = sub.try_recv() {
                record(&env);
                seen += 1;
            }
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(env) => {
                record(&env);
                seen += 1;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    seen
}

fn record(env: &EventEnvelope<JsonValue>) {
    info!(
        target: "audit",
        tenant_id = %env.tenant_id(),
        aggregate_type = env.aggregate_type(),
        aggregate_id = %env.aggregate_id(),
        sequence_number = env.sequence_number(),
        event_type = env.event_type(),
        event_id = %env.event_id(),
        "event committed"
    );
}
