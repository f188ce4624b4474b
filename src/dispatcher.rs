//! Event fan-in and forwarding.
//!
//! The dispatcher is the single consumer of both event channels. It never
//! blocks on the sink: every outbound send runs on its own task, with the
//! number of in-flight sends bounded by a semaphore. Ordinary samples that
//! cannot get a permit are dropped immediately; terminal events wait for a
//! permit because the collector must learn about every finished container.
//!
//! Per-pid ordering holds because exactly one sampler produces a pid's
//! stream and its terminal event always arrives on the finish channel last.
//! No ordering is guaranteed across pids.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::event::UsageEvent;
use crate::sink::UsageSink;
use crate::state::SharedState;

/// Dispatcher loop. Runs until both channels are closed, i.e. discovery and
/// every sampler have exited.
pub async fn run<S: UsageSink>(
    sink: S,
    instance_id: String,
    state: SharedState,
    mut usage_rx: UnboundedReceiver<UsageEvent>,
    mut finish_rx: UnboundedReceiver<UsageEvent>,
    max_in_flight: usize,
) {
    let permits = Arc::new(Semaphore::new(max_in_flight));

    loop {
        tokio::select! {
            Some(event) = usage_rx.recv() => {
                log_usage(&event);
                forward_usage(&sink, &instance_id, &permits, event);
            }
            Some(event) = finish_rx.recv() => {
                let pid = event.pid;
                info!(pid, container = %event.container, "container finished");
                forward_terminal(&sink, &instance_id, &permits, event);
                state.registry.unregister(pid);
            }
            else => {
                info!("event channels closed, dispatcher stopping");
                return;
            }
        }
    }
}

fn log_usage(event: &UsageEvent) {
    info!(
        pid = event.pid,
        application = %event.application,
        container = %event.container,
        process_time = event.process_time,
        cpu_time = event.cpu_time,
        cpu_usage = event.cpu_usage,
        "usage sample"
    );
}

/// Fire-and-forget delivery of an ordinary sample. No permit available means
/// the sink is backlogged; the sample is dropped, never buffered or retried.
fn forward_usage<S: UsageSink>(
    sink: &S,
    instance_id: &str,
    permits: &Arc<Semaphore>,
    event: UsageEvent,
) {
    let permit = match permits.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            warn!(pid = event.pid, "sink backlogged, dropping usage sample");
            return;
        }
    };

    let sink = sink.clone();
    let instance_id = instance_id.to_string();
    tokio::spawn(async move {
        let _permit = permit;
        if let Err(e) = sink.send_usage(&instance_id, &event).await {
            warn!(pid = event.pid, "dropping usage sample: {}", e);
        }
    });
}

/// Delivery of a terminal event: the final usage record first, then the
/// container-finished notification. Waits for a permit instead of dropping,
/// but still off the dispatcher loop.
fn forward_terminal<S: UsageSink>(
    sink: &S,
    instance_id: &str,
    permits: &Arc<Semaphore>,
    event: UsageEvent,
) {
    let sink = sink.clone();
    let instance_id = instance_id.to_string();
    let permits = Arc::clone(permits);
    tokio::spawn(async move {
        // The semaphore is never closed while sends are outstanding.
        let _permit = permits.acquire_owned().await.ok();
        if let Err(e) = sink.send_usage(&instance_id, &event).await {
            warn!(pid = event.pid, "dropping final usage record: {}", e);
        }
        if let Err(e) = sink.send_finished(&event.container).await {
            warn!(container = %event.container, "dropping finished notification: {}", e);
        }
    });
}
