// THEORY:
// Both background activities of the viewer are "do this again and again until
// told to stop". `RepeatingTask` gives that a handle: spawn it, and later
// `cancel().await` it (or just drop it). The shutdown signal is a `watch` channel,
// the same mechanism the visualizer uses for its play/pause control.
//
// Two cadences exist because the two activities want different things:
// - `FixedRate` ticks on a clock and skips missed ticks, like a display refresh.
// - `FixedDelay` waits *after* each tick completes, so a slow tick (a slow network
//   response) pushes the next one back instead of overlapping it.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    FixedRate(Duration),
    FixedDelay(Duration),
}

pub struct RepeatingTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl RepeatingTask {
    /// Spawns `tick` on the current tokio runtime. The first tick runs immediately.
    pub fn spawn<F, Fut>(name: &'static str, cadence: Cadence, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            match cadence {
                Cadence::FixedRate(period) => {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = stop_rx.changed() => break,
                            _ = interval.tick() => {}
                        }
                        tokio::select! {
                            _ = stop_rx.changed() => break,
                            _ = tick() => {}
                        }
                    }
                }
                Cadence::FixedDelay(delay) => loop {
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        _ = tick() => {}
                    }
                    tokio::select! {
                        _ = stop_rx.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                },
            }
            debug!(task = name, "repeating task stopped");
        });

        Self {
            name,
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signals the task to stop and waits for it to exit. An in-flight tick is
    /// abandoned at its next await point.
    pub async fn cancel(mut self) {
        debug!(task = self.name, "cancelling repeating task");
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        // Best effort stop on drop
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_task(cadence: Cadence, work: Duration) -> (RepeatingTask, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = RepeatingTask::spawn("test", cadence, move || {
            let counter = counter.clone();
            async move {
                tokio::time::sleep(work).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (task, count)
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_waits_for_tick_completion() {
        // 50ms of work + 100ms delay: ticks complete at 50, 200, 350, 500ms.
        let (task, count) = counting_task(Cadence::FixedDelay(Duration::from_millis(100)), Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(520)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_rate_ticks_on_the_clock() {
        let (task, count) = counting_task(Cadence::FixedRate(Duration::from_millis(10)), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(95)).await;
        assert_eq!(count.load(Ordering::SeqCst), 10);
        task.cancel().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_further_ticks() {
        let (task, count) = counting_task(Cadence::FixedDelay(Duration::from_millis(10)), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(35)).await;
        task.cancel().await;
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_stops_the_task() {
        let (task, count) = counting_task(Cadence::FixedDelay(Duration::from_millis(10)), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(25)).await;
        drop(task);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let after_drop = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
