use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

/// Stops future refresh ticks when stopped or dropped. Refreshes already
/// running are left to finish.
#[derive(Debug)]
pub struct RefreshHandle {
    ticker: JoinHandle<()>,
}

impl RefreshHandle {
    pub fn stop(self) {
        self.ticker.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.ticker.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

/// Runs `refresh` immediately and then every `period`. Each run is spawned
/// on its own task, so a slow run never delays the next tick and runs may
/// overlap; callers that care about ordering must discard stale results.
pub fn spawn_refresh<F, Fut>(period: Duration, refresh: F) -> RefreshHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    // tokio rejects a zero period.
    let period = period.max(Duration::from_millis(1));

    let ticker = tokio::spawn(async move {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            debug!(?period, "refresh tick");
            tokio::spawn(refresh());
        }
    });

    RefreshHandle { ticker }
}
