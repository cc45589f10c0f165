use crate::error::Result;
use crate::services::event_loop::ShellEvent;
use crate::{debug_if_enabled, shell_error};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use super::r#trait::CompositorSource;
use super::snapshot::{MonitorSnapshot, SnapshotTracker};

/// Число подряд неудачных опросов, после которого делаем паузу
const MAX_CONSECUTIVE_FAILURES: u32 = 5;
const FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Способ получить текущий список выходов композитора
#[async_trait::async_trait]
pub trait OutputProbe: Send + Sync {
    fn name(&self) -> &'static str;

    async fn probe(&self) -> Result<Vec<MonitorSnapshot>>;
}

/// Источник событий, периодически опрашивающий композитор и сравнивающий снимки
pub struct PollingCompositor {
    probe: Box<dyn OutputProbe>,
    period: Duration,
    events: mpsc::Sender<ShellEvent>,
    tracker: SnapshotTracker,
}

impl PollingCompositor {
    pub fn new(probe: Box<dyn OutputProbe>, period: Duration, events: mpsc::Sender<ShellEvent>) -> Self {
        Self {
            probe,
            period,
            events,
            tracker: SnapshotTracker::new(),
        }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("Опрос композитора через {} каждые {:?}", self.probe.name(), self.period);

        let mut ticker = interval(self.period);
        let mut failures = 0u32;

        loop {
            ticker.tick().await;

            let snapshot = match self.probe.probe().await {
                Ok(snapshot) => {
                    failures = 0;
                    snapshot
                }
                Err(e) => {
                    failures += 1;
                    warn!("{}: опрос не удался ({}/{}): {}", self.probe.name(), failures, MAX_CONSECUTIVE_FAILURES, e);
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        error!("{} не отвечает. Приостанавливаем опрос на {:?}", self.probe.name(), FAILURE_BACKOFF);
                        tokio::time::sleep(FAILURE_BACKOFF).await;
                        failures = 0;
                    }
                    continue;
                }
            };

            for event in self.tracker.diff(snapshot) {
                debug_if_enabled!("{}: {}", self.probe.name(), event);
                self.events
                    .send(ShellEvent::Compositor(event))
                    .await
                    .map_err(|_| shell_error!(channel, "канал событий оболочки закрыт"))?;
            }
        }
    }
}

#[async_trait::async_trait]
impl CompositorSource for PollingCompositor {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
