use crate::error::Result;
use crate::events::{CompositorEvent, Geometry};
use crate::services::event_loop::ShellEvent;
use crate::shell_error;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::CompositorSource;

/// Эмулирует композитор с двумя мониторами: подключение, смену фокуса,
/// отключение внешнего монитора (со "старым" событием фокуса) и возврат.
pub struct DryRunCompositor {
    events: mpsc::Sender<ShellEvent>,
}

impl DryRunCompositor {
    pub fn new(events: mpsc::Sender<ShellEvent>) -> Self {
        Self { events }
    }

    fn script() -> Vec<CompositorEvent> {
        let laptop = Geometry::new(0, 0, 1920, 1200);
        let external = Geometry::new(1920, 0, 2560, 1440);
        vec![
            CompositorEvent::attached("eDP-1", laptop),
            CompositorEvent::focus("eDP-1"),
            CompositorEvent::attached("DP-1", external),
            CompositorEvent::focus("DP-1"),
            CompositorEvent::detached("DP-1"),
            CompositorEvent::focus("DP-1"),
            CompositorEvent::focus("eDP-1"),
            CompositorEvent::attached("DP-1", external),
        ]
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - композитор работает в режиме эмуляции");

        let script = Self::script();
        let mut step = 0;
        let mut ticker = interval(Duration::from_secs(5));

        loop {
            ticker.tick().await;

            // После первого круга повторяем сценарий начиная со смены фокуса
            let event = script[step].clone();
            info!("Dry-run: эмулируем событие {}", event);
            self.events
                .send(ShellEvent::Compositor(event))
                .await
                .map_err(|_| shell_error!(channel, "канал событий оболочки закрыт"))?;

            step = if step + 1 == script.len() { 3 } else { step + 1 };
        }
    }
}

#[async_trait::async_trait]
impl CompositorSource for DryRunCompositor {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
