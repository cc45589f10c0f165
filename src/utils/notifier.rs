use crate::error::Result;
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zbus::zvariant::Value;
use zbus::Connection;

const APP_NAME: &str = "Rz-Shell";
const EXPIRE_TIMEOUT_MS: i32 = 5000;

/// Уведомления рабочего стола через org.freedesktop.Notifications.
///
/// Ошибка уведомления никогда не поднимается выше: она только пишется в лог.
pub struct DesktopNotifier {
    enabled: bool,
    dry_run: bool,
    connection: OnceCell<Connection>,
}

impl DesktopNotifier {
    pub fn new(enabled: bool, dry_run: bool) -> Self {
        Self {
            enabled,
            dry_run,
            connection: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn disabled() -> Self {
        Self::new(false, false)
    }

    pub async fn notify(&self, summary: &str, body: &str) {
        if !self.enabled {
            debug!("Уведомления отключены: {} - {}", summary, body);
            return;
        }

        if self.dry_run {
            info!("[DRY RUN] Уведомление: {} - {}", summary, body);
            return;
        }

        if let Err(e) = self.send(summary, body).await {
            warn!("Не удалось показать уведомление: {}", e);
        }
    }

    async fn send(&self, summary: &str, body: &str) -> Result<()> {
        let connection = self
            .connection
            .get_or_try_init(|| async { Connection::session().await })
            .await?;

        let actions: Vec<&str> = Vec::new();
        let hints: HashMap<&str, Value<'_>> = HashMap::new();

        connection
            .call_method(
                Some("org.freedesktop.Notifications"),
                "/org/freedesktop/Notifications",
                Some("org.freedesktop.Notifications"),
                "Notify",
                &(APP_NAME, 0u32, "dialog-warning", summary, body, actions, hints, EXPIRE_TIMEOUT_MS),
            )
            .await?;

        debug!("Уведомление отправлено: {}", summary);
        Ok(())
    }
}
