use crate::config::Config;
use crate::error::{Result, ShellError};
use crate::events::WidgetHandle;
use crate::services::component_factory::WidgetSpec;
use crate::shell_error;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::r#trait::WidgetBackend;

/// Бэкенд отрисовки, делегирующий работу внешней программе.
///
/// Протокол вызова:
/// - `<command> construct <handle> <spec-json>`
/// - `<command> teardown <handle>`
/// - `<command> invoke <handle> <command>` - stdout возвращается как результат
///
/// Каждый вызов ограничен `renderer.timeout_ms`; зависший процесс убивается.
pub struct ExecWidgetBackend {
    program: String,
    timeout: Duration,
    next_handle: AtomicU64,
}

impl ExecWidgetBackend {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let program = config
            .renderer
            .command
            .clone()
            .filter(|command| !command.is_empty())
            .ok_or_else(|| shell_error!(internal, "renderer.command не задан"))?;

        Ok(Self {
            program,
            timeout: Duration::from_millis(config.renderer.timeout_ms),
            next_handle: AtomicU64::new(1),
        })
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("exec: {} {}", self.program, args.join(" "));

        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                shell_error!(
                    widget,
                    "{} {} не ответил за {:?}",
                    self.program,
                    args.first().copied().unwrap_or_default(),
                    self.timeout
                )
            })?
            .map_err(|e| shell_error!(widget, "{} не запускается: {}", self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ShellError::Widget(format!(
                "{} {} завершился с ошибкой: {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl WidgetBackend for ExecWidgetBackend {
    async fn construct_widget(&self, spec: &WidgetSpec) -> Result<WidgetHandle> {
        let handle = WidgetHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let payload = serde_json::to_string(spec)?;
        self.run(&["construct", &handle.0.to_string(), &payload]).await?;
        Ok(handle)
    }

    async fn teardown_widget(&self, handle: WidgetHandle) -> Result<()> {
        self.run(&["teardown", &handle.0.to_string()]).await?;
        Ok(())
    }

    async fn invoke(&self, handle: WidgetHandle, command: &str) -> Result<String> {
        self.run(&["invoke", &handle.0.to_string(), command]).await
    }
}
