use crate::config::Config;
use crate::error::Result;
use crate::events::WidgetHandle;
use crate::services::component_factory::WidgetSpec;
use std::sync::Arc;
use std::time::Duration;

/// Trait for the rendering collaborator that owns the actual widget surfaces
#[async_trait::async_trait]
pub trait WidgetBackend: Send + Sync {
    /// Construct a widget surface for the given spec and return its handle
    async fn construct_widget(&self, spec: &WidgetSpec) -> Result<WidgetHandle>;

    /// Release every resource held by the widget
    async fn teardown_widget(&self, handle: WidgetHandle) -> Result<()>;

    /// Deliver a command (e.g. "toggle launcher") to a live widget
    async fn invoke(&self, handle: WidgetHandle, command: &str) -> Result<String>;
}

/// Factory function to create the rendering backend from config and the dry_run flag
pub fn create_widget_backend(config: Arc<Config>, dry_run: bool) -> Result<Arc<dyn WidgetBackend>> {
    if dry_run || config.renderer.mode == "log" {
        // В dry-run эмулируем медленное построение, чтобы были видны очереди мониторов
        let delay = if dry_run { Duration::from_millis(150) } else { Duration::ZERO };
        Ok(Arc::new(super::logging_backend::LoggingWidgetBackend::new().with_construct_delay(delay)))
    } else {
        Ok(Arc::new(super::exec_backend::ExecWidgetBackend::new(config)?))
    }
}
