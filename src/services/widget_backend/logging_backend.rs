use crate::error::Result;
use crate::events::{ComponentKind, WidgetHandle};
use crate::services::component_factory::WidgetSpec;
use crate::shell_error;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use super::r#trait::WidgetBackend;

/// Бэкенд отрисовки, который только ведёт учёт виджетов и пишет в лог.
/// Используется в dry-run режиме и в тестах.
pub struct LoggingWidgetBackend {
    next_handle: AtomicU64,
    widgets: DashMap<WidgetHandle, WidgetSpec>,
    invocations: Mutex<Vec<(WidgetHandle, String)>>,
    construct_delay: Duration,
    failing_construct: Mutex<HashSet<ComponentKind>>,
    failing_teardown: Mutex<HashSet<ComponentKind>>,
}

impl Default for LoggingWidgetBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingWidgetBackend {
    pub fn new() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            widgets: DashMap::new(),
            invocations: Mutex::new(Vec::new()),
            construct_delay: Duration::ZERO,
            failing_construct: Mutex::new(HashSet::new()),
            failing_teardown: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_construct_delay(mut self, delay: Duration) -> Self {
        self.construct_delay = delay;
        self
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.widgets.len()
    }

    #[cfg(test)]
    pub fn fail_construct(&self, kind: ComponentKind) {
        self.failing_construct.lock().insert(kind);
    }

    #[cfg(test)]
    pub fn fail_teardown(&self, kind: ComponentKind) {
        self.failing_teardown.lock().insert(kind);
    }

    #[cfg(test)]
    pub fn clear_failures(&self) {
        self.failing_construct.lock().clear();
        self.failing_teardown.lock().clear();
    }

    #[cfg(test)]
    pub fn invocations(&self) -> Vec<(WidgetHandle, String)> {
        self.invocations.lock().clone()
    }

    #[cfg(test)]
    pub fn spec_of(&self, handle: WidgetHandle) -> Option<WidgetSpec> {
        self.widgets.get(&handle).map(|entry| entry.value().clone())
    }
}

#[async_trait::async_trait]
impl WidgetBackend for LoggingWidgetBackend {
    async fn construct_widget(&self, spec: &WidgetSpec) -> Result<WidgetHandle> {
        if !self.construct_delay.is_zero() {
            tokio::time::sleep(self.construct_delay).await;
        }

        if self.failing_construct.lock().contains(&spec.kind) {
            return Err(shell_error!(widget, "не удалось построить {}", spec.namespace));
        }

        let handle = WidgetHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        info!(
            "[LOG] Построен виджет {} ({}, слой {:?}, якорь {}, {}x{})",
            spec.namespace, handle, spec.layer, spec.anchor, spec.width, spec.height
        );
        self.widgets.insert(handle, spec.clone());
        Ok(handle)
    }

    async fn teardown_widget(&self, handle: WidgetHandle) -> Result<()> {
        let Some((_, spec)) = self.widgets.remove(&handle) else {
            debug!("[LOG] Виджет {} уже разобран", handle);
            return Ok(());
        };

        if self.failing_teardown.lock().contains(&spec.kind) {
            // Ресурс всё равно считается потерянным - повторно не вернётся
            return Err(shell_error!(widget, "не удалось разобрать {}", spec.namespace));
        }

        info!("[LOG] Разобран виджет {} ({})", spec.namespace, handle);
        Ok(())
    }

    async fn invoke(&self, handle: WidgetHandle, command: &str) -> Result<String> {
        let namespace = self
            .widgets
            .get(&handle)
            .map(|entry| entry.value().namespace.clone())
            .ok_or_else(|| shell_error!(widget, "виджет {} не существует", handle))?;

        info!("[LOG] {} <- {}", namespace, command);
        self.invocations.lock().push((handle, command.to_string()));
        Ok(format!("{} {}", namespace, command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Geometry, MonitorId};
    use crate::services::component_factory::{build_spec, WidgetLayout};

    fn spec(kind: ComponentKind) -> WidgetSpec {
        build_spec(kind, &MonitorId::new("DP-1"), Geometry::new(0, 0, 1920, 1080), &WidgetLayout::default()).unwrap()
    }

    #[tokio::test]
    async fn test_construct_invoke_teardown() {
        let backend = LoggingWidgetBackend::new();
        let handle = backend.construct_widget(&spec(ComponentKind::Dashboard)).await.unwrap();
        assert_eq!(backend.live_count(), 1);

        let output = backend.invoke(handle, "launcher").await.unwrap();
        assert_eq!(output, "rz-shell-dashboard-DP-1 launcher");

        backend.teardown_widget(handle).await.unwrap();
        assert_eq!(backend.live_count(), 0);
        assert!(backend.invoke(handle, "launcher").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_teardown_still_releases_widget() {
        let backend = LoggingWidgetBackend::new();
        backend.fail_teardown(ComponentKind::Dock);
        let handle = backend.construct_widget(&spec(ComponentKind::Dock)).await.unwrap();

        assert!(backend.teardown_widget(handle).await.is_err());
        assert_eq!(backend.live_count(), 0);
    }
}
