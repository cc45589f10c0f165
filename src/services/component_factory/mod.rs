mod construction;

pub use self::construction::{build_spec, WidgetLayout, WidgetSpec};

use crate::error::{Result, ShellError};
use crate::events::{
    ComponentInstance, ComponentKind, ComponentState, Geometry, InstanceId, InstanceKey, MonitorId,
};
use crate::services::widget_backend::WidgetBackend;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// ComponentFactory создаёт и разбирает экземпляры компонентов.
///
/// Фабрика следит за инвариантом "не более одного живого экземпляра на
/// пару (монитор, тип)": ключ резервируется до обращения к бэкенду, так что
/// два параллельных `create` для одной пары не построят два виджета.
pub struct ComponentFactory {
    backend: Arc<dyn WidgetBackend>,
    live: DashMap<InstanceKey, InstanceId>,
    next_id: AtomicU64,
    layout: WidgetLayout,
}

impl ComponentFactory {
    pub fn new(backend: Arc<dyn WidgetBackend>) -> Self {
        Self {
            backend,
            live: DashMap::new(),
            next_id: AtomicU64::new(1),
            layout: WidgetLayout::default(),
        }
    }

    /// Расположение виджетов фиксируется при запуске
    pub fn with_layout(mut self, layout: WidgetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub async fn create(
        &self,
        monitor: &MonitorId,
        geometry: Geometry,
        kind: ComponentKind,
    ) -> Result<ComponentInstance> {
        let spec = build_spec(kind, monitor, geometry, &self.layout)
            .ok_or_else(|| ShellError::InvalidKind(kind.to_string()))?;

        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        match self.live.entry((monitor.clone(), kind)) {
            Entry::Occupied(_) => {
                return Err(ShellError::DuplicateInstance {
                    monitor: monitor.clone(),
                    kind,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        match self.backend.construct_widget(&spec).await {
            Ok(handle) => {
                info!("Создан компонент {}@{} {} ({})", kind, monitor, id, handle);
                Ok(ComponentInstance {
                    id,
                    monitor: monitor.clone(),
                    kind,
                    handle,
                    state: ComponentState::Created,
                })
            }
            Err(e) => {
                self.live.remove_if(&(monitor.clone(), kind), |_, live_id| *live_id == id);
                Err(e)
            }
        }
    }

    /// Разобрать экземпляр. Повторный вызов для уже разобранного - no-op.
    ///
    /// Экземпляр помечается `Destroyed` даже при ошибке бэкенда: ошибка
    /// возвращается вызывающему, но пара (монитор, тип) освобождается.
    pub async fn destroy(&self, instance: &mut ComponentInstance) -> Result<()> {
        if instance.state == ComponentState::Destroyed {
            debug!("Компонент {} уже разобран", instance);
            return Ok(());
        }

        let result = self.backend.teardown_widget(instance.handle).await;

        let id = instance.id;
        self.live.remove_if(&instance.key(), |_, live_id| *live_id == id);
        instance.state = ComponentState::Destroyed;

        match &result {
            Ok(()) => info!("Разобран компонент {}@{} {}", instance.kind, instance.monitor, id),
            Err(e) => debug!("Ошибка разбора {}: {}", instance, e),
        }
        result
    }

    #[cfg(test)]
    pub fn is_live(&self, monitor: &MonitorId, kind: ComponentKind) -> bool {
        self.live.contains_key(&(monitor.clone(), kind))
    }

    #[cfg(test)]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BarPosition;
    use crate::services::widget_backend::LoggingWidgetBackend;

    fn factory() -> (Arc<LoggingWidgetBackend>, ComponentFactory) {
        let backend = Arc::new(LoggingWidgetBackend::new());
        let factory = ComponentFactory::new(backend.clone());
        (backend, factory)
    }

    fn dp1() -> MonitorId {
        MonitorId::new("DP-1")
    }

    #[tokio::test]
    async fn test_create_twice_is_duplicate() {
        let (backend, factory) = factory();
        let geometry = Geometry::new(0, 0, 1920, 1080);

        let first = factory.create(&dp1(), geometry, ComponentKind::Bar).await.unwrap();
        assert_eq!(first.state, ComponentState::Created);

        let second = factory.create(&dp1(), geometry, ComponentKind::Bar).await;
        assert!(matches!(second, Err(ShellError::DuplicateInstance { .. })));
        assert_eq!(backend.live_count(), 1);
        assert_eq!(factory.live_count(), 1);
    }

    #[tokio::test]
    async fn test_layout_reaches_backend() {
        let backend = Arc::new(LoggingWidgetBackend::new());
        let layout = WidgetLayout {
            bar_position: BarPosition::Bottom,
            ..WidgetLayout::default()
        };
        let factory = ComponentFactory::new(backend.clone()).with_layout(layout);

        let bar = factory.create(&dp1(), Geometry::new(0, 0, 1920, 1080), ComponentKind::Bar).await.unwrap();
        let spec = backend.spec_of(bar.handle).unwrap();
        assert!(spec.anchor.bottom && !spec.anchor.top);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (backend, factory) = factory();
        let mut bar = factory.create(&dp1(), Geometry::default(), ComponentKind::Bar).await.unwrap();

        factory.destroy(&mut bar).await.unwrap();
        factory.destroy(&mut bar).await.unwrap();

        assert_eq!(bar.state, ComponentState::Destroyed);
        assert!(!factory.is_live(&dp1(), ComponentKind::Bar));
        assert_eq!(backend.live_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_construct_releases_reservation() {
        let (backend, factory) = factory();
        backend.fail_construct(ComponentKind::Corners);

        assert!(factory.create(&dp1(), Geometry::default(), ComponentKind::Corners).await.is_err());
        assert!(!factory.is_live(&dp1(), ComponentKind::Corners));

        backend.clear_failures();
        assert!(factory.create(&dp1(), Geometry::default(), ComponentKind::Corners).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_teardown_marks_destroyed() {
        let (backend, factory) = factory();
        backend.fail_teardown(ComponentKind::Dock);
        let mut dock = factory.create(&dp1(), Geometry::default(), ComponentKind::Dock).await.unwrap();

        assert!(factory.destroy(&mut dock).await.is_err());
        assert_eq!(dock.state, ComponentState::Destroyed);
        assert!(!factory.is_live(&dp1(), ComponentKind::Dock));
    }
}
