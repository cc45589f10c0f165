use crate::error::{Result, ShellError};
use crate::events::{ComponentInstance, ComponentKind, ComponentState, Geometry, MonitorId};
use crate::services::component_factory::ComponentFactory;
use crate::services::monitor_registry::{AttachOutcome, MonitorRegistry};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Итог приведения компонентов монитора к списку включённых типов
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: Vec<ComponentKind>,
    pub removed: Vec<ComponentKind>,
    pub failed: Vec<(ComponentKind, String)>,
    /// Монитор отключился посреди создания - оставшиеся типы пропущены
    pub aborted: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.aborted
    }
}

/// MonitorManager - единственный владелец отображения монитор -> компоненты.
///
/// Responsibilities (strict):
/// - create components for attached monitors in canonical kind order;
/// - tear them down in reverse order on detach, best-effort;
/// - serialize every create/destroy sequence per monitor (one async mutex per id).
///
/// Он не знает ни о фокусе, ни о привязках клавиш.
pub struct MonitorManager {
    registry: Arc<MonitorRegistry>,
    factory: Arc<ComponentFactory>,
    enabled_kinds: RwLock<Vec<ComponentKind>>,
    instances: DashMap<MonitorId, Vec<ComponentInstance>>,
    locks: DashMap<MonitorId, Arc<Mutex<()>>>,
}

impl MonitorManager {
    pub fn new(
        registry: Arc<MonitorRegistry>,
        factory: Arc<ComponentFactory>,
        enabled_kinds: Vec<ComponentKind>,
    ) -> Self {
        info!("Инициализация MonitorManager, типы компонентов: {:?}", enabled_kinds);
        Self {
            registry,
            factory,
            enabled_kinds: RwLock::new(Self::canonical(enabled_kinds)),
            instances: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    fn canonical(mut kinds: Vec<ComponentKind>) -> Vec<ComponentKind> {
        kinds.sort_by_key(|kind| kind.order());
        kinds.dedup();
        kinds
    }

    fn lock_for(&self, id: &MonitorId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    pub fn enabled_kinds(&self) -> Vec<ComponentKind> {
        self.enabled_kinds.read().clone()
    }

    /// Заменить список включённых типов (перезагрузка конфигурации).
    /// Уже живые компоненты приводятся к нему через `reconcile`.
    pub fn set_enabled_kinds(&self, kinds: Vec<ComponentKind>) {
        let kinds = Self::canonical(kinds);
        info!("Новый список типов компонентов: {:?}", kinds);
        *self.enabled_kinds.write() = kinds;
    }

    /// Синхронная часть подключения: только запись в реестре
    pub fn register_attached(&self, id: &MonitorId, geometry: Geometry) -> AttachOutcome {
        self.registry.on_monitor_attached(id, geometry)
    }

    /// Синхронная часть отключения: монитор перестаёт считаться подключённым
    pub fn mark_detached(&self, id: &MonitorId) -> bool {
        self.registry.on_monitor_detached(id)
    }

    /// Подключение целиком: регистрация и создание всех включённых компонентов
    pub async fn on_monitor_attached(&self, id: &MonitorId, geometry: Geometry) -> ReconcileReport {
        self.register_attached(id, geometry);
        self.reconcile(id).await
    }

    /// Отключение целиком: пометка, разбор всех компонентов, удаление записи
    pub async fn on_monitor_detached(&self, id: &MonitorId) -> Result<()> {
        self.mark_detached(id);
        self.teardown(id).await
    }

    /// Привести компоненты монитора к списку включённых типов.
    ///
    /// Недостающие типы создаются в каноническом порядке, выключенные
    /// разбираются в обратном. Уже существующие экземпляры не трогаются,
    /// поэтому повторный вызов после частичной ошибки докрутит оставшиеся
    /// типы в том же порядке.
    pub async fn reconcile(&self, id: &MonitorId) -> ReconcileReport {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut report = ReconcileReport::default();

        let Some(monitor) = self.registry.get(id).filter(|m| m.is_attached()) else {
            debug!("Монитор {} не подключён - создание пропущено", id);
            report.aborted = true;
            return report;
        };

        let enabled = self.enabled_kinds();

        // Сначала разбираем выключенные типы, в обратном порядке создания
        let stale: Vec<ComponentInstance> = self
            .instances
            .get_mut(id)
            .map(|mut list| {
                let (keep, stale): (Vec<_>, Vec<_>) =
                    list.drain(..).partition(|inst| enabled.contains(&inst.kind));
                *list = keep;
                stale
            })
            .unwrap_or_default();

        for mut instance in stale.into_iter().rev() {
            let kind = instance.kind;
            if let Err(e) = self.factory.destroy(&mut instance).await {
                error!("Не удалось разобрать выключенный компонент {}: {}", instance, e);
                report.failed.push((kind, e.to_string()));
            }
            report.removed.push(kind);
        }

        for kind in enabled {
            // Detach пришёл посреди создания - прерываем, разбор пойдёт следующим
            if !self.registry.is_attached(id) {
                warn!("Монитор {} отключён во время создания компонентов - прерываем", id);
                report.aborted = true;
                break;
            }

            if self.has_instance(id, kind) {
                continue;
            }

            match self.factory.create(id, monitor.geometry, kind).await {
                Ok(mut instance) => {
                    instance.state = ComponentState::Active;
                    self.instances.entry(id.clone()).or_default().push(instance);
                    report.created.push(kind);
                }
                Err(ShellError::DuplicateInstance { monitor, kind }) => {
                    warn!("Компонент {}@{} уже существует - считаем созданным", kind, monitor);
                }
                Err(e) => {
                    error!("Не удалось создать {}@{}: {}", kind, id, e);
                    report.failed.push((kind, e.to_string()));
                }
            }
        }

        info!(
            "Монитор {}: создано {:?}, удалено {:?}, ошибок {}",
            id,
            report.created,
            report.removed,
            report.failed.len()
        );
        report
    }

    /// Разобрать все компоненты монитора в обратном порядке создания и удалить запись.
    ///
    /// Ошибка одного компонента не останавливает разбор остальных: все ошибки
    /// собираются и возвращаются одной `ShellError::Teardown` после полного прохода.
    pub async fn teardown(&self, id: &MonitorId) -> Result<()> {
        let lock = self.lock_for(id);
        let guard = lock.lock().await;

        let instances = self
            .instances
            .remove(id)
            .map(|(_, list)| list)
            .unwrap_or_default();

        if instances.is_empty() {
            debug!("У монитора {} нет компонентов для разбора", id);
        } else {
            info!("Разбор {} компонентов монитора {}", instances.len(), id);
        }

        let mut failures = Vec::new();
        for mut instance in instances.into_iter().rev() {
            if let Err(e) = self.factory.destroy(&mut instance).await {
                error!("Ошибка разбора {}: {}", instance, e);
                failures.push(format!("{}: {}", instance.kind, e));
            }
        }

        let removed = self.registry.remove_if_detached(id);

        drop(guard);
        drop(lock);
        if removed || self.registry.get(id).is_none() {
            // Мьютекс удаляется, только если его больше никто не ждёт
            self.locks.remove_if(id, |_, lock| Arc::strong_count(lock) == 1);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ShellError::Teardown {
                monitor: id.clone(),
                failures,
            })
        }
    }

    fn has_instance(&self, id: &MonitorId, kind: ComponentKind) -> bool {
        self.instances
            .get(id)
            .map(|list| list.iter().any(|inst| inst.kind == kind && inst.is_live()))
            .unwrap_or(false)
    }

    /// Активный экземпляр для пары (монитор, тип), если монитор подключён
    pub fn instance(&self, id: &MonitorId, kind: ComponentKind) -> Option<ComponentInstance> {
        if !self.registry.is_attached(id) {
            return None;
        }
        self.instances.get(id).and_then(|list| {
            list.iter()
                .find(|inst| inst.kind == kind && inst.state == ComponentState::Active)
                .cloned()
        })
    }

    /// Компоненты монитора в порядке создания
    pub fn instances_of(&self, id: &MonitorId) -> Vec<ComponentInstance> {
        self.instances
            .get(id)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    pub fn live_instances(&self) -> Vec<ComponentInstance> {
        let mut all: Vec<ComponentInstance> = self
            .instances
            .iter()
            .flat_map(|entry| entry.value().clone())
            .filter(|inst| inst.is_live())
            .collect();
        all.sort_by(|a, b| (&a.monitor, a.kind.order()).cmp(&(&b.monitor, b.kind.order())));
        all
    }

    /// Отключить все мониторы перед завершением процесса
    pub async fn shutdown(&self) {
        let monitors = self.registry.list_attached();
        info!("Завершение: разбор компонентов {} мониторов", monitors.len());

        for id in monitors {
            if let Err(e) = self.on_monitor_detached(&id).await {
                warn!("Разбор при завершении с ошибками: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::widget_backend::LoggingWidgetBackend;
    use std::collections::HashSet;

    struct Fixture {
        backend: Arc<LoggingWidgetBackend>,
        manager: Arc<MonitorManager>,
    }

    fn fixture(kinds: &[ComponentKind]) -> Fixture {
        let backend = Arc::new(LoggingWidgetBackend::new());
        let factory = Arc::new(ComponentFactory::new(backend.clone()));
        let registry = Arc::new(MonitorRegistry::new());
        let manager = Arc::new(MonitorManager::new(registry, factory, kinds.to_vec()));
        Fixture { backend, manager }
    }

    fn id(name: &str) -> MonitorId {
        MonitorId::new(name)
    }

    fn geometry() -> Geometry {
        Geometry::new(0, 0, 1920, 1080)
    }

    fn live_set(manager: &MonitorManager) -> HashSet<(MonitorId, ComponentKind)> {
        manager.live_instances().iter().map(|inst| inst.key()).collect()
    }

    #[tokio::test]
    async fn test_attach_creates_all_kinds_in_order() {
        let f = fixture(&ComponentKind::ALL);
        let report = f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;

        assert!(report.is_clean());
        assert_eq!(report.created, ComponentKind::ALL.to_vec());

        let kinds: Vec<ComponentKind> =
            f.manager.instances_of(&id("DP-1")).iter().map(|i| i.kind).collect();
        assert_eq!(kinds, ComponentKind::ALL.to_vec());
        assert!(f
            .manager
            .instances_of(&id("DP-1"))
            .iter()
            .all(|i| i.state == ComponentState::Active));
    }

    #[tokio::test]
    async fn test_live_set_matches_attached_times_enabled() {
        let kinds = [ComponentKind::Bar, ComponentKind::Notification];
        let f = fixture(&kinds);

        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;
        f.manager.on_monitor_attached(&id("DP-2"), geometry()).await;
        f.manager.on_monitor_attached(&id("HDMI-A-1"), geometry()).await;
        f.manager.on_monitor_detached(&id("DP-2")).await.unwrap();
        f.manager.on_monitor_detached(&id("unknown")).await.unwrap();
        assert!(!f.manager.locks.contains_key(&id("unknown")));
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;

        let expected: HashSet<(MonitorId, ComponentKind)> = f
            .manager
            .registry()
            .list_attached()
            .into_iter()
            .flat_map(|m| kinds.iter().map(move |k| (m.clone(), *k)))
            .collect();
        assert_eq!(live_set(&f.manager), expected);
        assert_eq!(f.backend.live_count(), expected.len());
    }

    #[tokio::test]
    async fn test_detach_removes_everything_despite_failure() {
        let f = fixture(&ComponentKind::ALL);
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;
        f.backend.fail_teardown(ComponentKind::Dock);

        let err = f.manager.on_monitor_detached(&id("DP-1")).await.unwrap_err();
        match err {
            ShellError::Teardown { monitor, failures } => {
                assert_eq!(monitor, id("DP-1"));
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("dock"));
            }
            other => panic!("неожиданная ошибка: {other}"),
        }

        assert!(f.manager.instances_of(&id("DP-1")).is_empty());
        assert!(f.manager.registry().get(&id("DP-1")).is_none());
        assert!(!f.manager.locks.contains_key(&id("DP-1")));
        assert_eq!(f.backend.live_count(), 0);
    }

    #[tokio::test]
    async fn test_reattach_creates_fresh_instances() {
        let f = fixture(&[ComponentKind::Bar]);
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;
        let old = f.manager.instance(&id("DP-1"), ComponentKind::Bar).unwrap();

        f.manager.on_monitor_detached(&id("DP-1")).await.unwrap();
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;
        let new = f.manager.instance(&id("DP-1"), ComponentKind::Bar).unwrap();

        assert_ne!(old.id, new.id);
        assert_ne!(old.handle, new.handle);
    }

    #[tokio::test]
    async fn test_partial_failure_retried_on_next_reconcile() {
        let f = fixture(&ComponentKind::ALL);
        f.backend.fail_construct(ComponentKind::Corners);

        let report = f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.created.len(), 4);

        f.backend.clear_failures();
        let report = f.manager.reconcile(&id("DP-1")).await;
        assert_eq!(report.created, vec![ComponentKind::Corners]);
        assert_eq!(f.manager.instances_of(&id("DP-1")).len(), 5);
    }

    #[tokio::test]
    async fn test_reconcile_after_reload_drops_disabled_kinds() {
        let f = fixture(&ComponentKind::ALL);
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;

        f.manager.set_enabled_kinds(vec![ComponentKind::Dashboard, ComponentKind::Bar]);
        let report = f.manager.reconcile(&id("DP-1")).await;

        assert_eq!(
            report.removed,
            vec![ComponentKind::Notification, ComponentKind::Corners, ComponentKind::Dock]
        );
        assert!(report.created.is_empty());
        assert_eq!(f.backend.live_count(), 2);
    }

    #[tokio::test]
    async fn test_reconcile_on_detached_monitor_is_aborted() {
        let f = fixture(&ComponentKind::ALL);
        f.manager.register_attached(&id("DP-1"), geometry());
        f.manager.mark_detached(&id("DP-1"));

        let report = f.manager.reconcile(&id("DP-1")).await;
        assert!(report.aborted);
        assert!(report.created.is_empty());
        assert_eq!(f.backend.live_count(), 0);
    }

    #[tokio::test]
    async fn test_detach_waits_for_inflight_create() {
        let backend = Arc::new(
            LoggingWidgetBackend::new().with_construct_delay(std::time::Duration::from_millis(20)),
        );
        let factory = Arc::new(ComponentFactory::new(backend.clone()));
        let manager = Arc::new(MonitorManager::new(
            Arc::new(MonitorRegistry::new()),
            factory,
            ComponentKind::ALL.to_vec(),
        ));

        manager.register_attached(&id("DP-1"), geometry());
        let creating = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.reconcile(&id("DP-1")).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        manager.on_monitor_detached(&id("DP-1")).await.unwrap();
        let report = creating.await.unwrap();

        assert!(report.aborted);
        assert!(!report.created.is_empty());
        assert!(manager.live_instances().is_empty());
        assert_eq!(backend.live_count(), 0);
    }

    #[tokio::test]
    async fn test_instance_lookup_requires_attached_monitor() {
        let f = fixture(&[ComponentKind::Dashboard]);
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;

        assert!(f.manager.instance(&id("DP-1"), ComponentKind::Dashboard).is_some());
        assert!(f.manager.instance(&id("DP-1"), ComponentKind::Bar).is_none());

        f.manager.mark_detached(&id("DP-1"));
        assert!(f.manager.instance(&id("DP-1"), ComponentKind::Dashboard).is_none());
    }

    #[tokio::test]
    async fn test_lock_kept_for_reattached_monitor() {
        let f = fixture(&[ComponentKind::Bar]);
        f.manager.on_monitor_attached(&id("DP-1"), geometry()).await;

        f.manager.mark_detached(&id("DP-1"));
        f.manager.register_attached(&id("DP-1"), geometry());
        f.manager.teardown(&id("DP-1")).await.unwrap();

        assert!(f.manager.registry().is_attached(&id("DP-1")));
        assert!(f.manager.locks.contains_key(&id("DP-1")));
    }
}
