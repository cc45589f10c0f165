use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::Result;
use crate::events::{ComponentKind, CompositorEvent, MonitorId};
use crate::services::focus_tracker::FocusTracker;
use crate::services::monitor_manager::MonitorManager;
use crate::services::monitor_registry::AttachOutcome;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Сообщения, которые обрабатывает EventLoop
#[derive(Debug)]
pub enum ShellEvent {
    Compositor(CompositorEvent),
    /// Перечитанный список включённых типов компонентов
    Reload(Vec<ComponentKind>),
    /// Ответить, когда все уже поставленные в очередь операции мониторов завершатся
    Settle(oneshot::Sender<()>),
    Shutdown,
}

/// Операция жизненного цикла в очереди конкретного монитора
#[derive(Debug)]
enum LifecycleOp {
    Reconcile,
    Teardown,
    Barrier(oneshot::Sender<()>),
}

struct MonitorWorker {
    queue: mpsc::UnboundedSender<LifecycleOp>,
    handle: JoinHandle<()>,
}

pub fn event_channel() -> (mpsc::Sender<ShellEvent>, mpsc::Receiver<ShellEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// EventLoop - единственный потребитель событий композитора.
///
/// Изменения реестра и фокуса делаются прямо в цикле (они дешёвые), а создание
/// и разбор компонентов уходят в очередь воркера монитора. Так операции над
/// одним монитором строго упорядочены, разные мониторы обрабатываются
/// параллельно, а входящий канал никогда не блокируется построением виджетов.
pub struct EventLoop {
    config: Arc<Config>,
    manager: Arc<MonitorManager>,
    focus: Arc<FocusTracker>,
    events: mpsc::Receiver<ShellEvent>,
    /// Один воркер на id монитора до конца работы цикла: после отключения
    /// воркер остаётся, поэтому два воркера одного монитора не работают одновременно
    workers: HashMap<MonitorId, MonitorWorker>,
}

impl EventLoop {
    pub fn new(
        config: Arc<Config>,
        manager: Arc<MonitorManager>,
        focus: Arc<FocusTracker>,
        events: mpsc::Receiver<ShellEvent>,
    ) -> Self {
        Self {
            config,
            manager,
            focus,
            events,
            workers: HashMap::new(),
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("EventLoop запущен");

        while let Some(event) = self.events.recv().await {
            match event {
                ShellEvent::Compositor(event) => self.handle_compositor_event(event),
                ShellEvent::Reload(kinds) => self.handle_reload(kinds),
                ShellEvent::Settle(done) => self.handle_settle(done),
                ShellEvent::Shutdown => {
                    info!("EventLoop получил команду завершения");
                    break;
                }
            }
        }

        // Закрываем очереди: воркеры доделают уже поставленные операции и выйдут
        let workers: Vec<(MonitorId, MonitorWorker)> = self.workers.drain().collect();
        for (id, worker) in workers {
            drop(worker.queue);
            if let Err(e) = worker.handle.await {
                error!("Воркер монитора {} завершился аварийно: {}", id, e);
            }
        }

        self.manager.shutdown().await;
        info!("EventLoop завершён");
        Ok(())
    }

    fn handle_compositor_event(&mut self, event: CompositorEvent) {
        debug_if_enabled!("Событие композитора: {}", event);

        match event {
            CompositorEvent::MonitorAttached { id, geometry } => {
                if !self.config.is_monitor_selected(&id) {
                    debug!("Монитор {} не входит в selected_monitors - пропускаем", id);
                    return;
                }
                let outcome = self.manager.register_attached(&id, geometry);
                if outcome == AttachOutcome::Updated {
                    debug!("Монитор {} уже подключён, докручиваем недостающие компоненты", id);
                }
                self.enqueue(&id, LifecycleOp::Reconcile);
            }
            CompositorEvent::MonitorDetached { id } => {
                if self.manager.mark_detached(&id) {
                    self.focus.on_monitor_detached(&id);
                    self.enqueue(&id, LifecycleOp::Teardown);
                }
            }
            CompositorEvent::FocusChanged { id } => {
                self.focus.on_focus_changed(&id);
            }
        }
    }

    fn handle_reload(&mut self, kinds: Vec<ComponentKind>) {
        self.manager.set_enabled_kinds(kinds);
        for id in self.manager.registry().list_attached() {
            self.enqueue(&id, LifecycleOp::Reconcile);
        }
    }

    fn handle_settle(&mut self, done: oneshot::Sender<()>) {
        let barriers: Vec<oneshot::Receiver<()>> = self
            .workers
            .values()
            .filter_map(|worker| {
                let (tx, rx) = oneshot::channel();
                worker.queue.send(LifecycleOp::Barrier(tx)).ok().map(|_| rx)
            })
            .collect();

        // Ждём в отдельной задаче, чтобы не блокировать входящие события
        tokio::spawn(async move {
            for barrier in barriers {
                let _ = barrier.await;
            }
            let _ = done.send(());
        });
    }

    fn enqueue(&mut self, id: &MonitorId, op: LifecycleOp) {
        let worker = self
            .workers
            .entry(id.clone())
            .or_insert_with(|| Self::spawn_worker(id.clone(), self.manager.clone()));

        if worker.queue.send(op).is_err() {
            warn!("Очередь монитора {} закрыта - операция потеряна", id);
        }
    }

    fn spawn_worker(id: MonitorId, manager: Arc<MonitorManager>) -> MonitorWorker {
        let (queue, ops) = mpsc::unbounded_channel();
        debug!("Запуск воркера монитора {}", id);
        let handle = tokio::spawn(Self::run_worker(id, manager, ops));
        MonitorWorker { queue, handle }
    }

    async fn run_worker(
        id: MonitorId,
        manager: Arc<MonitorManager>,
        mut ops: mpsc::UnboundedReceiver<LifecycleOp>,
    ) {
        while let Some(op) = ops.recv().await {
            match op {
                LifecycleOp::Reconcile => {
                    let report = manager.reconcile(&id).await;
                    if !report.failed.is_empty() {
                        warn!("Монитор {}: не созданы {:?}", id, report.failed);
                    } else if !report.is_clean() {
                        debug!("Монитор {}: создание прервано отключением", id);
                    }
                }
                LifecycleOp::Teardown => {
                    if let Err(e) = manager.teardown(&id).await {
                        error!("{}", e);
                    }
                }
                LifecycleOp::Barrier(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Воркер монитора {} завершён", id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FocusFallback;
    use crate::events::Geometry;
    use crate::services::component_factory::ComponentFactory;
    use crate::services::monitor_registry::MonitorRegistry;
    use crate::services::widget_backend::LoggingWidgetBackend;
    use std::collections::HashSet;
    use std::time::Duration;

    struct Harness {
        backend: Arc<LoggingWidgetBackend>,
        manager: Arc<MonitorManager>,
        focus: Arc<FocusTracker>,
        tx: mpsc::Sender<ShellEvent>,
        handle: JoinHandle<Result<()>>,
    }

    fn harness(config: Config, delay: Duration) -> Harness {
        let backend = Arc::new(LoggingWidgetBackend::new().with_construct_delay(delay));
        let registry = Arc::new(MonitorRegistry::new());
        let factory = Arc::new(ComponentFactory::new(backend.clone()));
        let manager = Arc::new(MonitorManager::new(
            registry.clone(),
            factory,
            config.enabled_kinds().to_vec(),
        ));
        let focus = Arc::new(FocusTracker::new(registry, FocusFallback::RequireFreshEvent));
        let (tx, rx) = event_channel();
        let event_loop = EventLoop::new(Arc::new(config), manager.clone(), focus.clone(), rx);
        let handle = tokio::spawn(event_loop.run());
        Harness {
            backend,
            manager,
            focus,
            tx,
            handle,
        }
    }

    impl Harness {
        async fn send(&self, event: CompositorEvent) {
            self.tx.send(ShellEvent::Compositor(event)).await.unwrap();
        }

        async fn settle(&self) {
            let (done, wait) = oneshot::channel();
            self.tx.send(ShellEvent::Settle(done)).await.unwrap();
            wait.await.unwrap();
        }

        fn live(&self) -> HashSet<(MonitorId, ComponentKind)> {
            self.manager.live_instances().iter().map(|i| i.key()).collect()
        }

        fn expected(&self) -> HashSet<(MonitorId, ComponentKind)> {
            let kinds = self.manager.enabled_kinds();
            self.manager
                .registry()
                .list_attached()
                .into_iter()
                .flat_map(|m| kinds.iter().map(move |k| (m.clone(), *k)).collect::<Vec<_>>())
                .collect()
        }
    }

    fn geometry() -> Geometry {
        Geometry::new(0, 0, 1920, 1080)
    }

    #[tokio::test]
    async fn test_settled_state_matches_attached_times_enabled() {
        let h = harness(Config::default(), Duration::from_millis(2));

        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        h.send(CompositorEvent::attached("DP-2", geometry())).await;
        h.send(CompositorEvent::detached("DP-1")).await;
        h.send(CompositorEvent::attached("HDMI-A-1", geometry())).await;
        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        h.send(CompositorEvent::detached("DP-2")).await;
        h.send(CompositorEvent::detached("never-seen")).await;
        h.settle().await;

        assert_eq!(h.live(), h.expected());
        assert_eq!(h.live().len(), 10);
        assert_eq!(h.backend.live_count(), 10);
    }

    #[tokio::test]
    async fn test_detach_during_create_leaves_nothing_behind() {
        let h = harness(Config::default(), Duration::from_millis(10));

        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        h.send(CompositorEvent::detached("DP-1")).await;
        h.settle().await;

        assert!(h.live().is_empty());
        assert_eq!(h.backend.live_count(), 0);
        assert!(h.manager.registry().get(&MonitorId::new("DP-1")).is_none());
    }

    #[tokio::test]
    async fn test_stale_focus_after_detach_is_ignored() {
        let h = harness(Config::default(), Duration::ZERO);

        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        h.send(CompositorEvent::attached("DP-2", geometry())).await;
        h.send(CompositorEvent::focus("DP-2")).await;
        h.send(CompositorEvent::detached("DP-2")).await;
        h.send(CompositorEvent::focus("DP-2")).await;
        h.settle().await;

        assert_eq!(h.focus.current(), None);
    }

    #[tokio::test]
    async fn test_unselected_monitors_are_ignored() {
        let mut config = Config::default();
        config.components.selected_monitors = vec!["DP-1".to_string()];
        let h = harness(config, Duration::ZERO);

        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        h.send(CompositorEvent::attached("HDMI-A-1", geometry())).await;
        h.settle().await;

        assert_eq!(h.manager.registry().list_attached(), vec![MonitorId::new("DP-1")]);
        assert_eq!(h.live().len(), ComponentKind::ALL.len());
    }

    #[tokio::test]
    async fn test_reload_reconciles_every_monitor() {
        let h = harness(Config::default(), Duration::ZERO);

        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        h.send(CompositorEvent::attached("DP-2", geometry())).await;
        h.tx
            .send(ShellEvent::Reload(vec![ComponentKind::Bar, ComponentKind::Dashboard]))
            .await
            .unwrap();
        h.settle().await;

        assert_eq!(h.live(), h.expected());
        assert_eq!(h.live().len(), 4);
    }

    #[tokio::test]
    async fn test_shutdown_tears_everything_down() {
        let h = harness(Config::default(), Duration::ZERO);

        h.send(CompositorEvent::attached("DP-1", geometry())).await;
        h.send(CompositorEvent::attached("DP-2", geometry())).await;
        h.tx.send(ShellEvent::Shutdown).await.unwrap();
        h.handle.await.unwrap().unwrap();

        assert!(h.manager.live_instances().is_empty());
        assert_eq!(h.backend.live_count(), 0);
    }
}
