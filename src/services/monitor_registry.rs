use crate::events::{ConnectionState, Geometry, Monitor, MonitorId};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Результат регистрации монитора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Новый монитор
    Registered,
    /// Монитор уже подключён - обновлена геометрия
    Updated,
    /// Монитор был помечен отключённым и ещё ждал разбора
    Reattached,
}

/// MonitorRegistry хранит набор мониторов в порядке обнаружения.
///
/// Отключённый монитор остаётся в реестре (в состоянии `Detached`), пока
/// менеджер не разберёт все его компоненты и не вызовет `remove_if_detached`.
#[derive(Default)]
pub struct MonitorRegistry {
    monitors: RwLock<Vec<Monitor>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать монитор. Идемпотентно: повторный вызов только обновляет геометрию.
    pub fn on_monitor_attached(&self, id: &MonitorId, geometry: Geometry) -> AttachOutcome {
        let mut monitors = self.monitors.write();

        if let Some(pos) = monitors.iter().position(|m| &m.id == id) {
            if monitors[pos].is_attached() {
                if monitors[pos].geometry != geometry {
                    debug!("Монитор {}: геометрия {} -> {}", id, monitors[pos].geometry, geometry);
                    monitors[pos].geometry = geometry;
                }
                return AttachOutcome::Updated;
            }

            // Повторное подключение - это новое обнаружение, монитор уходит в конец порядка
            let mut monitor = monitors.remove(pos);
            monitor.state = ConnectionState::Attached;
            monitor.geometry = geometry;
            info!("Монитор переподключён: {}", monitor);
            monitors.push(monitor);
            return AttachOutcome::Reattached;
        }

        let monitor = Monitor {
            id: id.clone(),
            geometry,
            state: ConnectionState::Attached,
        };
        info!("Монитор подключён: {}", monitor);
        monitors.push(monitor);
        AttachOutcome::Registered
    }

    /// Пометить монитор отключённым. Неизвестный монитор - не ошибка, а no-op.
    pub fn on_monitor_detached(&self, id: &MonitorId) -> bool {
        let mut monitors = self.monitors.write();

        match monitors.iter_mut().find(|m| &m.id == id) {
            Some(monitor) if monitor.is_attached() => {
                monitor.state = ConnectionState::Detached;
                info!("Монитор отключён: {}", id);
                true
            }
            Some(_) => {
                debug!("Монитор {} уже помечен отключённым", id);
                false
            }
            None => {
                warn!("Отключение неизвестного монитора {} - игнорируем", id);
                false
            }
        }
    }

    /// Удалить запись, только если монитор всё ещё отключён
    pub fn remove_if_detached(&self, id: &MonitorId) -> bool {
        let mut monitors = self.monitors.write();
        let before = monitors.len();
        monitors.retain(|m| !(&m.id == id && !m.is_attached()));
        let removed = monitors.len() != before;
        if removed {
            debug!("Запись монитора {} удалена из реестра", id);
        }
        removed
    }

    /// Подключённые мониторы в порядке обнаружения
    pub fn list_attached(&self) -> Vec<MonitorId> {
        self.monitors
            .read()
            .iter()
            .filter(|m| m.is_attached())
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn first_attached(&self) -> Option<MonitorId> {
        self.monitors
            .read()
            .iter()
            .find(|m| m.is_attached())
            .map(|m| m.id.clone())
    }

    pub fn is_attached(&self, id: &MonitorId) -> bool {
        self.monitors
            .read()
            .iter()
            .any(|m| &m.id == id && m.is_attached())
    }

    pub fn get(&self, id: &MonitorId) -> Option<Monitor> {
        self.monitors.read().iter().find(|m| &m.id == id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Monitor> {
        self.monitors.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> MonitorId {
        MonitorId::new(name)
    }

    #[test]
    fn test_attach_is_idempotent_and_updates_geometry() {
        let registry = MonitorRegistry::new();
        let g1 = Geometry::new(0, 0, 1920, 1080);
        let g2 = Geometry::new(0, 0, 2560, 1440);

        assert_eq!(registry.on_monitor_attached(&id("DP-1"), g1), AttachOutcome::Registered);
        assert_eq!(registry.on_monitor_attached(&id("DP-1"), g2), AttachOutcome::Updated);

        assert_eq!(registry.list_attached(), vec![id("DP-1")]);
        assert_eq!(registry.get(&id("DP-1")).unwrap().geometry, g2);
    }

    #[test]
    fn test_list_attached_keeps_detection_order() {
        let registry = MonitorRegistry::new();
        for name in ["HDMI-A-1", "DP-1", "eDP-1"] {
            registry.on_monitor_attached(&id(name), Geometry::default());
        }
        registry.on_monitor_detached(&id("DP-1"));

        assert_eq!(registry.list_attached(), vec![id("HDMI-A-1"), id("eDP-1")]);
        assert_eq!(registry.list_attached(), registry.list_attached());
        assert_eq!(registry.first_attached(), Some(id("HDMI-A-1")));
    }

    #[test]
    fn test_detach_unknown_is_noop() {
        let registry = MonitorRegistry::new();
        assert!(!registry.on_monitor_detached(&id("ghost")));
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn test_detached_record_kept_until_removed() {
        let registry = MonitorRegistry::new();
        registry.on_monitor_attached(&id("DP-1"), Geometry::default());

        assert!(registry.on_monitor_detached(&id("DP-1")));
        assert!(!registry.is_attached(&id("DP-1")));
        assert_eq!(registry.get(&id("DP-1")).unwrap().state, ConnectionState::Detached);

        assert!(registry.remove_if_detached(&id("DP-1")));
        assert!(registry.get(&id("DP-1")).is_none());
    }

    #[test]
    fn test_reattach_before_removal_survives_cleanup() {
        let registry = MonitorRegistry::new();
        registry.on_monitor_attached(&id("DP-1"), Geometry::default());
        registry.on_monitor_attached(&id("DP-2"), Geometry::default());
        registry.on_monitor_detached(&id("DP-1"));

        assert_eq!(
            registry.on_monitor_attached(&id("DP-1"), Geometry::default()),
            AttachOutcome::Reattached
        );
        assert!(!registry.remove_if_detached(&id("DP-1")));
        assert_eq!(registry.list_attached(), vec![id("DP-2"), id("DP-1")]);
    }
}
