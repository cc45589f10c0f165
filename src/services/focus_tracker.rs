use crate::config::FocusFallback;
use crate::events::MonitorId;
use crate::services::monitor_registry::MonitorRegistry;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Состояние фокуса: до первого события фокуса монитора нет
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusState {
    Uninitialized,
    Focused(MonitorId),
}

/// Что произошло в ответ на событие фокуса
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusTransition {
    /// Событие про неизвестный или отключённый монитор
    Ignored,
    /// Фокус уже на этом мониторе - подписчики не уведомляются
    Unchanged,
    Changed { from: Option<MonitorId>, to: MonitorId },
    /// Монитор в фокусе отключился, фокус сброшен
    Cleared { from: MonitorId },
}

/// FocusTracker хранит монитор в фокусе и рассылает изменения через `watch`.
///
/// Изменять состояние может только сам трекер (по событиям композитора).
pub struct FocusTracker {
    registry: Arc<MonitorRegistry>,
    fallback: FocusFallback,
    state: watch::Sender<FocusState>,
}

impl FocusTracker {
    pub fn new(registry: Arc<MonitorRegistry>, fallback: FocusFallback) -> Self {
        info!("Инициализация FocusTracker (политика при отключении: {:?})", fallback);
        let (state, _) = watch::channel(FocusState::Uninitialized);
        Self {
            registry,
            fallback,
            state,
        }
    }

    pub fn on_focus_changed(&self, id: &MonitorId) -> FocusTransition {
        if !self.registry.is_attached(id) {
            warn!("Событие фокуса для неподключённого монитора {} - игнорируем", id);
            return FocusTransition::Ignored;
        }

        let mut previous = None;
        let changed = self.state.send_if_modified(|state| {
            if *state == FocusState::Focused(id.clone()) {
                return false;
            }
            if let FocusState::Focused(old) = state {
                previous = Some(old.clone());
            }
            *state = FocusState::Focused(id.clone());
            true
        });

        if changed {
            info!(
                "Фокус: {} -> {}",
                previous.as_ref().map(|m| m.as_str()).unwrap_or("none"),
                id
            );
            FocusTransition::Changed {
                from: previous,
                to: id.clone(),
            }
        } else {
            debug!("Фокус уже на мониторе {}", id);
            FocusTransition::Unchanged
        }
    }

    /// Вызывается после того, как реестр пометил монитор отключённым
    pub fn on_monitor_detached(&self, id: &MonitorId) -> FocusTransition {
        if *self.state.borrow() != FocusState::Focused(id.clone()) {
            return FocusTransition::Unchanged;
        }

        let next = match self.fallback {
            FocusFallback::RequireFreshEvent => None,
            FocusFallback::FirstAttached => self.registry.first_attached(),
        };

        match next {
            Some(next) => {
                info!("Монитор в фокусе {} отключён, фокус переходит на {}", id, next);
                self.state.send_replace(FocusState::Focused(next.clone()));
                FocusTransition::Changed {
                    from: Some(id.clone()),
                    to: next,
                }
            }
            None => {
                info!("Монитор в фокусе {} отключён, ждём новое событие фокуса", id);
                self.state.send_replace(FocusState::Uninitialized);
                FocusTransition::Cleared { from: id.clone() }
            }
        }
    }

    /// Текущий монитор в фокусе; никогда не возвращает отключённый монитор
    pub fn current(&self) -> Option<MonitorId> {
        match &*self.state.borrow() {
            FocusState::Focused(id) if self.registry.is_attached(id) => Some(id.clone()),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FocusState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Geometry;

    fn id(name: &str) -> MonitorId {
        MonitorId::new(name)
    }

    fn setup(fallback: FocusFallback) -> (Arc<MonitorRegistry>, FocusTracker) {
        let registry = Arc::new(MonitorRegistry::new());
        registry.on_monitor_attached(&id("DP-1"), Geometry::default());
        registry.on_monitor_attached(&id("DP-2"), Geometry::default());
        let tracker = FocusTracker::new(registry.clone(), fallback);
        (registry, tracker)
    }

    #[test]
    fn test_starts_uninitialized() {
        let (_, tracker) = setup(FocusFallback::RequireFreshEvent);
        assert_eq!(tracker.current(), None);
        assert_eq!(*tracker.subscribe().borrow(), FocusState::Uninitialized);
    }

    #[test]
    fn test_transitions() {
        let (_, tracker) = setup(FocusFallback::RequireFreshEvent);

        assert_eq!(
            tracker.on_focus_changed(&id("DP-1")),
            FocusTransition::Changed { from: None, to: id("DP-1") }
        );
        assert_eq!(tracker.on_focus_changed(&id("DP-1")), FocusTransition::Unchanged);
        assert_eq!(
            tracker.on_focus_changed(&id("DP-2")),
            FocusTransition::Changed { from: Some(id("DP-1")), to: id("DP-2") }
        );
        assert_eq!(tracker.current(), Some(id("DP-2")));
    }

    #[test]
    fn test_stale_focus_event_ignored() {
        let (registry, tracker) = setup(FocusFallback::RequireFreshEvent);
        tracker.on_focus_changed(&id("DP-1"));

        assert_eq!(tracker.on_focus_changed(&id("HDMI-A-9")), FocusTransition::Ignored);

        registry.on_monitor_detached(&id("DP-2"));
        assert_eq!(tracker.on_focus_changed(&id("DP-2")), FocusTransition::Ignored);
        assert_eq!(tracker.current(), Some(id("DP-1")));
    }

    #[tokio::test]
    async fn test_self_transition_does_not_notify() {
        let (_, tracker) = setup(FocusFallback::RequireFreshEvent);
        let mut rx = tracker.subscribe();

        tracker.on_focus_changed(&id("DP-1"));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        tracker.on_focus_changed(&id("DP-1"));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_detach_requires_fresh_event() {
        let (registry, tracker) = setup(FocusFallback::RequireFreshEvent);
        tracker.on_focus_changed(&id("DP-2"));

        registry.on_monitor_detached(&id("DP-2"));
        assert_eq!(tracker.current(), None);
        assert_eq!(
            tracker.on_monitor_detached(&id("DP-2")),
            FocusTransition::Cleared { from: id("DP-2") }
        );
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn test_detach_falls_back_to_first_attached() {
        let (registry, tracker) = setup(FocusFallback::FirstAttached);
        tracker.on_focus_changed(&id("DP-1"));

        registry.on_monitor_detached(&id("DP-1"));
        assert_eq!(
            tracker.on_monitor_detached(&id("DP-1")),
            FocusTransition::Changed { from: Some(id("DP-1")), to: id("DP-2") }
        );
        assert_eq!(tracker.current(), Some(id("DP-2")));
    }

    #[test]
    fn test_detach_of_unfocused_monitor_keeps_focus() {
        let (registry, tracker) = setup(FocusFallback::RequireFreshEvent);
        tracker.on_focus_changed(&id("DP-1"));

        registry.on_monitor_detached(&id("DP-2"));
        assert_eq!(tracker.on_monitor_detached(&id("DP-2")), FocusTransition::Unchanged);
        assert_eq!(tracker.current(), Some(id("DP-1")));
    }
}
