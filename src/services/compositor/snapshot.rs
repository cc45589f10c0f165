use crate::events::{CompositorEvent, Geometry, MonitorId};

/// Состояние одного выхода композитора в момент опроса
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub id: MonitorId,
    pub geometry: Geometry,
    pub focused: bool,
}

/// Превращает последовательные снимки выходов в события подключения/отключения/фокуса
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    known: Vec<MonitorSnapshot>,
    focused: Option<MonitorId>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// События идут в порядке: отключения, подключения (и смена геометрии), фокус
    pub fn diff(&mut self, current: Vec<MonitorSnapshot>) -> Vec<CompositorEvent> {
        let mut events = Vec::new();

        for old in &self.known {
            if !current.iter().any(|m| m.id == old.id) {
                events.push(CompositorEvent::MonitorDetached { id: old.id.clone() });
            }
        }

        for monitor in &current {
            let changed = match self.known.iter().find(|m| m.id == monitor.id) {
                Some(old) => old.geometry != monitor.geometry,
                None => true,
            };
            if changed {
                events.push(CompositorEvent::MonitorAttached {
                    id: monitor.id.clone(),
                    geometry: monitor.geometry,
                });
            }
        }

        let focused = current.iter().find(|m| m.focused).map(|m| m.id.clone());
        if focused != self.focused {
            if let Some(id) = &focused {
                events.push(CompositorEvent::FocusChanged { id: id.clone() });
            }
        }

        self.focused = focused;
        self.known = current;
        events
    }
}
