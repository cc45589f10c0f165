use serde::{Deserialize, Serialize};
use std::fmt;

/// Стабильный идентификатор монитора (имя выхода композитора, например "DP-1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonitorId(String);

impl MonitorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Геометрия монитора в логических координатах композитора
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Состояние подключения монитора
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Attached,
    Detached,
}

/// Запись реестра мониторов
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Monitor {
    pub id: MonitorId,
    pub geometry: Geometry,
    pub state: ConnectionState,
}

impl Monitor {
    pub fn is_attached(&self) -> bool {
        self.state == ConnectionState::Attached
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {:?}", self.id, self.geometry, self.state)
    }
}

/// Входящее событие от интеграции с композитором
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositorEvent {
    MonitorAttached { id: MonitorId, geometry: Geometry },
    MonitorDetached { id: MonitorId },
    FocusChanged { id: MonitorId },
}

impl CompositorEvent {
    pub fn attached(id: impl Into<String>, geometry: Geometry) -> Self {
        Self::MonitorAttached {
            id: MonitorId::new(id),
            geometry,
        }
    }

    pub fn detached(id: impl Into<String>) -> Self {
        Self::MonitorDetached {
            id: MonitorId::new(id),
        }
    }

    pub fn focus(id: impl Into<String>) -> Self {
        Self::FocusChanged {
            id: MonitorId::new(id),
        }
    }
}

impl fmt::Display for CompositorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MonitorAttached { id, geometry } => write!(f, "attached({}, {})", id, geometry),
            Self::MonitorDetached { id } => write!(f, "detached({})", id),
            Self::FocusChanged { id } => write!(f, "focus({})", id),
        }
    }
}
