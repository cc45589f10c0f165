use crate::error::ShellError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::MonitorId;

/// Фиксированный набор типов компонентов оболочки.
///
/// Порядок вариантов в `ComponentKind::ALL` является каноническим порядком
/// создания; разбор выполняется в обратном порядке.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Bar,
    Dock,
    Corners,
    Notification,
    Dashboard,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 5] = [
        ComponentKind::Bar,
        ComponentKind::Dock,
        ComponentKind::Corners,
        ComponentKind::Notification,
        ComponentKind::Dashboard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Bar => "bar",
            ComponentKind::Dock => "dock",
            ComponentKind::Corners => "corners",
            ComponentKind::Notification => "notification",
            ComponentKind::Dashboard => "dashboard",
        }
    }

    /// Позиция в каноническом порядке создания
    pub fn order(&self) -> usize {
        *self as usize
    }

    /// Разобрать список имён, сохранив порядок и убрав повторы
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<ComponentKind>, ShellError> {
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            let kind: ComponentKind = name.as_ref().parse()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        Ok(kinds)
    }
}

impl FromStr for ComponentKind {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bar" => Ok(ComponentKind::Bar),
            "dock" => Ok(ComponentKind::Dock),
            "corners" => Ok(ComponentKind::Corners),
            "notification" | "notifications" => Ok(ComponentKind::Notification),
            "dashboard" => Ok(ComponentKind::Dashboard),
            _ => Err(ShellError::InvalidKind(s.to_string())),
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Состояние жизненного цикла экземпляра компонента
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    Created,
    Active,
    Destroyed,
}

/// Уникальный номер экземпляра; никогда не переиспользуется
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Непрозрачный дескриптор виджета, выданный бэкендом отрисовки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetHandle(pub u64);

impl fmt::Display for WidgetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "widget:{}", self.0)
    }
}

/// Ключ уникальности: не более одного живого экземпляра на пару (монитор, тип)
pub type InstanceKey = (MonitorId, ComponentKind);

/// Экземпляр компонента, привязанный ровно к одному монитору
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInstance {
    pub id: InstanceId,
    pub monitor: MonitorId,
    pub kind: ComponentKind,
    pub handle: WidgetHandle,
    pub state: ComponentState,
}

impl ComponentInstance {
    pub fn key(&self) -> InstanceKey {
        (self.monitor.clone(), self.kind)
    }

    pub fn is_live(&self) -> bool {
        self.state != ComponentState::Destroyed
    }
}

impl fmt::Display for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {} ({:?})", self.kind, self.monitor, self.id, self.state)
    }
}
