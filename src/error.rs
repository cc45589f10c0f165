use crate::events::{ComponentKind, MonitorId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Неподдерживаемый тип компонента: {0}")]
    InvalidKind(String),

    #[error("Компонент {kind} уже существует на мониторе {monitor}")]
    DuplicateInstance { monitor: MonitorId, kind: ComponentKind },

    #[error("Неизвестное действие: {0}")]
    UnknownAction(String),

    #[error("Нет монитора в фокусе")]
    NoFocusedMonitor,

    #[error("Компонент {kind} на мониторе {monitor} ещё не готов")]
    ComponentNotReady { monitor: MonitorId, kind: ComponentKind },

    #[error("Ошибки при разборе компонентов монитора {monitor}: {}", .failures.join("; "))]
    Teardown { monitor: MonitorId, failures: Vec<String> },

    #[error("Ошибка виджета: {0}")]
    Widget(String),

    #[error("Ошибка композитора: {0}")]
    Compositor(String),

    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ошибка D-Bus: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Ошибка разбора JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Канал закрыт: {0}")]
    Channel(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),

    /// Ошибка, которую вернула запущенная оболочка по управляющему сокету
    #[error("{code}: {message}")]
    Remote { code: String, message: String },
}

impl ShellError {
    /// Ошибки, которые пользователь может вызвать сам (нажатием клавиши).
    /// Они сообщаются вызывающему и никогда не роняют процесс.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ShellError::UnknownAction(_)
                | ShellError::NoFocusedMonitor
                | ShellError::ComponentNotReady { .. }
        )
    }

    /// Короткий машиночитаемый код ошибки для ответа по управляющему сокету
    pub fn code(&self) -> &'static str {
        match self {
            ShellError::InvalidKind(_) => "invalid_kind",
            ShellError::DuplicateInstance { .. } => "duplicate_instance",
            ShellError::UnknownAction(_) => "unknown_action",
            ShellError::NoFocusedMonitor => "no_focused_monitor",
            ShellError::ComponentNotReady { .. } => "component_not_ready",
            ShellError::Teardown { .. } => "teardown",
            ShellError::Widget(_) => "widget",
            ShellError::Compositor(_) => "compositor",
            ShellError::Config(_) => "config",
            ShellError::Io(_) => "io",
            ShellError::DBus(_) => "dbus",
            ShellError::Json(_) => "json",
            ShellError::Channel(_) => "channel",
            ShellError::Internal(_) => "internal",
            ShellError::Remote { .. } => "remote",
        }
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;

// Удобные макросы для создания ошибок
#[macro_export]
macro_rules! shell_error {
    (widget, $($arg:tt)*) => {
        $crate::error::ShellError::Widget(format!($($arg)*))
    };
    (compositor, $($arg:tt)*) => {
        $crate::error::ShellError::Compositor(format!($($arg)*))
    };
    (channel, $($arg:tt)*) => {
        $crate::error::ShellError::Channel(format!($($arg)*))
    };
    (internal, $($arg:tt)*) => {
        $crate::error::ShellError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ShellError::NoFocusedMonitor.is_transient());
        assert!(ShellError::UnknownAction("x".to_string()).is_transient());
        assert!(ShellError::ComponentNotReady {
            monitor: MonitorId::new("DP-1"),
            kind: ComponentKind::Bar,
        }
        .is_transient());
        assert!(!ShellError::InvalidKind("panel".to_string()).is_transient());
    }

    #[test]
    fn test_teardown_message_lists_failures() {
        let err = ShellError::Teardown {
            monitor: MonitorId::new("HDMI-A-1"),
            failures: vec!["dock: busy".to_string(), "bar: gone".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("HDMI-A-1"));
        assert!(message.contains("dock: busy; bar: gone"));
        assert_eq!(err.code(), "teardown");
    }
}
