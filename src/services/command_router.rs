use crate::config::KeybindConfig;
use crate::error::{Result, ShellError};
use crate::events::{ComponentInstance, ComponentKind, InstanceId, MonitorId};
use crate::services::focus_tracker::FocusTracker;
use crate::services::monitor_manager::MonitorManager;
use crate::services::widget_backend::WidgetBackend;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Обработчик действия; вызывается против конкретного экземпляра компонента
#[async_trait::async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, instance: &ComponentInstance) -> Result<String>;

    /// Короткое описание для вывода таблицы привязок
    fn describe(&self) -> String;
}

/// Обработчик, передающий команду виджету через бэкенд отрисовки
pub struct WidgetCommandHandler {
    backend: Arc<dyn WidgetBackend>,
    command: String,
}

impl WidgetCommandHandler {
    pub fn new(backend: Arc<dyn WidgetBackend>, command: impl Into<String>) -> Self {
        Self {
            backend,
            command: command.into(),
        }
    }
}

#[async_trait::async_trait]
impl ActionHandler for WidgetCommandHandler {
    async fn handle(&self, instance: &ComponentInstance) -> Result<String> {
        self.backend.invoke(instance.handle, &self.command).await
    }

    fn describe(&self) -> String {
        self.command.clone()
    }
}

/// Привязка логического действия к типу компонента и обработчику.
/// Только для чтения после регистрации.
#[derive(Clone)]
pub struct CommandBinding {
    pub action: String,
    pub target_kind: ComponentKind,
    pub handler: Arc<dyn ActionHandler>,
}

impl fmt::Debug for CommandBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBinding")
            .field("action", &self.action)
            .field("target_kind", &self.target_kind)
            .field("handler", &self.handler.describe())
            .finish()
    }
}

/// Статическая таблица привязок по умолчанию: (действие, тип, команда виджету)
const DEFAULT_BINDINGS: &[(&str, ComponentKind, &str)] = &[
    ("toggle-launcher", ComponentKind::Dashboard, "launcher"),
    ("toggle-dashboard", ComponentKind::Dashboard, "dashboard"),
    ("toggle-overview", ComponentKind::Dashboard, "overview"),
    ("toggle-power", ComponentKind::Dashboard, "power"),
    ("toggle-tools", ComponentKind::Dashboard, "tools"),
    ("toggle-emoji", ComponentKind::Dashboard, "emoji"),
    ("toggle-wallpapers", ComponentKind::Dashboard, "wallpapers"),
    ("toggle-clipboard", ComponentKind::Dashboard, "cliphist"),
    ("toggle-dock", ComponentKind::Dock, "toggle"),
    ("toggle-bar", ComponentKind::Bar, "toggle"),
    ("clear-notifications", ComponentKind::Notification, "clear"),
];

/// Собрать таблицу привязок: значения по умолчанию, поверх - привязки из конфигурации
pub fn build_bindings(
    backend: Arc<dyn WidgetBackend>,
    keybinds: &[KeybindConfig],
) -> Result<Vec<CommandBinding>> {
    let mut bindings: Vec<CommandBinding> = DEFAULT_BINDINGS
        .iter()
        .map(|(action, kind, command)| CommandBinding {
            action: action.to_string(),
            target_kind: *kind,
            handler: Arc::new(WidgetCommandHandler::new(backend.clone(), *command)),
        })
        .collect();

    for keybind in keybinds {
        let binding = CommandBinding {
            action: keybind.action.clone(),
            target_kind: keybind.kind.parse()?,
            handler: Arc::new(WidgetCommandHandler::new(backend.clone(), keybind.command.clone())),
        };
        match bindings.iter_mut().find(|b| b.action == binding.action) {
            Some(existing) => {
                debug!("Привязка {} переопределена конфигурацией", binding.action);
                *existing = binding;
            }
            None => bindings.push(binding),
        }
    }

    Ok(bindings)
}

/// Результат успешной маршрутизации
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub action: String,
    pub monitor: MonitorId,
    pub kind: ComponentKind,
    pub instance: InstanceId,
    pub output: String,
}

/// CommandRouter направляет действие экземпляру компонента на мониторе в фокусе.
///
/// Сам маршрутизатор побочных эффектов не имеет: всё делает обработчик.
pub struct CommandRouter {
    bindings: HashMap<String, CommandBinding>,
    focus: Arc<FocusTracker>,
    manager: Arc<MonitorManager>,
}

impl CommandRouter {
    pub fn new(
        bindings: Vec<CommandBinding>,
        focus: Arc<FocusTracker>,
        manager: Arc<MonitorManager>,
    ) -> Self {
        info!("Зарегистрировано {} привязок действий", bindings.len());
        Self {
            bindings: bindings
                .into_iter()
                .map(|binding| (binding.action.clone(), binding))
                .collect(),
            focus,
            manager,
        }
    }

    /// Найти экземпляр, который должен получить действие
    pub fn resolve(&self, action: &str) -> Result<(&CommandBinding, ComponentInstance)> {
        let binding = self
            .bindings
            .get(action)
            .ok_or_else(|| ShellError::UnknownAction(action.to_string()))?;

        let monitor = self.focus.current().ok_or(ShellError::NoFocusedMonitor)?;

        let instance = self
            .manager
            .instance(&monitor, binding.target_kind)
            .ok_or(ShellError::ComponentNotReady {
                monitor,
                kind: binding.target_kind,
            })?;

        Ok((binding, instance))
    }

    pub async fn dispatch(&self, action: &str) -> Result<DispatchOutcome> {
        let (binding, instance) = self.resolve(action)?;
        debug!("Действие {} -> {}", action, instance);

        let output = binding.handler.handle(&instance).await?;
        info!("Действие {} выполнено на {}@{}", action, instance.kind, instance.monitor);

        Ok(DispatchOutcome {
            action: action.to_string(),
            monitor: instance.monitor,
            kind: instance.kind,
            instance: instance.id,
            output,
        })
    }

    /// Привязки, отсортированные по имени действия
    pub fn bindings(&self) -> Vec<&CommandBinding> {
        let mut bindings: Vec<&CommandBinding> = self.bindings.values().collect();
        bindings.sort_by(|a, b| a.action.cmp(&b.action));
        bindings
    }
}
