use crate::events::{ComponentKind, MonitorId};
use crate::services::component_factory::WidgetLayout;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub components: ComponentsConfig,
    #[serde(default)]
    pub compositor: CompositorConfig,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub keybinds: Vec<KeybindConfig>,
    // Разобранные типы компонентов - не сериализуются, строятся после загрузки
    #[serde(skip)]
    enabled_kinds: Vec<ComponentKind>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ComponentsConfig {
    pub enabled: Vec<String>,
    #[serde(default)]
    pub selected_monitors: Vec<String>,
    pub bar_position: BarPosition,
    /// Бар по центру края, а не во всю его длину
    pub centered_bar: bool,
    pub notification_position: NotificationPosition,
    /// Положение дашборда (панели)
    pub panel_position: PanelPosition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BarPosition {
    #[default]
    Top,
    Bottom,
    Left,
    Right,
}

impl BarPosition {
    pub fn is_vertical(self) -> bool {
        matches!(self, BarPosition::Left | BarPosition::Right)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationPosition {
    Top,
    Bottom,
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PanelPosition {
    #[default]
    Top,
    Bottom,
    Start,
    End,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositorConfig {
    pub backend: String,
    pub polling_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RendererConfig {
    pub mode: String,
    #[serde(default)]
    pub command: Option<String>,
    /// Сколько ждать ответа внешнего рендера на одну операцию
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusFallback {
    /// После отключения монитора в фокусе ждём новое событие фокуса
    RequireFreshEvent,
    /// Переводим фокус на первый подключённый монитор
    FirstAttached,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FocusConfig {
    pub fallback: FocusFallback,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct KeybindConfig {
    pub action: String,
    pub kind: String,
    pub command: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            enabled: ComponentKind::ALL.iter().map(|k| k.as_str().to_string()).collect(),
            selected_monitors: Vec::new(),
            bar_position: BarPosition::default(),
            centered_bar: false,
            notification_position: NotificationPosition::default(),
            panel_position: PanelPosition::default(),
        }
    }
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            backend: "auto".to_string(),
            polling_interval_ms: 500,
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mode: "log".to_string(),
            command: None,
            timeout_ms: 5000,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            fallback: FocusFallback::RequireFreshEvent,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            logging: LoggingConfig::default(),
            components: ComponentsConfig::default(),
            compositor: CompositorConfig::default(),
            renderer: RendererConfig::default(),
            focus: FocusConfig::default(),
            control: ControlConfig::default(),
            notifications: NotificationsConfig::default(),
            keybinds: Vec::new(),
            enabled_kinds: Vec::new(),
        };
        config.enabled_kinds = ComponentKind::ALL.to_vec();
        config
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("RZ_SHELL_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.build_enabled_kinds()?;

        Ok(config)
    }

    /// Разбирает `components.enabled` в типы компонентов в каноническом порядке создания.
    /// Неизвестный тип - ошибка конфигурации, фатальная при запуске.
    pub fn build_enabled_kinds(&mut self) -> Result<()> {
        let mut kinds = ComponentKind::parse_list(&self.components.enabled)
            .context("Неверный список components.enabled")?;
        kinds.sort_by_key(|kind| kind.order());
        self.enabled_kinds = kinds;
        Ok(())
    }

    /// Какие компоненты создавать на каждом мониторе
    pub fn enabled_kinds(&self) -> &[ComponentKind] {
        &self.enabled_kinds
    }

    /// Пустой список `selected_monitors` означает "все мониторы"
    pub fn is_monitor_selected(&self, id: &MonitorId) -> bool {
        self.components.selected_monitors.is_empty()
            || self
                .components
                .selected_monitors
                .iter()
                .any(|selected| selected == id.as_str())
    }

    /// Расположение виджетов для таблицы построения
    pub fn widget_layout(&self) -> WidgetLayout {
        WidgetLayout {
            bar_position: self.components.bar_position,
            centered_bar: self.components.centered_bar,
            notification_position: self.components.notification_position,
            panel_position: self.components.panel_position,
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        if let Some(path) = &self.control.socket_path {
            return path.clone();
        }
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(runtime_dir).join("rz-shell.sock")
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.components.enabled.is_empty() {
            anyhow::bail!("components.enabled не может быть пустым");
        }

        // Валидация настроек композитора
        match self.compositor.backend.as_str() {
            "auto" | "hyprland" | "sway" | "dry_run" => {}
            _ => anyhow::bail!("Неверный бэкенд композитора: {}", self.compositor.backend),
        }

        if self.compositor.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        // Валидация бэкенда отрисовки
        match self.renderer.mode.as_str() {
            "log" => {}
            "exec" => {
                if self.renderer.command.as_deref().map_or(true, str::is_empty) {
                    anyhow::bail!("renderer.command обязателен для режима exec");
                }
            }
            _ => anyhow::bail!("Неверный режим отрисовки: {}", self.renderer.mode),
        }

        if self.renderer.timeout_ms < 100 {
            anyhow::bail!("renderer.timeout_ms должно быть минимум 100");
        }

        // Вертикальный бар и боковая панель не могут занимать один край
        match (self.components.bar_position, self.components.panel_position) {
            (BarPosition::Left, PanelPosition::Start) | (BarPosition::Right, PanelPosition::End) => {
                anyhow::bail!(
                    "panel_position {:?} совпадает с краем бара {:?}",
                    self.components.panel_position,
                    self.components.bar_position
                );
            }
            _ => {}
        }

        // Валидация привязок
        for (i, keybind) in self.keybinds.iter().enumerate() {
            if keybind.action.is_empty() {
                anyhow::bail!("Пустое имя действия в привязке #{}", i + 1);
            }
            if keybind.kind.parse::<ComponentKind>().is_err() {
                anyhow::bail!("Неверный тип компонента '{}' в привязке #{}", keybind.kind, i + 1);
            }
            if keybind.command.is_empty() {
                anyhow::bail!("Пустая команда в привязке #{}", i + 1);
            }
        }

        Ok(())
    }
}
