//! Фиксированная таблица построения виджетов.
//!
//! Каждый `ComponentKind` отображается на функцию, которая строит описание
//! layer-shell поверхности для конкретного монитора. Бэкенд отрисовки получает
//! только готовый `WidgetSpec`.

use crate::config::{BarPosition, NotificationPosition, PanelPosition};
use crate::events::{ComponentKind, Geometry, MonitorId};
use serde::Serialize;
use std::fmt;

/// Слой layer-shell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Top,
    Overlay,
}

/// Края монитора, к которым прикреплена поверхность
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Anchor {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
}

impl Anchor {
    const fn edges(top: bool, bottom: bool, left: bool, right: bool) -> Self {
        Self { top, bottom, left, right }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut edges = Vec::with_capacity(4);
        if self.top { edges.push("top"); }
        if self.bottom { edges.push("bottom"); }
        if self.left { edges.push("left"); }
        if self.right { edges.push("right"); }
        if edges.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", edges.join("+"))
        }
    }
}

/// Описание виджета, передаваемое бэкенду отрисовки
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetSpec {
    pub kind: ComponentKind,
    pub monitor: MonitorId,
    pub namespace: String,
    pub layer: Layer,
    pub anchor: Anchor,
    pub exclusive_zone: i32,
    pub width: u32,
    pub height: u32,
    pub keyboard_interactive: bool,
}

/// Расположение виджетов на мониторе, задаётся в `[components]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WidgetLayout {
    pub bar_position: BarPosition,
    pub centered_bar: bool,
    pub notification_position: NotificationPosition,
    pub panel_position: PanelPosition,
}

type SpecBuilder = fn(&MonitorId, Geometry, &WidgetLayout) -> WidgetSpec;

const BAR_THICKNESS: u32 = 40;
const CENTERED_BAR_LENGTH: u32 = 1200;
const DOCK_HEIGHT: u32 = 64;
const NOTIFICATION_WIDTH: u32 = 400;
const DASHBOARD_WIDTH: u32 = 960;
const DASHBOARD_HEIGHT: u32 = 600;

const CONSTRUCTORS: [(ComponentKind, SpecBuilder); 5] = [
    (ComponentKind::Bar, bar),
    (ComponentKind::Dock, dock),
    (ComponentKind::Corners, corners),
    (ComponentKind::Notification, notification),
    (ComponentKind::Dashboard, dashboard),
];

/// Построить описание виджета через таблицу; `None` - тип не поддерживается таблицей
pub fn build_spec(
    kind: ComponentKind,
    monitor: &MonitorId,
    geometry: Geometry,
    layout: &WidgetLayout,
) -> Option<WidgetSpec> {
    CONSTRUCTORS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, builder)| builder(monitor, geometry, layout))
}

fn base(kind: ComponentKind, monitor: &MonitorId) -> WidgetSpec {
    WidgetSpec {
        kind,
        monitor: monitor.clone(),
        namespace: format!("rz-shell-{}-{}", kind, monitor),
        layer: Layer::Top,
        anchor: Anchor::default(),
        exclusive_zone: 0,
        width: 0,
        height: 0,
        keyboard_interactive: false,
    }
}

fn bar(monitor: &MonitorId, geometry: Geometry, layout: &WidgetLayout) -> WidgetSpec {
    // Центрированный бар не растягивается вдоль своего края
    let stretch = !layout.centered_bar;
    let anchor = match layout.bar_position {
        BarPosition::Top => Anchor::edges(true, false, stretch, stretch),
        BarPosition::Bottom => Anchor::edges(false, true, stretch, stretch),
        BarPosition::Left => Anchor::edges(stretch, stretch, true, false),
        BarPosition::Right => Anchor::edges(stretch, stretch, false, true),
    };

    let span = if layout.bar_position.is_vertical() {
        geometry.height
    } else {
        geometry.width
    };
    let length = if stretch { span } else { span.min(CENTERED_BAR_LENGTH) };

    let (width, height) = if layout.bar_position.is_vertical() {
        (BAR_THICKNESS, length)
    } else {
        (length, BAR_THICKNESS)
    };

    WidgetSpec {
        anchor,
        exclusive_zone: BAR_THICKNESS as i32,
        width,
        height,
        ..base(ComponentKind::Bar, monitor)
    }
}

fn dock(monitor: &MonitorId, geometry: Geometry, _layout: &WidgetLayout) -> WidgetSpec {
    WidgetSpec {
        anchor: Anchor::edges(false, true, false, false),
        width: geometry.width.min(geometry.width / 2 + DOCK_HEIGHT),
        height: DOCK_HEIGHT,
        ..base(ComponentKind::Dock, monitor)
    }
}

fn corners(monitor: &MonitorId, geometry: Geometry, _layout: &WidgetLayout) -> WidgetSpec {
    WidgetSpec {
        layer: Layer::Overlay,
        anchor: Anchor::edges(true, true, true, true),
        exclusive_zone: -1,
        width: geometry.width,
        height: geometry.height,
        ..base(ComponentKind::Corners, monitor)
    }
}

fn notification(monitor: &MonitorId, geometry: Geometry, layout: &WidgetLayout) -> WidgetSpec {
    let anchor = match layout.notification_position {
        NotificationPosition::Top => Anchor::edges(true, false, false, false),
        NotificationPosition::Bottom => Anchor::edges(false, true, false, false),
        NotificationPosition::TopLeft => Anchor::edges(true, false, true, false),
        NotificationPosition::TopRight => Anchor::edges(true, false, false, true),
        NotificationPosition::BottomLeft => Anchor::edges(false, true, true, false),
        NotificationPosition::BottomRight => Anchor::edges(false, true, false, true),
    };

    WidgetSpec {
        layer: Layer::Overlay,
        anchor,
        width: NOTIFICATION_WIDTH.min(geometry.width),
        height: geometry.height / 2,
        ..base(ComponentKind::Notification, monitor)
    }
}

fn dashboard(monitor: &MonitorId, geometry: Geometry, layout: &WidgetLayout) -> WidgetSpec {
    let (anchor, width, height) = match layout.panel_position {
        PanelPosition::Top => (Anchor::edges(true, false, false, false), DASHBOARD_WIDTH, DASHBOARD_HEIGHT),
        PanelPosition::Bottom => (Anchor::edges(false, true, false, false), DASHBOARD_WIDTH, DASHBOARD_HEIGHT),
        // Боковая панель вытянута по вертикали
        PanelPosition::Start => (Anchor::edges(false, false, true, false), DASHBOARD_HEIGHT, DASHBOARD_WIDTH),
        PanelPosition::End => (Anchor::edges(false, false, false, true), DASHBOARD_HEIGHT, DASHBOARD_WIDTH),
    };

    WidgetSpec {
        anchor,
        width: width.min(geometry.width),
        height: height.min(geometry.height),
        keyboard_interactive: true,
        ..base(ComponentKind::Dashboard, monitor)
    }
}
