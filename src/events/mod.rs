pub mod component;
pub mod monitor;

pub use component::{
    ComponentInstance, ComponentKind, ComponentState, InstanceId, InstanceKey, WidgetHandle,
};
pub use monitor::{CompositorEvent, ConnectionState, Geometry, Monitor, MonitorId};
