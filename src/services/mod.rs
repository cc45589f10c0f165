pub mod command_router;
pub mod component_factory;
pub mod compositor;
pub mod control_socket;
pub mod event_loop;
pub mod focus_tracker;
pub mod monitor_manager;
pub mod monitor_registry;
pub mod widget_backend;

pub use command_router::{build_bindings, CommandRouter};
pub use component_factory::ComponentFactory;
pub use compositor::create_compositor_source;
pub use control_socket::{send_request, ControlRequest, ControlServer};
pub use event_loop::{event_channel, EventLoop, ShellEvent};
pub use focus_tracker::FocusTracker;
pub use monitor_manager::MonitorManager;
pub use monitor_registry::MonitorRegistry;
pub use widget_backend::create_widget_backend;
