//! Compositor integration: responsibility and boundaries
//!
//! This module and its submodules are responsible ONLY for observing the
//! compositor (outputs and the focused output) and emitting CompositorEvent(s)
//! into the shell event channel. They MUST NOT create components or route
//! actions: all lifecycle decisions are made by the EventLoop and MonitorManager.

mod dry_run;
mod hyprland;
mod polling;
mod snapshot;
mod sway;
mod r#trait;

pub use self::r#trait::create_compositor_source;
