//! Rendering collaborator boundary.
//!
//! The coordinator never draws anything itself: it hands `WidgetSpec`s to a
//! `WidgetBackend` and keeps only the opaque handles it gets back.

mod exec_backend;
mod logging_backend;
mod r#trait;

pub use self::logging_backend::LoggingWidgetBackend;
pub use self::r#trait::{create_widget_backend, WidgetBackend};
