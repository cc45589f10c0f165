use crate::config::Config;
use crate::error::{Result, ShellError};
use crate::services::event_loop::ShellEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use super::dry_run::DryRunCompositor;
use super::hyprland::HyprctlProbe;
use super::polling::PollingCompositor;
use super::sway::SwaymsgProbe;

/// Trait for compositor event sources that can run in different modes
#[async_trait::async_trait]
pub trait CompositorSource {
    /// Run the source until the event channel closes
    async fn run(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Hyprland,
    Sway,
    DryRun,
}

fn resolve_backend(name: &str) -> Result<Backend> {
    match name {
        "hyprland" => Ok(Backend::Hyprland),
        "sway" => Ok(Backend::Sway),
        "dry_run" => Ok(Backend::DryRun),
        "auto" => {
            if std::env::var("HYPRLAND_INSTANCE_SIGNATURE").is_ok() {
                Ok(Backend::Hyprland)
            } else if std::env::var("SWAYSOCK").is_ok() {
                Ok(Backend::Sway)
            } else {
                Err(ShellError::Compositor(
                    "не удалось определить композитор; укажите compositor.backend или --dry-run"
                        .to_string(),
                ))
            }
        }
        other => Err(ShellError::Compositor(format!("неизвестный бэкенд: {}", other))),
    }
}

/// Factory function to create an appropriate compositor source based on config and the dry_run flag
pub fn create_compositor_source(
    config: Arc<Config>,
    events: mpsc::Sender<ShellEvent>,
    dry_run: bool,
) -> Result<Box<dyn CompositorSource + Send>> {
    let backend = if dry_run {
        Backend::DryRun
    } else {
        resolve_backend(&config.compositor.backend)?
    };
    info!("Источник событий композитора: {:?}", backend);

    let interval = Duration::from_millis(config.compositor.polling_interval_ms);
    Ok(match backend {
        Backend::Hyprland => Box::new(PollingCompositor::new(Box::new(HyprctlProbe), interval, events)),
        Backend::Sway => Box::new(PollingCompositor::new(Box::new(SwaymsgProbe), interval, events)),
        Backend::DryRun => Box::new(DryRunCompositor::new(events)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_backends() {
        assert_eq!(resolve_backend("hyprland").unwrap(), Backend::Hyprland);
        assert_eq!(resolve_backend("sway").unwrap(), Backend::Sway);
        assert_eq!(resolve_backend("dry_run").unwrap(), Backend::DryRun);
        assert!(resolve_backend("kwin").is_err());
    }

    #[tokio::test]
    async fn test_dry_run_flag_wins() {
        let (tx, _rx) = mpsc::channel(4);
        let mut config = Config::default();
        config.compositor.backend = "hyprland".to_string();
        assert!(create_compositor_source(Arc::new(config), tx, true).is_ok());
    }
}
