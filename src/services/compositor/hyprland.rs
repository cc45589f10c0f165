use crate::error::{Result, ShellError};
use crate::events::{Geometry, MonitorId};
use serde::Deserialize;
use tokio::process::Command;

use super::polling::OutputProbe;
use super::snapshot::MonitorSnapshot;

/// Опрос Hyprland через `hyprctl -j monitors`
pub struct HyprctlProbe;

#[derive(Debug, Deserialize)]
struct HyprMonitor {
    name: String,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    #[serde(default = "default_scale")]
    scale: f64,
    #[serde(default)]
    focused: bool,
    #[serde(default)]
    disabled: bool,
}

fn default_scale() -> f64 {
    1.0
}

/// Разобрать вывод `hyprctl -j monitors`; размеры переводятся в логические пиксели
pub fn parse_monitors(json: &str) -> Result<Vec<MonitorSnapshot>> {
    let monitors: Vec<HyprMonitor> = serde_json::from_str(json)?;

    Ok(monitors
        .into_iter()
        .filter(|m| !m.disabled)
        .map(|m| {
            let scale = if m.scale > 0.0 { m.scale } else { 1.0 };
            MonitorSnapshot {
                id: MonitorId::new(m.name),
                geometry: Geometry::new(
                    m.x,
                    m.y,
                    (m.width as f64 / scale).round() as u32,
                    (m.height as f64 / scale).round() as u32,
                ),
                focused: m.focused,
            }
        })
        .collect())
}

#[async_trait::async_trait]
impl OutputProbe for HyprctlProbe {
    fn name(&self) -> &'static str {
        "hyprctl"
    }

    async fn probe(&self) -> Result<Vec<MonitorSnapshot>> {
        let output = Command::new("hyprctl")
            .args(["-j", "monitors"])
            .output()
            .await
            .map_err(|e| ShellError::Compositor(format!("hyprctl не найден: {}", e)))?;

        if !output.status.success() {
            return Err(ShellError::Compositor(format!(
                "hyprctl вернул ошибку: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_monitors(&String::from_utf8_lossy(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"id": 0, "name": "DP-1", "description": "Dell", "x": 0, "y": 0,
         "width": 3840, "height": 2160, "scale": 2.0, "focused": false,
         "activeWorkspace": {"id": 1, "name": "1"}},
        {"id": 1, "name": "HDMI-A-1", "x": 1920, "y": 0,
         "width": 1920, "height": 1080, "scale": 1.0, "focused": true},
        {"id": 2, "name": "eDP-1", "x": 0, "y": 1080,
         "width": 1920, "height": 1200, "focused": false, "disabled": true}
    ]"#;

    #[test]
    fn test_parse_monitors() {
        let monitors = parse_monitors(SAMPLE).unwrap();

        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[0].id, MonitorId::new("DP-1"));
        assert_eq!(monitors[0].geometry, Geometry::new(0, 0, 1920, 1080));
        assert!(!monitors[0].focused);
        assert_eq!(monitors[1].id, MonitorId::new("HDMI-A-1"));
        assert!(monitors[1].focused);
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(parse_monitors("ok"), Err(ShellError::Json(_))));
    }
}
