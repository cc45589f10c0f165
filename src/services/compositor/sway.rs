use crate::error::{Result, ShellError};
use crate::events::{Geometry, MonitorId};
use serde::Deserialize;
use tokio::process::Command;

use super::polling::OutputProbe;
use super::snapshot::MonitorSnapshot;

/// Опрос Sway через `swaymsg -t get_outputs -r`
pub struct SwaymsgProbe;

#[derive(Debug, Deserialize)]
struct SwayRect {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct SwayOutput {
    name: String,
    #[serde(default)]
    active: bool,
    #[serde(default)]
    focused: bool,
    rect: SwayRect,
}

pub fn parse_outputs(json: &str) -> Result<Vec<MonitorSnapshot>> {
    let outputs: Vec<SwayOutput> = serde_json::from_str(json)?;

    Ok(outputs
        .into_iter()
        .filter(|o| o.active)
        .map(|o| MonitorSnapshot {
            id: MonitorId::new(o.name),
            geometry: Geometry::new(o.rect.x, o.rect.y, o.rect.width, o.rect.height),
            focused: o.focused,
        })
        .collect())
}

#[async_trait::async_trait]
impl OutputProbe for SwaymsgProbe {
    fn name(&self) -> &'static str {
        "swaymsg"
    }

    async fn probe(&self) -> Result<Vec<MonitorSnapshot>> {
        let output = Command::new("swaymsg")
            .args(["-t", "get_outputs", "-r"])
            .output()
            .await
            .map_err(|e| ShellError::Compositor(format!("swaymsg не найден: {}", e)))?;

        if !output.status.success() {
            return Err(ShellError::Compositor("swaymsg вернул ошибку".to_string()));
        }

        parse_outputs(&String::from_utf8_lossy(&output.stdout))
    }
}
