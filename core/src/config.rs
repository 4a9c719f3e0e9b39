//! Render configuration.
//!
//! [`RenderConfig`] collects the constants the renderers share. Hosts may
//! build it in code or load it from JSON; missing fields take their defaults.

use std::path::Path;

use anyhow::{Context, Result};
use codecity_scene::ColorScheme;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub colors: ColorScheme,
    /// Height of an opened component, which is rendered as a flat slab.
    pub open_component_height: f32,
    /// Brightness multiplier applied to hovered entities.
    pub hover_color_shift: f32,
    /// Vertical bias between a box top and its label.
    pub label_y_epsilon: f32,
    /// Distance of an open component's label from the component's left edge.
    pub open_label_x_offset: f32,
    /// Elevation of the communication curve midpoint. Zero draws straight lines.
    pub curve_height: f32,
    pub curve_segments: u32,
    pub tube_radial_segments: u32,
    /// Radius of the sphere marking a class calling itself.
    pub recursive_sphere_radius: f32,
    pub arrow_width: f32,
    pub min_line_thickness: f32,
    pub max_line_thickness: f32,
    /// Opacity of communications while their application is transparent.
    pub transparent_opacity: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            colors: ColorScheme::default(),
            open_component_height: 1.5,
            hover_color_shift: 1.1,
            label_y_epsilon: 0.01,
            open_label_x_offset: 1.5,
            curve_height: 0.0,
            curve_segments: 20,
            tube_radial_segments: 8,
            recursive_sphere_radius: 0.4,
            arrow_width: 1.0,
            min_line_thickness: 0.2,
            max_line_thickness: 1.5,
            transparent_opacity: 0.1,
        }
    }
}

impl RenderConfig {
    /// Parses a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read render config {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Failed to parse render config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecity_common::RgbColor;

    #[test]
    fn test_defaults() {
        let config = RenderConfig::default();

        assert_eq!(config.hover_color_shift, 1.1);
        assert_eq!(config.curve_segments, 20);
        assert_eq!(config.curve_height, 0.0);
    }

    #[test]
    fn test_from_json_str_partial() {
        let config = RenderConfig::from_json_str(
            r##"{ "curve_height": 3.5, "colors": { "highlighted_entity": "#0000ff" } }"##,
        )
        .unwrap();

        assert_eq!(config.curve_height, 3.5);
        assert_eq!(config.colors.highlighted_entity, RgbColor::new(0.0, 0.0, 1.0));
        assert_eq!(config.open_component_height, RenderConfig::default().open_component_height);
    }

    #[test]
    fn test_from_path_missing_file() {
        let error = RenderConfig::from_path("/nonexistent/codecity.json").unwrap_err();
        assert!(error.to_string().contains("Failed to read render config"));
    }

    #[test]
    fn test_from_path_reads_file() {
        let path = std::env::temp_dir().join(format!("codecity-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "hover_color_shift": 1.3 }"#).unwrap();

        let config = RenderConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.hover_color_shift, 1.3);
    }
}
