//! Slicer configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stlslice_mesh::DEFAULT_UNITS;

use crate::error::{Result, SliceError};

/// Slicing and export parameters.
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// pitch = 0.5
/// chain_tolerance = 1e-5
///
/// [svg]
/// stroke_width = 0.2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// Distance between consecutive planes (model units).
    pub pitch: f64,
    /// Height of the first plane. Defaults to the mesh's minimum Z.
    pub origin_z: Option<f64>,
    /// Vertices closer than this to a plane count as lying on it.
    pub plane_tolerance: f64,
    /// Segment endpoints closer than this are joined when chaining.
    pub chain_tolerance: f64,
    /// Weld coincident vertices after loading.
    pub merge_vertices: bool,
    /// Distance below which vertices are welded.
    pub merge_tolerance: f64,
    /// Largest hole (in boundary edges) that repair will fill.
    pub max_hole_edges: usize,
    /// Units tag written into exports.
    pub units: String,
    /// Directory for exports. Defaults to the source file's directory.
    pub output_dir: Option<PathBuf>,
    /// SVG rendering options.
    pub svg: SvgSettings,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            origin_z: None,
            plane_tolerance: 1e-9,
            chain_tolerance: 1e-6,
            merge_vertices: true,
            merge_tolerance: 1e-6,
            max_hole_edges: 4,
            units: DEFAULT_UNITS.to_string(),
            output_dir: None,
            svg: SvgSettings::default(),
        }
    }
}

/// SVG output options, in model units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvgSettings {
    /// Stroke width of the drawn polylines.
    pub stroke_width: f64,
    /// Margin added around the polylines' bounds.
    pub padding: f64,
}

impl Default for SvgSettings {
    fn default() -> Self {
        Self {
            stroke_width: 0.1,
            padding: 1.0,
        }
    }
}

fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SliceError::InvalidParameter(format!(
            "{name} must be a positive finite number, got {value}"
        )))
    }
}

impl SlicerConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        require_positive("pitch", self.pitch)?;
        require_positive("plane_tolerance", self.plane_tolerance)?;
        require_positive("chain_tolerance", self.chain_tolerance)?;
        require_positive("merge_tolerance", self.merge_tolerance)?;
        if let Some(z) = self.origin_z {
            if !z.is_finite() {
                return Err(SliceError::InvalidParameter(
                    "origin_z must be finite".into(),
                ));
            }
        }
        if self.svg.stroke_width <= 0.0 || self.svg.padding < 0.0 {
            return Err(SliceError::InvalidParameter(
                "svg stroke_width must be positive and padding non-negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SlicerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pitch, 1.0);
        assert_eq!(config.chain_tolerance, 1e-6);
        assert_eq!(config.max_hole_edges, 4);
        assert_eq!(config.units, "mm");
    }

    #[test]
    fn test_partial_toml() {
        let config = SlicerConfig::from_toml_str(
            r#"
            pitch = 0.25
            merge_vertices = false

            [svg]
            padding = 2.0
            "#,
        )
        .unwrap();
        assert_eq!(config.pitch, 0.25);
        assert!(!config.merge_vertices);
        assert_eq!(config.svg.padding, 2.0);
        assert_eq!(config.svg.stroke_width, 0.1);
        assert_eq!(config.plane_tolerance, 1e-9);
    }

    #[test]
    fn test_invalid_pitch() {
        for bad in ["pitch = 0.0", "pitch = -1.0", "pitch = nan"] {
            assert!(matches!(
                SlicerConfig::from_toml_str(bad),
                Err(SliceError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            SlicerConfig::from_toml_str("pitch = \"thick\""),
            Err(SliceError::Config(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slicer.toml");
        std::fs::write(&path, "chain_tolerance = 1e-4\noutput_dir = \"out\"\n").unwrap();
        let config = SlicerConfig::from_file(&path).unwrap();
        assert_eq!(config.chain_tolerance, 1e-4);
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
    }
}
