//! Export of sliced layers.
//!
//! JSON exports embed every cross-section in one document next to the
//! source. Vector exports (DXF, SVG) write one file per non-empty layer into
//! a fresh timestamped directory, plus an index mapping heights to files.

pub mod dxf;
pub mod svg;

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use chrono::Local;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SvgSettings;
use crate::error::{Result, SliceError};
use crate::layer::{format_height, CrossSection, HeightMap, LayerStore};

pub use dxf::DxfDocument;
pub use svg::render_svg;

/// Attempts at creating a unique export directory before giving up.
const MAX_DIR_ATTEMPTS: usize = 20;

/// Pause between directory attempts, so the timestamp can advance.
const DIR_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Single JSON document with every layer embedded.
    Json,
    /// Directory of DXF files.
    Dxf,
    /// Directory of SVG files.
    Svg,
}

impl ExportFormat {
    /// Every supported format.
    pub const ALL: [ExportFormat; 3] = [Self::Json, Self::Dxf, Self::Svg];

    /// File extension (also the format name).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Dxf => "dxf",
            Self::Svg => "svg",
        }
    }

    /// Names of all supported formats.
    pub fn supported() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.extension()).collect()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = SliceError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.extension() == lower)
            .ok_or_else(|| SliceError::UnsupportedFormat(s.to_string()))
    }
}

/// The embedded JSON export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceDocument {
    /// Path of the sliced mesh.
    pub source: String,
    /// Units of all coordinates.
    pub units: String,
    /// Whether the mesh was watertight when sliced.
    pub watertight: bool,
    /// Cross-section per height, `null` for empty layers.
    pub layers: LayerStore,
}

/// Index written alongside per-layer vector files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportIndex {
    /// Path of the sliced mesh.
    pub source: String,
    /// Units of all coordinates.
    pub units: String,
    /// Whether the mesh was watertight when sliced.
    pub watertight: bool,
    /// File written for each height; empty layers are absent.
    pub files: HeightMap<String>,
}

/// Where and how to export one slicing result.
#[derive(Debug, Clone)]
pub struct Exporter<'a> {
    /// Path of the sliced mesh; names the outputs.
    pub source: &'a Path,
    /// Units tag written into documents.
    pub units: &'a str,
    /// Watertight flag written into documents.
    pub watertight: bool,
    /// Output directory; defaults to the source's directory.
    pub output_dir: Option<&'a Path>,
    /// SVG rendering options.
    pub svg: &'a SvgSettings,
}

impl Exporter<'_> {
    /// Export `layers` in the format named by `format`.
    ///
    /// Returns `Ok(false)` without writing anything when the format is not
    /// supported.
    pub fn export(&self, layers: &LayerStore, format: &str) -> Result<bool> {
        let format = match format.parse::<ExportFormat>() {
            Ok(format) => format,
            Err(_) => {
                error!(
                    "Extension '{}' not supported. Currently supported: {:?}",
                    format,
                    ExportFormat::supported()
                );
                return Ok(false);
            }
        };
        let written = self.export_as(layers, format, &mut timestamp)?;
        info!("Exported {} layers to {}", layers.len(), written.display());
        Ok(true)
    }

    /// Export in a parsed format. Returns the JSON file or the export
    /// directory. `clock` supplies directory timestamps.
    pub fn export_as(
        &self,
        layers: &LayerStore,
        format: ExportFormat,
        clock: &mut dyn FnMut() -> String,
    ) -> Result<PathBuf> {
        let parent = self.target_dir();
        fs::create_dir_all(&parent)?;

        match format {
            ExportFormat::Json => self.write_json(layers, &parent),
            ExportFormat::Dxf | ExportFormat::Svg => self.write_directory(layers, format, &parent, clock),
        }
    }

    fn stem(&self) -> String {
        self.source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "slices".to_string())
    }

    fn target_dir(&self) -> PathBuf {
        match self.output_dir {
            Some(dir) => dir.to_path_buf(),
            None => match self.source.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
        }
    }

    fn write_json(&self, layers: &LayerStore, parent: &Path) -> Result<PathBuf> {
        let path = parent.join(format!("{}.json", self.stem()));
        let document = SliceDocument {
            source: self.source.display().to_string(),
            units: self.units.to_string(),
            watertight: self.watertight,
            layers: layers.clone(),
        };
        fs::write(&path, serde_json::to_string_pretty(&document)?)?;
        Ok(path)
    }

    fn write_directory(
        &self,
        layers: &LayerStore,
        format: ExportFormat,
        parent: &Path,
        clock: &mut dyn FnMut() -> String,
    ) -> Result<PathBuf> {
        let stem = self.stem();
        let dir = create_export_dir(parent, &stem, format, clock)?;

        let mut files = HeightMap::new();
        for (height, section) in layers.iter() {
            let name = format!("{}_{}.{}", stem, format_height(height), format.extension());
            let path = dir.join(&name);
            let Some(section) = section else {
                debug!("{} not created. No data to display.", name);
                continue;
            };
            match self.write_layer(section, &path, format) {
                Ok(()) => files.push(height, path.display().to_string()),
                Err(SliceError::NoRenderableGeometry) => {
                    debug!("{} not created. No data to display.", name);
                }
                Err(e) => warn!("Failed to write {}: {}", path.display(), e),
            }
        }

        let index = ExportIndex {
            source: self.source.display().to_string(),
            units: self.units.to_string(),
            watertight: self.watertight,
            files,
        };
        let index_path = dir.join(format!("{}_info.json", stem));
        fs::write(&index_path, serde_json::to_string_pretty(&index)?)?;
        debug!("Wrote {} layer files to {}", index.files.len(), dir.display());
        Ok(dir)
    }

    /// Write one cross-section to `path` as a vector drawing.
    ///
    /// JSON is not a per-layer format and is rejected with
    /// [`SliceError::UnsupportedFormat`].
    pub fn write_layer(&self, section: &CrossSection, path: &Path, format: ExportFormat) -> Result<()> {
        if format == ExportFormat::Json {
            return Err(SliceError::UnsupportedFormat(format.to_string()));
        }
        if !section.is_renderable() {
            return Err(SliceError::NoRenderableGeometry);
        }
        if format == ExportFormat::Dxf {
            DxfDocument::from_section(section, self.units).export(path)?;
        } else {
            let svg = render_svg(section, self.units, self.svg).ok_or(SliceError::NoRenderableGeometry)?;
            fs::write(path, svg)?;
        }
        Ok(())
    }
}

/// Current local time as `YYYYMMDD-HHMMSS`.
pub fn timestamp() -> String {
    Local::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Create `<stem>_<format>_<timestamp>` under `parent`, never reusing an
/// existing directory. On collision the clock is asked again after a pause.
pub fn create_export_dir(
    parent: &Path,
    stem: &str,
    format: ExportFormat,
    clock: &mut dyn FnMut() -> String,
) -> Result<PathBuf> {
    for attempt in 0..MAX_DIR_ATTEMPTS {
        let dir = parent.join(format!("{}_{}_{}", stem, format.extension(), clock()));
        match fs::create_dir(&dir) {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} exists (attempt {}), retrying", dir.display(), attempt + 1);
                thread::sleep(DIR_RETRY_DELAY);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(SliceError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!(
            "could not create a unique export directory in {}",
            parent.display()
        ),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Polyline2;
    use serde_json::Map;
    use stlslice_math::{Point2, Transform};

    fn square() -> CrossSection {
        CrossSection {
            polylines: vec![Polyline2 {
                points: vec![
                    Point2::new(0.0, 0.0),
                    Point2::new(1.0, 0.0),
                    Point2::new(1.0, 1.0),
                    Point2::new(0.0, 1.0),
                ],
                closed: true,
            }],
            to_3d: Transform::identity(),
            metadata: Map::new(),
        }
    }

    fn layers() -> LayerStore {
        let mut store = LayerStore::new();
        store.push(0.0, Some(square()));
        store.push(0.5, Some(square()));
        store.push(1.0, None);
        store
    }

    fn exporter<'a>(source: &'a Path, svg: &'a SvgSettings) -> Exporter<'a> {
        Exporter {
            source,
            units: "mm",
            watertight: true,
            output_dir: None,
            svg,
        }
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("DXF".parse::<ExportFormat>().unwrap(), ExportFormat::Dxf);
        assert_eq!(" Svg ".parse::<ExportFormat>().unwrap(), ExportFormat::Svg);
        assert!(matches!(
            "obj".parse::<ExportFormat>(),
            Err(SliceError::UnsupportedFormat(s)) if s == "obj"
        ));
        assert_eq!(ExportFormat::supported(), vec!["json", "dxf", "svg"]);
    }

    #[test]
    fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.stl");
        let svg = SvgSettings::default();
        assert!(exporter(&source, &svg).export(&layers(), "json").unwrap());

        let text = fs::read_to_string(dir.path().join("part.json")).unwrap();
        let doc: SliceDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(doc.units, "mm");
        assert!(doc.watertight);
        assert_eq!(doc.layers.heights(), vec![0.0, 0.5, 1.0]);
        assert_eq!(doc.layers, layers());
    }

    #[test]
    fn test_unsupported_format_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.stl");
        let svg = SvgSettings::default();
        assert!(!exporter(&source, &svg).export(&layers(), "obj").unwrap());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_directory_export() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.stl");
        let svg = SvgSettings::default();
        let mut clock = || "20240101-120000".to_string();
        let out = exporter(&source, &svg)
            .export_as(&layers(), ExportFormat::Dxf, &mut clock)
            .unwrap();

        assert_eq!(out, dir.path().join("part_dxf_20240101-120000"));
        assert!(out.join("part_0.0.dxf").exists());
        assert!(out.join("part_0.5.dxf").exists());
        assert!(!out.join("part_1.0.dxf").exists());

        let index: ExportIndex =
            serde_json::from_str(&fs::read_to_string(out.join("part_info.json")).unwrap()).unwrap();
        assert_eq!(index.files.heights(), vec![0.0, 0.5]);
        assert!(index.files.get(0.5).unwrap().ends_with("part_0.5.dxf"));
    }

    #[test]
    fn test_directory_collision_retries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("part_svg_20240101-120000")).unwrap();

        let mut stamps = vec!["20240101-120001", "20240101-120000"];
        let mut clock = move || stamps.pop().unwrap_or("unused").to_string();
        let out = create_export_dir(dir.path(), "part", ExportFormat::Svg, &mut clock).unwrap();
        assert_eq!(out, dir.path().join("part_svg_20240101-120001"));
    }

    #[test]
    fn test_output_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("out/nested");
        let source = PathBuf::from("models/part.obj");
        let svg = SvgSettings::default();
        let exporter = Exporter {
            output_dir: Some(out_dir.as_path()),
            ..exporter(&source, &svg)
        };
        let mut clock = timestamp;
        let path = exporter.export_as(&layers(), ExportFormat::Json, &mut clock).unwrap();
        assert_eq!(path, out_dir.join("part.json"));
        assert!(path.exists());
    }

    #[test]
    fn test_write_layer_rejects_empty() {
        let source = PathBuf::from("part.stl");
        let svg = SvgSettings::default();
        let empty = CrossSection {
            polylines: Vec::new(),
            ..square()
        };
        let result = exporter(&source, &svg).write_layer(&empty, Path::new("unused.svg"), ExportFormat::Svg);
        assert!(matches!(result, Err(SliceError::NoRenderableGeometry)));
    }

    #[test]
    fn test_write_layer_vector_only() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.stl");
        let svg = SvgSettings::default();
        let exporter = exporter(&source, &svg);

        let path = dir.path().join("layer.json");
        assert!(matches!(
            exporter.write_layer(&square(), &path, ExportFormat::Json),
            Err(SliceError::UnsupportedFormat(f)) if f == "json"
        ));
        assert!(!path.exists());

        let path = dir.path().join("layer.svg");
        exporter.write_layer(&square(), &path, ExportFormat::Svg).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("<path"));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(ts.as_bytes()[8], b'-');
    }
}
