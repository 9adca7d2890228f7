//! The slicing session: load, repair, slice, export.

use std::path::{Path, PathBuf};

use log::{info, warn};
use stlslice_mesh::{merge_vertices, repair, Mesh};

use crate::config::SlicerConfig;
use crate::error::{Result, SliceError};
use crate::export::{ExportFormat, Exporter};
use crate::layer::LayerStore;
use crate::schedule::{build_schedule, PlaneSchedule};
use crate::section::{section, SectionParams};

/// Owns one mesh and the layers most recently sliced from it.
#[derive(Debug, Clone)]
pub struct SlicerSession {
    config: SlicerConfig,
    source: PathBuf,
    mesh: Option<Mesh>,
    watertight: bool,
    schedule: Option<PlaneSchedule>,
    layers: LayerStore,
}

impl SlicerSession {
    /// Create a session with no mesh.
    pub fn new(config: SlicerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source: PathBuf::new(),
            mesh: None,
            watertight: false,
            schedule: None,
            layers: LayerStore::new(),
        })
    }

    /// Load, weld and repair the mesh at `path`.
    ///
    /// On failure the session keeps no mesh, so later slicing is rejected.
    pub fn load_mesh(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.mesh = None;
        self.schedule = None;
        self.layers = LayerStore::new();
        self.source = path.to_path_buf();

        let mesh = stlslice_mesh::load(path)?;
        self.set_mesh(mesh);
        Ok(())
    }

    /// Use an in-memory mesh; `source` names the exports.
    pub fn from_mesh(config: SlicerConfig, mesh: Mesh, source: impl Into<PathBuf>) -> Result<Self> {
        let mut session = Self::new(config)?;
        session.source = source.into();
        session.set_mesh(mesh);
        Ok(session)
    }

    fn set_mesh(&mut self, mut mesh: Mesh) {
        if self.config.merge_vertices {
            merge_vertices(&mut mesh, self.config.merge_tolerance);
        }
        mesh.units = self.config.units.clone();
        self.watertight = repair(&mut mesh, self.config.max_hole_edges);
        if !self.watertight {
            warn!(
                "{} is not watertight; cross-sections may be open",
                self.source.display()
            );
        }
        info!(
            "Mesh ready: {} vertices, {} faces, watertight: {}",
            mesh.vertex_count(),
            mesh.face_count(),
            self.watertight
        );
        self.mesh = Some(mesh);
    }

    /// Slice the mesh at `pitch`, or the configured pitch when `None`.
    ///
    /// Replaces any previous layers.
    pub fn slice_mesh(&mut self, pitch: Option<f64>) -> Result<&LayerStore> {
        let mesh = self
            .mesh
            .as_ref()
            .ok_or_else(|| SliceError::InvalidParameter("no mesh loaded".into()))?;
        let pitch = pitch.unwrap_or(self.config.pitch);

        let schedule = build_schedule(mesh, pitch, self.config.origin_z)?;
        let params = SectionParams {
            plane_tolerance: self.config.plane_tolerance,
            chain_tolerance: self.config.chain_tolerance,
        };
        let sections = section(mesh, &schedule.origin, &schedule.normal, &schedule.heights, &params)?;

        self.layers = schedule.heights.iter().copied().zip(sections).collect();
        info!(
            "Sliced {} into {} layers ({} non-empty)",
            self.source.display(),
            self.layers.len(),
            self.layers.non_empty_count()
        );
        self.schedule = Some(schedule);
        Ok(&self.layers)
    }

    /// Export the current layers.
    ///
    /// Returns `Ok(false)` for an unsupported format.
    pub fn export_layers(&self, format: &str) -> Result<bool> {
        self.require_mesh()?;
        self.exporter().export(&self.layers, format)
    }

    /// Export the current layers in a parsed format, returning the JSON file
    /// or export directory written.
    pub fn export_as(&self, format: ExportFormat) -> Result<PathBuf> {
        self.require_mesh()?;
        self.exporter()
            .export_as(&self.layers, format, &mut crate::export::timestamp)
    }

    fn require_mesh(&self) -> Result<()> {
        match self.mesh {
            Some(_) => Ok(()),
            None => Err(SliceError::InvalidParameter("no mesh loaded".into())),
        }
    }

    fn exporter(&self) -> Exporter<'_> {
        Exporter {
            source: &self.source,
            units: &self.config.units,
            watertight: self.watertight,
            output_dir: self.config.output_dir.as_deref(),
            svg: &self.config.svg,
        }
    }

    /// The loaded mesh, after welding and repair.
    pub fn mesh(&self) -> Option<&Mesh> {
        self.mesh.as_ref()
    }

    /// Layers from the last slice.
    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// Plane schedule of the last slice.
    pub fn schedule(&self) -> Option<&PlaneSchedule> {
        self.schedule.as_ref()
    }

    /// Whether the mesh was watertight after repair.
    pub fn is_watertight(&self) -> bool {
        self.watertight
    }

    /// Path the mesh was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Active configuration.
    pub fn config(&self) -> &SlicerConfig {
        &self.config
    }
}
