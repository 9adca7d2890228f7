#![warn(missing_docs)]

//! Mesh slicer: parallel cross-sections of a triangle mesh.
//!
//! A [`SlicerSession`] loads a mesh, welds and repairs it, cuts it with
//! evenly spaced horizontal planes and exports the resulting polylines as a
//! JSON document or as per-layer DXF/SVG files.
//!
//! # Example
//!
//! ```no_run
//! use stlslice::{SlicerConfig, SlicerSession};
//!
//! let mut session = SlicerSession::new(SlicerConfig::default())?;
//! session.load_mesh("part.stl")?;
//! let layers = session.slice_mesh(Some(0.5))?;
//! println!("Layers: {}", layers.len());
//! session.export_layers("svg")?;
//! # Ok::<(), stlslice::SliceError>(())
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod layer;
pub mod schedule;
pub mod section;
pub mod session;

pub use config::{SlicerConfig, SvgSettings};
pub use error::{Result, SliceError};
pub use export::{ExportFormat, ExportIndex, Exporter, SliceDocument};
pub use layer::{format_height, CrossSection, HeightMap, LayerStore, Polyline2};
pub use schedule::{build_schedule, PlaneSchedule};
pub use section::{chain_segments, section, SectionParams};
pub use session::SlicerSession;
