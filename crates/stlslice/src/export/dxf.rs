//! DXF R12 output for cross-sections.
//!
//! Each polyline becomes one `LWPOLYLINE` on layer 0, with the closed flag
//! set for closed contours. Coordinates are the section's local 2D frame.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use stlslice_math::Point2;

use crate::layer::CrossSection;

/// `$INSUNITS` code for the units tag, or 0 (unitless) if unknown.
fn insunits_code(units: &str) -> u8 {
    match units.to_ascii_lowercase().as_str() {
        "in" | "inch" | "inches" => 1,
        "ft" | "foot" | "feet" => 2,
        "mm" | "millimeter" | "millimeters" => 4,
        "cm" | "centimeter" | "centimeters" => 5,
        "m" | "meter" | "meters" => 6,
        _ => 0,
    }
}

/// DXF document builder.
pub struct DxfDocument {
    polylines: Vec<(Vec<Point2>, bool)>,
    units: u8,
}

impl DxfDocument {
    /// Create an empty document in the given units.
    pub fn new(units: &str) -> Self {
        Self {
            polylines: Vec::new(),
            units: insunits_code(units),
        }
    }

    /// Document holding every polyline of `section` with two or more points.
    pub fn from_section(section: &CrossSection, units: &str) -> Self {
        let mut doc = Self::new(units);
        for polyline in section.polylines.iter().filter(|p| p.points.len() >= 2) {
            doc.add_polyline(polyline.points.clone(), polyline.closed);
        }
        doc
    }

    /// Add a polyline.
    pub fn add_polyline(&mut self, points: Vec<Point2>, closed: bool) {
        self.polylines.push((points, closed));
    }

    /// Number of polylines in the document.
    pub fn len(&self) -> usize {
        self.polylines.len()
    }

    /// True when the document has no polylines.
    pub fn is_empty(&self) -> bool {
        self.polylines.is_empty()
    }

    /// Write the document to `path`.
    pub fn export(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()
    }

    /// Write the document to any writer.
    pub fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        // Header
        writeln!(writer, "0")?;
        writeln!(writer, "SECTION")?;
        writeln!(writer, "2")?;
        writeln!(writer, "HEADER")?;
        writeln!(writer, "9")?;
        writeln!(writer, "$ACADVER")?;
        writeln!(writer, "1")?;
        writeln!(writer, "AC1009")?;
        writeln!(writer, "9")?;
        writeln!(writer, "$INSUNITS")?;
        writeln!(writer, "70")?;
        writeln!(writer, "{}", self.units)?;
        writeln!(writer, "0")?;
        writeln!(writer, "ENDSEC")?;

        // Tables (empty)
        writeln!(writer, "0")?;
        writeln!(writer, "SECTION")?;
        writeln!(writer, "2")?;
        writeln!(writer, "TABLES")?;
        writeln!(writer, "0")?;
        writeln!(writer, "ENDSEC")?;

        // Entities
        writeln!(writer, "0")?;
        writeln!(writer, "SECTION")?;
        writeln!(writer, "2")?;
        writeln!(writer, "ENTITIES")?;
        for (points, closed) in &self.polylines {
            write_polyline(writer, points, *closed)?;
        }
        writeln!(writer, "0")?;
        writeln!(writer, "ENDSEC")?;

        writeln!(writer, "0")?;
        writeln!(writer, "EOF")?;
        Ok(())
    }
}

fn write_polyline(writer: &mut impl Write, points: &[Point2], closed: bool) -> std::io::Result<()> {
    writeln!(writer, "0")?;
    writeln!(writer, "LWPOLYLINE")?;
    writeln!(writer, "8")?;
    writeln!(writer, "0")?;
    writeln!(writer, "90")?;
    writeln!(writer, "{}", points.len())?;
    writeln!(writer, "70")?;
    writeln!(writer, "{}", if closed { 1 } else { 0 })?;
    for p in points {
        writeln!(writer, "10")?;
        writeln!(writer, "{:.6}", p.x)?;
        writeln!(writer, "20")?;
        writeln!(writer, "{:.6}", p.y)?;
    }
    Ok(())
}
