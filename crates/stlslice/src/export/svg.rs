//! SVG output for cross-sections.

use std::fmt::Write;

use crate::config::SvgSettings;
use crate::layer::CrossSection;

/// CSS length unit for the document size, with the factor converting model
/// units into it. Unknown tags give a unitless size.
fn css_length(units: &str) -> (&'static str, f64) {
    match units.to_ascii_lowercase().as_str() {
        "mm" | "millimeter" | "millimeters" => ("mm", 1.0),
        "cm" | "centimeter" | "centimeters" => ("cm", 1.0),
        "m" | "meter" | "meters" => ("mm", 1000.0),
        "in" | "inch" | "inches" => ("in", 1.0),
        "ft" | "foot" | "feet" => ("in", 12.0),
        _ => ("", 1.0),
    }
}

/// Render a cross-section as a standalone SVG document.
///
/// The view box fits the polylines' bounds plus padding, sized in model
/// units. A group transform flips the y axis so the drawing is not mirrored.
/// Returns `None` if the section has no polyline with two or more points.
pub fn render_svg(section: &CrossSection, units: &str, settings: &SvgSettings) -> Option<String> {
    if !section.is_renderable() {
        return None;
    }
    let (min, max) = section.bounds()?;
    let pad = settings.padding;
    let width = (max.x - min.x) + 2.0 * pad;
    let height = (max.y - min.y) + 2.0 * pad;
    let view_x = min.x - pad;
    let view_y = -(max.y + pad);
    let (unit, scale) = css_length(units);
    let (size_w, size_h) = (width * scale, height * scale);

    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{size_w:.4}{unit}" height="{size_h:.4}{unit}" viewBox="{view_x:.4} {view_y:.4} {width:.4} {height:.4}">
  <g transform="scale(1,-1)" fill="none" stroke="black" stroke-width="{:.4}">
"#,
        settings.stroke_width,
    );

    for polyline in section.polylines.iter().filter(|p| p.points.len() >= 2) {
        let mut path = String::new();
        for (i, point) in polyline.points.iter().enumerate() {
            let cmd = if i == 0 { "M" } else { " L" };
            let _ = write!(path, "{cmd} {:.4} {:.4}", point.x, point.y);
        }
        if polyline.closed {
            path.push_str(" Z");
        }
        let _ = writeln!(svg, r#"    <path d="{path}"/>"#);
    }

    svg.push_str("  </g>\n</svg>\n");
    Some(svg)
}
