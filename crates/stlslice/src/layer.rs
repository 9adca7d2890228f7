//! Cross-sections and the ordered layer store.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stlslice_math::{Point2, Point3, Transform};

/// An open or closed 2D polyline in a section plane's local frame.
///
/// Closed polylines do not repeat their first point.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline2 {
    /// Vertices in order.
    pub points: Vec<Point2>,
    /// Whether the last point connects back to the first.
    pub closed: bool,
}

impl Polyline2 {
    /// Signed enclosed area (positive when counter-clockwise).
    ///
    /// Zero for open polylines.
    pub fn signed_area(&self) -> f64 {
        if !self.closed || self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum::<f64>()
            * 0.5
    }

    /// Total length, including the closing edge.
    pub fn length(&self) -> f64 {
        let open: f64 = self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
        match (self.closed, self.points.first(), self.points.last()) {
            (true, Some(first), Some(last)) => open + (first - last).norm(),
            _ => open,
        }
    }
}

/// The intersection of a mesh with one plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CrossSectionRecord", from = "CrossSectionRecord")]
pub struct CrossSection {
    /// Chained polylines in the plane's local 2D frame.
    pub polylines: Vec<Polyline2>,
    /// Maps local `(x, y, 0)` back into model space.
    pub to_3d: Transform,
    /// Free-form details (plane index, height, origin, normal, segment count).
    pub metadata: Map<String, Value>,
}

impl CrossSection {
    /// True if at least one polyline has two or more points.
    pub fn is_renderable(&self) -> bool {
        self.polylines.iter().any(|p| p.points.len() >= 2)
    }

    /// 2D bounding box `(min, max)` over all polyline points.
    pub fn bounds(&self) -> Option<(Point2, Point2)> {
        let mut points = self.polylines.iter().flat_map(|p| p.points.iter());
        let first = *points.next()?;
        Some(points.fold((first, first), |(min, max), p| {
            (
                Point2::new(min.x.min(p.x), min.y.min(p.y)),
                Point2::new(max.x.max(p.x), max.y.max(p.y)),
            )
        }))
    }

    /// Polyline `index` lifted back into model space.
    pub fn polyline_3d(&self, index: usize) -> Vec<Point3> {
        self.polylines[index]
            .points
            .iter()
            .map(|p| self.to_3d.apply_point2(p))
            .collect()
    }
}

/// Serialized form: closed polylines repeat their first point.
#[derive(Clone, Serialize, Deserialize)]
struct CrossSectionRecord {
    polylines: Vec<Vec<[f64; 2]>>,
    to_3d_transform: [[f64; 4]; 4],
    #[serde(default)]
    metadata: Map<String, Value>,
}

impl From<CrossSection> for CrossSectionRecord {
    fn from(section: CrossSection) -> Self {
        let polylines = section
            .polylines
            .iter()
            .map(|polyline| {
                let mut points: Vec<[f64; 2]> =
                    polyline.points.iter().map(|p| [p.x, p.y]).collect();
                if polyline.closed {
                    if let Some(&first) = points.first() {
                        points.push(first);
                    }
                }
                points
            })
            .collect();
        Self {
            polylines,
            to_3d_transform: section.to_3d.to_rows(),
            metadata: section.metadata,
        }
    }
}

impl From<CrossSectionRecord> for CrossSection {
    fn from(record: CrossSectionRecord) -> Self {
        let polylines = record
            .polylines
            .into_iter()
            .map(|raw| {
                let mut points: Vec<Point2> = raw.iter().map(|&[x, y]| Point2::new(x, y)).collect();
                let closed = points.len() >= 3 && points.first() == points.last();
                if closed {
                    points.pop();
                }
                Polyline2 { points, closed }
            })
            .collect();
        Self {
            polylines,
            to_3d: Transform::from_rows(&record.to_3d_transform),
            metadata: record.metadata,
        }
    }
}

/// Format a height as a map key: shortest round-trip decimal, always with a
/// fractional part or exponent.
pub fn format_height(height: f64) -> String {
    format!("{height:?}")
}

/// Height-keyed entries kept in insertion (ascending height) order.
///
/// Serializes as a JSON object whose keys are [`format_height`] strings.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap<T> {
    entries: Vec<(f64, T)>,
}

/// One slot per scheduled height; `None` marks an empty intersection.
pub type LayerStore = HeightMap<Option<CrossSection>>;

impl<T> HeightMap<T> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry. Callers keep heights ascending.
    pub fn push(&mut self, height: f64, value: T) {
        self.entries.push((height, value));
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> + '_ {
        self.entries.iter().map(|(h, v)| (*h, v))
    }

    /// Heights in order.
    pub fn heights(&self) -> Vec<f64> {
        self.entries.iter().map(|(h, _)| *h).collect()
    }

    /// Value at exactly `height`.
    pub fn get(&self, height: f64) -> Option<&T> {
        self.entries
            .iter()
            .find(|(h, _)| *h == height)
            .map(|(_, v)| v)
    }
}

impl<T> Default for HeightMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(f64, T)> for HeightMap<T> {
    fn from_iter<I: IntoIterator<Item = (f64, T)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl LayerStore {
    /// Number of heights with a non-empty cross-section.
    pub fn non_empty_count(&self) -> usize {
        self.entries.iter().filter(|(_, s)| s.is_some()).count()
    }
}

impl<T: Serialize> Serialize for HeightMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (height, value) in &self.entries {
            map.serialize_entry(&format_height(*height), value)?;
        }
        map.end()
    }
}

struct HeightMapVisitor<T>(PhantomData<T>);

impl<'de, T: Deserialize<'de>> Visitor<'de> for HeightMapVisitor<T> {
    type Value = HeightMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map keyed by decimal heights")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<String, T>()? {
            let height: f64 = key
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("invalid height key '{key}'")))?;
            entries.push((height, value));
        }
        Ok(HeightMap { entries })
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for HeightMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(HeightMapVisitor(PhantomData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(closed: bool) -> Polyline2 {
        Polyline2 {
            points: vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 2.0),
                Point2::new(0.0, 2.0),
            ],
            closed,
        }
    }

    fn section(polylines: Vec<Polyline2>) -> CrossSection {
        let mut metadata = Map::new();
        metadata.insert("index".into(), Value::from(3));
        CrossSection {
            polylines,
            to_3d: Transform::translation(1.0, 2.0, 7.5),
            metadata,
        }
    }

    #[test]
    fn test_polyline_measures() {
        assert_relative_eq!(square(true).signed_area(), 4.0);
        assert_relative_eq!(square(false).signed_area(), 0.0);
        assert_relative_eq!(square(true).length(), 8.0);
        assert_relative_eq!(square(false).length(), 6.0);
    }

    #[test]
    fn test_closed_polyline_repeats_first_point() {
        let value = serde_json::to_value(section(vec![square(true), square(false)])).unwrap();
        let polylines = value["polylines"].as_array().unwrap();
        assert_eq!(polylines[0].as_array().unwrap().len(), 5);
        assert_eq!(polylines[0][0], polylines[0][4]);
        assert_eq!(polylines[1].as_array().unwrap().len(), 4);
        assert_eq!(value["to_3d_transform"][2][3], 7.5);
        assert_eq!(value["metadata"]["index"], 3);
    }

    #[test]
    fn test_cross_section_json_restores_closed_flag() {
        let original = section(vec![square(true), square(false)]);
        let json = serde_json::to_string(&original).unwrap();
        let restored: CrossSection = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_lift_to_3d() {
        let lifted = section(vec![square(true)]).polyline_3d(0);
        assert_relative_eq!(lifted[2].x, 3.0);
        assert_relative_eq!(lifted[2].y, 4.0);
        assert_relative_eq!(lifted[2].z, 7.5);
    }

    #[test]
    fn test_height_keys() {
        assert_eq!(format_height(0.0), "0.0");
        assert_eq!(format_height(2.5), "2.5");
        assert_eq!(format_height(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_layer_store_order_and_nulls() {
        let mut store = LayerStore::new();
        store.push(0.0, Some(section(vec![square(true)])));
        store.push(2.5, None);
        store.push(10.0, Some(section(vec![square(false)])));
        assert_eq!(store.non_empty_count(), 2);

        let json = serde_json::to_string(&store).unwrap();
        let positions: Vec<usize> = ["\"0.0\"", "\"2.5\"", "\"10.0\""]
            .iter()
            .map(|k| json.find(k).unwrap())
            .collect();
        assert!(positions[0] < positions[1] && positions[1] < positions[2]);
        assert!(json.contains("\"2.5\":null"));

        let restored: LayerStore = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.heights(), vec![0.0, 2.5, 10.0]);
        assert!(restored.get(2.5).unwrap().is_none());
        assert_eq!(restored, store);
    }

    #[test]
    fn test_bad_height_key() {
        let result: Result<LayerStore, _> = serde_json::from_str(r#"{"abc": null}"#);
        assert!(result.is_err());
    }
}
