//! Item geometry validity checks.

use crate::Item;
use geojson::{Geometry, PolygonType, Position, Value};
use serde::Serialize;
use std::fmt::Display;

/// An item that was dropped from a listing because its geometry is invalid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidGeometry {
    /// The id of the dropped item.
    pub id: String,

    /// Why the geometry is invalid.
    pub reason: String,
}

/// Checks that a geometry's coordinates are finite, in range, and that its
/// polygon rings are closed with at least four positions.
///
/// # Examples
///
/// ```
/// use geojson::{Geometry, Value};
///
/// let point = Geometry::new(Value::Point(vec![-105.1, 41.1]));
/// stac_map::geometry::validate(&point).unwrap();
/// let point = Geometry::new(Value::Point(vec![-205.1, 41.1]));
/// stac_map::geometry::validate(&point).unwrap_err();
/// ```
pub fn validate(geometry: &Geometry) -> Result<(), String> {
    validate_value(&geometry.value)
}

fn validate_value(value: &Value) -> Result<(), String> {
    match value {
        Value::Point(position) => validate_position(position),
        Value::MultiPoint(positions) | Value::LineString(positions) => {
            positions.iter().try_for_each(|p| validate_position(p))
        }
        Value::MultiLineString(lines) => lines
            .iter()
            .flatten()
            .try_for_each(|p| validate_position(p)),
        Value::Polygon(polygon) => validate_polygon(polygon),
        Value::MultiPolygon(polygons) => polygons.iter().try_for_each(validate_polygon),
        Value::GeometryCollection(geometries) => {
            geometries.iter().try_for_each(|g| validate_value(&g.value))
        }
    }
}

fn validate_polygon(polygon: &PolygonType) -> Result<(), String> {
    for ring in polygon {
        if ring.len() < 4 {
            return Err(format!("polygon ring has {} positions, needs at least 4", ring.len()));
        }
        if ring.first() != ring.last() {
            return Err("polygon ring is not closed".to_string());
        }
        ring.iter().try_for_each(|p| validate_position(p))?;
    }
    Ok(())
}

fn validate_position(position: &Position) -> Result<(), String> {
    let (Some(x), Some(y)) = (position.first(), position.get(1)) else {
        return Err(format!("position has {} values, needs at least 2", position.len()));
    };
    if !x.is_finite() || !y.is_finite() {
        Err(format!("non-finite coordinate: [{x}, {y}]"))
    } else if !(-180. ..=180.).contains(x) || !(-90. ..=90.).contains(y) {
        Err(format!("coordinate out of range: [{x}, {y}]"))
    } else {
        Ok(())
    }
}

/// Drops items with invalid geometries, returning the kept items and a
/// warning for each dropped one.
///
/// Items with a `null` geometry are kept.
pub fn sanitize_items(items: Vec<Item>) -> (Vec<Item>, Vec<InvalidGeometry>) {
    let mut kept = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();
    for item in items {
        match item.geometry.as_ref().map(validate).transpose() {
            Ok(_) => kept.push(item),
            Err(reason) => {
                tracing::warn!("dropping item {} with invalid geometry: {reason}", item.id);
                warnings.push(InvalidGeometry {
                    id: item.id,
                    reason,
                });
            }
        }
    }
    (kept, warnings)
}

impl Display for InvalidGeometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid geometry on item {}: {}", self.id, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::sanitize_items;
    use crate::Item;
    use geojson::{Geometry, Value};

    fn item(id: &str, value: Option<Value>) -> Item {
        let mut item = Item::new(id);
        item.geometry = value.map(Geometry::new);
        item
    }

    #[test]
    fn drops_invalid() {
        let items = vec![
            item("ok", Some(Value::Point(vec![1., 2.]))),
            item("null", None),
            item("nan", Some(Value::Point(vec![f64::NAN, 2.]))),
            item(
                "open-ring",
                Some(Value::Polygon(vec![vec![
                    vec![0., 0.],
                    vec![1., 0.],
                    vec![1., 1.],
                    vec![0., 1.],
                ]])),
            ),
            item(
                "closed-ring",
                Some(Value::Polygon(vec![vec![
                    vec![0., 0.],
                    vec![1., 0.],
                    vec![1., 1.],
                    vec![0., 0.],
                ]])),
            ),
        ];
        let (kept, warnings) = sanitize_items(items);
        assert_eq!(
            kept.iter().map(|item| item.id.as_str()).collect::<Vec<_>>(),
            vec!["ok", "null", "closed-ring"]
        );
        assert_eq!(
            warnings.iter().map(|w| w.id.as_str()).collect::<Vec<_>>(),
            vec!["nan", "open-ring"]
        );
    }
}
