use crate::{Error, Result, TemporalColumns};
use chrono::{DateTime, Utc};
use geo_types::{Geometry, MultiPolygon, Point};
use geojson::{Feature, FeatureCollection};
use serde::Serialize;
use serde_json::Value;
use stac_map::Bbox;

/// One column of a parquet file, as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    /// The column name.
    pub name: String,

    /// The DuckDB type, e.g. `VARCHAR` or `GEOMETRY`.
    pub r#type: String,
}

/// The columns of a parquet file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Schema {
    /// The columns, in file order.
    pub columns: Vec<Column>,
}

/// The kind of geometry in a [GeoparquetTable].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeometryType {
    /// Every row is a point.
    Point,

    /// Every row is a polygon or multipolygon.
    Polygon,
}

/// A column of decoded geometries, all of one [GeometryType].
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryVector {
    /// Points.
    Point(Vec<Point<f64>>),

    /// Polygons, each held as a multipolygon.
    Polygon(Vec<MultiPolygon<f64>>),
}

/// The `id` and geometry columns of a stac-geoparquet file.
///
/// Row `i` of `geometry` belongs to `ids[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoparquetTable {
    /// Item ids.
    pub ids: Vec<String>,

    /// Item geometries.
    pub geometry: GeometryVector,
}

/// Summary information about a stac-geoparquet file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoparquetMetadata {
    /// The number of rows.
    pub count: u64,

    /// The union of every row's bbox, collapsed to 2D.
    pub bbox: Option<Bbox>,

    /// The earliest start datetime.
    pub start_datetime: Option<DateTime<Utc>>,

    /// The latest end datetime.
    pub end_datetime: Option<DateTime<Utc>>,

    /// The file's key-value metadata, in file order.
    pub key_value: Vec<KeyValue>,
}

/// One entry of parquet key-value metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyValue {
    /// The key.
    pub key: String,

    /// The value, parsed as JSON if possible, otherwise a string.
    pub value: Value,
}

impl Schema {
    /// Returns the column with this name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns true if there's a column with this name.
    pub fn has(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the columns to use for temporal filtering.
    ///
    /// The start column is `start_datetime` if present, else `datetime`. The
    /// end column is `end_datetime` if present, else `start_datetime` if
    /// present, else `datetime`. Returns `None` if there are no datetime
    /// columns at all.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map_duckdb::{Column, Schema};
    ///
    /// let schema = Schema {
    ///     columns: vec![Column { name: "datetime".into(), r#type: "TIMESTAMP WITH TIME ZONE".into() }],
    /// };
    /// let columns = schema.temporal_columns().unwrap();
    /// assert_eq!(columns.start, "datetime");
    /// assert_eq!(columns.end, "datetime");
    /// ```
    pub fn temporal_columns(&self) -> Option<TemporalColumns> {
        let has_datetime = self.has("datetime");
        let has_start = self.has("start_datetime");
        let has_end = self.has("end_datetime");
        if !(has_datetime || has_start || has_end) {
            return None;
        }
        let start = if has_start {
            "start_datetime"
        } else if has_datetime {
            "datetime"
        } else {
            "end_datetime"
        };
        let end = if has_end {
            "end_datetime"
        } else if has_start {
            "start_datetime"
        } else {
            "datetime"
        };
        Some(TemporalColumns {
            start: start.to_string(),
            end: end.to_string(),
        })
    }

    /// Returns true if the geometry column has DuckDB's `GEOMETRY` type
    /// rather than raw WKB.
    pub fn has_native_geometry(&self) -> bool {
        self.column("geometry")
            .is_some_and(|column| column.r#type.starts_with("GEOMETRY"))
    }
}

impl GeometryVector {
    /// Builds a vector from decoded geometries.
    ///
    /// An empty input is a polygon vector. Multipolygons count as polygons,
    /// and mixing points with polygons is an error.
    pub fn from_geometries(geometries: Vec<Geometry<f64>>) -> Result<GeometryVector> {
        let mut geometries = geometries.into_iter().enumerate();
        let Some((_, first)) = geometries.next() else {
            return Ok(GeometryVector::Polygon(Vec::new()));
        };
        match first {
            Geometry::Point(point) => {
                let mut points = vec![point];
                for (row, geometry) in geometries {
                    match geometry {
                        Geometry::Point(point) => points.push(point),
                        geometry => return Err(mixed(row, &geometry)),
                    }
                }
                Ok(GeometryVector::Point(points))
            }
            first => {
                let mut polygons = vec![to_multi_polygon(0, first)?];
                for (row, geometry) in geometries {
                    if let Geometry::Point(_) = geometry {
                        return Err(mixed(row, &geometry));
                    }
                    polygons.push(to_multi_polygon(row, geometry)?);
                }
                Ok(GeometryVector::Polygon(polygons))
            }
        }
    }

    /// Returns the geometry type.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            GeometryVector::Point(_) => GeometryType::Point,
            GeometryVector::Polygon(_) => GeometryType::Polygon,
        }
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        match self {
            GeometryVector::Point(points) => points.len(),
            GeometryVector::Polygon(polygons) => polygons.len(),
        }
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the geometry at `row` as GeoJSON.
    pub fn to_geojson(&self, row: usize) -> Option<geojson::Geometry> {
        match self {
            GeometryVector::Point(points) => points.get(row).map(geojson::Geometry::from),
            GeometryVector::Polygon(polygons) => polygons.get(row).map(geojson::Geometry::from),
        }
    }
}

impl GeoparquetTable {
    /// Returns the geometry type.
    pub fn geometry_type(&self) -> GeometryType {
        self.geometry.geometry_type()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Converts this table into a GeoJSON FeatureCollection of `id` and
    /// geometry.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .ids
            .iter()
            .enumerate()
            .map(|(row, id)| Feature {
                id: Some(geojson::feature::Id::String(id.clone())),
                geometry: self.geometry.to_geojson(row),
                ..Default::default()
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

fn to_multi_polygon(row: usize, geometry: Geometry<f64>) -> Result<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(polygon) => Ok(MultiPolygon(vec![polygon])),
        Geometry::MultiPolygon(multi_polygon) => Ok(multi_polygon),
        geometry => Err(Error::UnsupportedGeometryType {
            row,
            geometry_type: geometry_type_name(&geometry).to_string(),
        }),
    }
}

fn mixed(row: usize, geometry: &Geometry<f64>) -> Error {
    Error::MixedGeometryTypes {
        row,
        actual: geometry_type_name(geometry).to_string(),
    }
}

fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::{Column, GeometryType, GeometryVector, Schema};
    use crate::Error;
    use geo_types::{Geometry, LineString, MultiPolygon, Point, polygon};
    use rstest::rstest;

    fn schema(names: &[&str]) -> Schema {
        Schema {
            columns: names
                .iter()
                .map(|name| Column {
                    name: name.to_string(),
                    r#type: "TIMESTAMP WITH TIME ZONE".to_string(),
                })
                .collect(),
        }
    }

    #[rstest]
    #[case(&["datetime"], "datetime", "datetime")]
    #[case(&["datetime", "start_datetime", "end_datetime"], "start_datetime", "end_datetime")]
    #[case(&["datetime", "start_datetime"], "start_datetime", "start_datetime")]
    #[case(&["datetime", "end_datetime"], "datetime", "end_datetime")]
    fn temporal_columns(#[case] names: &[&str], #[case] start: &str, #[case] end: &str) {
        let columns = schema(names).temporal_columns().unwrap();
        assert_eq!(columns.start, start);
        assert_eq!(columns.end, end);
    }

    #[test]
    fn no_temporal_columns() {
        assert!(schema(&["id"]).temporal_columns().is_none());
    }

    #[test]
    fn empty_is_polygon() {
        let vector = GeometryVector::from_geometries(Vec::new()).unwrap();
        assert_eq!(vector.geometry_type(), GeometryType::Polygon);
        assert!(vector.is_empty());
    }

    #[test]
    fn polygons_and_multipolygons() {
        let square = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 0.)];
        let vector = GeometryVector::from_geometries(vec![
            Geometry::Polygon(square.clone()),
            Geometry::MultiPolygon(MultiPolygon(vec![square.clone(), square])),
        ])
        .unwrap();
        let GeometryVector::Polygon(polygons) = vector else {
            panic!("expected polygons");
        };
        assert_eq!(polygons[0].0.len(), 1);
        assert_eq!(polygons[1].0.len(), 2);
    }

    #[test]
    fn mixed() {
        let square = polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 0.)];
        let error = GeometryVector::from_geometries(vec![
            Geometry::Point(Point::new(0., 0.)),
            Geometry::Polygon(square),
        ])
        .unwrap_err();
        assert!(matches!(error, Error::MixedGeometryTypes { row: 1, .. }));
    }

    #[test]
    fn unsupported() {
        let error = GeometryVector::from_geometries(vec![Geometry::LineString(LineString::from(
            vec![(0., 0.), (1., 1.)],
        ))])
        .unwrap_err();
        assert!(matches!(error, Error::UnsupportedGeometryType { row: 0, .. }));
    }
}
