use crate::{
    Column, Error, GeometryVector, GeoparquetMetadata, GeoparquetTable, KeyValue, Query, Result,
    Schema, quote_identifier, quote_literal, wkb,
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use duckdb::Connection;
use serde_json::{Map, Value};
use stac_map::{Bbox, DatetimeBounds, Item};

/// Default hive partitioning value
pub const DEFAULT_USE_HIVE_PARTITIONING: bool = false;

/// The default union by name value.
pub const DEFAULT_UNION_BY_NAME: bool = true;

const ITEM_FIELDS: [&str; 9] = [
    "type",
    "stac_version",
    "stac_extensions",
    "id",
    "geometry",
    "bbox",
    "links",
    "assets",
    "collection",
];

const TIMESTAMP_FIELDS: [&str; 5] = ["datetime", "start_datetime", "end_datetime", "created", "updated"];

/// A client for querying stac-geoparquet with DuckDB.
///
/// Each method is one independent query, so a failed query never affects
/// the connection or any other query.
#[derive(Debug)]
pub struct Client {
    connection: Connection,

    /// Whether to use hive partitioning
    pub use_hive_partitioning: bool,

    /// Whether to use `union_by_name` when querying.
    ///
    /// Defaults to true.
    pub union_by_name: bool,
}

impl Client {
    /// Creates a new client with an in-memory DuckDB connection.
    ///
    /// This function will install and load the spatial and icu extensions.
    /// If you'd like to manage your own extensions, set things up then use
    /// `connection.into()` to get a new `Client`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stac_map_duckdb::Client;
    ///
    /// let client = Client::new().unwrap();
    /// ```
    pub fn new() -> Result<Client> {
        let connection = Connection::open_in_memory().map_err(Error::Connection)?;
        for sql in ["INSTALL spatial", "LOAD spatial", "INSTALL icu", "LOAD icu"] {
            let _ = connection.execute(sql, []).map_err(Error::Connection)?;
        }
        Ok(connection.into())
    }

    /// Returns a new client on the same database.
    pub fn try_clone(&self) -> Result<Client> {
        let connection = self.connection.try_clone().map_err(Error::Connection)?;
        Ok(Client {
            connection,
            use_hive_partitioning: self.use_hive_partitioning,
            union_by_name: self.union_by_name,
        })
    }

    /// Returns the columns of a parquet file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stac_map_duckdb::Client;
    ///
    /// let client = Client::new().unwrap();
    /// let schema = client.describe("items.parquet").unwrap();
    /// ```
    pub fn describe(&self, href: &str) -> Result<Schema> {
        let sql = format!(
            "SELECT column_name, column_type FROM (DESCRIBE SELECT * FROM {})",
            self.read_parquet(href)
        );
        log::debug!("duckdb sql: {sql}");
        let mut statement = self.connection.prepare(&sql)?;
        let columns = statement
            .query_map([], |row| {
                Ok(Column {
                    name: row.get(0)?,
                    r#type: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, duckdb::Error>>()?;
        Ok(Schema { columns })
    }

    /// Computes the row count, bbox, temporal extent, and key-value metadata
    /// of a stac-geoparquet file.
    pub fn metadata(&self, href: &str, schema: &Schema) -> Result<GeoparquetMetadata> {
        let bbox_columns = if schema.has("bbox") {
            "min(bbox.xmin), min(bbox.ymin), max(bbox.xmax), max(bbox.ymax)"
        } else {
            "NULL::DOUBLE, NULL::DOUBLE, NULL::DOUBLE, NULL::DOUBLE"
        };
        let datetime_columns = match schema.temporal_columns() {
            Some(columns) => format!(
                "epoch_ms(min({}::TIMESTAMPTZ)), epoch_ms(max({}::TIMESTAMPTZ))",
                quote_identifier(&columns.start),
                quote_identifier(&columns.end)
            ),
            None => "NULL::BIGINT, NULL::BIGINT".to_string(),
        };
        let query = Query::new(self.read_parquet(href)).select([
            "count(*)",
            bbox_columns,
            datetime_columns.as_str(),
        ]);
        let (sql, params) = query.build();
        log::debug!("duckdb sql: {sql}");
        let mut statement = self.connection.prepare(&sql)?;
        let (count, xmin, ymin, xmax, ymax, start, end) =
            statement.query_row(duckdb::params_from_iter(params), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<f64>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                    row.get::<_, Option<i64>>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })?;
        let bbox = match (xmin, ymin, xmax, ymax) {
            (Some(xmin), Some(ymin), Some(xmax), Some(ymax)) => {
                Some(Bbox::new(xmin, ymin, xmax, ymax))
            }
            _ => None,
        };
        Ok(GeoparquetMetadata {
            count: count.try_into()?,
            bbox,
            start_datetime: start.and_then(DateTime::from_timestamp_millis),
            end_datetime: end.and_then(DateTime::from_timestamp_millis),
            key_value: self.key_value_metadata(href)?,
        })
    }

    /// Reads a parquet file's key-value metadata.
    ///
    /// Values that parse as JSON are returned parsed, anything else as a
    /// string.
    pub fn key_value_metadata(&self, href: &str) -> Result<Vec<KeyValue>> {
        let sql = format!(
            "SELECT key, value FROM parquet_kv_metadata({})",
            quote_literal(href)
        );
        log::debug!("duckdb sql: {sql}");
        let mut statement = self.connection.prepare(&sql)?;
        let rows = statement
            .query_map([], |row| {
                Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<Vec<u8>>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, duckdb::Error>>()?;
        Ok(rows
            .into_iter()
            .map(|(key, value)| {
                let value = String::from_utf8_lossy(&value.unwrap_or_default()).into_owned();
                KeyValue {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    value: serde_json::from_str(&value).unwrap_or(Value::String(value)),
                }
            })
            .collect())
    }

    /// Loads the `id` and geometry columns, optionally filtered to rows whose
    /// interval overlaps `bounds`.
    ///
    /// Rows with a null geometry are skipped.
    pub fn table(
        &self,
        href: &str,
        schema: &Schema,
        bounds: Option<&DatetimeBounds>,
    ) -> Result<GeoparquetTable> {
        let geometry = if schema.has_native_geometry() {
            "ST_AsWKB(geometry)::BLOB"
        } else {
            "geometry::BLOB"
        };
        let mut query = Query::new(self.read_parquet(href))
            .select(["id::VARCHAR", geometry])
            .filter("geometry IS NOT NULL", Vec::<String>::new());
        if let Some(bounds) = bounds {
            match schema.temporal_columns() {
                Some(columns) => query = query.filter_datetime(&columns, bounds),
                None => log::warn!("{href} has no datetime columns, ignoring datetime bounds"),
            }
        }
        let (sql, params) = query.build();
        log::debug!("duckdb sql: {sql}");
        let mut statement = self.connection.prepare(&sql)?;
        let (ids, rows): (Vec<String>, Vec<Vec<u8>>) = statement
            .query_map(duckdb::params_from_iter(params), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, duckdb::Error>>()?
            .into_iter()
            .unzip();
        log::debug!("decoding {} geometries", rows.len());
        let geometries = wkb::decode_column(&rows)?;
        Ok(GeoparquetTable {
            ids,
            geometry: GeometryVector::from_geometries(geometries)?,
        })
    }

    /// Loads one row as a STAC Item.
    ///
    /// Returns `None` if no row has this id.
    pub fn item(&self, href: &str, schema: &Schema, id: &str) -> Result<Option<Item>> {
        let geometry = if schema.has_native_geometry() {
            "ST_AsGeoJSON(geometry)"
        } else {
            "ST_AsGeoJSON(ST_GeomFromWKB(geometry))"
        };
        let inner = Query::new(self.read_parquet(href))
            .select([format!("* REPLACE ({geometry} AS geometry)")])
            .filter("id = ?", [id.to_string()])
            .limit(1);
        let (inner_sql, params) = inner.build();
        let sql = format!("SELECT to_json(t)::VARCHAR FROM ({inner_sql}) t");
        log::debug!("duckdb sql: {sql}");
        let mut statement = self.connection.prepare(&sql)?;
        let mut rows = statement.query(duckdb::params_from_iter(params))?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let json: String = row.get(0)?;
        let Value::Object(row) = serde_json::from_str(&json)? else {
            return Ok(None);
        };
        row_to_item(row).map(Some)
    }

    fn read_parquet(&self, href: &str) -> String {
        format!(
            "read_parquet({}, hive_partitioning={}, union_by_name={})",
            quote_literal(href),
            self.use_hive_partitioning,
            self.union_by_name
        )
    }
}

/// Reconstitutes a STAC Item from one row of stac-geoparquet.
///
/// Top-level item fields stay at the top level and every other column
/// becomes a property. Nulls are dropped, a `bbox` struct becomes an array,
/// timestamps become RFC 3339 strings, and a GeoJSON string geometry is
/// parsed.
pub fn row_to_item(row: Map<String, Value>) -> Result<Item> {
    let mut item = Map::new();
    let mut properties = Map::new();
    for (key, value) in row {
        let value = strip_nulls(value);
        if value.is_null() {
            continue;
        }
        if ITEM_FIELDS.contains(&key.as_str()) {
            let value = match key.as_str() {
                "bbox" => bbox_to_array(value),
                "geometry" => match value {
                    Value::String(s) => serde_json::from_str(&s)?,
                    value => value,
                },
                _ => value,
            };
            let _ = item.insert(key, value);
        } else {
            let value = match value {
                Value::String(s) if TIMESTAMP_FIELDS.contains(&key.as_str()) => {
                    Value::String(normalize_timestamp(&s).unwrap_or(s))
                }
                value => value,
            };
            let _ = properties.insert(key, value);
        }
    }
    let _ = item.insert("type".to_string(), "Feature".into());
    let _ = item.insert("properties".to_string(), Value::Object(properties));
    serde_json::from_value(Value::Object(item)).map_err(Error::from)
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key, strip_nulls(value)))
                .collect(),
        ),
        Value::Array(array) => Value::Array(array.into_iter().map(strip_nulls).collect()),
        value => value,
    }
}

fn bbox_to_array(value: Value) -> Value {
    let Value::Object(object) = value else {
        return value;
    };
    let keys: &[&str] = if object.contains_key("zmin") {
        &["xmin", "ymin", "zmin", "xmax", "ymax", "zmax"]
    } else {
        &["xmin", "ymin", "xmax", "ymax"]
    };
    keys.iter()
        .map(|key| object.get(*key).cloned().unwrap_or(Value::Null))
        .collect()
}

fn normalize_timestamp(s: &str) -> Option<String> {
    let datetime = DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|datetime| datetime.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .ok()
                .map(|datetime| datetime.and_utc())
        })?;
    Some(datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

impl From<Connection> for Client {
    fn from(connection: Connection) -> Self {
        Client {
            connection,
            use_hive_partitioning: DEFAULT_USE_HIVE_PARTITIONING,
            union_by_name: DEFAULT_UNION_BY_NAME,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Client, normalize_timestamp, row_to_item};
    use crate::{GeometryType, GeometryVector};
    use duckdb::Connection;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use stac_map::DatetimeBounds;
    use tempfile::TempDir;

    #[fixture]
    #[once]
    pub(crate) fn install_extensions() {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute("INSTALL icu", []).unwrap();
        connection.execute("INSTALL spatial", []).unwrap();
    }

    #[allow(unused_variables)]
    #[fixture]
    pub(crate) fn client(install_extensions: ()) -> Client {
        Client::new().unwrap()
    }

    /// Writes a three row stac-geoparquet file with an interval and key-value metadata.
    pub(crate) fn items_parquet(client: &Client, tempdir: &TempDir) -> String {
        let path = tempdir.path().join("items.parquet");
        let href = path.to_string_lossy().into_owned();
        client
            .connection
            .execute_batch(&format!(
                "COPY (
                    SELECT * FROM (VALUES
                        ('a', ST_Point(1, 2), {{'xmin': 1.0, 'ymin': 2.0, 'xmax': 1.0, 'ymax': 2.0}},
                            '2020-01-01T00:00:00Z'::TIMESTAMPTZ, '2020-01-01T00:00:00Z'::TIMESTAMPTZ, '2020-01-31T00:00:00Z'::TIMESTAMPTZ, 12.5),
                        ('b', ST_Point(3, 4), {{'xmin': 3.0, 'ymin': 4.0, 'xmax': 3.0, 'ymax': 4.0}},
                            '2020-06-01T00:00:00Z'::TIMESTAMPTZ, '2020-06-01T00:00:00Z'::TIMESTAMPTZ, '2020-06-30T00:00:00Z'::TIMESTAMPTZ, NULL),
                        ('c', ST_Point(-5, -6), {{'xmin': -5.0, 'ymin': -6.0, 'xmax': -5.0, 'ymax': -6.0}},
                            '2021-01-01T00:00:00Z'::TIMESTAMPTZ, '2021-01-01T00:00:00Z'::TIMESTAMPTZ, '2021-01-31T00:00:00Z'::TIMESTAMPTZ, 80.0)
                    ) AS t(id, geometry, bbox, datetime, start_datetime, end_datetime, \"eo:cloud_cover\")
                ) TO '{href}' (FORMAT PARQUET, KV_METADATA {{'geo-version': '{{\"version\": \"1.1.0\"}}', 'note': 'not json'}})"
            ))
            .unwrap();
        href
    }

    #[rstest]
    fn describe(client: Client) {
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let schema = client.describe(&href).unwrap();
        let names = schema
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "id",
                "geometry",
                "bbox",
                "datetime",
                "start_datetime",
                "end_datetime",
                "eo:cloud_cover"
            ]
        );
    }

    #[rstest]
    fn metadata(client: Client) {
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let schema = client.describe(&href).unwrap();
        let metadata = client.metadata(&href, &schema).unwrap();
        assert_eq!(metadata.count, 3);
        assert_eq!(metadata.bbox.unwrap().to_array(), [-5., -6., 3., 4.]);
        assert_eq!(
            metadata.start_datetime.unwrap().to_rfc3339(),
            "2020-01-01T00:00:00+00:00"
        );
        assert_eq!(
            metadata.end_datetime.unwrap().to_rfc3339(),
            "2021-01-31T00:00:00+00:00"
        );
        let geo = metadata
            .key_value
            .iter()
            .find(|kv| kv.key == "geo-version")
            .unwrap();
        assert_eq!(geo.value, json!({"version": "1.1.0"}));
        let note = metadata.key_value.iter().find(|kv| kv.key == "note").unwrap();
        assert_eq!(note.value, json!("not json"));
    }

    #[rstest]
    fn table(client: Client) {
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let schema = client.describe(&href).unwrap();
        let table = client.table(&href, &schema, None).unwrap();
        assert_eq!(table.ids, vec!["a", "b", "c"]);
        assert_eq!(table.geometry_type(), GeometryType::Point);
        let GeometryVector::Point(points) = &table.geometry else {
            panic!("expected points");
        };
        assert_eq!((points[0].x(), points[0].y()), (1., 2.));
        assert_eq!((points[1].x(), points[1].y()), (3., 4.));
        assert_eq!((points[2].x(), points[2].y()), (-5., -6.));
    }

    #[rstest]
    #[case("2020-06-15/2020-12-31", vec!["b"])]
    #[case("2020-01-15/..", vec!["a", "b", "c"])]
    #[case("../2020-05-01", vec!["a"])]
    #[case("2022-01-01/..", vec![])]
    fn table_with_datetime(client: Client, #[case] bounds: &str, #[case] ids: Vec<&str>) {
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let schema = client.describe(&href).unwrap();
        let bounds: DatetimeBounds = bounds.parse().unwrap();
        let table = client.table(&href, &schema, Some(&bounds)).unwrap();
        assert_eq!(table.ids, ids);
    }

    #[rstest]
    fn item(client: Client) {
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let schema = client.describe(&href).unwrap();
        let item = client.item(&href, &schema, "a").unwrap().unwrap();
        assert_eq!(item.id, "a");
        assert_eq!(item.bbox.unwrap().to_array(), [1., 2., 1., 2.]);
        assert_eq!(item.properties["eo:cloud_cover"], json!(12.5));
        assert_eq!(item.property_str("datetime"), Some("2020-01-01T00:00:00Z"));
        let geometry = item.geometry.unwrap();
        assert_eq!(geometry.value, geojson::Value::Point(vec![1., 2.]));

        let item = client.item(&href, &schema, "b").unwrap().unwrap();
        assert!(!item.properties.contains_key("eo:cloud_cover"));
    }

    #[rstest]
    fn missing_item(client: Client) {
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let schema = client.describe(&href).unwrap();
        assert!(client.item(&href, &schema, "nope").unwrap().is_none());
        assert!(
            client
                .item(&href, &schema, "x' OR '1'='1")
                .unwrap()
                .is_none()
        );
    }

    #[rstest]
    fn query_error_keeps_connection(client: Client) {
        let _ = client.describe("does-not-exist.parquet").unwrap_err();
        let tempdir = TempDir::new().unwrap();
        let href = items_parquet(&client, &tempdir);
        let _ = client.describe(&href).unwrap();
    }

    #[test]
    fn timestamps() {
        assert_eq!(
            normalize_timestamp("2020-01-01 00:00:00+00").unwrap(),
            "2020-01-01T00:00:00Z"
        );
        assert_eq!(
            normalize_timestamp("2020-01-01 12:30:00.5").unwrap(),
            "2020-01-01T12:30:00.500Z"
        );
        assert!(normalize_timestamp("yesterday").is_none());
    }

    #[test]
    fn reconstitute() {
        let item = row_to_item(
            json!({
                "id": "an-id",
                "geometry": "{\"type\":\"Point\",\"coordinates\":[1.0,2.0]}",
                "bbox": {"xmin": 1.0, "ymin": 2.0, "xmax": 1.0, "ymax": 2.0},
                "collection": "a-collection",
                "datetime": "2020-01-01 00:00:00+00",
                "platform": null,
                "assets": {"data": {"href": "https://stac.test/data.tif", "title": null}},
                "links": []
            })
            .as_object()
            .unwrap()
            .clone(),
        )
        .unwrap();
        assert_eq!(item.collection.as_deref(), Some("a-collection"));
        assert_eq!(item.property_str("datetime"), Some("2020-01-01T00:00:00Z"));
        assert!(!item.properties.contains_key("platform"));
        assert!(item.assets["data"].title.is_none());
    }
}
