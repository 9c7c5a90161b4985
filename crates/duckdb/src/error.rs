use thiserror::Error;

/// A crate-specific error enum.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// [arrow_schema::ArrowError]
    #[error(transparent)]
    Arrow(#[from] arrow_schema::ArrowError),

    /// The session was closed, or its connection could not be established.
    #[error("the session is closed")]
    Closed,

    /// The geometry column is too large to fit in one binary array.
    #[error("geometry column is larger than 2 GiB")]
    ColumnTooLarge,

    /// Could not open or set up the DuckDB connection.
    #[error("could not connect to duckdb: {0}")]
    Connection(#[source] duckdb::Error),

    /// A table has both point and polygon geometries.
    #[error("table mixes point and polygon geometries (row {row} is a {actual})")]
    MixedGeometryTypes {
        /// The first row with a different type.
        row: usize,

        /// That row's geometry type.
        actual: String,
    },

    /// No href has been set on the session.
    #[error("no href has been set")]
    NoHref,

    /// A query failed.
    ///
    /// Query errors are deterministic (bad SQL, a missing column) and are
    /// never retried.
    #[error(transparent)]
    Query(#[from] duckdb::Error),

    /// [serde_json::Error]
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    /// [stac_map::Error]
    #[error(transparent)]
    Stac(#[from] stac_map::Error),

    /// [std::num::TryFromIntError]
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),

    /// A geometry that is neither a point nor a polygon.
    #[error("unsupported geometry type at row {row}: {geometry_type}")]
    UnsupportedGeometryType {
        /// The row index.
        row: usize,

        /// The geometry type.
        geometry_type: String,
    },

    /// A WKB value could not be decoded.
    #[error("invalid wkb at row {row}: {message}")]
    Wkb {
        /// The row index.
        row: usize,

        /// What went wrong.
        message: String,
    },
}
