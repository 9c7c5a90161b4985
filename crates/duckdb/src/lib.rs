//! Query [stac-geoparquet](https://github.com/stac-utils/stac-geoparquet)
//! with [duckdb](https://duckdb.org/).
//!
//! A [Session] holds one reused connection for the active href and answers
//! four questions about it: its [Schema], its [GeoparquetMetadata], a
//! [GeoparquetTable] of ids and decoded geometries, and single items by id.
//!
//! # Examples
//!
//! ```no_run
//! use stac_map_duckdb::Session;
//!
//! let mut session = Session::new();
//! session.set_href("items.parquet");
//! let count = session.metadata().unwrap().count;
//! let table = session.table(None).unwrap();
//! assert_eq!(table.len() as u64, count);
//! ```

#![warn(missing_docs, unused_crate_dependencies)]

mod client;
mod error;
mod query;
mod session;
mod table;
pub mod wkb;

pub use {
    client::{Client, DEFAULT_UNION_BY_NAME, DEFAULT_USE_HIVE_PARTITIONING, row_to_item},
    error::Error,
    query::{Query, TemporalColumns, quote_identifier, quote_literal},
    session::{Session, SessionState},
    table::{
        Column, GeometryType, GeometryVector, GeoparquetMetadata, GeoparquetTable, KeyValue,
        Schema,
    },
};

/// A crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Return this crate's version.
///
/// # Examples
///
/// ```
/// println!("{}", stac_map_duckdb::version());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
