//! Resolve, normalize, and filter [STAC](https://stacspec.org) documents.
//!
//! This crate holds the in-memory model that every other **stac-map** crate
//! speaks:
//!
//! - [Value] is a closed sum type over the four STAC entity kinds
//! - [href] turns possibly-relative hrefs into absolute ones and guarantees a
//!   `self` link
//! - [filter] evaluates spatial and temporal containment predicates used to
//!   narrow what's "in view"
//!
//! # Examples
//!
//! ```
//! use stac_map::{Links, Value};
//!
//! let value: Value = serde_json::from_str(r#"{
//!     "type": "Catalog",
//!     "stac_version": "1.1.0",
//!     "id": "root",
//!     "description": "A catalog",
//!     "links": [{"href": "a/b/c", "rel": "child"}]
//! }"#).unwrap();
//! let value = stac_map::href::normalize_document(&value, "https://example.com/root/catalog.json").unwrap();
//! assert_eq!(value.links()[0].href, "https://example.com/root/a/b/c");
//! assert_eq!(value.self_link().unwrap().href, "https://example.com/root/catalog.json");
//! ```

#![warn(missing_docs, unused_qualifications)]

mod asset;
mod bbox;
pub mod datetime;
mod error;
pub mod filter;
pub mod geometry;
pub mod href;
mod link;
mod value;

pub use {
    asset::Asset,
    bbox::Bbox,
    datetime::{DatetimeBounds, Temporal},
    error::Error,
    geometry::InvalidGeometry,
    link::{Link, Links, Method},
    value::{
        Catalog, Collection, Extent, Item, ItemCollection, SpatialExtent, TemporalExtent, Type,
        Value,
    },
};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Return this crate's version.
///
/// # Examples
///
/// ```
/// println!("{}", stac_map::version());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
