//! Fetch, deduplicate, and paginate STAC documents.
//!
//! A [Fetcher] turns hrefs into normalized [stac_map::Value]s, a [Cursor]
//! walks paginated listings one page at a time, and [AppState] ties them to
//! the active href so that results for an old href are never applied.
//!
//! # Examples
//!
//! ```no_run
//! use stac_map_io::{AppState, Fetcher};
//!
//! # tokio_test::block_on(async {
//! let fetcher = Fetcher::new(Default::default()).unwrap();
//! let mut state = AppState::new();
//! state.load(&fetcher, "https://stac.test/catalog.json").await.unwrap();
//! for collection in state.visible_collections() {
//!     println!("{}", collection.id);
//! }
//! # })
//! ```

#![warn(missing_docs, unused_qualifications)]

mod cursor;
mod error;
mod fetcher;
mod page;
mod search;
mod state;

pub use {
    cursor::{Cursor, CursorState, Ticket},
    error::Error,
    fetcher::{ChildError, Children, Fetcher, FetcherOptions, Request, child_links},
    page::{Collections, Page},
    search::SearchState,
    state::{AppState, Generation},
};

/// Crate-specific result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns a string suitable for use as a HTTP user agent.
pub fn user_agent() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
}
