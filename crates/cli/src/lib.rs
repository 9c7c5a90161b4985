// The verbosity stuff is cribbed from https://github.com/clap-rs/clap-verbosity-flag/blob/c621a6a8a7c0b6df8f1464a985a5d076b4915693/src/lib.rs and updated for tracing

#![deny(unused_crate_dependencies)]

use anyhow::{Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use stac_map::{Bbox, DatetimeBounds};
use stac_map_duckdb::Session;
use stac_map_io::{AppState, Fetcher, FetcherOptions, SearchState};
use std::{io::Write, time::Duration};
use tracing::metadata::Level;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{
    fmt::writer::MakeWriterExt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// stac-map: browse STAC catalogs, APIs, and stac-geoparquet from the command line
#[derive(Debug, Parser)]
pub struct StacMap {
    #[command(subcommand)]
    command: Command,

    /// Whether to print compact JSON output.
    ///
    /// By default, JSON output is printed "pretty".
    #[arg(short = 'c', long = "compact-json", global = true)]
    compact_json: Option<bool>,

    /// The request timeout, in seconds.
    #[arg(long = "timeout", global = true, default_value_t = 30)]
    timeout: u64,

    /// How many times to retry a request that failed with a transient error.
    #[arg(long = "retries", global = true, default_value_t = 1)]
    retries: u32,

    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = ErrorLevel::verbose_help(),
        long_help = ErrorLevel::verbose_long_help(),
    )]
    verbose: u8,

    #[arg(
        long,
        short = 'q',
        action = clap::ArgAction::Count,
        global = true,
        help = ErrorLevel::quiet_help(),
        long_help = ErrorLevel::quiet_long_help(),
        conflicts_with = "verbose",
    )]
    quiet: u8,
}

/// A stac-map subcommand.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetches a STAC value and prints it with every href made absolute.
    Resolve {
        /// The href (URL or local path) of the STAC value.
        href: String,
    },

    /// Fetches a catalog's children and prints the collections and items
    /// that pass the filters.
    Children {
        /// The href of the catalog or collection.
        href: String,

        /// The viewport, as a comma-delimited `xmin,ymin,xmax,ymax`.
        #[arg(long = "bbox", allow_hyphen_values = true)]
        bbox: Option<Bbox>,

        /// Datetime interval, formatted like `2020-01-01/2020-12-31`.
        ///
        /// Use `..` or leave a side empty for open ranges.
        #[arg(long = "datetime")]
        datetime: Option<DatetimeBounds>,

        /// Don't treat collections with a global extent as always visible.
        #[arg(long = "exclude-global", default_value_t = false)]
        exclude_global: bool,
    },

    /// Pages through a STAC API's collections.
    Collections {
        /// The href of the STAC API root.
        href: String,

        /// The maximum number of pages to fetch.
        #[arg(long = "max-pages")]
        max_pages: Option<usize>,
    },

    /// Searches a STAC API.
    Search {
        /// The href of the STAC API root.
        href: String,

        /// Comma-delimited list of one or more Collection IDs that each matching Item must be in.
        #[arg(long = "collections", value_delimiter = ',')]
        collections: Vec<String>,

        /// Requested bounding box, as a comma-delimited string.
        ///
        /// A bbox that crosses the antimeridian is narrowed to one side.
        #[arg(long = "bbox", allow_hyphen_values = true)]
        bbox: Option<Bbox>,

        /// Single date+time, or a range ('/' separator), formatted to [RFC 3339,
        /// section 5.6](https://tools.ietf.org/html/rfc3339#section-5.6).
        ///
        /// Use double dots `..` for open date ranges.
        #[arg(long = "datetime")]
        datetime: Option<String>,

        /// The page size to be returned from the server.
        #[arg(long = "limit")]
        limit: Option<u64>,

        /// The maximum number of items to return from the search.
        #[arg(short = 'n', long = "max-items")]
        max_items: Option<usize>,
    },

    /// Queries a stac-geoparquet file.
    Parquet {
        #[command(subcommand)]
        command: ParquetCommand,
    },

    /// Generate completion scripts for a given shell.
    GenerateCompletions {
        /// The shell to generate completion scripts for.
        shell: clap_complete::Shell,
    },
}

/// A stac-geoparquet subcommand.
#[derive(Debug, Subcommand)]
pub enum ParquetCommand {
    /// Prints the row count, bbox, datetime range, and key-value metadata.
    Metadata {
        /// The href of the stac-geoparquet file.
        href: String,
    },

    /// Prints the column names and types.
    Schema {
        /// The href of the stac-geoparquet file.
        href: String,
    },

    /// Prints the ids and geometries as a GeoJSON FeatureCollection.
    Table {
        /// The href of the stac-geoparquet file.
        href: String,

        /// Only include rows whose datetime interval overlaps this one.
        #[arg(long = "datetime")]
        datetime: Option<DatetimeBounds>,
    },

    /// Prints one item.
    Item {
        /// The href of the stac-geoparquet file.
        href: String,

        /// The item id.
        id: String,
    },
}

#[derive(Copy, Clone, Debug, Default)]
struct ErrorLevel;

impl StacMap {
    /// Runs this command.
    ///
    /// If `init_tracing_subscriber` is `false`, it is expected that the caller
    /// is setting up the appropriate logging.
    pub async fn run(self, init_tracing_subscriber: bool) -> Result<()> {
        if init_tracing_subscriber {
            let indicatif_layer = IndicatifLayer::new();
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer().with_writer(
                        indicatif_layer
                            .get_stderr_writer()
                            .with_max_level(self.log_level().unwrap_or(Level::WARN)),
                    ),
                )
                .with(indicatif_layer)
                .init();
        }
        match self.command {
            Command::Resolve { ref href } => {
                let value = self.fetcher()?.fetch(href.as_str()).await?;
                self.put(&value)
            }
            Command::Children {
                ref href,
                bbox,
                datetime,
                exclude_global,
            } => {
                let fetcher = self.fetcher()?;
                let mut state = AppState::new();
                state.set_viewport(bbox);
                state.set_datetime_bounds(datetime);
                state.set_include_global(!exclude_global);
                state.load(&fetcher, href).await?;
                let errors = state
                    .child_errors()
                    .iter()
                    .map(|child_error| {
                        json!({"href": child_error.href, "error": child_error.error.to_string()})
                    })
                    .collect::<Vec<_>>();
                self.put(&json!({
                    "collections": state.visible_collections(),
                    "items": state.visible_items(),
                    "warnings": state.warnings(),
                    "errors": errors,
                }))
            }
            Command::Collections {
                ref href,
                max_pages,
            } => {
                let fetcher = self.fetcher()?;
                let mut state = AppState::new();
                state.load(&fetcher, href).await?;
                if state.collections_cursor().is_none() {
                    return Err(anyhow!("{href} does not have a collections listing"));
                }
                let mut pages = 0;
                while max_pages.is_none_or(|max_pages| pages < max_pages)
                    && state.load_more_collections(&fetcher).await?.is_some()
                {
                    pages += 1;
                }
                self.put(&json!({ "collections": state.collections().collect::<Vec<_>>() }))
            }
            Command::Search {
                ref href,
                ref collections,
                bbox,
                ref datetime,
                limit,
                max_items,
            } => {
                let fetcher = self.fetcher()?;
                let mut state = AppState::new();
                state.load(&fetcher, href).await?;
                let search = SearchState::new()
                    .with_collections(collections.iter())
                    .with_bbox(bbox)
                    .with_datetime(datetime.clone())
                    .with_limit(limit);
                if !state.set_search(search)? {
                    return Err(anyhow!("{href} does not have a search link"));
                }
                for notice in state.notices() {
                    eprintln!(
                        "WARNING: bbox {:?} crosses the antimeridian, searching {:?}",
                        notice.original.to_array(),
                        notice.narrowed.to_array()
                    );
                }
                while max_items.is_none_or(|max_items| state.items().count() < max_items)
                    && state.load_more_items(&fetcher).await?.is_some()
                {}
                let features = state
                    .items()
                    .take(max_items.unwrap_or(usize::MAX))
                    .collect::<Vec<_>>();
                self.put(&json!({
                    "type": "FeatureCollection",
                    "features": features,
                }))
            }
            Command::Parquet { ref command } => self.parquet(command),
            Command::GenerateCompletions { shell } => {
                let mut command = StacMap::command();
                clap_complete::generate(shell, &mut command, "stac-map", &mut std::io::stdout());
                Ok(())
            }
        }
    }

    fn parquet(&self, command: &ParquetCommand) -> Result<()> {
        let mut session = Session::new();
        match command {
            ParquetCommand::Metadata { href } => {
                session.set_href(href);
                self.put(session.metadata()?)
            }
            ParquetCommand::Schema { href } => {
                session.set_href(href);
                self.put(session.schema()?)
            }
            ParquetCommand::Table { href, datetime } => {
                session.set_href(href);
                let table = session.table(*datetime)?;
                tracing::info!(
                    "read {} rows of {:?} geometry",
                    table.len(),
                    table.geometry_type()
                );
                self.put(&table.to_feature_collection())
            }
            ParquetCommand::Item { href, id } => {
                session.set_href(href);
                let item = session
                    .item(id)?
                    .ok_or_else(|| anyhow!("no item with id={id} in {href}"))?;
                self.put(&item)
            }
        }
    }

    /// Returns the fetcher options set by the global flags.
    pub fn fetcher_options(&self) -> FetcherOptions {
        FetcherOptions {
            timeout: Duration::from_secs(self.timeout),
            retries: self.retries,
            ..Default::default()
        }
    }

    fn fetcher(&self) -> Result<Fetcher> {
        Ok(Fetcher::new(self.fetcher_options())?)
    }

    fn put<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let mut stdout = std::io::stdout().lock();
        if self.compact_json.unwrap_or_default() {
            serde_json::to_writer(&mut stdout, value)?;
        } else {
            serde_json::to_writer_pretty(&mut stdout, value)?;
        }
        writeln!(stdout)?;
        Ok(())
    }

    /// Returns the log level set by `-v` and `-q`.
    pub fn log_level(&self) -> Option<Level> {
        level_enum(self.verbosity())
    }

    fn verbosity(&self) -> i8 {
        level_value(ErrorLevel::default()) - (self.quiet as i8) + (self.verbose as i8)
    }
}

impl ErrorLevel {
    fn default() -> Option<Level> {
        Some(Level::ERROR)
    }

    fn verbose_help() -> Option<&'static str> {
        Some("Increase verbosity")
    }

    fn verbose_long_help() -> Option<&'static str> {
        None
    }

    fn quiet_help() -> Option<&'static str> {
        Some("Decrease verbosity")
    }

    fn quiet_long_help() -> Option<&'static str> {
        None
    }
}

fn level_enum(verbosity: i8) -> Option<Level> {
    match verbosity {
        i8::MIN..=-1 => None,
        0 => Some(Level::ERROR),
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        4..=i8::MAX => Some(Level::TRACE),
    }
}

fn level_value(level: Option<Level>) -> i8 {
    match level {
        None => -1,
        Some(Level::ERROR) => 0,
        Some(Level::WARN) => 1,
        Some(Level::INFO) => 2,
        Some(Level::DEBUG) => 3,
        Some(Level::TRACE) => 4,
    }
}

// Used by the binary.
use tokio as _;

#[cfg(test)]
use {assert_cmd as _, duckdb as _, rstest as _, tempfile as _};
