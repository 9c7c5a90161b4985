use crate::{Client, Error, GeoparquetMetadata, GeoparquetTable, Result, Schema};
use stac_map::{DatetimeBounds, Item};

/// The state of a [Session]'s connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection has been opened yet.
    Unconnected,

    /// The connection is being opened.
    Connecting,

    /// The connection is open and idle.
    Ready,

    /// A query is running.
    Querying,

    /// The session was closed, or its connection could not be opened.
    Closed,
}

/// One geoparquet href being browsed through one reused connection.
///
/// The schema is described once per href. Metadata and tables are derived
/// values: they are replaced when the href or the datetime bounds change,
/// never modified.
#[derive(Debug)]
pub struct Session {
    state: SessionState,
    client: Option<Client>,
    href: Option<String>,
    schema: Option<Schema>,
    metadata: Option<GeoparquetMetadata>,
    table: Option<(Option<DatetimeBounds>, GeoparquetTable)>,
}

impl Session {
    /// Creates a session that will connect on first use.
    pub fn new() -> Session {
        Session {
            state: SessionState::Unconnected,
            client: None,
            href: None,
            schema: None,
            metadata: None,
            table: None,
        }
    }

    /// Creates a session around an existing client.
    pub fn with_client(client: Client) -> Session {
        Session {
            state: SessionState::Ready,
            client: Some(client),
            ..Session::new()
        }
    }

    /// Opens the connection if it isn't open yet.
    ///
    /// A connection failure closes the session; it is not retried.
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Closed => Err(Error::Closed),
            SessionState::Unconnected => {
                self.state = SessionState::Connecting;
                match Client::new() {
                    Ok(client) => {
                        self.client = Some(client);
                        self.state = SessionState::Ready;
                        Ok(())
                    }
                    Err(err) => {
                        log::warn!("could not connect to duckdb: {err}");
                        self.state = SessionState::Closed;
                        Err(err)
                    }
                }
            }
            SessionState::Connecting | SessionState::Ready | SessionState::Querying => Ok(()),
        }
    }

    /// Makes `href` the active href, discarding everything derived from the
    /// previous one but keeping the connection.
    pub fn set_href(&mut self, href: impl ToString) {
        let href = href.to_string();
        if self.href.as_deref() == Some(href.as_str()) {
            return;
        }
        log::debug!("geoparquet href: {href}");
        self.href = Some(href);
        self.schema = None;
        self.metadata = None;
        self.table = None;
    }

    /// Closes the session.
    pub fn close(&mut self) {
        self.state = SessionState::Closed;
        self.client = None;
        self.schema = None;
        self.metadata = None;
        self.table = None;
    }

    /// Returns the connection state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the active href.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Returns the schema, describing the file the first time.
    pub fn schema(&mut self) -> Result<&Schema> {
        self.run(|_, _, _| Ok(()))?;
        self.schema.as_ref().ok_or(Error::NoHref)
    }

    /// Returns the metadata, computing it the first time.
    pub fn metadata(&mut self) -> Result<&GeoparquetMetadata> {
        if self.metadata.is_none() {
            let metadata = self.run(|client, href, schema| client.metadata(href, schema))?;
            self.metadata = Some(metadata);
        }
        self.metadata.as_ref().ok_or(Error::NoHref)
    }

    /// Returns the table for these datetime bounds.
    ///
    /// The table is reloaded only if the bounds differ from the last call.
    pub fn table(&mut self, bounds: Option<DatetimeBounds>) -> Result<&GeoparquetTable> {
        let is_current = self
            .table
            .as_ref()
            .is_some_and(|(table_bounds, _)| *table_bounds == bounds);
        if !is_current {
            let table =
                self.run(|client, href, schema| client.table(href, schema, bounds.as_ref()))?;
            self.table = Some((bounds, table));
        }
        self.table.as_ref().map(|(_, table)| table).ok_or(Error::NoHref)
    }

    /// Loads one item by id.
    pub fn item(&mut self, id: &str) -> Result<Option<Item>> {
        self.run(|client, href, schema| client.item(href, schema, id))
    }

    fn run<T>(&mut self, f: impl FnOnce(&Client, &str, &Schema) -> Result<T>) -> Result<T> {
        self.connect()?;
        let href = self.href.clone().ok_or(Error::NoHref)?;
        let client = self.client.as_ref().ok_or(Error::Closed)?;
        self.state = SessionState::Querying;
        let schema = match self.schema.take() {
            Some(schema) => Ok(schema),
            None => client.describe(&href),
        };
        let result = match schema {
            Ok(schema) => {
                let result = f(client, &href, &schema);
                self.schema = Some(schema);
                result
            }
            Err(err) => Err(err),
        };
        self.state = SessionState::Ready;
        result
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}
