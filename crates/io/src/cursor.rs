use crate::{Fetcher, Page, Request, Result, fetcher::RequestKey};
use stac_map::InvalidGeometry;
use std::{
    collections::HashSet,
    sync::atomic::{AtomicU64, Ordering},
};

static TICKETS: AtomicU64 = AtomicU64::new(1);

/// The state of a [Cursor].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// There is a next page and nothing is in flight.
    Ready,

    /// A page request is in flight.
    Fetching,

    /// The last page had no `next` link, or its `next` link pointed at a
    /// page that was already requested.
    Exhausted,

    /// The last page request failed; the same page can be retried.
    Failed,
}

/// Identifies one in-flight page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

/// Walks the `next` links of a paginated listing, accumulating entries.
///
/// At most one page request is in flight at a time. [Cursor::begin] hands out
/// a [Ticket] and [Cursor::complete] only accepts the result for the
/// outstanding ticket, so results for a superseded request are dropped.
#[derive(Debug)]
pub struct Cursor<P: Page> {
    state: CursorState,
    requested: HashSet<RequestKey>,
    next: Option<Request>,
    entries: Vec<P::Entry>,
    warnings: Vec<InvalidGeometry>,
    pages: usize,
    in_flight: Option<Ticket>,
}

impl<P: Page> Cursor<P> {
    /// Creates a cursor that starts at the given request.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::ItemCollection;
    /// use stac_map_io::{Cursor, CursorState};
    ///
    /// let cursor: Cursor<ItemCollection> = Cursor::new("https://stac.test/search");
    /// assert_eq!(cursor.state(), CursorState::Ready);
    /// assert!(cursor.has_more());
    /// ```
    pub fn new(first: impl Into<Request>) -> Cursor<P> {
        Cursor {
            state: CursorState::Ready,
            requested: HashSet::new(),
            next: Some(first.into()),
            entries: Vec::new(),
            warnings: Vec::new(),
            pages: 0,
            in_flight: None,
        }
    }

    /// Returns this cursor's state.
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Returns true if a page request is in flight.
    pub fn is_fetching(&self) -> bool {
        self.state == CursorState::Fetching
    }

    /// Returns true if there is another page to fetch.
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// Returns the request for the next page.
    pub fn next_request(&self) -> Option<&Request> {
        self.next.as_ref()
    }

    /// Returns the number of pages that have been merged.
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Returns every entry so far, in page order.
    pub fn entries(&self) -> &[P::Entry] {
        &self.entries
    }

    /// Returns the entries that were dropped for having invalid geometries.
    pub fn warnings(&self) -> &[InvalidGeometry] {
        &self.warnings
    }

    /// Consumes this cursor, returning its entries.
    pub fn into_entries(self) -> Vec<P::Entry> {
        self.entries
    }

    /// Starts fetching the next page.
    ///
    /// Returns `None` if a request is already in flight or if there are no
    /// more pages.
    pub fn begin(&mut self) -> Option<(Ticket, Request)> {
        if self.is_fetching() {
            return None;
        }
        let request = self.next.clone()?;
        let ticket = Ticket(TICKETS.fetch_add(1, Ordering::Relaxed));
        self.in_flight = Some(ticket);
        self.state = CursorState::Fetching;
        let _ = self.requested.insert(request.key());
        Some((ticket, request))
    }

    /// Merges the result of the request for `ticket`.
    ///
    /// Returns `Ok(None)` if the ticket is not the outstanding one, otherwise
    /// the number of entries the page added. On error the cursor moves to
    /// [CursorState::Failed] and keeps its next request so the page can be
    /// retried.
    pub fn complete(&mut self, ticket: Ticket, result: Result<P>) -> Result<Option<usize>> {
        if self.in_flight != Some(ticket) {
            tracing::debug!("ignoring result for a superseded page request");
            return Ok(None);
        }
        self.in_flight = None;
        let page = match result {
            Ok(page) => page,
            Err(err) => {
                self.state = CursorState::Failed;
                return Err(err);
            }
        };
        let next = page.next_link().map(Request::from);
        self.next = match next {
            Some(next) if self.requested.contains(&next.key()) => {
                tracing::warn!(
                    "next link points at an already requested page, stopping: {}",
                    next.href
                );
                None
            }
            next => next,
        };
        let (entries, warnings) = page.into_entries();
        let count = entries.len();
        self.entries.extend(entries);
        self.warnings.extend(warnings);
        self.pages += 1;
        self.state = if self.next.is_some() {
            CursorState::Ready
        } else {
            CursorState::Exhausted
        };
        Ok(Some(count))
    }

    /// Fetches and merges the next page.
    ///
    /// Returns `Ok(None)` if there was nothing to fetch.
    pub async fn fetch_next(&mut self, fetcher: &Fetcher) -> Result<Option<usize>> {
        let Some((ticket, request)) = self.begin() else {
            return Ok(None);
        };
        let result = fetcher.fetch_page::<P>(&request).await;
        self.complete(ticket, result)
    }

    /// Fetches pages until the listing is exhausted or there are at least
    /// `max_entries` entries, then truncates to `max_entries`.
    pub async fn fetch_all(&mut self, fetcher: &Fetcher, max_entries: Option<usize>) -> Result<()> {
        while self.has_more() && max_entries.is_none_or(|max| self.entries.len() < max) {
            if self.fetch_next(fetcher).await?.is_none() {
                break;
            }
        }
        if let Some(max) = max_entries {
            self.entries.truncate(max);
        }
        Ok(())
    }
}
