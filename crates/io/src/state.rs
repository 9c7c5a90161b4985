use crate::{
    ChildError, Collections, Cursor, Fetcher, Request, Result, SearchState, Ticket,
    fetcher::child_links,
};
use futures::StreamExt;
use stac_map::{
    Bbox, Catalog, Collection, DatetimeBounds, InvalidGeometry, Item, ItemCollection, Links,
    Temporal, Value,
    datetime::compute_datetime_bounds,
    filter::{AntimeridianNarrowed, filter_collections, filter_items},
    geometry::sanitize_items,
};

/// Identifies the href a request was issued for.
///
/// Every [AppState::navigate] produces a new generation, and results issued
/// under an older one are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

/// Everything derived from the active href.
///
/// Navigating discards all of it; nothing carries over from one href to the
/// next.
#[derive(Debug)]
pub struct AppState {
    href: Option<String>,
    generation: u64,
    value: Option<Value>,
    children: Vec<Value>,
    child_errors: Vec<ChildError>,
    collections: Option<Cursor<Collections>>,
    items: Option<Cursor<ItemCollection>>,
    search: SearchState,
    viewport: Option<Bbox>,
    datetime_bounds: Option<DatetimeBounds>,
    include_global: bool,
    warnings: Vec<InvalidGeometry>,
    notices: Vec<AntimeridianNarrowed>,
}

impl AppState {
    /// Creates an empty state with no active href.
    pub fn new() -> AppState {
        AppState {
            href: None,
            generation: 0,
            value: None,
            children: Vec::new(),
            child_errors: Vec::new(),
            collections: None,
            items: None,
            search: SearchState::default(),
            viewport: None,
            datetime_bounds: None,
            include_global: true,
            warnings: Vec::new(),
            notices: Vec::new(),
        }
    }

    /// Makes `href` the active href.
    ///
    /// Clears every piece of derived state and the fetcher's cache, and
    /// returns the new generation with the request for the root document.
    /// The viewport and datetime filter are user intent and survive.
    pub fn navigate(&mut self, href: impl ToString, fetcher: &Fetcher) -> (Generation, Request) {
        let href = href.to_string();
        tracing::info!("navigating to {href}");
        self.generation += 1;
        self.value = None;
        self.children.clear();
        self.child_errors.clear();
        self.collections = None;
        self.items = None;
        self.search = SearchState::default();
        self.warnings.clear();
        self.notices.clear();
        fetcher.clear();
        self.href = Some(href.clone());
        (self.generation(), Request::get(href))
    }

    /// Returns the current generation.
    pub fn generation(&self) -> Generation {
        Generation(self.generation)
    }

    /// Returns true if a result issued under `generation` should be applied.
    pub fn is_current(&self, generation: Generation) -> bool {
        generation.0 == self.generation
    }

    /// Applies the result of fetching the root document.
    ///
    /// Returns `Ok(false)` if the result is stale. A Catalog gets a
    /// collections cursor if it has a `data` link or conforms to the
    /// collections endpoint, and a Collection gets an items cursor from its
    /// `items` link.
    pub fn apply_value(&mut self, generation: Generation, result: Result<Value>) -> Result<bool> {
        if !self.is_current(generation) {
            tracing::debug!("ignoring stale root document");
            return Ok(false);
        }
        let value = match result? {
            Value::Catalog(catalog) => {
                self.collections = collections_request(&catalog).map(Cursor::new);
                Value::Catalog(catalog)
            }
            Value::Collection(collection) => {
                self.items = collection.link("items").map(|link| Cursor::new(link));
                Value::Collection(collection)
            }
            Value::ItemCollection(mut item_collection) => {
                let (items, warnings) = sanitize_items(std::mem::take(&mut item_collection.items));
                item_collection.items = items;
                self.warnings.extend(warnings);
                Value::ItemCollection(item_collection)
            }
            value => value,
        };
        self.value = Some(value);
        Ok(true)
    }

    /// Applies the result of fetching one child link.
    ///
    /// A child item with an invalid geometry is dropped with a warning.
    /// Returns false if the result is stale.
    pub fn apply_child(&mut self, generation: Generation, href: String, result: Result<Value>) -> bool {
        if !self.is_current(generation) {
            tracing::debug!("ignoring stale child {href}");
            return false;
        }
        match result {
            Ok(Value::Item(item)) => {
                let (items, warnings) = sanitize_items(vec![item]);
                self.children.extend(items.into_iter().map(Value::Item));
                self.warnings.extend(warnings);
            }
            Ok(value) => self.children.push(value),
            Err(error) => {
                tracing::warn!("could not fetch child {href}: {error}");
                self.child_errors.push(ChildError { href, error });
            }
        }
        true
    }

    /// Applies a page of the collections listing.
    pub fn apply_collections_page(
        &mut self,
        generation: Generation,
        ticket: Ticket,
        result: Result<Collections>,
    ) -> Result<Option<usize>> {
        match self.collections.as_mut() {
            Some(cursor) if generation.0 == self.generation => cursor.complete(ticket, result),
            _ => Ok(None),
        }
    }

    /// Applies a page of the items listing or search.
    pub fn apply_items_page(
        &mut self,
        generation: Generation,
        ticket: Ticket,
        result: Result<ItemCollection>,
    ) -> Result<Option<usize>> {
        match self.items.as_mut() {
            Some(cursor) if generation.0 == self.generation => cursor.complete(ticket, result),
            _ => Ok(None),
        }
    }

    /// Navigates to `href`, fetches it, then fetches its children.
    ///
    /// Children are applied in completion order. Child failures are kept in
    /// [AppState::child_errors]; only a failure of the root document is
    /// returned.
    pub async fn load(&mut self, fetcher: &Fetcher, href: impl ToString) -> Result<()> {
        let (generation, request) = self.navigate(href, fetcher);
        let result = fetcher.fetch(request).await;
        let _ = self.apply_value(generation, result)?;
        let links = self.value.as_ref().map(child_links).unwrap_or_default();
        let stream = fetcher.fetch_links(links);
        futures::pin_mut!(stream);
        while let Some((href, result)) = stream.next().await {
            let _ = self.apply_child(generation, href, result);
        }
        Ok(())
    }

    /// Fetches the next page of the collections listing, if any.
    pub async fn load_more_collections(&mut self, fetcher: &Fetcher) -> Result<Option<usize>> {
        let generation = self.generation();
        let Some((ticket, request)) = self.collections.as_mut().and_then(Cursor::begin) else {
            return Ok(None);
        };
        let result = fetcher.fetch_page(&request).await;
        self.apply_collections_page(generation, ticket, result)
    }

    /// Fetches the next page of the items listing or search, if any.
    pub async fn load_more_items(&mut self, fetcher: &Fetcher) -> Result<Option<usize>> {
        let generation = self.generation();
        let Some((ticket, request)) = self.items.as_mut().and_then(Cursor::begin) else {
            return Ok(None);
        };
        let result = fetcher.fetch_page(&request).await;
        self.apply_items_page(generation, ticket, result)
    }

    /// Replaces the search and restarts the items cursor against the value's
    /// `search` link.
    ///
    /// Returns false if the value has no `search` link.
    pub fn set_search(&mut self, search: SearchState) -> Result<bool> {
        self.search = search;
        let Some(link) = self.value.as_ref().and_then(|value| value.link("search")) else {
            return Ok(false);
        };
        let (request, notice) = self.search.to_request(link)?;
        self.notices.extend(notice);
        self.items = Some(Cursor::new(request));
        Ok(true)
    }

    /// Sets the viewport used by [AppState::visible_collections] and
    /// [AppState::visible_items].
    pub fn set_viewport(&mut self, viewport: Option<Bbox>) {
        self.viewport = viewport;
    }

    /// Sets the datetime filter.
    pub fn set_datetime_bounds(&mut self, bounds: Option<DatetimeBounds>) {
        self.datetime_bounds = bounds;
    }

    /// Sets whether global collections match every viewport.
    pub fn set_include_global(&mut self, include_global: bool) {
        self.include_global = include_global;
    }

    /// Returns the collections that pass the viewport and datetime filters.
    pub fn visible_collections(&self) -> Vec<&Collection> {
        filter_collections(
            self.collections(),
            self.viewport.as_ref(),
            self.datetime_bounds.as_ref(),
            self.include_global,
        )
    }

    /// Returns the items that pass the viewport and datetime filters.
    pub fn visible_items(&self) -> Vec<&Item> {
        filter_items(
            self.items(),
            self.viewport.as_ref(),
            self.datetime_bounds.as_ref(),
        )
    }

    /// Returns the combined temporal extent of every known collection and item.
    pub fn datetime_extent(&self) -> DatetimeBounds {
        let mut bounds = compute_datetime_bounds(self.items());
        for collection in self.collections() {
            let (start, end) = collection.datetime_interval();
            bounds.extend(start, end);
        }
        bounds
    }

    /// Returns every known collection: children, then the collections listing.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.children
            .iter()
            .filter_map(|value| match value {
                Value::Collection(collection) => Some(collection),
                _ => None,
            })
            .chain(self.collections.iter().flat_map(|cursor| cursor.entries()))
    }

    /// Returns every known item: the value's own, children, then the items
    /// listing.
    pub fn items(&self) -> impl Iterator<Item = &Item> {
        let own = match &self.value {
            Some(Value::ItemCollection(item_collection)) => item_collection.items.as_slice(),
            _ => &[],
        };
        own.iter()
            .chain(self.children.iter().filter_map(|value| match value {
                Value::Item(item) => Some(item),
                _ => None,
            }))
            .chain(self.items.iter().flat_map(|cursor| cursor.entries()))
    }

    /// Returns the active href.
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref()
    }

    /// Returns the resolved root value.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Returns the resolved children, in completion order.
    pub fn children(&self) -> &[Value] {
        &self.children
    }

    /// Returns the children that failed to resolve.
    pub fn child_errors(&self) -> &[ChildError] {
        &self.child_errors
    }

    /// Returns the collections cursor.
    pub fn collections_cursor(&self) -> Option<&Cursor<Collections>> {
        self.collections.as_ref()
    }

    /// Returns the items cursor.
    pub fn items_cursor(&self) -> Option<&Cursor<ItemCollection>> {
        self.items.as_ref()
    }

    /// Returns the current search.
    pub fn search(&self) -> &SearchState {
        &self.search
    }

    /// Returns every item dropped for an invalid geometry.
    pub fn warnings(&self) -> Vec<&InvalidGeometry> {
        self.warnings
            .iter()
            .chain(self.items.iter().flat_map(|cursor| cursor.warnings()))
            .collect()
    }

    /// Returns the antimeridian notices raised by searches.
    pub fn notices(&self) -> &[AntimeridianNarrowed] {
        &self.notices
    }
}

impl Default for AppState {
    fn default() -> Self {
        AppState::new()
    }
}

fn collections_request(catalog: &Catalog) -> Option<Request> {
    if let Some(link) = catalog.link("data") {
        return Some(Request::from(link));
    }
    let conforms = catalog
        .additional_fields
        .get("conformsTo")
        .and_then(|value| value.as_array())
        .is_some_and(|classes| {
            classes.iter().filter_map(|class| class.as_str()).any(|class| {
                class.ends_with("/collections") || class.contains("ogcapi-features")
            })
        });
    if conforms {
        catalog
            .self_link()
            .map(|link| Request::get(format!("{}/collections", link.href.trim_end_matches('/'))))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::AppState;
    use crate::{Fetcher, SearchState};
    use mockito::Server;
    use serde_json::json;
    use stac_map::{Bbox, DatetimeBounds, Value};

    #[tokio::test]
    async fn load_catalog_with_children() {
        let mut server = Server::new_async().await;
        let _root = server
            .mock("GET", "/catalog.json")
            .with_body(
                json!({
                    "type": "Catalog",
                    "id": "root",
                    "description": "",
                    "links": [
                        {"href": "./east/collection.json", "rel": "child"},
                        {"href": "./west/collection.json", "rel": "child"},
                        {"href": "./missing/collection.json", "rel": "child"}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _east = server
            .mock("GET", "/east/collection.json")
            .with_body(
                json!({
                    "type": "Collection",
                    "id": "east",
                    "description": "",
                    "extent": {
                        "spatial": {"bbox": [[100, -10, 110, 10]]},
                        "temporal": {"interval": [["2020-01-01T00:00:00Z", "2020-12-31T23:59:59Z"]]}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _west = server
            .mock("GET", "/west/collection.json")
            .with_body(
                json!({
                    "type": "Collection",
                    "id": "west",
                    "description": "",
                    "extent": {
                        "spatial": {"bbox": [[-110, -10, -100, 10]]},
                        "temporal": {"interval": [["2021-01-01T00:00:00Z", null]]}
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/missing/collection.json")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = Fetcher::new(Default::default()).unwrap();
        let mut state = AppState::new();
        state
            .load(&fetcher, format!("{}/catalog.json", server.url()))
            .await
            .unwrap();
        assert_eq!(state.children().len(), 2);
        assert_eq!(state.child_errors().len(), 1);
        assert_eq!(state.visible_collections().len(), 2);

        state.set_viewport(Some(Bbox::new(90., -5., 120., 5.)));
        let visible = state.visible_collections();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "east");

        state.set_viewport(None);
        state.set_datetime_bounds(Some("2021-06-01/2021-07-01".parse().unwrap()));
        let visible = state.visible_collections();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "west");

        let extent = state.datetime_extent();
        assert_eq!(
            extent.start.unwrap().to_rfc3339(),
            "2020-01-01T00:00:00+00:00"
        );
        assert_eq!(extent.end.unwrap().to_rfc3339(), "2020-12-31T23:59:59+00:00");
    }

    #[test]
    fn stale_results_are_ignored() {
        let fetcher = Fetcher::new(Default::default()).unwrap();
        let mut state = AppState::new();
        let (old, _) = state.navigate("https://stac.test/a.json", &fetcher);
        let (current, _) = state.navigate("https://stac.test/b.json", &fetcher);
        assert!(!state.is_current(old));
        let applied = state
            .apply_value(
                old,
                Ok(Value::Catalog(stac_map::Catalog::new("a"))),
            )
            .unwrap();
        assert!(!applied);
        assert!(state.value().is_none());
        assert!(!state.apply_child(
            old,
            "https://stac.test/child.json".to_string(),
            Ok(Value::Catalog(stac_map::Catalog::new("child"))),
        ));
        assert!(state.children().is_empty());
        assert!(
            state
                .apply_value(current, Ok(Value::Catalog(stac_map::Catalog::new("b"))))
                .unwrap()
        );
        assert_eq!(state.value().unwrap().id(), Some("b"));
        assert_eq!(state.href(), Some("https://stac.test/b.json"));
    }

    #[test]
    fn child_item_with_invalid_geometry_is_dropped() {
        let fetcher = Fetcher::new(Default::default()).unwrap();
        let mut state = AppState::new();
        let (generation, _) = state.navigate("https://stac.test/catalog.json", &fetcher);
        let child = |id: &str, x: f64| -> Value {
            serde_json::from_value(json!({
                "type": "Feature",
                "id": id,
                "geometry": {"type": "Point", "coordinates": [x, 0]},
                "properties": {"datetime": "2024-01-01T00:00:00Z"}
            }))
            .unwrap()
        };
        assert!(state.apply_child(
            generation,
            "https://stac.test/good.json".to_string(),
            Ok(child("good", 10.)),
        ));
        assert!(state.apply_child(
            generation,
            "https://stac.test/bad.json".to_string(),
            Ok(child("bad", 500.)),
        ));
        assert_eq!(state.children().len(), 1);
        assert_eq!(state.children()[0].id(), Some("good"));
        let warnings = state.warnings();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].id, "bad");
        assert!(state.child_errors().is_empty());
    }

    #[test]
    fn data_link_creates_collections_cursor() {
        let fetcher = Fetcher::new(Default::default()).unwrap();
        let mut state = AppState::new();
        let (generation, _) = state.navigate("https://stac.test/api", &fetcher);
        let value = Value::from_json(json!({
            "type": "Catalog",
            "id": "api",
            "description": "",
            "conformsTo": ["https://api.stacspec.org/v1.0.0/collections"],
            "links": [{"href": "https://stac.test/api", "rel": "self"}]
        }))
        .unwrap();
        let _ = state.apply_value(generation, Ok(value)).unwrap();
        let cursor = state.collections_cursor().unwrap();
        assert_eq!(
            cursor.next_request().unwrap().href,
            "https://stac.test/api/collections"
        );
    }

    #[test]
    fn search_without_link() {
        let mut state = AppState::new();
        assert!(!state.set_search(SearchState::new()).unwrap());
    }

    #[tokio::test]
    async fn search_across_the_antimeridian() {
        let mut server = Server::new_async().await;
        let base = server.url();
        let _root = server
            .mock("GET", "/api")
            .with_body(
                json!({
                    "type": "Catalog",
                    "id": "api",
                    "description": "",
                    "links": [{"href": format!("{base}/search"), "rel": "search", "method": "POST"}]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _search = server
            .mock("POST", "/search")
            .with_body(
                json!({
                    "type": "FeatureCollection",
                    "features": [
                        {"type": "Feature", "id": "a", "bbox": [-179, -1, -178, 1], "geometry": null, "properties": {"datetime": "2024-01-02T00:00:00Z"}},
                        {"type": "Feature", "id": "b", "geometry": {"type": "Point", "coordinates": [500, 0]}, "properties": {}}
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;
        let fetcher = Fetcher::new(Default::default()).unwrap();
        let mut state = AppState::new();
        state.load(&fetcher, format!("{base}/api")).await.unwrap();
        let search = SearchState::new()
            .with_bbox(Bbox::new(170., -10., 200., 10.))
            .with_datetime_bounds(&DatetimeBounds::unbounded());
        assert!(state.set_search(search).unwrap());
        assert_eq!(state.notices().len(), 1);
        assert_eq!(state.load_more_items(&fetcher).await.unwrap(), Some(1));
        assert_eq!(state.warnings().len(), 1);
        assert_eq!(state.visible_items().len(), 1);
        assert_eq!(state.load_more_items(&fetcher).await.unwrap(), None);
    }
}
