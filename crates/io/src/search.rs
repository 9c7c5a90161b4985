use crate::{Request, Result};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use stac_map::{
    Bbox, DatetimeBounds, Link, Method,
    filter::{AntimeridianNarrowed, normalize_viewport_bbox},
};
use std::collections::BTreeSet;
use url::Url;

/// The parameters of a STAC API item search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    collections: BTreeSet<String>,
    bbox: Option<Bbox>,
    datetime: Option<String>,
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
struct GetSearch {
    #[serde(skip_serializing_if = "Option::is_none")]
    collections: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    datetime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PostSearch<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    collections: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bbox: Option<Bbox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    datetime: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
}

impl SearchState {
    /// Creates an empty search.
    pub fn new() -> SearchState {
        SearchState::default()
    }

    /// Sets the collection ids to search.
    pub fn with_collections<I, S>(mut self, collections: I) -> SearchState
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        self.collections = collections.into_iter().map(|c| c.to_string()).collect();
        self
    }

    /// Sets the bounding box, usually the current viewport.
    pub fn with_bbox(mut self, bbox: impl Into<Option<Bbox>>) -> SearchState {
        self.bbox = bbox.into();
        self
    }

    /// Sets the datetime interval string, e.g. `2024-01-01T00:00:00Z/..`.
    pub fn with_datetime(mut self, datetime: impl Into<Option<String>>) -> SearchState {
        self.datetime = datetime.into();
        self
    }

    /// Sets the datetime from bounds, clearing it if the bounds are unbounded.
    pub fn with_datetime_bounds(mut self, bounds: &DatetimeBounds) -> SearchState {
        self.datetime = (!bounds.is_unbounded()).then(|| bounds.to_string());
        self
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: impl Into<Option<u64>>) -> SearchState {
        self.limit = limit.into();
        self
    }

    /// Returns the collection ids.
    pub fn collections(&self) -> &BTreeSet<String> {
        &self.collections
    }

    /// Returns the bounding box.
    pub fn bbox(&self) -> Option<&Bbox> {
        self.bbox.as_ref()
    }

    /// Returns the datetime interval string.
    pub fn datetime(&self) -> Option<&str> {
        self.datetime.as_deref()
    }

    /// Returns the page size.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Builds the first request of this search against a `search` link.
    ///
    /// A `GET` link gets query parameters and a `POST` link gets a JSON body,
    /// merged over the link's own body. The bbox is normalized first, and
    /// the notice is returned if it was narrowed at the antimeridian.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::{Bbox, Link};
    /// use stac_map_io::SearchState;
    ///
    /// let search = SearchState::new()
    ///     .with_collections(["a"])
    ///     .with_bbox(Bbox::new(-10., -10., 10., 10.));
    /// let (request, notice) = search
    ///     .to_request(&Link::new("https://stac.test/search", "search"))
    ///     .unwrap();
    /// assert_eq!(
    ///     request.href,
    ///     "https://stac.test/search?collections=a&bbox=-10%2C-10%2C10%2C10"
    /// );
    /// assert!(notice.is_none());
    /// ```
    pub fn to_request(&self, link: &Link) -> Result<(Request, Option<AntimeridianNarrowed>)> {
        let viewport = self.bbox.map(normalize_viewport_bbox);
        let bbox = viewport.map(|viewport| viewport.bbox);
        let notice = viewport.and_then(|viewport| viewport.notice);
        let request = match link.method_or_default() {
            Method::Get => {
                let params = GetSearch {
                    collections: (!self.collections.is_empty()).then(|| {
                        self.collections
                            .iter()
                            .map(String::as_str)
                            .collect::<Vec<_>>()
                            .join(",")
                    }),
                    bbox: bbox.map(|bbox| bbox.to_array().map(|v| v.to_string()).join(",")),
                    datetime: self.datetime.clone(),
                    limit: self.limit,
                };
                let query = serde_urlencoded::to_string(&params)?;
                let mut url = Url::parse(&link.href)?;
                if !query.is_empty() {
                    let query = match url.query() {
                        Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                        _ => query,
                    };
                    url.set_query(Some(&query));
                }
                Request::get(url)
            }
            Method::Post => {
                let mut body = match &link.body {
                    Some(JsonValue::Object(object)) => object.clone(),
                    _ => Map::new(),
                };
                let params = PostSearch {
                    collections: self.collections.iter().map(String::as_str).collect(),
                    bbox,
                    datetime: self.datetime.as_deref(),
                    limit: self.limit,
                };
                if let JsonValue::Object(params) = serde_json::to_value(params)? {
                    body.extend(params);
                }
                Request::post(&link.href, JsonValue::Object(body))
            }
        };
        Ok((request, notice))
    }
}
