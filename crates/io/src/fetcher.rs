use crate::{Error, Page, Result};
use futures::{Stream, StreamExt, stream::FuturesUnordered};
use serde_json::{Map, Value as JsonValue};
use stac_map::{Link, Links, Method, Value, href};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use tokio::sync::OnceCell;
use url::Url;

/// The default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The default number of retries for transient failures.
pub const DEFAULT_RETRIES: u32 = 1;

/// The default delay before the first retry, doubled for each subsequent one.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Configuration for a [Fetcher].
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// Per-request timeout.
    pub timeout: Duration,

    /// How many times to retry a transient failure.
    pub retries: u32,

    /// Delay before the first retry.
    pub backoff: Duration,

    /// The `User-Agent` header.
    pub user_agent: String,
}

/// A request for a STAC document or a page of a listing.
///
/// Requests are idempotent and cached by `(href, method, body)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// The href, either a url or a local path.
    pub href: String,

    /// The HTTP method.
    pub method: Method,

    /// The JSON body, for `POST` requests.
    pub body: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RequestKey {
    href: String,
    method: Method,
    body: Option<String>,
}

/// Fetches STAC documents, normalizes them, and deduplicates concurrent requests.
///
/// Cloning a fetcher is cheap, and clones share the same cache.
///
/// Only successes are cached. When an in-flight request fails, each caller
/// that was waiting on it sends the request again in turn, and a later
/// fetch of the same request goes back to the network.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    options: FetcherOptions,
    cache: Arc<Mutex<HashMap<RequestKey, Arc<OnceCell<JsonValue>>>>>,
}

/// The result of expanding a value's `child` and `item` links.
#[derive(Debug, Default)]
pub struct Children {
    /// Successfully fetched values, in completion order.
    pub values: Vec<Value>,

    /// Links that failed, each with its own error.
    pub errors: Vec<ChildError>,
}

/// A child link that could not be fetched.
#[derive(Debug)]
pub struct ChildError {
    /// The href of the child link.
    pub href: String,

    /// What went wrong.
    pub error: Error,
}

enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Fetcher {
    /// Creates a new fetcher.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map_io::{Fetcher, FetcherOptions};
    ///
    /// let fetcher = Fetcher::new(FetcherOptions::default()).unwrap();
    /// ```
    pub fn new(options: FetcherOptions) -> Result<Fetcher> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(&options.user_agent)
            .build()?;
        Ok(Fetcher {
            client,
            options,
            cache: Default::default(),
        })
    }

    /// Fetches a STAC value.
    ///
    /// The returned value has absolute hrefs and a `self` link. A document
    /// without a `type` field has its type inferred from its shape. Errors
    /// are returned to this caller only and are never cached.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stac_map_io::Fetcher;
    ///
    /// # tokio_test::block_on(async {
    /// let fetcher = Fetcher::new(Default::default()).unwrap();
    /// let value = fetcher.fetch("https://stac.test/catalog.json").await.unwrap();
    /// # })
    /// ```
    pub async fn fetch(&self, request: impl Into<Request>) -> Result<Value> {
        let request = request.into();
        let (json, base) = self.fetch_json(&request).await?;
        let value = Value::from_json(json).map_err(|err| Error::from(err).with_href(&request.href))?;
        let value = href::normalize_document(&value, &base)?;
        Ok(value)
    }

    /// Fetches one page of a listing.
    pub async fn fetch_page<P: Page>(&self, request: &Request) -> Result<P> {
        let (json, base) = self.fetch_json(request).await?;
        P::from_json(json, &base).map_err(|err| err.with_href(&request.href))
    }

    /// Fetches every `child` and `item` link of a value.
    ///
    /// Links are fetched concurrently and one failure never prevents the
    /// others from resolving.
    pub async fn fetch_children(&self, value: &Value) -> Children {
        let mut children = Children::default();
        let stream = self.fetch_links(child_links(value));
        futures::pin_mut!(stream);
        while let Some((href, result)) = stream.next().await {
            match result {
                Ok(value) => children.values.push(value),
                Err(error) => children.errors.push(ChildError { href, error }),
            }
        }
        children
    }

    /// Fetches links concurrently, yielding `(href, result)` in completion order.
    pub fn fetch_links(
        &self,
        links: Vec<Link>,
    ) -> impl Stream<Item = (String, Result<Value>)> + '_ {
        links
            .into_iter()
            .map(|link| async move {
                let result = self.fetch(&link).await;
                if let Err(err) = &result {
                    tracing::warn!("could not fetch {}: {err}", link.href);
                }
                (link.href, result)
            })
            .collect::<FuturesUnordered<_>>()
    }

    /// Drops every cached document.
    ///
    /// Document identity is href-scoped, so the whole cache goes when the
    /// active href changes.
    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Returns the number of cached requests.
    pub fn cache_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn fetch_json(&self, request: &Request) -> Result<(JsonValue, String)> {
        let cell = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(request.key())
            .or_default()
            .clone();
        let json = cell
            .get_or_try_init(|| self.fetch_uncached(request))
            .await?
            .clone();
        Ok((json, base_url(&request.href)?))
    }

    async fn fetch_uncached(&self, request: &Request) -> Result<JsonValue> {
        tracing::debug!("fetching {:?} {}", request.method, request.href);
        match Location::from(request.href.as_str()) {
            Location::Remote(url) => self.get_remote(url, request).await,
            Location::Local(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|io| Error::FromPath {
                    io,
                    path: path.to_string_lossy().into_owned(),
                })?;
                serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
                    href: request.href.clone(),
                    source,
                })
            }
        }
    }

    async fn get_remote(&self, url: Url, request: &Request) -> Result<JsonValue> {
        let mut attempt = 0;
        loop {
            match self.send(url.clone(), request).await {
                Err(err) if attempt < self.options.retries && err.is_transient() => {
                    let delay = self.options.backoff * 2u32.saturating_pow(attempt);
                    tracing::warn!(
                        "transient error getting {}, retrying in {delay:?}: {err}",
                        request.href
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send(&self, url: Url, request: &Request) -> Result<JsonValue> {
        let empty = JsonValue::Object(Map::new());
        let builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self
                .client
                .post(url)
                .json(request.body.as_ref().unwrap_or(&empty)),
        };
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                href: request.href.clone(),
            });
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
            href: request.href.clone(),
            source,
        })
    }
}

/// Returns a value's `child` and `item` links.
pub fn child_links(value: &Value) -> Vec<Link> {
    value
        .links()
        .iter()
        .filter(|link| link.is_child() || link.is_item())
        .cloned()
        .collect()
}

/// Returns the url that relative hrefs in the document at `href` resolve against.
///
/// Local paths become `file://` urls.
fn base_url(href: &str) -> Result<String> {
    if Url::parse(href).is_ok() {
        Ok(href.to_string())
    } else {
        let path = std::path::absolute(href).map_err(|io| Error::FromPath {
            io,
            path: href.to_string(),
        })?;
        Url::from_file_path(&path)
            .map(String::from)
            .map_err(|_| Error::InvalidHref(href.to_string()))
    }
}

impl Request {
    /// Creates a `GET` request.
    pub fn get(href: impl ToString) -> Request {
        Request {
            href: href.to_string(),
            method: Method::Get,
            body: None,
        }
    }

    /// Creates a `POST` request with a JSON body.
    pub fn post(href: impl ToString, body: JsonValue) -> Request {
        Request {
            href: href.to_string(),
            method: Method::Post,
            body: Some(body),
        }
    }

    pub(crate) fn key(&self) -> RequestKey {
        RequestKey {
            href: self.href.clone(),
            method: self.method,
            body: self.body.as_ref().map(JsonValue::to_string),
        }
    }
}

impl From<&Link> for Request {
    fn from(link: &Link) -> Request {
        Request {
            href: link.href.clone(),
            method: link.method_or_default(),
            body: link.body.clone(),
        }
    }
}

impl From<&str> for Request {
    fn from(href: &str) -> Request {
        Request::get(href)
    }
}

impl From<String> for Request {
    fn from(href: String) -> Request {
        Request::get(href)
    }
}

impl From<&Request> for Request {
    fn from(request: &Request) -> Request {
        request.clone()
    }
}

impl From<&str> for Location {
    fn from(href: &str) -> Location {
        match Url::parse(href) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Location::Local)
                .unwrap_or(Location::Remote(url)),
            Ok(url) => Location::Remote(url),
            Err(_) => Location::Local(PathBuf::from(href)),
        }
    }
}

impl Default for FetcherOptions {
    fn default() -> Self {
        FetcherOptions {
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            backoff: DEFAULT_BACKOFF,
            user_agent: crate::user_agent().to_string(),
        }
    }
}
