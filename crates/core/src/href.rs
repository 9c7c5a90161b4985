//! Resolve relative hrefs and normalize fetched documents.

use crate::{Asset, Error, Link, Links, Result, Type, Value};
use indexmap::IndexMap;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value as JsonValue};
use url::Url;

/// Returns `true` if the href parses as an absolute url.
pub fn is_absolute(href: &str) -> bool {
    Url::parse(href).is_ok()
}

/// Makes an href absolute relative to a base url.
///
/// Absolute hrefs are returned unchanged. `s3://` results are returned
/// percent-decoded, because object keys are raw UTF-8; every other scheme
/// gets the standard percent-encoded form.
///
/// # Examples
///
/// ```
/// use stac_map::href::to_absolute;
///
/// assert_eq!(to_absolute("./item.json", "https://stac.test/a/b").unwrap(), "https://stac.test/a/item.json");
/// assert_eq!(to_absolute("http://stac.test/item.json", "https://other.test/").unwrap(), "http://stac.test/item.json");
/// assert_eq!(to_absolute("🦄.tiff", "s3://bucket").unwrap(), "s3://bucket/🦄.tiff");
/// to_absolute("./item.json", "not a url").unwrap_err();
/// ```
pub fn to_absolute(href: &str, base: &str) -> Result<String> {
    if is_absolute(href) {
        return Ok(href.to_string());
    }
    let base_url = Url::parse(base).map_err(|_| Error::MalformedBaseUrl(base.to_string()))?;
    let url = base_url
        .join(href)
        .map_err(|_| Error::MalformedBaseUrl(base.to_string()))?;
    if url.scheme() == "s3" {
        Ok(percent_decode_str(url.as_str())
            .decode_utf8_lossy()
            .into_owned())
    } else {
        Ok(url.into())
    }
}

/// Returns a copy of the value with absolute link and asset hrefs and a `self` link.
///
/// If there's no `self` link, one is appended with `href = base`. Items
/// inside an item collection get their links and assets made absolute too,
/// but they don't get a `self` link added.
///
/// # Examples
///
/// ```
/// use stac_map::{Catalog, Link, Links, Value, href};
///
/// let mut catalog = Catalog::new("an-id");
/// catalog.links.push(Link::new("a/b/c", "child"));
/// let value = href::normalize_document(&catalog.into(), "https://example.com/root/item.json").unwrap();
/// assert_eq!(value.links()[0].href, "https://example.com/root/a/b/c");
/// assert_eq!(value.self_link().unwrap().href, "https://example.com/root/item.json");
/// ```
pub fn normalize_document(value: &Value, base: &str) -> Result<Value> {
    let mut value = value.clone();
    make_links_absolute(value.links_mut(), base)?;
    if value.self_link().is_none() {
        value.links_mut().push(Link::self_(base));
    }
    if let Some(assets) = value.assets_mut() {
        make_assets_absolute(assets, base)?;
    }
    if let Value::ItemCollection(ref mut item_collection) = value {
        for item in &mut item_collection.items {
            make_links_absolute(&mut item.links, base)?;
            make_assets_absolute(&mut item.assets, base)?;
        }
    }
    Ok(value)
}

/// Makes every link href absolute.
pub fn make_links_absolute(links: &mut [Link], base: &str) -> Result<()> {
    for link in links {
        link.href = to_absolute(&link.href, base)?;
    }
    Ok(())
}

/// Makes every asset href absolute, including alternate assets.
pub fn make_assets_absolute(assets: &mut IndexMap<String, Asset>, base: &str) -> Result<()> {
    for asset in assets.values_mut() {
        asset.href = to_absolute(&asset.href, base)?;
        make_assets_absolute(&mut asset.alternate, base)?;
    }
    Ok(())
}

/// Infers a document's type from its shape.
///
/// Checked in order: `features` (an array) means an item collection,
/// `extent` means a collection, `geometry` and `properties` mean an item,
/// and `stac_version` alone means a catalog. Any other shape is `None`.
///
/// # Examples
///
/// ```
/// use stac_map::{Type, href::infer_type};
///
/// let object = serde_json::json!({"geometry": null, "properties": {}});
/// assert_eq!(infer_type(object.as_object().unwrap()), Some(Type::Item));
/// ```
pub fn infer_type(object: &Map<String, JsonValue>) -> Option<Type> {
    if object.get("features").is_some_and(JsonValue::is_array) {
        Some(Type::ItemCollection)
    } else if object.contains_key("extent") {
        Some(Type::Collection)
    } else if object.contains_key("geometry") && object.contains_key("properties") {
        Some(Type::Item)
    } else if object.contains_key("stac_version") {
        Some(Type::Catalog)
    } else {
        None
    }
}
