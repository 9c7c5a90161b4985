use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use stac_map::{
    Collection, InvalidGeometry, Item, ItemCollection, Link, Value, geometry::sanitize_items,
    href,
};
use std::fmt::Debug;

/// One page of a paginated STAC listing.
pub trait Page: Sized {
    /// The kind of entry on this page.
    type Entry: Debug;

    /// Decodes a page, resolving its hrefs against `base`.
    fn from_json(json: JsonValue, base: &str) -> Result<Self>;

    /// Returns this page's links.
    fn links(&self) -> &[Link];

    /// Consumes this page, returning its entries and any entries that were
    /// dropped.
    fn into_entries(self) -> (Vec<Self::Entry>, Vec<InvalidGeometry>);

    /// Returns the `next` link, if there is one.
    fn next_link(&self) -> Option<&Link> {
        self.links().iter().find(|link| link.is_next())
    }
}

/// A page of the `/collections` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Collections {
    /// The collections on this page.
    pub collections: Vec<Collection>,

    /// Links, including `next`.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Additional fields, e.g. `numberMatched`.
    #[serde(flatten)]
    pub additional_fields: Map<String, JsonValue>,
}

impl Page for Collections {
    type Entry = Collection;

    fn from_json(json: JsonValue, base: &str) -> Result<Collections> {
        let mut page: Collections = serde_json::from_value(json)?;
        href::make_links_absolute(&mut page.links, base)?;
        for collection in &mut page.collections {
            href::make_links_absolute(&mut collection.links, base)?;
            href::make_assets_absolute(&mut collection.assets, base)?;
        }
        Ok(page)
    }

    fn links(&self) -> &[Link] {
        &self.links
    }

    fn into_entries(self) -> (Vec<Collection>, Vec<InvalidGeometry>) {
        (self.collections, Vec::new())
    }
}

impl Page for ItemCollection {
    type Entry = Item;

    fn from_json(json: JsonValue, base: &str) -> Result<ItemCollection> {
        let value = Value::from_json(json)?;
        match href::normalize_document(&value, base)? {
            Value::ItemCollection(item_collection) => Ok(item_collection),
            value => Err(Error::IncorrectType {
                actual: value.r#type().as_str().to_string(),
                expected: "FeatureCollection".to_string(),
            }),
        }
    }

    fn links(&self) -> &[Link] {
        &self.links
    }

    fn into_entries(self) -> (Vec<Item>, Vec<InvalidGeometry>) {
        sanitize_items(self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::{Collections, Page};
    use serde_json::json;
    use stac_map::ItemCollection;

    #[test]
    fn collections_page() {
        let page = Collections::from_json(
            json!({
                "collections": [{
                    "type": "Collection",
                    "id": "a",
                    "description": "",
                    "links": [{"href": "a/items", "rel": "items"}]
                }],
                "links": [{"href": "collections?token=2", "rel": "next"}],
                "numberMatched": 2
            }),
            "https://stac.test/api/collections",
        )
        .unwrap();
        assert_eq!(
            page.next_link().unwrap().href,
            "https://stac.test/api/collections?token=2"
        );
        assert_eq!(
            page.collections[0].links[0].href,
            "https://stac.test/api/a/items"
        );
        assert_eq!(page.additional_fields["numberMatched"], 2);
        let (entries, warnings) = page.into_entries();
        assert_eq!(entries.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn item_page_drops_invalid_geometries() {
        let page = ItemCollection::from_json(
            json!({
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "id": "good", "geometry": {"type": "Point", "coordinates": [1, 2]}, "properties": {}},
                    {"type": "Feature", "id": "bad", "geometry": {"type": "Point", "coordinates": [1, 200]}, "properties": {}}
                ]
            }),
            "https://stac.test/search",
        )
        .unwrap();
        assert!(page.next_link().is_none());
        let (items, warnings) = page.into_entries();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "good");
        assert_eq!(warnings[0].id, "bad");
    }

    #[test]
    fn item_page_wrong_type() {
        let _ = ItemCollection::from_json(
            json!({"type": "Catalog", "id": "c", "description": ""}),
            "https://stac.test/catalog.json",
        )
        .unwrap_err();
    }
}
