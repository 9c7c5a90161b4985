use crate::{Asset, Bbox, Error, Link, Links, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt::Display;

/// A STAC value: a [Catalog], [Collection], [Item], or [ItemCollection].
///
/// The `type` field is the discriminator. Documents that arrive without one
/// get it inferred from their shape by [crate::href::infer_type] before they
/// are decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
#[allow(clippy::large_enum_variant)]
pub enum Value {
    /// A STAC Catalog.
    Catalog(Catalog),

    /// A STAC Collection.
    Collection(Collection),

    /// A STAC Item.
    #[serde(rename = "Feature")]
    Item(Item),

    /// A GeoJSON FeatureCollection of STAC Items.
    #[serde(rename = "FeatureCollection")]
    ItemCollection(ItemCollection),
}

/// The four kinds of STAC entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// A catalog.
    Catalog,

    /// A collection.
    Collection,

    /// An item (GeoJSON `Feature`).
    Item,

    /// An item collection (GeoJSON `FeatureCollection`).
    ItemCollection,
}

/// A STAC Catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// The STAC version the catalog implements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,

    /// A list of extension identifiers the catalog implements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,

    /// Identifier for the catalog.
    pub id: String,

    /// A short descriptive one-line title for the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Detailed multi-line description to fully explain the catalog.
    #[serde(default)]
    pub description: String,

    /// A list of references to other documents.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Additional fields not part of the catalog specification.
    #[serde(flatten)]
    pub additional_fields: Map<String, JsonValue>,
}

/// A STAC Collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// The STAC version the collection implements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,

    /// A list of extension identifiers the collection implements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,

    /// Identifier for the collection that is unique across the provider.
    pub id: String,

    /// A short descriptive one-line title for the collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Detailed multi-line description to fully explain the collection.
    #[serde(default)]
    pub description: String,

    /// Collection's license(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    /// Spatial and temporal extents.
    #[serde(default)]
    pub extent: Extent,

    /// Dictionary of asset objects that can be downloaded.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub assets: IndexMap<String, Asset>,

    /// A list of references to other documents.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Additional fields not part of the collection specification.
    #[serde(flatten)]
    pub additional_fields: Map<String, JsonValue>,
}

/// The extent of a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Potential spatial extents covered by the collection.
    #[serde(default)]
    pub spatial: SpatialExtent,

    /// Potential temporal extents covered by the collection.
    #[serde(default)]
    pub temporal: TemporalExtent,

    /// Additional fields on the extent.
    #[serde(flatten)]
    pub additional_fields: Map<String, JsonValue>,
}

/// The spatial extent of a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    /// The first box is the overall extent, the rest are sub-extents.
    #[serde(default)]
    pub bbox: Vec<Bbox>,
}

/// The temporal extent of a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemporalExtent {
    /// The first interval is the overall extent; `null` ends are open.
    #[serde(default)]
    pub interval: Vec<[Option<String>; 2]>,
}

/// A STAC Item, a GeoJSON Feature with STAC fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// The STAC version the item implements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stac_version: Option<String>,

    /// A list of extension identifiers the item implements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stac_extensions: Vec<String>,

    /// Provider identifier.
    pub id: String,

    /// Defines the full footprint of the asset represented by this item.
    #[serde(default)]
    pub geometry: Option<geojson::Geometry>,

    /// Bounding box of the asset represented by this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,

    /// Additional metadata fields, including `datetime`.
    #[serde(default)]
    pub properties: Map<String, JsonValue>,

    /// List of link objects to resources and related URLs.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Dictionary of asset objects that can be downloaded.
    #[serde(default)]
    pub assets: IndexMap<String, Asset>,

    /// The id of the collection this item references to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Additional fields not part of the item specification.
    #[serde(flatten)]
    pub additional_fields: Map<String, JsonValue>,
}

/// A GeoJSON FeatureCollection of STAC Items, e.g. a page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemCollection {
    /// An optional identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The items.
    #[serde(rename = "features", default)]
    pub items: Vec<Item>,

    /// Links, e.g. to the `next` page of a search.
    #[serde(default)]
    pub links: Vec<Link>,

    /// Additional fields, e.g. `numberMatched`.
    #[serde(flatten)]
    pub additional_fields: Map<String, JsonValue>,
}

impl Value {
    /// Creates a value from a JSON object, inferring the type if it is missing.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Value;
    ///
    /// let value = Value::from_json(serde_json::json!({
    ///     "id": "an-id",
    ///     "stac_version": "1.1.0",
    ///     "extent": {"spatial": {"bbox": [[-180, -90, 180, 90]]}, "temporal": {"interval": [[null, null]]}}
    /// })).unwrap();
    /// assert!(matches!(value, Value::Collection(_)));
    /// ```
    pub fn from_json(json: JsonValue) -> Result<Value> {
        match json {
            JsonValue::Object(mut object) => {
                if !object.contains_key("type") {
                    let r#type = crate::href::infer_type(&object).ok_or(Error::UnknownShape)?;
                    let _ = object.insert("type".to_string(), r#type.as_str().into());
                }
                serde_json::from_value(JsonValue::Object(object)).map_err(Error::from)
            }
            _ => Err(Error::NotAnObject(json)),
        }
    }

    /// Returns this value's type.
    pub fn r#type(&self) -> Type {
        match self {
            Value::Catalog(_) => Type::Catalog,
            Value::Collection(_) => Type::Collection,
            Value::Item(_) => Type::Item,
            Value::ItemCollection(_) => Type::ItemCollection,
        }
    }

    /// Returns this value's id, which is optional only for item collections.
    pub fn id(&self) -> Option<&str> {
        match self {
            Value::Catalog(catalog) => Some(&catalog.id),
            Value::Collection(collection) => Some(&collection.id),
            Value::Item(item) => Some(&item.id),
            Value::ItemCollection(item_collection) => item_collection.id.as_deref(),
        }
    }

    /// Returns a mutable reference to this value's assets, if it can have any.
    pub fn assets_mut(&mut self) -> Option<&mut IndexMap<String, Asset>> {
        match self {
            Value::Collection(collection) => Some(&mut collection.assets),
            Value::Item(item) => Some(&mut item.assets),
            Value::Catalog(_) | Value::ItemCollection(_) => None,
        }
    }
}

impl Type {
    /// Returns the value of the `type` field for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Type::Catalog => "Catalog",
            Type::Collection => "Collection",
            Type::Item => "Feature",
            Type::ItemCollection => "FeatureCollection",
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Catalog {
    /// Creates a new catalog with the given id.
    pub fn new(id: impl ToString) -> Catalog {
        Catalog {
            stac_version: None,
            stac_extensions: Vec::new(),
            id: id.to_string(),
            title: None,
            description: String::new(),
            links: Vec::new(),
            additional_fields: Map::new(),
        }
    }
}

impl Collection {
    /// Creates a new collection with the given id and an empty extent.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Collection;
    ///
    /// let collection = Collection::new("an-id");
    /// assert!(collection.extent.spatial.bbox.is_empty());
    /// ```
    pub fn new(id: impl ToString) -> Collection {
        Collection {
            stac_version: None,
            stac_extensions: Vec::new(),
            id: id.to_string(),
            title: None,
            description: String::new(),
            license: None,
            extent: Extent::default(),
            assets: IndexMap::new(),
            links: Vec::new(),
            additional_fields: Map::new(),
        }
    }
}

impl Item {
    /// Creates a new item with the given id and no geometry.
    pub fn new(id: impl ToString) -> Item {
        Item {
            stac_version: None,
            stac_extensions: Vec::new(),
            id: id.to_string(),
            geometry: None,
            bbox: None,
            properties: Map::new(),
            links: Vec::new(),
            assets: IndexMap::new(),
            collection: None,
            additional_fields: Map::new(),
        }
    }

    /// Returns a string property, if it is set.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|value| value.as_str())
    }
}

macro_rules! impl_links {
    ($($t:ty),*) => {
        $(
            impl Links for $t {
                fn links(&self) -> &[Link] {
                    &self.links
                }

                fn links_mut(&mut self) -> &mut Vec<Link> {
                    &mut self.links
                }
            }
        )*
    };
}

impl_links!(Catalog, Collection, Item, ItemCollection);

impl Links for Value {
    fn links(&self) -> &[Link] {
        match self {
            Value::Catalog(catalog) => catalog.links(),
            Value::Collection(collection) => collection.links(),
            Value::Item(item) => item.links(),
            Value::ItemCollection(item_collection) => item_collection.links(),
        }
    }

    fn links_mut(&mut self) -> &mut Vec<Link> {
        match self {
            Value::Catalog(catalog) => catalog.links_mut(),
            Value::Collection(collection) => collection.links_mut(),
            Value::Item(item) => item.links_mut(),
            Value::ItemCollection(item_collection) => item_collection.links_mut(),
        }
    }
}

impl From<Vec<Item>> for ItemCollection {
    fn from(items: Vec<Item>) -> ItemCollection {
        ItemCollection {
            items,
            ..Default::default()
        }
    }
}

impl From<Catalog> for Value {
    fn from(catalog: Catalog) -> Value {
        Value::Catalog(catalog)
    }
}

impl From<Collection> for Value {
    fn from(collection: Collection) -> Value {
        Value::Collection(collection)
    }
}

impl From<Item> for Value {
    fn from(item: Item) -> Value {
        Value::Item(item)
    }
}

impl From<ItemCollection> for Value {
    fn from(item_collection: ItemCollection) -> Value {
        Value::ItemCollection(item_collection)
    }
}
