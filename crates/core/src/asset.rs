use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An asset is an object that contains a URI to data associated with an item
/// or collection that can be downloaded or streamed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// URI to the asset object.
    ///
    /// Made absolute at resolution time, like link hrefs.
    pub href: String,

    /// The displayed title for clients and users.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Media type of the asset.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// The semantic roles of the asset.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    /// Alternate locations of the same asset, from the alternate-assets extension.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub alternate: IndexMap<String, Asset>,

    /// Additional fields on the asset.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

impl Asset {
    /// Creates a new asset with the provided href.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Asset;
    ///
    /// let asset = Asset::new("/asset/dir/asset.tif");
    /// assert_eq!(asset.href, "/asset/dir/asset.tif");
    /// ```
    pub fn new(href: impl ToString) -> Asset {
        Asset {
            href: href.to_string(),
            title: None,
            r#type: None,
            roles: Vec::new(),
            alternate: IndexMap::new(),
            additional_fields: Map::new(),
        }
    }

    /// Returns true if this asset has the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::Asset;

    #[test]
    fn alternate() {
        let asset: Asset = serde_json::from_str(
            r#"{"href": "./data.tif", "roles": ["data"], "alternate": {"s3": {"href": "s3://bucket/data.tif"}}}"#,
        )
        .unwrap();
        assert!(asset.has_role("data"));
        assert_eq!(asset.alternate["s3"].href, "s3://bucket/data.tif");
    }
}
