use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A link from one STAC object to another resource.
///
/// After resolution every link's `href` is absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// The actual link in the format of an URL.
    pub href: String,

    /// Relationship between the current document and the linked document.
    pub rel: String,

    /// Media type of the referenced entity.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,

    /// A human readable title to be used in rendered displays of the link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// The HTTP method of the request, usually `GET` or `POST`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,

    /// The body of a `POST` request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// Additional fields on the link.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// The HTTP method of a link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    #[default]
    #[serde(alias = "get")]
    Get,

    /// `POST`
    #[serde(alias = "post")]
    Post,
}

/// Implemented by any object that has links.
pub trait Links {
    /// Returns a reference to this object's links.
    fn links(&self) -> &[Link];

    /// Returns a mutable reference to this object's links.
    fn links_mut(&mut self) -> &mut Vec<Link>;

    /// Returns the first link with the given rel type.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::{Catalog, Link, Links};
    ///
    /// let mut catalog = Catalog::new("an-id");
    /// catalog.links.push(Link::new("./child.json", "child"));
    /// assert!(catalog.link("child").is_some());
    /// assert!(catalog.link("item").is_none());
    /// ```
    fn link(&self, rel: &str) -> Option<&Link> {
        self.links().iter().find(|link| link.rel == rel)
    }

    /// Returns this object's self link.
    fn self_link(&self) -> Option<&Link> {
        self.link("self")
    }

    /// Returns an iterator over this object's child links.
    fn iter_child_links(&self) -> Box<dyn Iterator<Item = &Link> + '_> {
        Box::new(self.links().iter().filter(|link| link.is_child()))
    }

    /// Returns an iterator over this object's item links.
    fn iter_item_links(&self) -> Box<dyn Iterator<Item = &Link> + '_> {
        Box::new(self.links().iter().filter(|link| link.is_item()))
    }
}

impl Link {
    /// Creates a new link with the provided href and rel type.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Link;
    ///
    /// let link = Link::new("an-href", "a-rel");
    /// assert_eq!(link.href, "an-href");
    /// assert_eq!(link.rel, "a-rel");
    /// ```
    pub fn new(href: impl ToString, rel: impl ToString) -> Link {
        Link {
            href: href.to_string(),
            rel: rel.to_string(),
            r#type: None,
            title: None,
            method: None,
            body: None,
            additional_fields: Map::new(),
        }
    }

    /// Creates a new `self` link.
    pub fn self_(href: impl ToString) -> Link {
        Link::new(href, "self")
    }

    /// Sets this link's method.
    pub fn method(mut self, method: Method) -> Link {
        self.method = Some(method);
        self
    }

    /// Sets this link's body.
    pub fn body(mut self, body: impl Into<Value>) -> Link {
        self.body = Some(body.into());
        self
    }

    /// Returns true if this is a `self` link.
    pub fn is_self(&self) -> bool {
        self.rel == "self"
    }

    /// Returns true if this is a `child` link.
    pub fn is_child(&self) -> bool {
        self.rel == "child"
    }

    /// Returns true if this is an `item` link.
    pub fn is_item(&self) -> bool {
        self.rel == "item"
    }

    /// Returns true if this is a `next` link.
    pub fn is_next(&self) -> bool {
        self.rel == "next"
    }

    /// Returns true if this is a `previous` (or `prev`) link.
    pub fn is_previous(&self) -> bool {
        self.rel == "previous" || self.rel == "prev"
    }

    /// Returns the method for following this link, defaulting to `GET`.
    pub fn method_or_default(&self) -> Method {
        self.method.unwrap_or_default()
    }
}

impl Links for Vec<Link> {
    fn links(&self) -> &[Link] {
        self
    }

    fn links_mut(&mut self) -> &mut Vec<Link> {
        self
    }
}
