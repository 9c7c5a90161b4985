//! Spatial and temporal predicates used to narrow what's "in view".
//!
//! Everything here is pure: predicates take entities by reference and never
//! mutate or log, with the single exception of [normalize_viewport_bbox],
//! which reports antimeridian narrowing.

use crate::{Bbox, Collection, DatetimeBounds, Item, Temporal};
use serde::Serialize;

/// Informational notice emitted when a search bbox had to be narrowed to one
/// side of the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AntimeridianNarrowed {
    /// The viewport as it was given.
    pub original: Bbox,

    /// The single rectangle that will actually be searched.
    pub narrowed: Bbox,
}

/// A viewport bbox that is safe to send to a STAC API.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedViewport {
    /// The normalized bbox, which never crosses ±180°.
    pub bbox: Bbox,

    /// Set if the viewport crossed the antimeridian and was narrowed.
    pub notice: Option<AntimeridianNarrowed>,
}

/// Returns true if the bbox covers every longitude.
///
/// # Examples
///
/// ```
/// use stac_map::{Bbox, filter};
///
/// assert!(filter::bbox_is_global(&Bbox::global()));
/// assert!(!filter::bbox_is_global(&Bbox::new(-180., -90., 179., 90.)));
/// ```
pub fn bbox_is_global(bbox: &Bbox) -> bool {
    bbox.width() >= 360.
}

/// Returns true if the collection's overall spatial extent overlaps the viewport.
///
/// When `include_global` is true, a collection with a global extent matches
/// every viewport. A collection without a spatial extent never matches.
///
/// # Examples
///
/// ```
/// use stac_map::{Bbox, Collection, filter};
///
/// let mut collection = Collection::new("an-id");
/// collection.extent.spatial.bbox.push(Bbox::global());
/// let viewport = Bbox::new(10., 10., 20., 20.);
/// assert!(filter::is_collection_in_bbox(&collection, &viewport, true));
/// ```
pub fn is_collection_in_bbox(collection: &Collection, viewport: &Bbox, include_global: bool) -> bool {
    let Some(bbox) = collection.extent.spatial.bbox.first() else {
        return false;
    };
    if include_global && bbox_is_global(bbox) {
        true
    } else {
        bbox.intersects(viewport)
    }
}

/// Returns true if the item's bbox overlaps the viewport.
///
/// Items have no "global" exception, and an item without a bbox never matches.
pub fn is_item_in_bbox(item: &Item, viewport: &Bbox) -> bool {
    item.bbox.is_some_and(|bbox| bbox.intersects(viewport))
}

/// Returns true if the collection's overall temporal extent overlaps the bounds.
///
/// # Examples
///
/// ```
/// use stac_map::{Collection, DatetimeBounds, filter};
///
/// let mut collection = Collection::new("an-id");
/// collection.extent.temporal.interval.push([
///     Some("2020-01-01T00:00:00Z".to_string()),
///     Some("2020-12-31T23:59:59Z".to_string()),
/// ]);
/// let bounds: DatetimeBounds = "2020-01-01/2020-12-31".parse().unwrap();
/// assert!(filter::is_collection_in_datetime_bounds(&collection, &bounds));
/// let bounds: DatetimeBounds = "2021-01-01/2021-12-31".parse().unwrap();
/// assert!(!filter::is_collection_in_datetime_bounds(&collection, &bounds));
/// ```
pub fn is_collection_in_datetime_bounds(collection: &Collection, bounds: &DatetimeBounds) -> bool {
    is_in_datetime_bounds(collection, bounds)
}

/// Returns true if the item's datetime (or start/end datetime) overlaps the bounds.
pub fn is_item_in_datetime_bounds(item: &Item, bounds: &DatetimeBounds) -> bool {
    is_in_datetime_bounds(item, bounds)
}

fn is_in_datetime_bounds(entity: &impl Temporal, bounds: &DatetimeBounds) -> bool {
    let (start, end) = entity.datetime_interval();
    bounds.overlaps(start, end)
}

/// Normalizes a raw map viewport into a single bbox suitable for a search query.
///
/// Applied in order:
///
/// 1. A box at least 360° wide, or with a non-finite longitude, is clamped
///    to `[-180, 180]`.
/// 2. A box starting west of -180° is shifted east by whole turns until its
///    start is in range.
/// 3. A box ending east of 180° is shifted west by whole turns, as far as
///    its start stays at or east of -180°.
/// 4. A box that still ends east of 180° crosses the antimeridian. It's
///    narrowed to one side: if its midpoint is beyond 180° the western piece
///    `[-180, ymin, xmax - 360, ymax]` is kept, otherwise the eastern piece
///    `[xmin, ymin, 180, ymax]`.
///
/// Latitudes are clamped to `[-90, 90]`.
///
/// # Examples
///
/// ```
/// use stac_map::{Bbox, filter};
///
/// let viewport = filter::normalize_viewport_bbox(Bbox::new(170., -10., 200., 10.));
/// assert_eq!(viewport.bbox, Bbox::new(-180., -10., -160., 10.));
/// assert!(viewport.notice.is_some());
/// ```
pub fn normalize_viewport_bbox(raw: Bbox) -> NormalizedViewport {
    let [mut xmin, ymin, mut xmax, ymax] = raw.to_array();
    let (ymin, ymax) = (ymin.max(-90.), ymax.min(90.));
    if !(xmin.is_finite() && xmax.is_finite()) || xmax - xmin >= 360. {
        return NormalizedViewport {
            bbox: Bbox::new(-180., ymin, 180., ymax),
            notice: None,
        };
    }
    if xmin < -180. {
        let shift = ((-180. - xmin) / 360.).ceil() * 360.;
        xmin += shift;
        xmax += shift;
    }
    if xmax > 180. {
        let turns = ((xmax - 180.) / 360.)
            .ceil()
            .min(((xmin + 180.) / 360.).floor())
            .max(0.);
        xmin -= turns * 360.;
        xmax -= turns * 360.;
    }
    // Huge longitudes lose precision when shifted.
    xmin = xmin.clamp(-180., 180.);
    xmax = xmax.clamp(xmin, xmin + 360.);
    if xmax > 180. {
        let narrowed = if (xmin + xmax) / 2. > 180. {
            Bbox::new(-180., ymin, xmax - 360., ymax)
        } else {
            Bbox::new(xmin, ymin, 180., ymax)
        };
        tracing::info!(
            "viewport {:?} crosses the antimeridian, search narrowed to {:?}",
            raw.to_array(),
            narrowed.to_array()
        );
        NormalizedViewport {
            bbox: narrowed,
            notice: Some(AntimeridianNarrowed {
                original: raw,
                narrowed,
            }),
        }
    } else {
        NormalizedViewport {
            bbox: Bbox::new(xmin, ymin, xmax, ymax),
            notice: None,
        }
    }
}

/// Returns the collections that are in the viewport and the datetime bounds.
///
/// `None` for either filter means that filter is not applied.
pub fn filter_collections<'a>(
    collections: impl IntoIterator<Item = &'a Collection>,
    viewport: Option<&Bbox>,
    bounds: Option<&DatetimeBounds>,
    include_global: bool,
) -> Vec<&'a Collection> {
    collections
        .into_iter()
        .filter(|collection| {
            viewport.is_none_or(|viewport| is_collection_in_bbox(collection, viewport, include_global))
                && bounds.is_none_or(|bounds| is_collection_in_datetime_bounds(collection, bounds))
        })
        .collect()
}

/// Returns the items that are in the viewport and the datetime bounds.
pub fn filter_items<'a>(
    items: impl IntoIterator<Item = &'a Item>,
    viewport: Option<&Bbox>,
    bounds: Option<&DatetimeBounds>,
) -> Vec<&'a Item> {
    items
        .into_iter()
        .filter(|item| {
            viewport.is_none_or(|viewport| is_item_in_bbox(item, viewport))
                && bounds.is_none_or(|bounds| is_item_in_datetime_bounds(item, bounds))
        })
        .collect()
}
