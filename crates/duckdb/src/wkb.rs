//! Well-known binary (WKB) geometry decoding.
//!
//! Rows are parsed with the `wkb` crate and converted to [geo_types] through
//! [geo_traits]. Both byte orders are supported, as are ISO Z and M
//! dimensions, which are read and dropped. Geometry collections are rejected
//! before parsing, since they are the only WKB type that nests.

use crate::{Error, Result};
use arrow_array::{Array, BinaryArray};
use arrow_buffer::{Buffer, OffsetBuffer, ScalarBuffer};
use geo_traits::to_geo::ToGeoGeometry;
use geo_types::Geometry;

const GEOMETRY_COLLECTION: u32 = 7;

/// Decodes one WKB geometry.
///
/// # Examples
///
/// ```
/// use geo_types::{Geometry, Point};
///
/// let mut wkb = vec![1u8];
/// wkb.extend(1u32.to_le_bytes());
/// wkb.extend(1.0f64.to_le_bytes());
/// wkb.extend(2.0f64.to_le_bytes());
/// let geometry = stac_map_duckdb::wkb::decode(&wkb).unwrap();
/// assert_eq!(geometry, Geometry::Point(Point::new(1., 2.)));
/// ```
pub fn decode(bytes: &[u8]) -> std::result::Result<Geometry<f64>, String> {
    match geometry_code(bytes) {
        None => return Err("invalid byte order or truncated header".to_string()),
        Some(GEOMETRY_COLLECTION) => {
            return Err("geometry collections are not supported".to_string());
        }
        Some(_) => {}
    }
    let wkb = ::wkb::reader::read_wkb(bytes).map_err(|err| err.to_string())?;
    wkb.try_to_geometry()
        .ok_or_else(|| "empty points are not supported".to_string())
}

/// Decodes a column of WKB values, one geometry per row.
///
/// The rows are concatenated into one buffer with prefix-summed offsets and
/// decoded as a single binary array, so output row `i` is input row `i`.
pub fn decode_column(rows: &[Vec<u8>]) -> Result<Vec<Geometry<f64>>> {
    let array = to_binary_array(rows)?;
    let mut geometries = Vec::with_capacity(array.len());
    for (row, bytes) in array.iter().enumerate() {
        let bytes = bytes.unwrap_or_default();
        let geometry = decode(bytes).map_err(|message| Error::Wkb { row, message })?;
        geometries.push(geometry);
    }
    Ok(geometries)
}

fn to_binary_array(rows: &[Vec<u8>]) -> Result<BinaryArray> {
    let mut offsets = Vec::with_capacity(rows.len() + 1);
    offsets.push(0i32);
    let mut end = 0i32;
    for row in rows {
        end = end
            .checked_add(i32::try_from(row.len())?)
            .ok_or(Error::ColumnTooLarge)?;
        offsets.push(end);
    }
    let offsets = OffsetBuffer::new(ScalarBuffer::from(offsets));
    let values = Buffer::from_vec(rows.concat());
    let array = BinaryArray::try_new(offsets, values, None)?;
    Ok(array)
}

/// Reads the geometry type code from the header, without Z, M, or SRID flags.
fn geometry_code(bytes: &[u8]) -> Option<u32> {
    let header: [u8; 4] = bytes.get(1..5)?.try_into().ok()?;
    let code = match bytes.first()? {
        0 => u32::from_be_bytes(header),
        1 => u32::from_le_bytes(header),
        _ => return None,
    };
    Some((code & 0x0fff_ffff) % 1000)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{decode, decode_column};
    use crate::Error;
    use geo_types::{Geometry, LineString, MultiPolygon, Point, Polygon, polygon};
    use rstest::rstest;

    pub(crate) fn point(x: f64, y: f64) -> Vec<u8> {
        let mut wkb = vec![1];
        wkb.extend(1u32.to_le_bytes());
        wkb.extend(x.to_le_bytes());
        wkb.extend(y.to_le_bytes());
        wkb
    }

    pub(crate) fn square(xmin: f64, ymin: f64, size: f64) -> Vec<u8> {
        let ring = [
            (xmin, ymin),
            (xmin + size, ymin),
            (xmin + size, ymin + size),
            (xmin, ymin + size),
            (xmin, ymin),
        ];
        let mut wkb = vec![1];
        wkb.extend(3u32.to_le_bytes());
        wkb.extend(1u32.to_le_bytes());
        wkb.extend(5u32.to_le_bytes());
        for (x, y) in ring {
            wkb.extend(x.to_le_bytes());
            wkb.extend(y.to_le_bytes());
        }
        wkb
    }

    fn big_endian_point(x: f64, y: f64) -> Vec<u8> {
        let mut wkb = vec![0];
        wkb.extend(1u32.to_be_bytes());
        wkb.extend(x.to_be_bytes());
        wkb.extend(y.to_be_bytes());
        wkb
    }

    fn point_with_type(geometry_type: u32, values: &[f64]) -> Vec<u8> {
        let mut wkb = vec![1];
        wkb.extend(geometry_type.to_le_bytes());
        for value in values {
            wkb.extend(value.to_le_bytes());
        }
        wkb
    }

    #[rstest]
    #[case::little_endian(point(1., 2.))]
    #[case::big_endian(big_endian_point(1., 2.))]
    #[case::iso_z(point_with_type(1001, &[1., 2., 3.]))]
    #[case::iso_m(point_with_type(2001, &[1., 2., 4.]))]
    #[case::iso_zm(point_with_type(3001, &[1., 2., 3., 4.]))]
    fn point_variants(#[case] wkb: Vec<u8>) {
        assert_eq!(decode(&wkb).unwrap(), Geometry::Point(Point::new(1., 2.)));
    }

    #[test]
    fn polygon() {
        let geometry = decode(&square(0., 0., 1.)).unwrap();
        assert_eq!(
            geometry,
            Geometry::Polygon(polygon![
                (x: 0., y: 0.),
                (x: 1., y: 0.),
                (x: 1., y: 1.),
                (x: 0., y: 1.),
                (x: 0., y: 0.),
            ])
        );
    }

    #[test]
    fn multi_polygon() {
        let mut wkb = vec![1];
        wkb.extend(6u32.to_le_bytes());
        wkb.extend(2u32.to_le_bytes());
        wkb.extend(square(0., 0., 1.));
        wkb.extend(square(10., 10., 2.));
        let Geometry::MultiPolygon(MultiPolygon(polygons)) = decode(&wkb).unwrap() else {
            panic!("expected a multipolygon");
        };
        assert_eq!(polygons.len(), 2);
        assert_eq!(polygons[1].exterior().0[2].x, 12.);
    }

    #[test]
    fn empty_polygon() {
        let mut wkb = vec![1];
        wkb.extend(3u32.to_le_bytes());
        wkb.extend(0u32.to_le_bytes());
        assert_eq!(
            decode(&wkb).unwrap(),
            Geometry::Polygon(Polygon::new(LineString(Vec::new()), Vec::new()))
        );
    }

    #[rstest]
    #[case::empty(Vec::new())]
    #[case::bad_byte_order(vec![2, 1, 0, 0, 0])]
    #[case::short_header(vec![1, 1])]
    #[case::unknown_code(point_with_type(17, &[1., 2.]))]
    #[case::collection(nested_collection(1))]
    #[case::big_endian_collection({ let mut wkb = vec![0]; wkb.extend(7u32.to_be_bytes()); wkb.extend(0u32.to_be_bytes()); wkb })]
    fn invalid(#[case] wkb: Vec<u8>) {
        let _ = decode(&wkb).unwrap_err();
    }

    fn nested_collection(depth: usize) -> Vec<u8> {
        let mut wkb = Vec::new();
        for _ in 0..depth {
            wkb.push(1);
            wkb.extend(7u32.to_le_bytes());
            wkb.extend(1u32.to_le_bytes());
        }
        wkb.extend(point(1., 2.));
        wkb
    }

    #[test]
    fn deeply_nested_collection() {
        let wkb = nested_collection(1_000_000);
        let message = decode(&wkb).unwrap_err();
        assert!(message.contains("collection"), "{message}");
        let rows = vec![point(1., 2.), wkb];
        match decode_column(&rows).unwrap_err() {
            Error::Wkb { row, .. } => assert_eq!(row, 1),
            error => panic!("unexpected error: {error}"),
        }
    }

    #[test]
    fn column_is_row_aligned() {
        let rows = vec![point(1., 2.), square(0., 0., 1.), point(3., 4.)];
        let geometries = decode_column(&rows).unwrap();
        assert_eq!(geometries.len(), 3);
        assert_eq!(geometries[0], Geometry::Point(Point::new(1., 2.)));
        assert!(matches!(geometries[1], Geometry::Polygon(_)));
        assert_eq!(geometries[2], Geometry::Point(Point::new(3., 4.)));
    }

    #[test]
    fn column_error_has_row() {
        let rows = vec![point(1., 2.), point_with_type(17, &[1., 2.])];
        match decode_column(&rows).unwrap_err() {
            Error::Wkb { row, .. } => assert_eq!(row, 1),
            error => panic!("unexpected error: {error}"),
        }
    }
}
