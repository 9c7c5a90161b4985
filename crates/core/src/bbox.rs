use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A bounding box, in degrees.
///
/// Three dimensional boxes are collapsed to two dimensions for every spatial
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub enum Bbox {
    /// `[xmin, ymin, xmax, ymax]`
    TwoDimensional([f64; 4]),

    /// `[xmin, ymin, zmin, xmax, ymax, zmax]`
    ThreeDimensional([f64; 6]),
}

impl Bbox {
    /// Creates a new two dimensional bounding box.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Bbox;
    ///
    /// let bbox = Bbox::new(-106.1, 40.5, -106.0, 40.6);
    /// assert_eq!(bbox.xmin(), -106.1);
    /// ```
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Bbox {
        Bbox::TwoDimensional([xmin, ymin, xmax, ymax])
    }

    /// Returns the whole-world bounding box.
    pub fn global() -> Bbox {
        Bbox::new(-180., -90., 180., 90.)
    }

    /// Returns the minimum x value.
    pub fn xmin(&self) -> f64 {
        match self {
            Bbox::TwoDimensional(b) => b[0],
            Bbox::ThreeDimensional(b) => b[0],
        }
    }

    /// Returns the minimum y value.
    pub fn ymin(&self) -> f64 {
        match self {
            Bbox::TwoDimensional(b) => b[1],
            Bbox::ThreeDimensional(b) => b[1],
        }
    }

    /// Returns the maximum x value.
    pub fn xmax(&self) -> f64 {
        match self {
            Bbox::TwoDimensional(b) => b[2],
            Bbox::ThreeDimensional(b) => b[3],
        }
    }

    /// Returns the maximum y value.
    pub fn ymax(&self) -> f64 {
        match self {
            Bbox::TwoDimensional(b) => b[3],
            Bbox::ThreeDimensional(b) => b[4],
        }
    }

    /// Returns the width of this box, in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.xmax() - self.xmin()
    }

    /// Collapses this box to two dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Bbox;
    ///
    /// let bbox: Bbox = vec![1., 2., 3., 4., 5., 6.].try_into().unwrap();
    /// assert_eq!(bbox.to_2d(), Bbox::new(1., 2., 4., 5.));
    /// ```
    pub fn to_2d(&self) -> Bbox {
        Bbox::new(self.xmin(), self.ymin(), self.xmax(), self.ymax())
    }

    /// Returns true if the two boxes overlap, boundaries included.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_map::Bbox;
    ///
    /// let a = Bbox::new(0., 0., 1., 1.);
    /// assert!(a.intersects(&Bbox::new(1., 1., 2., 2.)));
    /// assert!(!a.intersects(&Bbox::new(1.1, 0., 2., 1.)));
    /// ```
    pub fn intersects(&self, other: &Bbox) -> bool {
        self.xmin() <= other.xmax()
            && other.xmin() <= self.xmax()
            && self.ymin() <= other.ymax()
            && other.ymin() <= self.ymax()
    }

    /// Returns this box as a two dimensional array.
    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin(), self.ymin(), self.xmax(), self.ymax()]
    }
}

impl TryFrom<Vec<f64>> for Bbox {
    type Error = Error;

    fn try_from(value: Vec<f64>) -> Result<Bbox> {
        if let Ok(bbox) = <[f64; 4]>::try_from(value.as_slice()) {
            Ok(Bbox::TwoDimensional(bbox))
        } else if let Ok(bbox) = <[f64; 6]>::try_from(value.as_slice()) {
            Ok(Bbox::ThreeDimensional(bbox))
        } else {
            Err(Error::InvalidBbox(value))
        }
    }
}

impl From<Bbox> for Vec<f64> {
    fn from(bbox: Bbox) -> Vec<f64> {
        match bbox {
            Bbox::TwoDimensional(b) => b.to_vec(),
            Bbox::ThreeDimensional(b) => b.to_vec(),
        }
    }
}

impl From<[f64; 4]> for Bbox {
    fn from(value: [f64; 4]) -> Bbox {
        Bbox::TwoDimensional(value)
    }
}

impl FromStr for Bbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Bbox> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f64>()
                    .map_err(|_| Error::InvalidBbox(Vec::new()))
            })
            .collect::<Result<Vec<_>>>()?;
        if values.iter().any(|value| !value.is_finite()) {
            return Err(Error::InvalidBbox(values));
        }
        values.try_into()
    }
}
