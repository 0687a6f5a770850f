#![forbid(unsafe_code)]

//! Coordinate reference systems and single-position transforms.
//!
//! Every projection knows how to move a position to and from geographic
//! longitude/latitude in degrees. A transform between two projections goes
//! through that common space:
//!
//! ```text
//! from ──unproject──▶ (lon, lat) ──project──▶ to
//! ```
//!
//! Projections compare equal by code. A transform between equal projections
//! returns the input unchanged, bit for bit.
//!
//! # Built-in definitions
//!
//! | Code | Definition |
//! |------|------------|
//! | `EPSG:4326`, `CRS:84` | geographic degrees |
//! | `EPSG:3857` (`EPSG:900913`, `EPSG:102100`, `EPSG:102113`) | spherical web mercator |
//! | `EPSG:326zz` / `EPSG:327zz` | UTM zone `zz` north / south (spherical) |
//!
//! The transverse mercator used for UTM is the spherical form; it is exact at
//! the projection origin and within centimetres near the central meridian.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::coords::Position;
use crate::error::{Error, Result};

/// Earth radius used by the spherical projections (WGS84 semi-major axis).
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Half the web mercator world width; northing is clamped to this.
const MERCATOR_HALF_SIZE: f64 = PI * EARTH_RADIUS;

/// UTM scale factor on the central meridian.
const UTM_SCALE_FACTOR: f64 = 0.9996;

/// UTM false easting.
const UTM_FALSE_EASTING: f64 = 500_000.0;

/// UTM false northing for the southern hemisphere.
const UTM_SOUTH_FALSE_NORTHING: f64 = 10_000_000.0;

/// How a projection maps to and from geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProjectionDef {
    /// Longitude/latitude in degrees.
    Geographic,
    /// Spherical web mercator in metres.
    WebMercator,
    /// Spherical transverse mercator in metres.
    TransverseMercator {
        /// Longitude of the central meridian, degrees.
        central_meridian: f64,
        scale_factor: f64,
        false_easting: f64,
        false_northing: f64,
    },
}

/// A coordinate reference system: an identifying code plus its definition.
#[derive(Clone)]
pub struct Projection {
    code: Arc<str>,
    def: ProjectionDef,
}

impl Projection {
    /// Register a projection under a custom code.
    #[must_use]
    pub fn new(code: impl Into<Arc<str>>, def: ProjectionDef) -> Self {
        Self {
            code: code.into(),
            def,
        }
    }

    /// `EPSG:4326`.
    #[must_use]
    pub fn wgs84() -> Self {
        Self::new("EPSG:4326", ProjectionDef::Geographic)
    }

    /// `EPSG:3857`.
    #[must_use]
    pub fn web_mercator() -> Self {
        Self::new("EPSG:3857", ProjectionDef::WebMercator)
    }

    /// UTM zone `1..=60`, northern or southern hemisphere.
    pub fn utm(zone: u8, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::UnknownProjection(format!("UTM zone {zone}")));
        }
        let prefix = if north { 326 } else { 327 };
        Ok(Self::new(
            format!("EPSG:{prefix}{zone:02}"),
            ProjectionDef::TransverseMercator {
                central_meridian: f64::from(zone) * 6.0 - 183.0,
                scale_factor: UTM_SCALE_FACTOR,
                false_easting: UTM_FALSE_EASTING,
                false_northing: if north { 0.0 } else { UTM_SOUTH_FALSE_NORTHING },
            },
        ))
    }

    /// Look up a built-in projection by code. Aliases resolve to the
    /// canonical code so that they compare equal.
    pub fn from_code(code: &str) -> Result<Self> {
        let normalized = code.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "WGS84" => return Ok(Self::wgs84()),
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" | "EPSG:102113" => {
                return Ok(Self::web_mercator());
            }
            _ => {}
        }
        let utm = normalized
            .strip_prefix("EPSG:")
            .filter(|digits| digits.len() == 5)
            .and_then(|digits| {
                let north = match &digits[..3] {
                    "326" => true,
                    "327" => false,
                    _ => return None,
                };
                digits[3..].parse::<u8>().ok().map(|zone| (zone, north))
            });
        match utm {
            Some((zone, north)) => Self::utm(zone, north),
            None => Err(Error::UnknownProjection(code.to_string())),
        }
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[must_use]
    pub fn def(&self) -> ProjectionDef {
        self.def
    }

    /// Move a position in this projection to geographic degrees.
    fn unproject(&self, p: Position) -> std::result::Result<Position, &'static str> {
        ensure_finite(p)?;
        match self.def {
            ProjectionDef::Geographic => Ok(p),
            ProjectionDef::WebMercator => {
                let lon = (p[0] / EARTH_RADIUS).to_degrees();
                let lat = (2.0 * (p[1] / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
                Ok([lon, lat])
            }
            ProjectionDef::TransverseMercator {
                central_meridian,
                scale_factor,
                false_easting,
                false_northing,
            } => {
                let k = scale_factor * EARTH_RADIUS;
                let x = (p[0] - false_easting) / k;
                let y = (p[1] - false_northing) / k;
                let lat = (y.sin() / x.cosh()).asin();
                let dlon = x.sinh().atan2(y.cos());
                Ok([central_meridian + dlon.to_degrees(), lat.to_degrees()])
            }
        }
    }

    /// Move a geographic position into this projection.
    fn project(&self, p: Position) -> std::result::Result<Position, &'static str> {
        ensure_finite(p)?;
        match self.def {
            ProjectionDef::Geographic => Ok(p),
            ProjectionDef::WebMercator => {
                let x = EARTH_RADIUS * p[0].to_radians();
                let y = EARTH_RADIUS * (FRAC_PI_4 + p[1].to_radians() / 2.0).tan().ln();
                Ok([x, y.clamp(-MERCATOR_HALF_SIZE, MERCATOR_HALF_SIZE)])
            }
            ProjectionDef::TransverseMercator {
                central_meridian,
                scale_factor,
                false_easting,
                false_northing,
            } => {
                let lat = p[1].to_radians();
                let dlon = (p[0] - central_meridian).to_radians();
                let b = lat.cos() * dlon.sin();
                if b.abs() >= 1.0 {
                    return Err("position is 90 degrees from the central meridian");
                }
                let k = scale_factor * EARTH_RADIUS;
                let x = k * 0.5 * ((1.0 + b) / (1.0 - b)).ln();
                let y = k * lat.sin().atan2(lat.cos() * dlon.cos());
                Ok([x + false_easting, y + false_northing])
            }
        }
    }
}

fn ensure_finite(p: Position) -> std::result::Result<(), &'static str> {
    if p[0].is_finite() && p[1].is_finite() {
        Ok(())
    } else {
        Err("non-finite position")
    }
}

/// Transform one position from `from` to `to`.
///
/// Identity (no arithmetic at all) when the projections are equal.
pub fn transform_position(p: Position, from: &Projection, to: &Projection) -> Result<Position> {
    if from == to {
        return Ok(p);
    }
    let fail = |reason| Error::Transform {
        from: from.code().to_string(),
        to: to.code().to_string(),
        position: p,
        reason,
    };
    let geographic = from.unproject(p).map_err(fail)?;
    let out = to.project(geographic).map_err(fail)?;
    ensure_finite(out).map_err(|_| fail("transform produced a non-finite position"))?;
    Ok(out)
}

impl PartialEq for Projection {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Projection {}

impl Hash for Projection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("code", &&*self.code)
            .field("def", &self.def)
            .finish()
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Position, b: Position, tol: f64) -> bool {
        (a[0] - b[0]).abs() <= tol && (a[1] - b[1]).abs() <= tol
    }

    #[test]
    fn identity_is_exact() {
        let p = [0.1 + 0.2, -123.456_789];
        let proj = Projection::web_mercator();
        assert_eq!(transform_position(p, &proj, &proj), Ok(p));
    }

    #[test]
    fn aliases_compare_equal() {
        let a = Projection::from_code("EPSG:900913").unwrap();
        assert_eq!(a, Projection::web_mercator());
        assert_eq!(a.code(), "EPSG:3857");
        assert_eq!(Projection::from_code("crs:84").unwrap(), Projection::wgs84());
    }

    #[test]
    fn unknown_code_is_rejected() {
        assert_eq!(
            Projection::from_code("EPSG:9999"),
            Err(Error::UnknownProjection("EPSG:9999".into()))
        );
        assert!(Projection::from_code("EPSG:32661").is_err());
    }

    #[test]
    fn utm_codes_resolve() {
        let north = Projection::from_code("EPSG:32631").unwrap();
        assert_eq!(north, Projection::utm(31, true).unwrap());
        match north.def() {
            ProjectionDef::TransverseMercator {
                central_meridian,
                false_northing,
                ..
            } => {
                assert_eq!(central_meridian, 3.0);
                assert_eq!(false_northing, 0.0);
            }
            other => panic!("unexpected def {other:?}"),
        }
        let south = Projection::from_code("EPSG:32733").unwrap();
        assert_eq!(south.code(), "EPSG:32733");
        assert!(Projection::utm(0, true).is_err());
    }

    #[test]
    fn web_mercator_origin_and_edge() {
        let wgs = Projection::wgs84();
        let merc = Projection::web_mercator();
        let origin = transform_position([0.0, 0.0], &wgs, &merc).unwrap();
        assert!(close(origin, [0.0, 0.0], 1e-6));
        let edge = transform_position([180.0, 0.0], &wgs, &merc).unwrap();
        assert!(close(edge, [MERCATOR_HALF_SIZE, 0.0], 1e-6));
    }

    #[test]
    fn web_mercator_clamps_poles() {
        let p = transform_position([0.0, 90.0], &Projection::wgs84(), &Projection::web_mercator())
            .unwrap();
        assert_eq!(p[1], MERCATOR_HALF_SIZE);
    }

    #[test]
    fn transverse_mercator_origin_offset_is_exact() {
        let tm = Projection::new(
            "LOCAL:TM0",
            ProjectionDef::TransverseMercator {
                central_meridian: 0.0,
                scale_factor: UTM_SCALE_FACTOR,
                false_easting: UTM_FALSE_EASTING,
                false_northing: 0.0,
            },
        );
        let wgs = Projection::wgs84();
        assert_eq!(transform_position([0.0, 0.0], &wgs, &tm), Ok([500_000.0, 0.0]));
        assert_eq!(transform_position([500_000.0, 0.0], &tm, &wgs), Ok([0.0, 0.0]));
    }

    #[test]
    fn transverse_mercator_round_trip() {
        let utm = Projection::utm(33, true).unwrap();
        let wgs = Projection::wgs84();
        let p = [14.42, 50.08];
        let there = transform_position(p, &wgs, &utm).unwrap();
        let back = transform_position(there, &utm, &wgs).unwrap();
        assert!(close(back, p, 1e-9));
    }

    #[test]
    fn transverse_mercator_rejects_antimeridian_of_axis() {
        let tm = Projection::utm(31, true).unwrap();
        let err = transform_position([93.0, 0.0], &Projection::wgs84(), &tm).unwrap_err();
        assert!(matches!(err, Error::Transform { .. }));
    }

    #[test]
    fn non_finite_input_fails() {
        let err = transform_position(
            [f64::NAN, 0.0],
            &Projection::wgs84(),
            &Projection::web_mercator(),
        )
        .unwrap_err();
        match err {
            Error::Transform { from, to, reason, .. } => {
                assert_eq!(from, "EPSG:4326");
                assert_eq!(to, "EPSG:3857");
                assert_eq!(reason, "non-finite position");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
