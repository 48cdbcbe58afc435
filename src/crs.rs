//! Coordinate reference systems and polygon reprojection.
//!
//! Geographic systems on the NAD83 and WGS84 datums differ by well under a
//! grid cell at the resolutions handled here, so they are treated as the same
//! system. Anything projected goes through PROJ when the `proj` feature is on.

use std::fmt;

use geo::MultiPolygon;

use crate::error::GeoError;

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
const NAD83_PRJ: &str = r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;

/// A CRS definition: an authority code such as `EPSG:4326`, a PROJ string or WKT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crs(String);

impl Crs {
    pub fn new(definition: impl Into<String>) -> Self {
        Crs(definition.into().trim().to_string())
    }

    pub fn wgs84() -> Self {
        Crs::new("EPSG:4326")
    }

    pub fn nad83() -> Self {
        Crs::new("EPSG:4269")
    }

    /// Interprets the contents of an ESRI `.prj` sidecar.
    pub fn from_prj(wkt: &str) -> Self {
        let wkt = wkt.trim();
        if wkt.starts_with("GEOGCS") && wkt.contains("North_American_1983") {
            Crs::nad83()
        } else if wkt.starts_with("GEOGCS") && wkt.contains("WGS_1984") {
            Crs::wgs84()
        } else {
            Crs::new(wkt)
        }
    }

    pub fn definition(&self) -> &str {
        &self.0
    }

    /// True for longitude/latitude systems on the NAD83 or WGS84 datum.
    pub fn is_geographic(&self) -> bool {
        let def = self.0.to_lowercase();
        matches!(def.as_str(), "epsg:4326" | "epsg:4269" | "ogc:crs84")
            || def.contains("+proj=longlat")
            || def.contains("+proj=latlong")
            || (def.starts_with("geogcs[")
                && (def.contains("wgs_1984") || def.contains("north_american_1983")))
    }

    /// Equivalent for masking purposes.
    pub fn matches(&self, other: &Crs) -> bool {
        self.0.eq_ignore_ascii_case(&other.0) || (self.is_geographic() && other.is_geographic())
    }

    /// ESRI WKT for the `.prj` sidecar, when one is known.
    pub fn esri_wkt(&self) -> Option<&'static str> {
        match self.0.to_lowercase().as_str() {
            "epsg:4326" | "ogc:crs84" => Some(WGS84_PRJ),
            "epsg:4269" => Some(NAD83_PRJ),
            _ => None,
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.definition())
    }
}

/// Moves polygons between coordinate reference systems.
pub trait Reproject {
    fn reproject(
        &self,
        geometry: &MultiPolygon<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<MultiPolygon<f64>, GeoError>;
}

/// Handles only geographic-to-geographic moves, which are the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeographicReprojector;

impl Reproject for GeographicReprojector {
    fn reproject(
        &self,
        geometry: &MultiPolygon<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<MultiPolygon<f64>, GeoError> {
        if from.matches(to) {
            Ok(geometry.clone())
        } else {
            Err(GeoError::UnsupportedCrs {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }
}

#[cfg(feature = "proj")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjReprojector;

#[cfg(feature = "proj")]
impl Reproject for ProjReprojector {
    fn reproject(
        &self,
        geometry: &MultiPolygon<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<MultiPolygon<f64>, GeoError> {
        use geo::{Coord, MapCoords};
        use proj::Proj;

        if from.matches(to) {
            return Ok(geometry.clone());
        }

        let proj = Proj::new_known_crs(from.definition(), to.definition(), None)
            .map_err(|e| GeoError::Projection(e.to_string()))?;

        geometry
            .try_map_coords(|c| proj.convert((c.x, c.y)).map(|(x, y)| Coord { x, y }))
            .map_err(|e| GeoError::Projection(e.to_string()))
    }
}

/// The best reprojector this build supports.
pub fn reprojector() -> Box<dyn Reproject> {
    #[cfg(feature = "proj")]
    {
        Box::new(ProjReprojector)
    }
    #[cfg(not(feature = "proj"))]
    {
        Box::new(GeographicReprojector)
    }
}

// -- Tests -------------------------------------------------------------------
