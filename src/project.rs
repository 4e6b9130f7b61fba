use crate::error::{Error, Result};

/// An opaque coordinate transform between geographic and projected space.
/// The engine only ever calls `inverse`, to report grid bounds back in
/// geographic coordinates; `forward` completes the pair for callers that
/// project their own data.
pub trait Projection {
    fn name(&self) -> &str;

    /// Geographic (lon, lat) degrees to projected coordinates.
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Projected coordinates back to geographic (lon, lat) degrees.
    fn inverse(&self, x: f64, y: f64) -> (f64, f64);
}

/// Spherical Web Mercator (EPSG:3857), meters on a sphere of radius 6378137.
pub struct WebMercator;

const EARTH_RADIUS: f64 = 6_378_137.0;

impl Projection for WebMercator {
    fn name(&self) -> &str {
        "epsg:3857"
    }

    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = EARTH_RADIUS * lon.to_radians();
        let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        (x, y)
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (y / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
        (lon, lat)
    }
}

/// Look up a projection by its configuration name.
pub fn by_name(name: &str) -> Result<Box<dyn Projection>> {
    match name.to_ascii_lowercase().as_str() {
        "epsg:3857" | "webmercator" => Ok(Box::new(WebMercator)),
        _ => Err(Error::UnknownProjection {
            name: name.to_string(),
        }),
    }
}
