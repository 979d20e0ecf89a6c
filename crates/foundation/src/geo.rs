use serde::{Deserialize, Serialize};

/// A WGS84 position as the map widgets report it.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        LatLng { lat, lng }
    }

    /// Parses `"lat,lng"`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (lat, lng) = raw.split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lng = lng.trim().parse::<f64>().ok()?;
        if !lat.is_finite() || !lng.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some(LatLng { lat, lng })
    }

    pub fn to_param(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }

    pub fn rounded(self, decimals: u32) -> Self {
        LatLng {
            lat: round_to(self.lat, decimals),
            lng: round_to(self.lng, decimals),
        }
    }
}

pub fn round_to(v: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(decimals as i32);
    (v * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::{LatLng, round_to};

    #[test]
    fn parses_and_formats() {
        let p = LatLng::parse("48.2, 16.37").unwrap();
        assert_eq!(p, LatLng::new(48.2, 16.37));
        assert_eq!(p.to_param(), "48.2,16.37");
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        assert_eq!(LatLng::parse("91,0"), None);
        assert_eq!(LatLng::parse("0"), None);
        assert_eq!(LatLng::parse("x,1"), None);
    }

    #[test]
    fn rounding_is_stable() {
        let p = LatLng::new(48.2081743, 16.3738189).rounded(5);
        assert_eq!(p, LatLng::new(48.20817, 16.37382));
        assert_eq!(round_to(3.14159, 2), 3.14);
    }
}
