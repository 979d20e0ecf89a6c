use serde::{Deserialize, Serialize};

/// Geographic bounding box in WGS84 degrees, ordered the way STAC APIs
/// expect it: west, south, east, north.
///
/// `west > east` is allowed and denotes a box crossing the antimeridian.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub const WORLD: BBox = BBox {
        west: -180.0,
        south: -90.0,
        east: 180.0,
        north: 90.0,
    };

    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        BBox {
            west,
            south,
            east,
            north,
        }
    }

    pub fn is_world(&self) -> bool {
        *self == Self::WORLD
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Parses `"west,south,east,north"`.
    ///
    /// Rejects non-finite values, latitudes outside [-90, 90] and boxes whose
    /// south edge lies above the north edge.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split(',').map(|p| p.trim().parse::<f64>());
        let west = parts.next()?.ok()?;
        let south = parts.next()?.ok()?;
        let east = parts.next()?.ok()?;
        let north = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }

        let b = BBox::new(west, south, east, north);
        b.is_valid().then_some(b)
    }

    pub fn is_valid(&self) -> bool {
        let finite = self.to_array().iter().all(|v| v.is_finite());
        finite
            && (-90.0..=90.0).contains(&self.south)
            && (-90.0..=90.0).contains(&self.north)
            && self.south <= self.north
    }

    /// Shortest representation that parses back to the same floats.
    pub fn to_param(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}

#[cfg(test)]
mod tests {
    use super::BBox;

    #[test]
    fn parses_ordered_components() {
        let b = BBox::parse("-10.5,35,20.25,60").unwrap();
        assert_eq!(b, BBox::new(-10.5, 35.0, 20.25, 60.0));
    }

    #[test]
    fn param_round_trips_exactly() {
        let b = BBox::new(11.123456789, 46.1, 12.987654321, 47.000001);
        assert_eq!(BBox::parse(&b.to_param()), Some(b));
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(BBox::parse("1,2,3"), None);
        assert_eq!(BBox::parse("1,2,3,4,5"), None);
        assert_eq!(BBox::parse("a,2,3,4"), None);
        assert_eq!(BBox::parse("0,50,10,40"), None);
        assert_eq!(BBox::parse("0,-91,10,40"), None);
        assert_eq!(BBox::parse("NaN,0,1,1"), None);
    }

    #[test]
    fn antimeridian_boxes_are_valid() {
        assert!(BBox::parse("170,-10,-170,10").is_some());
    }

    #[test]
    fn world_is_world() {
        assert!(BBox::WORLD.is_world());
        assert!(!BBox::new(0.0, 0.0, 1.0, 1.0).is_world());
    }
}
