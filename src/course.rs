//! Static course data: holes, hazards and terrain classification.
//!
//! The course arrives already projected into one planar frame (meters,
//! shared origin). Only the per-hole flag changes during a run, and only
//! the greenkeeper routine moves it.

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::CourseError,
    geometry::{BoundingBox, Point, Polygon},
};

/// Terrain under the ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lie {
    Tee,
    Fairway,
    Rough,
    Bunker,
    Green,
    Water,
    Hole,
}

impl Lie {
    /// Fraction of a club's full carry available from this lie.
    pub fn distance_multiplier(self) -> f64 {
        match self {
            Lie::Tee | Lie::Fairway | Lie::Green | Lie::Hole => 1.0,
            Lie::Rough => 0.8,
            Lie::Bunker => 0.6,
            Lie::Water => 0.0,
        }
    }

    /// Weight applied to the remaining distance when ranking a landing spot.
    pub fn utility_multiplier(self) -> f64 {
        match self {
            Lie::Hole => 0.0,
            Lie::Green => 0.8,
            Lie::Fairway | Lie::Tee => 1.0,
            Lie::Rough => 1.3,
            Lie::Bunker => 1.6,
            Lie::Water => f64::INFINITY,
        }
    }
}

fn default_par() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hole {
    pub number: u32,
    #[serde(default = "default_par")]
    pub par: u32,
    pub flag: Point,
    #[serde(default)]
    pub fairway: Polygon,
    #[serde(default)]
    pub green: Polygon,
    #[serde(default)]
    pub bunkers: Vec<Polygon>,
    #[serde(default)]
    pub tees: Vec<Polygon>,
}

impl Hole {
    /// Center of the first tee box, falling back to the fairway and then the
    /// green when the hole has no tees.
    pub fn tee_position(&self) -> Point {
        self.tees
            .iter()
            .find(|tee| !tee.is_empty())
            .or((!self.fairway.is_empty()).then_some(&self.fairway))
            .unwrap_or(&self.green)
            .center()
    }

    pub fn green_center(&self) -> Point {
        self.green.center()
    }

    /// Inside this hole's fairway or green.
    pub fn covers(&self, p: Point) -> bool {
        self.green.contains(p) || self.fairway.contains(p)
    }

    fn polygons(&self) -> impl Iterator<Item = &Polygon> {
        std::iter::once(&self.fairway)
            .chain(std::iter::once(&self.green))
            .chain(self.bunkers.iter())
            .chain(self.tees.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hazards {
    #[serde(default)]
    pub water: Vec<Polygon>,
    #[serde(default)]
    pub bridges: Vec<Polygon>,
}

impl Hazards {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn on_bridge(&self, p: Point) -> bool {
        self.bridges.iter().any(|b| b.contains(p))
    }

    /// Open water: inside a water body and not covered by a bridge.
    pub fn is_water(&self, p: Point) -> bool {
        self.water.iter().any(|w| w.contains(p)) && !self.on_bridge(p)
    }
}

/// Terrain at `position` for `hole`, checked green, water, bunker, fairway,
/// tee, then rough.
pub fn determine_lie(position: Point, hole: &Hole, hazards: &Hazards) -> Lie {
    if hole.green.contains(position) {
        Lie::Green
    } else if hazards.is_water(position) {
        Lie::Water
    } else if hole.bunkers.iter().any(|b| b.contains(position)) {
        Lie::Bunker
    } else if hole.fairway.contains(position) {
        Lie::Fairway
    } else if hole.tees.iter().any(|t| t.contains(position)) {
        Lie::Tee
    } else {
        Lie::Rough
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    holes: BTreeMap<u32, Hole>,
    pub hazards: Hazards,
}

impl Course {
    pub fn new(holes: Vec<Hole>, hazards: Hazards) -> Result<Self, CourseError> {
        let holes: BTreeMap<u32, Hole> = holes.into_iter().map(|h| (h.number, h)).collect();
        validate_numbering(&holes)?;
        Ok(Self { holes, hazards })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CourseError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CourseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, CourseError> {
        let document: CourseDocument = serde_json::from_str(text)?;
        document.into_course()
    }

    pub fn num_holes(&self) -> u32 {
        self.holes.len() as u32
    }

    pub fn hole(&self, number: u32) -> Option<&Hole> {
        self.holes.get(&number)
    }

    pub fn holes(&self) -> impl Iterator<Item = &Hole> {
        self.holes.values()
    }

    pub fn hole_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.holes.keys().copied()
    }

    /// Commits a new flag position. Returns false for an unknown hole.
    pub fn set_flag(&mut self, number: u32, flag: Point) -> bool {
        match self.holes.get_mut(&number) {
            Some(hole) => {
                hole.flag = flag;
                true
            }
            None => false,
        }
    }

    /// Bounding box of every course polygon grown by `margin`.
    pub fn bounds(&self, margin: f64) -> Option<BoundingBox> {
        let points = self
            .holes
            .values()
            .flat_map(|h| h.polygons())
            .chain(self.hazards.water.iter())
            .chain(self.hazards.bridges.iter())
            .flat_map(|poly| poly.points().iter().copied());
        BoundingBox::around(points).map(|b| b.expanded(margin))
    }

    /// Stable hash of the geometry the navigator depends on (greens, water,
    /// bridges). Flags are excluded because they move.
    pub fn fingerprint(&self) -> u64 {
        let mut hash = Fnv1a::default();
        for hole in self.holes.values() {
            hash.write(u64::from(hole.number));
            hash.write_polygon(&hole.green);
        }
        for poly in self.hazards.water.iter().chain(&self.hazards.bridges) {
            hash.write(u64::MAX);
            hash.write_polygon(poly);
        }
        hash.finish()
    }
}

fn validate_numbering(holes: &BTreeMap<u32, Hole>) -> Result<(), CourseError> {
    let expected_max = holes.len() as u32;
    if expected_max == 0 {
        return Err(CourseError::Empty);
    }
    match (1..=expected_max).find(|n| !holes.contains_key(n)) {
        Some(missing) => Err(CourseError::HoleGap {
            missing,
            expected_max,
        }),
        None => Ok(()),
    }
}

struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }
}

impl Fnv1a {
    fn write(&mut self, value: u64) {
        for byte in value.to_le_bytes() {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(0x0100_0000_01b3);
        }
    }

    fn write_polygon(&mut self, poly: &Polygon) {
        self.write(poly.points().len() as u64);
        for p in poly.points() {
            self.write(p.x.to_bits());
            self.write(p.y.to_bits());
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

/// On-disk course layout produced by the survey converter.
#[derive(Debug, Deserialize)]
struct CourseDocument {
    holes: BTreeMap<u32, HoleRecord>,
    #[serde(default)]
    water: Vec<Polygon>,
    #[serde(default)]
    bridges: Vec<Polygon>,
}

#[derive(Debug, Deserialize)]
struct HoleRecord {
    #[serde(default)]
    flag: Option<Point>,
    #[serde(default = "default_par")]
    par: u32,
    #[serde(default)]
    fairway: Polygon,
    #[serde(default)]
    green: Polygon,
    #[serde(default)]
    bunkers: Vec<Polygon>,
    #[serde(default)]
    tees: Vec<Polygon>,
}

impl CourseDocument {
    fn into_course(self) -> Result<Course, CourseError> {
        let holes = self
            .holes
            .into_iter()
            .map(|(number, record)| {
                let flag = record.flag.unwrap_or_else(|| record.green.center());
                Hole {
                    number,
                    par: record.par,
                    flag,
                    fairway: record.fairway,
                    green: record.green,
                    bunkers: record.bunkers,
                    tees: record.tees,
                }
            })
            .collect();
        Course::new(
            holes,
            Hazards {
                water: self.water,
                bridges: self.bridges,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hole() -> Hole {
        Hole {
            number: 1,
            par: 4,
            flag: Point::new(200.0, 50.0),
            fairway: Polygon::rect(0.0, 40.0, 90.0, 60.0),
            green: Polygon::rect(180.0, 40.0, 220.0, 60.0),
            bunkers: vec![Polygon::rect(160.0, 60.0, 175.0, 70.0)],
            tees: vec![Polygon::rect(-5.0, 45.0, 5.0, 55.0)],
        }
    }

    fn pond() -> Hazards {
        Hazards {
            water: vec![Polygon::rect(100.0, 30.0, 120.0, 70.0)],
            bridges: vec![Polygon::rect(100.0, 48.0, 120.0, 52.0)],
        }
    }

    #[test]
    fn lie_classification() {
        let hole = sample_hole();
        let hazards = pond();
        assert_eq!(determine_lie(Point::new(200.0, 50.0), &hole, &hazards), Lie::Green);
        assert_eq!(determine_lie(Point::new(110.0, 35.0), &hole, &hazards), Lie::Water);
        assert_eq!(determine_lie(Point::new(110.0, 50.0), &hole, &hazards), Lie::Rough);
        assert_eq!(determine_lie(Point::new(165.0, 65.0), &hole, &hazards), Lie::Bunker);
        assert_eq!(determine_lie(Point::new(50.0, 50.0), &hole, &hazards), Lie::Fairway);
        assert_eq!(determine_lie(Point::new(-3.0, 50.0), &hole, &hazards), Lie::Tee);
        assert_eq!(determine_lie(Point::new(50.0, 150.0), &hole, &hazards), Lie::Rough);
    }

    #[test]
    fn missing_polygons_never_match() {
        let hole = Hole {
            number: 1,
            par: 3,
            flag: Point::new(0.0, 0.0),
            fairway: Polygon::default(),
            green: Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]),
            bunkers: vec![],
            tees: vec![],
        };
        assert_eq!(determine_lie(Point::new(0.5, 0.5), &hole, &Hazards::none()), Lie::Rough);
    }

    #[test]
    fn tee_position_falls_back_to_fairway_then_green() {
        let mut hole = sample_hole();
        assert_eq!(hole.tee_position(), Point::new(0.0, 50.0));
        hole.tees.clear();
        assert_eq!(hole.tee_position(), Point::new(45.0, 50.0));
        hole.fairway = Polygon::default();
        assert_eq!(hole.tee_position(), Point::new(200.0, 50.0));
    }

    #[test]
    fn loader_defaults_missing_fields() {
        let json = r#"{
            "holes": {
                "1": { "green": [{"x":0,"y":0},{"x":10,"y":0},{"x":10,"y":10},{"x":0,"y":10}] },
                "2": { "flag": {"x": 3, "y": 4}, "par": 3 }
            }
        }"#;
        let course = Course::from_json_str(json).unwrap();
        assert_eq!(course.num_holes(), 2);
        let first = course.hole(1).unwrap();
        assert_eq!(first.flag, Point::new(5.0, 5.0));
        assert_eq!(first.par, 4);
        assert!(first.bunkers.is_empty());
        assert_eq!(course.hole(2).unwrap().par, 3);
        assert!(course.hazards.water.is_empty());
    }

    #[test]
    fn loader_rejects_gaps_and_empty_courses() {
        let gap = r#"{ "holes": { "1": {}, "3": {} } }"#;
        assert!(matches!(
            Course::from_json_str(gap),
            Err(CourseError::HoleGap { missing: 2, .. })
        ));
        assert!(matches!(
            Course::from_json_str(r#"{ "holes": {} }"#),
            Err(CourseError::Empty)
        ));
        assert!(matches!(Course::from_json_str("not json"), Err(CourseError::Parse(_))));
    }

    #[test]
    fn fingerprint_ignores_flags_but_tracks_greens() {
        let mut course = Course::new(vec![sample_hole()], pond()).unwrap();
        let before = course.fingerprint();
        course.set_flag(1, Point::new(190.0, 45.0));
        assert_eq!(course.fingerprint(), before);

        let mut moved = sample_hole();
        moved.green = Polygon::rect(181.0, 40.0, 220.0, 60.0);
        let other = Course::new(vec![moved], pond()).unwrap();
        assert_ne!(other.fingerprint(), before);
    }

    #[test]
    fn bounds_cover_all_features() {
        let course = Course::new(vec![sample_hole()], pond()).unwrap();
        let bounds = course.bounds(10.0).unwrap();
        assert_eq!(bounds.min, Point::new(-15.0, 20.0));
        assert_eq!(bounds.max, Point::new(230.0, 80.0));
    }
}
