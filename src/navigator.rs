//! Hazard-aware routing between greens.
//!
//! Waypoints are green centers, the four extreme points of each green,
//! bridge centers and vertices, and offset points around each water body's
//! bounding box. Two waypoints are connected when the straight walk between
//! them stays out of open water. Paths for every ordered hole pair are
//! computed once and never change afterwards.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap},
    fs,
    path::Path,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    course::{Course, Hazards},
    error::PathCacheError,
    geometry::{distance, Point},
};

const WATER_OFFSET: f64 = 30.0;
const MIN_SEGMENT_SAMPLES: usize = 20;
const METERS_PER_SAMPLE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointKind {
    GreenCenter(u32),
    GreenEdge(u32),
    BridgeCenter,
    BridgeEdge,
    WaterEdge,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub position: Point,
    pub kind: WaypointKind,
}

/// Visibility graph over the course's waypoints.
pub struct WaypointGraph {
    waypoints: Vec<Waypoint>,
    edges: Vec<Vec<(usize, f64)>>,
    hazards: Hazards,
}

impl WaypointGraph {
    pub fn build(course: &Course) -> Self {
        let hazards = course.hazards.clone();
        let waypoints = generate_waypoints(course, &hazards);
        let mut edges = vec![Vec::new(); waypoints.len()];
        for i in 0..waypoints.len() {
            for j in (i + 1)..waypoints.len() {
                let (a, b) = (waypoints[i].position, waypoints[j].position);
                if !crosses_open_water(&hazards, a, b) {
                    let cost = distance(a, b);
                    edges[i].push((j, cost));
                    edges[j].push((i, cost));
                }
            }
        }
        Self {
            waypoints,
            edges,
            hazards,
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn green_center_node(&self, hole: u32) -> Option<usize> {
        self.waypoints
            .iter()
            .position(|w| w.kind == WaypointKind::GreenCenter(hole))
    }

    pub fn crosses_water(&self, a: Point, b: Point) -> bool {
        crosses_open_water(&self.hazards, a, b)
    }

    /// A* from `start` to `goal` with straight-line distance as heuristic.
    pub fn astar(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let n = self.waypoints.len();
        if start >= n || goal >= n {
            return None;
        }
        if start == goal {
            return Some(vec![start]);
        }

        let goal_pos = self.waypoints[goal].position;
        let mut g_score = vec![f64::INFINITY; n];
        let mut came_from: Vec<Option<usize>> = vec![None; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g_score[start] = 0.0;
        open.push(OpenEntry {
            node: start,
            f_score: distance(self.waypoints[start].position, goal_pos),
        });

        while let Some(OpenEntry { node, .. }) = open.pop() {
            if node == goal {
                let mut path = vec![goal];
                let mut cursor = goal;
                while let Some(prev) = came_from[cursor] {
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            if closed[node] {
                continue;
            }
            closed[node] = true;

            for &(neighbor, cost) in &self.edges[node] {
                if closed[neighbor] {
                    continue;
                }
                let tentative = g_score[node] + cost;
                if tentative < g_score[neighbor] {
                    g_score[neighbor] = tentative;
                    came_from[neighbor] = Some(node);
                    open.push(OpenEntry {
                        node: neighbor,
                        f_score: tentative
                            + distance(self.waypoints[neighbor].position, goal_pos),
                    });
                }
            }
        }
        None
    }
}

/// Min-heap entry: smallest f-score pops first, lower node index on ties.
struct OpenEntry {
    node: usize,
    f_score: f64,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_score
            .total_cmp(&self.f_score)
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn generate_waypoints(course: &Course, hazards: &Hazards) -> Vec<Waypoint> {
    let mut waypoints = Vec::new();

    for hole in course.holes() {
        let center = if hole.green.is_empty() {
            hole.flag
        } else {
            hole.green_center()
        };
        waypoints.push(Waypoint {
            position: center,
            kind: WaypointKind::GreenCenter(hole.number),
        });
        if hole.green.is_degenerate() {
            continue;
        }
        for (dx, dy) in [(1.0, 0.0), (-1.0, 0.0), (0.0, 1.0), (0.0, -1.0)] {
            let extreme = hole.green.points().iter().copied().max_by(|a, b| {
                let sa = (a.x - center.x) * dx + (a.y - center.y) * dy;
                let sb = (b.x - center.x) * dx + (b.y - center.y) * dy;
                sa.total_cmp(&sb)
            });
            if let Some(position) = extreme {
                waypoints.push(Waypoint {
                    position,
                    kind: WaypointKind::GreenEdge(hole.number),
                });
            }
        }
    }

    for bridge in &hazards.bridges {
        if bridge.is_empty() {
            continue;
        }
        waypoints.push(Waypoint {
            position: bridge.center(),
            kind: WaypointKind::BridgeCenter,
        });
        waypoints.extend(bridge.points().iter().map(|&position| Waypoint {
            position,
            kind: WaypointKind::BridgeEdge,
        }));
    }

    for water in &hazards.water {
        let Some(bbox) = water.bounds() else {
            continue;
        };
        let (lo, hi, mid) = (bbox.min, bbox.max, bbox.mid());
        let candidates = [
            Point::new(lo.x - WATER_OFFSET, lo.y - WATER_OFFSET),
            Point::new(hi.x + WATER_OFFSET, lo.y - WATER_OFFSET),
            Point::new(hi.x + WATER_OFFSET, hi.y + WATER_OFFSET),
            Point::new(lo.x - WATER_OFFSET, hi.y + WATER_OFFSET),
            Point::new(mid.x, lo.y - WATER_OFFSET),
            Point::new(mid.x, hi.y + WATER_OFFSET),
            Point::new(lo.x - WATER_OFFSET, mid.y),
            Point::new(hi.x + WATER_OFFSET, mid.y),
        ];
        waypoints.extend(
            candidates
                .into_iter()
                .filter(|&p| !hazards.water.iter().any(|w| w.contains(p)))
                .map(|position| Waypoint {
                    position,
                    kind: WaypointKind::WaterEdge,
                }),
        );
    }

    waypoints
}

/// Samples the segment every few meters; any sample in open water fails it.
pub fn crosses_open_water(hazards: &Hazards, a: Point, b: Point) -> bool {
    if hazards.water.is_empty() {
        return false;
    }
    let samples = MIN_SEGMENT_SAMPLES.max((distance(a, b) / METERS_PER_SAMPLE) as usize);
    (0..=samples).any(|i| {
        let t = i as f64 / samples as f64;
        let p = Point::new(a.x + t * (b.x - a.x), a.y + t * (b.y - a.y));
        hazards.is_water(p)
    })
}

/// Precomputed green-to-green walking routes for every ordered hole pair.
#[derive(Debug, Clone, Default)]
pub struct Navigator {
    paths: HashMap<(u32, u32), Vec<Point>>,
    /// Pairs with no dry route that use the direct line instead.
    fallbacks: BTreeSet<(u32, u32)>,
}

impl Navigator {
    pub fn build(course: &Course) -> Self {
        let graph = WaypointGraph::build(course);
        let mut navigator = Navigator::default();
        let holes: Vec<u32> = course.hole_numbers().collect();

        for (i, &from) in holes.iter().enumerate() {
            for &to in &holes[i + 1..] {
                let (Some(start), Some(goal)) =
                    (graph.green_center_node(from), graph.green_center_node(to))
                else {
                    continue;
                };
                let a = graph.waypoints[start].position;
                let b = graph.waypoints[goal].position;

                let route = if !graph.crosses_water(a, b) {
                    vec![a, b]
                } else if let Some(nodes) = graph.astar(start, goal) {
                    nodes
                        .into_iter()
                        .map(|n| graph.waypoints[n].position)
                        .collect()
                } else {
                    warn!(
                        from,
                        to, "no water-avoiding route between greens; using the direct line"
                    );
                    navigator.fallbacks.insert((from, to));
                    navigator.fallbacks.insert((to, from));
                    vec![a, b]
                };

                let mut reverse = route.clone();
                reverse.reverse();
                navigator.paths.insert((from, to), route);
                navigator.paths.insert((to, from), reverse);
            }
        }

        info!(
            waypoints = graph.waypoints.len(),
            edges = graph.edge_count(),
            routes = navigator.paths.len(),
            fallbacks = navigator.fallbacks.len(),
            "navigator built"
        );
        navigator
    }

    /// Uses the cache at `cache_path` when it matches this course, otherwise
    /// rebuilds and rewrites it. Cache problems are logged, never fatal.
    pub fn load_or_build(course: &Course, cache_path: &Path) -> Self {
        let fingerprint = course.fingerprint();
        match PathCache::load(cache_path) {
            Ok(Some(cache)) => match cache.into_navigator(course, fingerprint) {
                Some(navigator) => {
                    info!(path = %cache_path.display(), "loaded route cache");
                    return navigator;
                }
                None => warn!(path = %cache_path.display(), "route cache is stale; rebuilding"),
            },
            Ok(None) => info!(path = %cache_path.display(), "no route cache; building"),
            Err(err) => warn!(error = %err, "route cache unreadable; rebuilding"),
        }

        let navigator = Self::build(course);
        if let Err(err) = navigator.to_cache(fingerprint).save(cache_path) {
            warn!(error = %err, "failed to write route cache");
        }
        navigator
    }

    /// Route from one green center to another. `None` for unknown holes and
    /// for `from == to`, which has no stored route.
    pub fn path(&self, from: u32, to: u32) -> Option<&[Point]> {
        self.paths.get(&(from, to)).map(Vec::as_slice)
    }

    pub fn is_fallback(&self, from: u32, to: u32) -> bool {
        self.fallbacks.contains(&(from, to))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn to_cache(&self, fingerprint: u64) -> PathCache {
        PathCache {
            fingerprint,
            generated_at: Utc::now(),
            paths: self
                .paths
                .iter()
                .map(|(&(from, to), route)| (cache_key(from, to), route.clone()))
                .collect(),
            fallbacks: self
                .fallbacks
                .iter()
                .map(|&(from, to)| cache_key(from, to))
                .collect(),
        }
    }
}

pub fn cache_key(from: u32, to: u32) -> String {
    format!("{from},{to}")
}

fn parse_cache_key(key: &str) -> Option<(u32, u32)> {
    let (from, to) = key.split_once(',')?;
    Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
}

/// Persisted routes keyed by `"{from},{to}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathCache {
    pub fingerprint: u64,
    pub generated_at: DateTime<Utc>,
    pub paths: BTreeMap<String, Vec<Point>>,
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl PathCache {
    /// `Ok(None)` when no cache file exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, PathCacheError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PathCacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), PathCacheError> {
        let io_err = |source| PathCacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)
    }

    /// Usable only when built for this exact geometry and complete for
    /// every ordered pair of distinct holes.
    fn into_navigator(self, course: &Course, fingerprint: u64) -> Option<Navigator> {
        if self.fingerprint != fingerprint {
            return None;
        }
        let mut paths = HashMap::with_capacity(self.paths.len());
        for (key, route) in self.paths {
            if route.is_empty() {
                return None;
            }
            paths.insert(parse_cache_key(&key)?, route);
        }
        let holes: Vec<u32> = course.hole_numbers().collect();
        let complete = holes.iter().all(|&a| {
            holes
                .iter()
                .all(|&b| a == b || paths.contains_key(&(a, b)))
        });
        if !complete {
            return None;
        }
        let fallbacks = self
            .fallbacks
            .iter()
            .filter_map(|key| parse_cache_key(key))
            .collect();
        Some(Navigator { paths, fallbacks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{course::Hole, geometry::Polygon};

    fn hole(number: u32, green: Polygon) -> Hole {
        Hole {
            number,
            par: 4,
            flag: green.center(),
            fairway: Polygon::default(),
            green,
            bunkers: vec![],
            tees: vec![],
        }
    }

    fn pond_course(bridges: Vec<Polygon>) -> Course {
        Course::new(
            vec![
                hole(1, Polygon::rect(-20.0, -20.0, 20.0, 20.0)),
                hole(2, Polygon::rect(280.0, -20.0, 320.0, 20.0)),
                hole(3, Polygon::rect(-20.0, 280.0, 20.0, 320.0)),
            ],
            Hazards {
                water: vec![Polygon::rect(100.0, -60.0, 200.0, 60.0)],
                bridges,
            },
        )
        .unwrap()
    }

    #[test]
    fn clear_pairs_walk_straight() {
        let nav = Navigator::build(&pond_course(vec![]));
        let route = nav.path(1, 3).unwrap();
        assert_eq!(route, &[Point::new(0.0, 0.0), Point::new(0.0, 300.0)]);
        assert_eq!(nav.len(), 6);
        assert!(nav.path(2, 2).is_none());
        assert!(nav.path(1, 9).is_none());
    }

    #[test]
    fn water_forces_a_detour_with_dry_legs() {
        let course = pond_course(vec![]);
        let nav = Navigator::build(&course);
        let route = nav.path(1, 2).unwrap();
        assert!(route.len() > 2);
        assert_eq!(route.first(), Some(&Point::new(0.0, 0.0)));
        assert_eq!(route.last(), Some(&Point::new(300.0, 0.0)));
        for leg in route.windows(2) {
            assert!(!crosses_open_water(&course.hazards, leg[0], leg[1]));
        }
        assert!(!nav.is_fallback(1, 2));
    }

    #[test]
    fn reverse_route_mirrors_forward_route() {
        let nav = Navigator::build(&pond_course(vec![]));
        let mut forward = nav.path(1, 2).unwrap().to_vec();
        forward.reverse();
        assert_eq!(nav.path(2, 1).unwrap(), forward.as_slice());
    }

    #[test]
    fn bridge_makes_the_direct_line_passable() {
        let course = pond_course(vec![Polygon::rect(95.0, -5.0, 205.0, 5.0)]);
        let nav = Navigator::build(&course);
        assert_eq!(nav.path(1, 2).unwrap().len(), 2);
    }

    #[test]
    fn enclosed_green_falls_back_to_direct_line() {
        let course = Course::new(
            vec![
                hole(1, Polygon::rect(-10.0, -10.0, 10.0, 10.0)),
                hole(2, Polygon::rect(490.0, -10.0, 510.0, 10.0)),
            ],
            Hazards {
                water: vec![
                    Polygon::rect(460.0, -40.0, 540.0, -20.0),
                    Polygon::rect(460.0, 20.0, 540.0, 40.0),
                    Polygon::rect(460.0, -40.0, 480.0, 40.0),
                    Polygon::rect(520.0, -40.0, 540.0, 40.0),
                ],
                bridges: vec![],
            },
        )
        .unwrap();
        let nav = Navigator::build(&course);
        assert!(nav.is_fallback(1, 2));
        assert_eq!(nav.path(1, 2).unwrap().len(), 2);
    }

    #[test]
    fn astar_trivial_and_out_of_range() {
        let graph = WaypointGraph::build(&pond_course(vec![]));
        let start = graph.green_center_node(1).unwrap();
        assert_eq!(graph.astar(start, start), Some(vec![start]));
        assert_eq!(graph.astar(start, 10_000), None);
    }

    #[test]
    fn water_edge_waypoints_stay_dry() {
        let course = pond_course(vec![]);
        let graph = WaypointGraph::build(&course);
        let edges: Vec<_> = graph
            .waypoints()
            .iter()
            .filter(|w| w.kind == WaypointKind::WaterEdge)
            .collect();
        assert_eq!(edges.len(), 8);
        assert!(edges.iter().all(|w| !course.hazards.is_water(w.position)));
    }

    #[test]
    fn cache_keys_round_trip() {
        assert_eq!(cache_key(3, 17), "3,17");
        assert_eq!(parse_cache_key("3,17"), Some((3, 17)));
        assert_eq!(parse_cache_key("3;17"), None);
        assert_eq!(parse_cache_key("a,1"), None);
    }
}
