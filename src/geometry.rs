//! Zone geometry.
//!
//! A zone is a quadrilateral parking slot with a fixed vertex order:
//! `v0` top-left, `v1` bottom-left, `v2` bottom-right, `v3` top-right.
//! Each zone derives a lane band: two guide lines inset from the left and
//! right edges, between which an object counts as properly parked.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Default fractional inset of the lane band from each side of a zone.
pub const DEFAULT_LANE_INSET: f64 = 0.35;

const EDGE_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x as f64, y as f64)
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// Zone names are local identifiers: `area1`, `lot_a-3`.
pub fn validate_zone_name(name: &str) -> Result<()> {
    static ZONE_NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ZONE_NAME_RE.get_or_init(|| regex::Regex::new(r"^[a-z0-9_-]{1,64}$").unwrap());

    if !re.is_match(&name.to_lowercase()) {
        return Err(anyhow!(
            "zone name '{}' must match ^[a-z0-9_-]{{1,64}}$",
            name
        ));
    }
    Ok(())
}

/// An immutable parking zone.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    name: String,
    vertices: [Point; 4],
}

impl Zone {
    pub fn new(name: &str, vertices: [Point; 4]) -> Result<Self> {
        validate_zone_name(name)?;
        Ok(Self {
            name: name.to_lowercase(),
            vertices,
        })
    }

    /// Build a zone from integer pixel vertices (the usual configuration form).
    pub fn from_pixels(name: &str, vertices: [(i32, i32); 4]) -> Result<Self> {
        Self::new(name, vertices.map(Point::from))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[Point; 4] {
        &self.vertices
    }

    /// Mean y of the top edge (`v0`, `v3`).
    pub fn top_mid_y(&self) -> f64 {
        (self.vertices[0].y + self.vertices[3].y) / 2.0
    }

    /// Mean y of the bottom edge (`v1`, `v2`).
    pub fn bottom_mid_y(&self) -> f64 {
        (self.vertices[1].y + self.vertices[2].y) / 2.0
    }

    /// Vertex average, used to place the zone marker.
    pub fn centroid(&self) -> Point {
        let (sx, sy) = self
            .vertices
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / 4.0, sy / 4.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_zone(point, self)
    }
}

/// Boundary-inclusive point-in-polygon test (even-odd ray casting).
pub fn point_in_zone(point: Point, zone: &Zone) -> bool {
    let v = &zone.vertices;
    let mut inside = false;
    let mut j = v.len() - 1;
    for i in 0..v.len() {
        let (a, b) = (v[i], v[j]);
        if on_segment(point, a, b) {
            return true;
        }
        if (a.y > point.y) != (b.y > point.y) {
            let x_cross = a.x + (point.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_segment(p: Point, a: Point, b: Point) -> bool {
    let cross = (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x);
    if cross.abs() > EDGE_EPSILON {
        return false;
    }
    p.x >= a.x.min(b.x) - EDGE_EPSILON
        && p.x <= a.x.max(b.x) + EDGE_EPSILON
        && p.y >= a.y.min(b.y) - EDGE_EPSILON
        && p.y <= a.y.max(b.y) + EDGE_EPSILON
}

/// One lane guide line, running from the zone's top mid height to its
/// bottom mid height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneLine {
    pub top: Point,
    pub bottom: Point,
}

impl LaneLine {
    /// x of the line at a vertical ratio (0 = top, 1 = bottom).
    pub fn x_at(&self, ratio: f64) -> f64 {
        self.top.x + ratio * (self.bottom.x - self.top.x)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LaneBand {
    pub left: LaneLine,
    pub right: LaneLine,
}

/// Derive the lane band of `zone` for an inset fraction `0 < inset < 0.5`.
pub fn lane_band(zone: &Zone, inset: f64) -> LaneBand {
    debug_assert!(inset > 0.0 && inset < 0.5, "lane inset out of range");
    let [v0, v1, v2, v3] = zone.vertices;
    let top_y = zone.top_mid_y();
    let bottom_y = zone.bottom_mid_y();
    let line = |ratio: f64| LaneLine {
        top: Point::new(v0.x + ratio * (v3.x - v0.x), top_y),
        bottom: Point::new(v1.x + ratio * (v2.x - v1.x), bottom_y),
    };
    LaneBand {
        left: line(inset),
        right: line(1.0 - inset),
    }
}

/// The configured zones in declaration order, with lane bands cached.
///
/// Declaration order is the membership tie-break: the first zone that
/// contains a point owns it.
#[derive(Clone, Debug)]
pub struct ZoneSet {
    zones: Vec<Zone>,
    bands: Vec<LaneBand>,
    inset: f64,
}

impl ZoneSet {
    pub fn new(zones: Vec<Zone>, inset: f64) -> Result<Self> {
        if zones.is_empty() {
            return Err(anyhow!("at least one zone must be configured"));
        }
        if !(inset > 0.0 && inset < 0.5) {
            return Err(anyhow!("lane inset must be within (0, 0.5), got {}", inset));
        }
        for (i, zone) in zones.iter().enumerate() {
            if zones[..i].iter().any(|z| z.name == zone.name) {
                return Err(anyhow!("duplicate zone name '{}'", zone.name));
            }
        }
        let bands = zones.iter().map(|z| lane_band(z, inset)).collect();
        Ok(Self {
            zones,
            bands,
            inset,
        })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn inset(&self) -> f64 {
        self.inset
    }

    pub fn zone(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn band(&self, index: usize) -> Option<&LaneBand> {
        self.bands.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.zones.iter().position(|z| z.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Zone, &LaneBand)> {
        self.zones.iter().zip(self.bands.iter())
    }

    /// First zone (declaration order) containing `point`, with its index
    /// and lane band.
    pub fn locate(&self, point: Point) -> Option<(usize, &Zone, &LaneBand)> {
        self.iter()
            .enumerate()
            .find(|(_, (zone, _))| point_in_zone(point, zone))
            .map(|(index, (zone, band))| (index, zone, band))
    }
}

/// The seven slots of the reference parking lot, in a 1020x500 frame.
pub fn reference_zones() -> Vec<Zone> {
    const AREAS: [(&str, [(i32, i32); 4]); 7] = [
        ("area1", [(210, 173), (19, 340), (149, 319), (315, 169)]),
        ("area2", [(330, 168), (172, 310), (313, 284), (450, 150)]),
        ("area3", [(467, 151), (333, 285), (473, 265), (578, 142)]),
        ("area4", [(595, 138), (492, 263), (624, 247), (693, 136)]),
        ("area5", [(706, 134), (640, 246), (752, 230), (787, 136)]),
        ("area6", [(798, 138), (766, 230), (856, 219), (871, 136)]),
        ("area7", [(881, 132), (868, 218), (938, 212), (953, 136)]),
    ];
    AREAS
        .iter()
        .map(|(name, vertices)| Zone {
            name: (*name).to_string(),
            vertices: vertices.map(Point::from),
        })
        .collect()
}
