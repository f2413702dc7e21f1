//! Lane-band membership classification.

use crate::geometry::{LaneBand, Point, Zone};

/// Returns true when `point` lies outside the lane band of `zone`.
///
/// The point is assumed to be inside the zone already. The band boundaries
/// are interpolated at the point's vertical position between the zone's top
/// and bottom mid heights. A zone with no height has no meaningful band, so
/// every point in it is violating.
pub fn is_violating(point: Point, zone: &Zone, band: &LaneBand) -> bool {
    let top_y = zone.top_mid_y();
    let height = zone.bottom_mid_y() - top_y;
    if height == 0.0 {
        log::debug!(
            "zone {} has zero height; treating point ({}, {}) as violating",
            zone.name(),
            point.x,
            point.y
        );
        return true;
    }

    let ratio = (point.y - top_y) / height;
    let left_x = band.left.x_at(ratio);
    let right_x = band.right.x_at(ratio);
    !(left_x <= point.x && point.x <= right_x)
}
