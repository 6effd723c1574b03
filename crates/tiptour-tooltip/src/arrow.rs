//! Directional arrow pointing from the tooltip at the nearest target

use serde::Serialize;
use tiptour_core::{Document, NodeId, Point};

pub const ARROW_CLASS: &str = "tiptour-arrow";
pub const ARROW_SVG_CLASS: &str = "tiptour-arrow-svg";

/// Scale bands by distance to the nearest target, checked in order.
const SCALE_TIERS: [(f64, f64); 4] = [(50.0, 1.4), (100.0, 1.3), (150.0, 1.2), (250.0, 1.1)];

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArrowPose {
    pub target: NodeId,
    pub distance: f64,
    /// Degrees, 0 pointing right, clockwise in screen coordinates.
    pub angle: f64,
    pub scale: f64,
}

impl ArrowPose {
    pub fn transform(&self) -> String {
        format!("rotate({}deg) scale({})", self.angle, self.scale)
    }
}

pub fn scale_for_distance(distance: f64) -> f64 {
    SCALE_TIERS
        .iter()
        .find(|(limit, _)| distance < *limit)
        .map_or(1.0, |(_, scale)| *scale)
}

/// Nearest target by center-to-center distance. Detached targets are skipped.
pub fn pose_towards(doc: &Document, from: Point, targets: &[NodeId]) -> Option<ArrowPose> {
    let (target, center, distance) = targets
        .iter()
        .filter_map(|t| {
            let center = doc.rect(*t)?.center();
            Some((*t, center, from.distance_to(center)))
        })
        .min_by(|a, b| a.2.total_cmp(&b.2))?;

    let angle = (center.y - from.y).atan2(center.x - from.x).to_degrees();
    Some(ArrowPose {
        target,
        distance,
        angle,
        scale: scale_for_distance(distance),
    })
}

pub fn markup(color: &str, size: u32) -> String {
    format!(
        r#"<div class="{svg_class}"><svg width="{size}" height="{size}" viewBox="0 0 24 24" fill="none"><path class="tiptour-arrow-path" d="M8 4 L16 12 L8 20" stroke="{color}" stroke-width="2.5" stroke-linecap="round" stroke-linejoin="round"/></svg></div>"#,
        svg_class = ARROW_SVG_CLASS,
        size = size,
        color = tiptour_core::html::escape_attr(color),
    )
}
