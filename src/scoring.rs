//! Per-stroke deviation/extra-length measurement and group/gene score
//! aggregation (spec §4.4, §8 "Scoring").
//!
//! A stroke's `deviation` is the average distance from its own sampled
//! points to the nearest point on its bound Han stroke's arc (forward or
//! reverse sampling, whichever is closer at each point); its `extra_length`
//! is how much longer its own arc is than the Han stroke's, in the Han
//! stroke's own scale. A group's score combines its strokes' deviations and
//! extra lengths with the overlap and placement penalties computed
//! elsewhere into the seven weighted exponents spec §3 names.

use crate::{
    gene::{Gene, GroupScore, InvalidFlags},
    han::{ArcPoint, HanRef},
    unit::Unit,
};

/// How a gene's score aggregates its groups' totals (spec §6 "Globals XML"
/// `groupScoreMode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScoreMode {
    Average,
    Minimum,
}
impl Default for GroupScoreMode {
    fn default() -> Self {
        Self::Average
    }
}

/// Roll a gene's groups up into a single gene score, per `mode` (spec §2
/// "group and gene score aggregation from weighted components").
pub fn aggregate_gene_score(gene: &Gene, mode: GroupScoreMode) -> f64 {
    let totals: Vec<f64> = gene.groups.iter().filter_map(|g| g.score.total.get()).collect();
    if totals.is_empty() {
        return 0.0;
    }
    match mode {
        GroupScoreMode::Average => totals.iter().sum::<f64>() / totals.len() as f64,
        GroupScoreMode::Minimum => totals.iter().copied().fold(f64::INFINITY, f64::min),
    }
}

/// Relative weights applied to each of the seven score components before
/// they are summed into `GroupScore::total` (spec §8). Configurable per
/// genome at load time; these are the source's defaults.
#[derive(Debug, Clone, Copy)]
pub struct ScoreWeights {
    pub scale: f64,
    pub placement: f64,
    pub illegal_overlaps: f64,
    pub missing_overlaps: f64,
    pub deviation: f64,
    pub extra_length: f64,
    pub dropouts: f64,
}
impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            scale: 1.0,
            placement: 1.0,
            illegal_overlaps: 2.0,
            missing_overlaps: 2.0,
            deviation: 1.0,
            extra_length: 0.5,
            dropouts: 0.25,
        }
    }
}

/// Nearest point on `arc` (by Euclidean distance) to `target`, searching
/// both sampling directions.
fn nearest_distance(arc: &[ArcPoint], target: crate::geometry::Point) -> f64 {
    arc.iter()
        .map(|p| {
            let dx = p.point.x.value() - target.x.value();
            let dy = p.point.y.value() - target.y.value();
            (dx * dx + dy * dy).sqrt()
        })
        .fold(f64::INFINITY, f64::min)
}

impl Gene {
    /// Recompute `deviation`/`extra_length` for every bound stroke against
    /// `han`, then roll per-group and per-gene scores up from them, the
    /// stroke/group scale already computed by [`Gene::ensure_dimensions`],
    /// and the overlap lists already computed by
    /// [`crate::overlaps::detect_overlaps`] (spec §4.4, §8).
    pub fn ensure_score(&mut self, han: &HanRef, weights: &ScoreWeights) {
        if !self.invalid.contains(InvalidFlags::SCORE) {
            return;
        }

        for (stroke_idx, stroke) in self.strokes.iter_mut().enumerate() {
            let Some(&han_id) = self.stroke_to_han.get(&stroke_idx) else {
                stroke.deviation = Unit::UNDEFINED;
                stroke.extra_length = Unit::UNDEFINED;
                stroke.arc_length = Unit::UNDEFINED;
                continue;
            };
            let han_stroke = han.stroke(han_id);
            let points = &self.points[stroke.acids.start..=stroke.acids.end];

            let forward_total: f64 = points.iter().map(|p| nearest_distance(&han_stroke.forward, *p)).sum();
            let reverse_total: f64 = if han_stroke.reverse.is_empty() {
                f64::INFINITY
            } else {
                points.iter().map(|p| nearest_distance(&han_stroke.reverse, *p)).sum()
            };
            let best_total = forward_total.min(reverse_total);
            stroke.deviation = Unit::new(best_total / points.len().max(1) as f64);

            let own_length: f64 = points
                .windows(2)
                .map(|w| {
                    let dx = w[1].x.value() - w[0].x.value();
                    let dy = w[1].y.value() - w[0].y.value();
                    (dx * dx + dy * dy).sqrt()
                })
                .sum();
            stroke.arc_length = Unit::new(own_length);
            let han_length = han_stroke.arc_length() * stroke.sx.get().unwrap_or(1.0).max(1e-9);
            stroke.extra_length = Unit::new((own_length - han_length).max(0.0));
        }

        for group in &mut self.groups {
            score_group(group, &self.strokes, &self.illegal_overlaps, &self.missing_overlaps, weights);
        }

        self.invalid.clear(InvalidFlags::SCORE);
    }
}

fn score_group(
    group: &mut crate::gene::Group,
    strokes: &[crate::gene::Stroke],
    illegal_overlaps: &[(usize, usize)],
    missing_overlaps: &[(usize, usize)],
    weights: &ScoreWeights,
) {
    let members: Vec<&crate::gene::Stroke> = group.strokes.iter().map(|&i| &strokes[i]).collect();
    let defined_deviation: Vec<f64> = members.iter().filter_map(|s| s.deviation.get()).collect();
    let defined_extra: Vec<f64> = members.iter().filter_map(|s| s.extra_length.get()).collect();
    let dropout_count: u32 = members.iter().map(|s| s.dropout_count).sum();

    let deviation = average(&defined_deviation);
    let extra_length = average(&defined_extra);
    let scale = match (group.sx.get(), group.sy.get()) {
        (Some(sx), Some(sy)) => Unit::new((sx - 1.0).abs() + (sy - 1.0).abs()),
        _ => Unit::UNDEFINED,
    };
    let placement = match (group.dx.get(), group.dy.get()) {
        (Some(dx), Some(dy)) => Unit::new((dx * dx + dy * dy).sqrt()),
        _ => Unit::UNDEFINED,
    };

    let member_set: std::collections::BTreeSet<usize> = group.strokes.iter().copied().collect();
    let illegal = illegal_overlaps
        .iter()
        .filter(|(a, b)| member_set.contains(a) || member_set.contains(b))
        .count();
    let missing = missing_overlaps
        .iter()
        .filter(|(a, b)| member_set.contains(a) || member_set.contains(b))
        .count();

    let dropouts = Unit::new(dropout_count as f64);
    let illegal_overlaps_unit = Unit::new(illegal as f64);
    let missing_overlaps_unit = Unit::new(missing as f64);

    let total = weighted_sum(
        &[
            (scale, weights.scale),
            (placement, weights.placement),
            (illegal_overlaps_unit, weights.illegal_overlaps),
            (missing_overlaps_unit, weights.missing_overlaps),
            (deviation, weights.deviation),
            (extra_length, weights.extra_length),
            (dropouts, weights.dropouts),
        ],
    );

    group.score = GroupScore {
        scale,
        placement,
        illegal_overlaps: illegal_overlaps_unit,
        missing_overlaps: missing_overlaps_unit,
        deviation,
        extra_length,
        dropouts,
        total,
    };
}

fn average(values: &[f64]) -> Unit {
    if values.is_empty() {
        Unit::UNDEFINED
    } else {
        Unit::new(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn weighted_sum(terms: &[(Unit, f64)]) -> Unit {
    let mut total = 0.0;
    for (value, weight) in terms {
        if let Some(v) = value.get() {
            total += v * weight;
        }
    }
    Unit::new(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{Point, Range},
        han::{HanGroup, HanStroke},
    };

    fn han_with_one_straight_stroke() -> HanRef {
        let bounds = crate::geometry::Rectangle {
            top_left: Point::new(0.0, 1.0),
            bottom_right: Point::new(2.0, 0.0),
        };
        HanRef {
            unicode: '一',
            length: 2.0,
            bounds,
            minimum_stroke_length: 0.1,
            groups: vec![HanGroup { id: 0, strokes: vec![0], bounds }],
            strokes: vec![HanStroke {
                id: 0,
                forward: vec![
                    ArcPoint { point: Point::new(0.0, 0.0), distance: 0.0 },
                    ArcPoint { point: Point::new(2.0, 0.0), distance: 2.0 },
                ],
                reverse: vec![],
                bounds,
            }],
            overlaps: vec![],
        }
    }

    #[test]
    fn stroke_on_the_arc_has_zero_deviation() {
        let mut gene = Gene::new(Range::new(0, 8), Point::ORIGIN);
        gene.points = vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(2.0, 0.0)];
        gene.strokes = vec![crate::gene::Stroke::new(Range::new(0, 2))];
        gene.strokes[0].sx = Unit::new(1.0);
        gene.groups = vec![crate::gene::Group::new(vec![0])];
        gene.bind_stroke(0, 0);
        gene.invalid.set(InvalidFlags::SCORE);

        let han = han_with_one_straight_stroke();
        gene.ensure_score(&han, &ScoreWeights::default());
        assert!(gene.strokes[0].deviation.value() < 1e-9);
    }

    #[test]
    fn unassigned_stroke_has_undefined_deviation() {
        let mut gene = Gene::new(Range::new(0, 8), Point::ORIGIN);
        gene.points = vec![Point::new(5.0, 5.0), Point::new(6.0, 5.0)];
        gene.strokes = vec![crate::gene::Stroke::new(Range::new(0, 1))];
        gene.groups = vec![crate::gene::Group::new(vec![0])];
        gene.invalid.set(InvalidFlags::SCORE);

        let han = han_with_one_straight_stroke();
        gene.ensure_score(&han, &ScoreWeights::default());
        assert!(gene.strokes[0].deviation.is_undefined());
    }
}
