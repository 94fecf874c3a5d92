//! Sweep-line detection of stroke-to-stroke overlaps (spec §4.5).
//!
//! Builds the segment list for a gene's strokes, sweeps left to right on
//! `x`, and reports every strict crossing between lines belonging to
//! different strokes. Bounding boxes are pre-filtered (expanded by a small
//! margin, per spec §4.5 "near-miss tolerance") so that the O(n log n)
//! sweep only runs the exact intersection test on pairs that could plausibly
//! cross.

use std::cmp::Ordering;

use crate::{
    geometry::{Line, Point, Rectangle},
    gene::Gene,
};

/// One edge of the event queue: a line entering or leaving the active set,
/// or two active lines swapping order (spec §4.5's `original_source`
/// `LineEvent` kinds, reproduced here as a flat queue rather than a
/// reordered priority heap).
#[derive(Debug, Clone, Copy, PartialEq)]
enum EventKind {
    Enter,
    Swap,
    Exit,
}

#[derive(Debug, Clone, Copy)]
struct Event {
    x: f64,
    y: f64,
    kind: EventKind,
    line: u32,
}

/// Total order over the queue: by `x`, then `Enter < Swap < Exit`, then
/// descending `y`, then ascending line id — reproduced from
/// `original_source/src/core/overlap.cpp`'s `LineEvent::compare`
/// (SPEC_FULL.md §B). The descending-`y` tiebreak keeps strokes that enter
/// at the same `x` in a stable top-to-bottom sweep order.
fn event_cmp(a: &Event, b: &Event) -> Ordering {
    fn kind_rank(kind: EventKind) -> u8 {
        match kind {
            EventKind::Enter => 0,
            EventKind::Swap => 1,
            EventKind::Exit => 2,
        }
    }
    a.x.partial_cmp(&b.x)
        .unwrap_or(Ordering::Equal)
        .then_with(|| kind_rank(a.kind).cmp(&kind_rank(b.kind)))
        .then_with(|| b.y.partial_cmp(&a.y).unwrap_or(Ordering::Equal))
        .then_with(|| a.line.cmp(&b.line))
}

/// Every line segment belonging to `gene`'s strokes, walking each stroke's
/// acid points in order (spec §4.1 "a stroke is a polyline through its
/// acids' endpoints").
fn stroke_lines(gene: &Gene) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut id = 0u32;
    for (stroke_idx, stroke) in gene.strokes.iter().enumerate() {
        let pts = &gene.points[stroke.acids.start..=stroke.acids.end];
        for pair in pts.windows(2) {
            lines.push(Line::new(pair[0], pair[1], stroke_idx, id));
            id += 1;
        }
    }
    lines
}

/// Margin added to a line's bounding box before testing it against the
/// active set, so that near-parallel near-touches still get an exact test
/// rather than being missed by floating point jitter (spec §4.5).
const BOX_MARGIN: f64 = 1e-6;

/// Every strict crossing between lines of different strokes, as
/// `(stroke_a, stroke_b, point)` with `stroke_a < stroke_b` (spec §3).
///
/// Sweeps left to right on `x`. `Enter` events insert a line into the active
/// set and test it against every other active line from a different stroke
/// (bounding-box pre-filtered); `Exit` events remove it. No `Swap` events are
/// emitted — keeping the active set an unordered `Vec` rather than an
/// order-maintaining structure is sufficient once every pairwise test inside
/// the active window is exact, at the cost of the active set growing to
/// O(n) for pathological all-overlapping input rather than staying sorted.
pub fn detect_overlaps(gene: &Gene) -> Vec<(usize, usize, Point)> {
    let lines = stroke_lines(gene);
    let boxes: Vec<Rectangle> = lines
        .iter()
        .map(|l| {
            Rectangle::from_points([l.start, l.end])
                .expect("a line has two distinct endpoints")
                .expand(BOX_MARGIN)
        })
        .collect();

    let mut events = Vec::with_capacity(lines.len() * 2);
    for line in &lines {
        let c = line.canonical();
        events.push(Event { x: c.start.x.value(), y: c.start.y.value(), kind: EventKind::Enter, line: c.id });
        events.push(Event { x: c.end.x.value(), y: c.end.y.value(), kind: EventKind::Exit, line: c.id });
    }
    events.sort_by(event_cmp);

    let mut active: Vec<u32> = Vec::new();
    let mut found = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for event in &events {
        let i = event.line as usize;
        match event.kind {
            EventKind::Enter => {
                for &other_id in &active {
                    let j = other_id as usize;
                    if lines[i].owner == lines[j].owner {
                        continue; // Same-stroke crossings are not overlaps.
                    }
                    if !boxes[i].intersects(&boxes[j]) {
                        continue;
                    }
                    if let Some(point) = lines[i].intersects_at(&lines[j]) {
                        let (a, b) = (lines[i].owner.min(lines[j].owner), lines[i].owner.max(lines[j].owner));
                        if seen.insert((a, b, line_key(point))) {
                            found.push((a, b, point));
                        }
                    }
                }
                active.push(event.line);
            }
            EventKind::Exit => active.retain(|&id| id != event.line),
            EventKind::Swap => {}
        }
    }
    found
}

fn line_key(p: Point) -> (i64, i64) {
    ((p.x.value() * 1e6).round() as i64, (p.y.value() * 1e6).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        acid::{Base, CodonTable},
        geometry::Range,
    };

    fn bases_of(s: &str) -> Vec<Base> {
        s.chars().map(|c| Base::try_from(c).unwrap()).collect()
    }

    fn compiled_gene(dna: &str) -> Gene {
        let bases = bases_of(dna);
        let mut gene = Gene::new(Range::new(0, bases.len() - 1), Point::ORIGIN);
        let table = CodonTable::standard();
        gene.ensure_acids(&bases, &table).unwrap();
        gene.ensure_coherence();
        gene.ensure_segments();
        gene
    }

    #[test]
    fn no_overlaps_within_a_single_stroke() {
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        gene.ensure_strokes(0).unwrap();
        assert!(detect_overlaps(&gene).is_empty());
    }

    #[test]
    fn crossing_strokes_report_one_overlap() {
        // Two independent two-point strokes laid directly into `points`,
        // bypassing acid compilation entirely: stroke 0 runs horizontally
        // through (0,0)-(2,0), stroke 1 crosses it diagonally.
        let mut gene = Gene::new(Range::new(0, 11), Point::ORIGIN);
        gene.points = vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, -1.0),
        ];
        gene.strokes = vec![
            crate::gene::Stroke::new(Range::new(0, 1)),
            crate::gene::Stroke::new(Range::new(2, 3)),
        ];

        let overlaps = detect_overlaps(&gene);
        assert_eq!(overlaps.len(), 1);
        assert_eq!((overlaps[0].0, overlaps[0].1), (0, 1));
        assert!((overlaps[0].2.x.value() - 1.0).abs() < 1e-6);
        assert!((overlaps[0].2.y.value() - 0.0).abs() < 1e-6);
    }
}
