//! The loaded, immutable Han (Chinese character) glyph reference (spec §3,
//! §6 "Han XML").
//!
//! A [`HanRef`] is produced once by the embedding application (from a parsed
//! `hanDefinition` document — XML parsing itself is out of scope, spec §1)
//! and shared by borrow across every trial that scores against it.

use crate::geometry::{Point, Rectangle};

/// One sampled point along a Han stroke's arc, with its cumulative
/// arc-length distance from the stroke's start (spec §6 `pointDistance`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcPoint {
    pub point: Point,
    pub distance: f64,
}

/// A single reference stroke: forward- and reverse-sampled point sequences
/// (arc-length distances let scoring measure deviation and extra length
/// without resampling, spec §4.1/§4.4's `HStroke`).
#[derive(Debug, Clone)]
pub struct HanStroke {
    pub id: usize,
    pub forward: Vec<ArcPoint>,
    pub reverse: Vec<ArcPoint>,
    pub bounds: Rectangle,
}
impl HanStroke {
    pub fn arc_length(&self) -> f64 {
        self.forward.last().map(|p| p.distance).unwrap_or(0.0)
    }
    pub fn start(&self) -> Point {
        self.forward.first().map(|p| p.point).unwrap_or(Point::ORIGIN)
    }
    pub fn end(&self) -> Point {
        self.forward.last().map(|p| p.point).unwrap_or(Point::ORIGIN)
    }
}

/// A named collection of Han strokes scored together (spec §3 `HGroup`).
#[derive(Debug, Clone)]
pub struct HanGroup {
    pub id: usize,
    pub strokes: Vec<usize>,
    pub bounds: Rectangle,
}

/// A required or allowed overlap between two Han strokes (spec §6 `overlap`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HanOverlap {
    pub first_stroke: usize,
    pub second_stroke: usize,
    pub required: bool,
}

/// The full reference definition for one Han character (spec §3 `HanRef`).
#[derive(Debug, Clone)]
pub struct HanRef {
    pub unicode: char,
    pub length: f64,
    pub bounds: Rectangle,
    pub minimum_stroke_length: f64,
    pub groups: Vec<HanGroup>,
    pub strokes: Vec<HanStroke>,
    pub overlaps: Vec<HanOverlap>,
}
impl HanRef {
    pub fn stroke(&self, id: usize) -> &HanStroke {
        &self.strokes[id]
    }
    pub fn group(&self, id: usize) -> &HanGroup {
        &self.groups[id]
    }
    pub fn group_of_stroke(&self, stroke: usize) -> Option<usize> {
        self.groups.iter().position(|g| g.strokes.contains(&stroke))
    }
    /// `true` if `(a, b)` (in either order) is declared required in this
    /// reference.
    pub fn is_required_overlap(&self, a: usize, b: usize) -> bool {
        self.overlaps
            .iter()
            .any(|o| o.required && unordered_eq(o, a, b))
    }
    /// `true` if `(a, b)` is declared at all (required or merely allowed).
    pub fn is_allowed_overlap(&self, a: usize, b: usize) -> bool {
        self.overlaps.iter().any(|o| unordered_eq(o, a, b))
    }
    /// Every required overlap not present in `observed`.
    pub fn missing_overlaps(&self, observed: &[(usize, usize)]) -> Vec<HanOverlap> {
        self.overlaps
            .iter()
            .filter(|o| o.required)
            .filter(|o| {
                !observed
                    .iter()
                    .any(|&(a, b)| unordered_eq(o, a, b))
            })
            .copied()
            .collect()
    }
    /// Every observed overlap not declared (required or allowed) in this
    /// reference.
    pub fn illegal_overlaps(&self, observed: &[(usize, usize)]) -> Vec<(usize, usize)> {
        observed
            .iter()
            .copied()
            .filter(|&(a, b)| !self.is_allowed_overlap(a, b))
            .collect()
    }
}

fn unordered_eq(o: &HanOverlap, a: usize, b: usize) -> bool {
    (o.first_stroke == a && o.second_stroke == b) || (o.first_stroke == b && o.second_stroke == a)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_han() -> HanRef {
        let bounds = Rectangle {
            top_left: Point::new(0.0, 1.0),
            bottom_right: Point::new(1.0, 0.0),
        };
        HanRef {
            unicode: '人',
            length: 2.0,
            bounds,
            minimum_stroke_length: 0.1,
            groups: vec![HanGroup {
                id: 0,
                strokes: vec![0, 1],
                bounds,
            }],
            strokes: vec![
                HanStroke {
                    id: 0,
                    forward: vec![
                        ArcPoint { point: Point::ORIGIN, distance: 0.0 },
                        ArcPoint { point: Point::new(1.0, 1.0), distance: 1.0 },
                    ],
                    reverse: vec![],
                    bounds,
                },
                HanStroke {
                    id: 1,
                    forward: vec![
                        ArcPoint { point: Point::ORIGIN, distance: 0.0 },
                        ArcPoint { point: Point::new(1.0, 0.0), distance: 1.0 },
                    ],
                    reverse: vec![],
                    bounds,
                },
            ],
            overlaps: vec![HanOverlap { first_stroke: 0, second_stroke: 1, required: true }],
        }
    }

    #[test]
    fn overlap_queries_are_order_independent() {
        let han = sample_han();
        assert!(han.is_required_overlap(0, 1));
        assert!(han.is_required_overlap(1, 0));
        assert!(!han.is_required_overlap(0, 2));
    }

    #[test]
    fn missing_and_illegal_overlaps() {
        let han = sample_han();
        assert_eq!(han.missing_overlaps(&[]).len(), 1);
        assert!(han.missing_overlaps(&[(0, 1)]).is_empty());
        assert_eq!(han.illegal_overlaps(&[(0, 1), (1, 2)]), vec![(1, 2)]);
    }
}
