//! A single gene: its acid trace, coherence, strokes, groups, and the
//! invalidation bitset that drives incremental recompilation (spec §3, §4).

pub mod compile;
pub mod dimensions;
pub mod strokes;

use std::collections::BTreeMap;

use crate::{
    acid::{Acid, CODON_LEN},
    geometry::{Point, Range, Rectangle},
    unit::Unit,
};

/// Transitive-closure invalidation bitset (spec §3 `invalid_flags`).
///
/// Mirrors `original_source/src/core/gene.hpp`'s `GENEINVALID` hex-flag enum:
/// a manual bitset rather than a bitflags dependency the rest of the
/// workspace doesn't use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvalidFlags(u16);
impl InvalidFlags {
    pub const NONE: Self = Self(0);
    pub const ACIDS: Self = Self(0x0001);
    pub const POINTS: Self = Self(0x0002);
    pub const COHERENCE: Self = Self(0x0004);
    pub const SEGMENTS: Self = Self(0x0008);
    pub const STROKES: Self = Self(0x0010);
    pub const DIMENSIONS: Self = Self(0x0020);
    pub const OVERLAPS: Self = Self(0x0040);
    pub const SCORE: Self = Self(0x0080);
    pub const ALL: Self = Self(0x00FF);

    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }
    pub fn clear(&mut self, other: Self) {
        self.0 &= !other.0;
    }
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
    pub fn any(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub range: Range,
    pub coherent: bool,
}
impl Segment {
    pub fn len(&self) -> usize {
        self.range.len()
    }
}

/// Whether a scale component was computed from this element's own geometry or
/// promoted down from its parent (spec §4.4, §9 "Scale inheritance").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Inherited {
    pub sx: bool,
    pub sy: bool,
}

#[derive(Debug, Clone)]
pub struct Stroke {
    pub acids: Range,
    pub segment_count: u32,
    pub dropout_count: u32,
    pub bounds: Option<Rectangle>,
    pub arc_length: Unit,
    pub inherited: Inherited,
    pub sx: Unit,
    pub sy: Unit,
    pub sxy: Unit,
    pub dx: Unit,
    pub dy: Unit,
    pub dx_parent: Unit,
    pub dy_parent: Unit,
    pub deviation: Unit,
    pub extra_length: Unit,
}
impl Stroke {
    pub fn new(acids: Range) -> Self {
        Self {
            acids,
            segment_count: 0,
            dropout_count: 0,
            bounds: None,
            arc_length: Unit::UNDEFINED,
            inherited: Inherited::default(),
            sx: Unit::UNDEFINED,
            sy: Unit::UNDEFINED,
            sxy: Unit::UNDEFINED,
            dx: Unit::UNDEFINED,
            dy: Unit::UNDEFINED,
            dx_parent: Unit::UNDEFINED,
            dy_parent: Unit::UNDEFINED,
            deviation: Unit::UNDEFINED,
            extra_length: Unit::UNDEFINED,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Group {
    pub strokes: Vec<usize>,
    pub bounds: Option<Rectangle>,
    pub inherited: Inherited,
    pub sx: Unit,
    pub sy: Unit,
    pub sxy: Unit,
    pub dx: Unit,
    pub dy: Unit,
    pub dx_parent: Unit,
    pub dy_parent: Unit,
    /// Seven score exponents, spec §3: scale, placement, illegal overlaps,
    /// missing overlaps, deviation, extra length, dropouts.
    pub score: GroupScore,
}
impl Group {
    pub fn new(strokes: Vec<usize>) -> Self {
        Self {
            strokes,
            bounds: None,
            inherited: Inherited::default(),
            sx: Unit::UNDEFINED,
            sy: Unit::UNDEFINED,
            sxy: Unit::UNDEFINED,
            dx: Unit::UNDEFINED,
            dy: Unit::UNDEFINED,
            dx_parent: Unit::UNDEFINED,
            dy_parent: Unit::UNDEFINED,
            score: GroupScore::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupScore {
    pub scale: Unit,
    pub placement: Unit,
    pub illegal_overlaps: Unit,
    pub missing_overlaps: Unit,
    pub deviation: Unit,
    pub extra_length: Unit,
    pub dropouts: Unit,
    pub total: Unit,
}

#[derive(Debug, Clone)]
pub struct Gene {
    /// Inclusive base range `[start, end]` (spec §3).
    pub range: Range,
    pub origin: Point,

    pub acids: Vec<Acid>,
    pub points: Vec<Point>,
    pub coherent_count: Vec<u8>,
    pub segments: Vec<Segment>,

    pub strokes: Vec<Stroke>,
    pub groups: Vec<Group>,

    pub stroke_to_han: BTreeMap<usize, usize>,
    pub han_to_stroke: BTreeMap<usize, usize>,
    pub stroke_to_group: BTreeMap<usize, usize>,

    /// `(stroke_a, stroke_b, point)` with `a < b` (spec §3).
    pub overlaps: Vec<(usize, usize, Point)>,
    pub missing_overlaps: Vec<(usize, usize)>,
    pub illegal_overlaps: Vec<(usize, usize)>,

    pub gene_bounds: Option<Rectangle>,
    pub gene_sx: Unit,
    pub gene_sy: Unit,
    pub gene_dx: Unit,
    pub gene_dy: Unit,

    pub invalid: InvalidFlags,
}

impl Gene {
    pub fn new(range: Range, origin: Point) -> Self {
        Self {
            range,
            origin,
            acids: Vec::new(),
            points: Vec::new(),
            coherent_count: Vec::new(),
            segments: Vec::new(),
            strokes: Vec::new(),
            groups: Vec::new(),
            stroke_to_han: BTreeMap::new(),
            han_to_stroke: BTreeMap::new(),
            stroke_to_group: BTreeMap::new(),
            overlaps: Vec::new(),
            missing_overlaps: Vec::new(),
            illegal_overlaps: Vec::new(),
            gene_bounds: None,
            gene_sx: Unit::UNDEFINED,
            gene_sy: Unit::UNDEFINED,
            gene_dx: Unit::UNDEFINED,
            gene_dy: Unit::UNDEFINED,
            invalid: InvalidFlags::ALL,
        }
    }

    pub fn codon_count(&self) -> usize {
        self.range.len() / CODON_LEN
    }

    /// The number of codons excluding the start and stop codon (spec §4.2
    /// "Total units length of the gene excludes start and stop").
    pub fn unit_count(&self) -> usize {
        self.codon_count().saturating_sub(2)
    }

    /// First codon index of an interior acid range `[range.start + CODON,
    /// range.end - CODON]` (spec §3 invariant).
    pub fn interior_codon_range(&self) -> Range {
        Range::new(1, self.codon_count() - 2)
    }

    pub fn invariants_hold(&self) -> bool {
        self.acids.len() == self.points.len() && self.points.len() == self.coherent_count.len()
    }

    /// Drive the whole compile → validate → score pipeline for whatever
    /// portion of [`InvalidFlags`] is currently set (spec §2's data-flow
    /// summary: "compile incrementally → validate → score").
    ///
    /// Each stage is itself idempotent when its flag is already clear, so
    /// calling this after a localized edit only redoes the stages the edit's
    /// transitive invalidation (spec §4.2) actually dirtied.
    pub fn recompile(
        &mut self,
        bases: &[crate::acid::Base],
        table: &crate::acid::CodonTable,
        max_dropout_len: usize,
        han: &crate::han::HanRef,
        weights: &crate::scoring::ScoreWeights,
    ) -> Result<(), crate::error::ValidationFailure> {
        self.ensure_acids(bases, table)?;
        self.ensure_coherence();
        self.ensure_segments();
        self.ensure_strokes(max_dropout_len)?;
        self.ensure_overlaps(han)?;
        self.ensure_dimensions(han);
        self.validate_dimensions()?;
        self.ensure_score(han, weights);
        Ok(())
    }

    /// Recompute the overlap set and the missing/illegal lists derived from
    /// it against `han` (spec §4.5's sweep output feeding §4.4/§8 scoring).
    fn ensure_overlaps(&mut self, han: &crate::han::HanRef) -> Result<(), crate::error::ValidationFailure> {
        if !self.invalid.contains(InvalidFlags::OVERLAPS) {
            return Ok(());
        }
        let overlaps = crate::overlaps::detect_overlaps(self);
        let stroke_pairs: Vec<(usize, usize)> = overlaps.iter().map(|&(a, b, _)| (a, b)).collect();

        let han_pairs = |a: usize, b: usize| -> Option<(usize, usize)> {
            Some((*self.stroke_to_han.get(&a)?, *self.stroke_to_han.get(&b)?))
        };
        let observed_han_pairs: Vec<(usize, usize)> = stroke_pairs
            .iter()
            .filter_map(|&(a, b)| han_pairs(a, b))
            .collect();

        self.missing_overlaps = han
            .missing_overlaps(&observed_han_pairs)
            .into_iter()
            .filter_map(|o| {
                let a = *self.han_to_stroke.get(&o.first_stroke)?;
                let b = *self.han_to_stroke.get(&o.second_stroke)?;
                Some((a.min(b), a.max(b)))
            })
            .collect();
        self.illegal_overlaps = stroke_pairs
            .iter()
            .copied()
            .filter(|&(a, b)| match han_pairs(a, b) {
                Some((ha, hb)) => !han.is_allowed_overlap(ha, hb),
                None => true, // Either side unbound: no reference overlap can license this.
            })
            .collect();
        self.overlaps = overlaps;

        self.invalid.clear(InvalidFlags::OVERLAPS);
        Ok(())
    }

    /// Spec §4.4 step 4: "At least one axis must have profile across the
    /// whole gene; if both `nx, ny` are zero the gene fails validation."
    fn validate_dimensions(&self) -> Result<(), crate::error::ValidationFailure> {
        if self.gene_sx.is_undefined() && self.gene_sy.is_undefined() {
            return Err(crate::error::ValidationFailure::new(
                crate::error::ValidationReason::Measurement,
                "both dimensions lack profile",
            ));
        }
        Ok(())
    }
}
