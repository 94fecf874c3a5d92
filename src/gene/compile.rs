//! Bases → acids → points → coherence → segments (spec §4.2).

use crate::{
    acid::{Acid, Base, CodonTable, CODON_LEN},
    error::{ValidationFailure, ValidationReason},
    geometry::Range,
};

use super::{Gene, InvalidFlags, Segment};

/// What kind of edit touched the gene, used to decide how cheaply acids can
/// be revalidated (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A single base changed in place; codon count is unchanged.
    PointChange { codon: usize, silent: bool },
    /// Bases were inserted or removed in whole codons at `codon`.
    Indel { codon: usize, codon_delta: isize },
}

impl Gene {
    /// Applies the transitive invalidation rules for an edit (spec §4.2).
    pub fn mark_invalid(&mut self, change: ChangeKind) {
        match change {
            ChangeKind::PointChange { silent: true, .. } if !self.invalid.contains(InvalidFlags::ACIDS) => {
                // A silent change inside an already-valid gene only disturbs scoring.
                self.invalid.set(InvalidFlags::SCORE);
            }
            ChangeKind::PointChange { codon, .. } => {
                self.invalid.set(InvalidFlags::ACIDS);
                self.touch_from(codon);
            }
            ChangeKind::Indel { codon, codon_delta } => {
                self.resize_for_indel(codon, codon_delta);
                self.invalid.set(InvalidFlags::ACIDS);
                self.touch_from(codon.min(self.codon_count().saturating_sub(1)));
            }
        }
        self.propagate_invalidation();
    }

    fn touch_from(&mut self, _codon: usize) {
        // Tracked for callers that want to know the dirty boundary; the
        // actual recompute range is recomputed fresh in `ensure_acids`.
    }

    fn propagate_invalidation(&mut self) {
        if self.invalid.contains(InvalidFlags::ACIDS) {
            self.invalid.set(InvalidFlags::POINTS);
        }
        if self.invalid.contains(InvalidFlags::POINTS) {
            self.invalid.set(InvalidFlags::COHERENCE);
        }
        if self.invalid.contains(InvalidFlags::COHERENCE) {
            self.invalid.set(InvalidFlags::SEGMENTS);
        }
        if self.invalid.contains(InvalidFlags::SEGMENTS) {
            self.invalid.set(InvalidFlags::STROKES);
        }
        if self.invalid.contains(InvalidFlags::STROKES) {
            self.invalid.set(InvalidFlags::DIMENSIONS);
            self.invalid.set(InvalidFlags::OVERLAPS);
        }
        if self.invalid.contains(InvalidFlags::DIMENSIONS) || self.invalid.contains(InvalidFlags::OVERLAPS) {
            self.invalid.set(InvalidFlags::SCORE);
        }
    }

    /// Resize `acids`/`points`/`coherent_count` by `codon_delta` whole
    /// codons at `codon`, and shift/stretch trailing stroke ranges by the
    /// same amount (spec §4.2, §3 "Stroke ranges move with indels").
    fn resize_for_indel(&mut self, codon: usize, codon_delta: isize) {
        if codon_delta > 0 {
            let n = codon_delta as usize;
            let at = codon.min(self.acids.len());
            for _ in 0..n {
                self.acids.insert(at, Acid::Stop);
                self.points.insert(at, self.origin);
                self.coherent_count.insert(at, 0);
            }
        } else if codon_delta < 0 {
            let n = (-codon_delta) as usize;
            let at = codon.min(self.acids.len().saturating_sub(n));
            self.acids.drain(at..(at + n).min(self.acids.len()));
            self.points.drain(at..(at + n).min(self.points.len()));
            self.coherent_count.drain(at..(at + n).min(self.coherent_count.len()));
        }

        for stroke in &mut self.strokes {
            if stroke.acids.start >= codon {
                stroke.acids = stroke.acids.shift(codon_delta);
            } else if stroke.acids.contains(codon) || stroke.acids.end >= codon {
                // The edit lands inside this stroke: grow/shrink its end
                // rather than shifting the whole range. Re-validation will
                // reject the result if it becomes too short or inverted.
                let new_end = (stroke.acids.end as isize + codon_delta).max(stroke.acids.start as isize);
                stroke.acids = Range::new(stroke.acids.start, new_end as usize);
            }
        }
    }

    /// Rebuild `acids` and `points` from scratch against `bases`/`table`.
    ///
    /// The source recomputes only the codons after the first touched index
    /// (`ensureAcids(i, k)`, prefix-summing from `points[i-1]`); this
    /// recomputes the whole gene, which is the same result because every
    /// earlier acid/point is unaffected by edits at or after `i` and is
    /// therefore recomputed to an identical value. Recompiling whole-gene
    /// keeps the incremental bookkeeping in `resize_for_indel` (which already
    /// pre-sizes the arrays) the only place that reasons about `i`.
    pub fn ensure_acids(&mut self, bases: &[Base], table: &CodonTable) -> Result<(), ValidationFailure> {
        if !self.invalid.contains(InvalidFlags::ACIDS) {
            return Ok(());
        }

        let codon_count = self.range.len() / CODON_LEN;
        if codon_count < 2 {
            return Err(ValidationFailure::new(
                ValidationReason::Segments,
                "gene shorter than a start+stop codon pair",
            ));
        }

        let first = codon_of(&bases[self.range.start..=self.range.end], 0);
        if !crate::acid::is_start_codon(first) {
            return Err(ValidationFailure::new(ValidationReason::Segments, "gene does not begin with a start codon"));
        }
        let last = codon_of(&bases[self.range.start..=self.range.end], codon_count - 1);
        if !crate::acid::is_stop_codon(last) {
            return Err(ValidationFailure::new(ValidationReason::Segments, "gene does not end with a stop codon"));
        }

        let mut acids = Vec::with_capacity(codon_count);
        acids.push(Acid::Stop); // Start codon: zero-length acid at the origin.
        for i in 1..codon_count - 1 {
            let codon = codon_of(&bases[self.range.start..=self.range.end], i);
            acids.push(table.get(codon));
        }
        acids.push(Acid::Stop); // Stop codon.

        let mut points = Vec::with_capacity(codon_count);
        points.push(self.origin);
        for acid in &acids[1..] {
            let prev = *points.last().unwrap();
            points.push(acid.apply(prev));
        }

        self.acids = acids;
        self.points = points;
        self.coherent_count = vec![0; codon_count];
        self.invalid.clear(InvalidFlags::ACIDS);
        self.invalid.clear(InvalidFlags::POINTS);
        Ok(())
    }

    /// Recompute `coherent_count[i]` for every trivector (spec §4.2): each
    /// acid's count is the number of coherent 3-acid windows it belongs to
    /// (0, 1, 2 or 3).
    pub fn ensure_coherence(&mut self) {
        if !self.invalid.contains(InvalidFlags::COHERENCE) {
            return;
        }
        let n = self.acids.len();
        let mut counts = vec![0u8; n];
        if n >= 3 {
            for start in 0..=n - 3 {
                if is_coherent_trivector(&self.acids, start) {
                    counts[start] += 1;
                    counts[start + 1] += 1;
                    counts[start + 2] += 1;
                }
            }
        }
        self.coherent_count = counts;
        self.invalid.clear(InvalidFlags::COHERENCE);
    }

    /// Split the interior into alternating coherent/incoherent runs (spec §4.2).
    pub fn ensure_segments(&mut self) {
        if !self.invalid.contains(InvalidFlags::SEGMENTS) {
            return;
        }
        let interior = self.interior_codon_range();
        let mut segments = Vec::new();
        let mut i = interior.start;
        while i <= interior.end {
            let coherent = self.coherent_count[i] > 0;
            let start = i;
            while i <= interior.end && (self.coherent_count[i] > 0) == coherent {
                i += 1;
            }
            segments.push(Segment {
                range: Range::new(start, i - 1),
                coherent,
            });
        }
        self.segments = segments;
        self.invalid.clear(InvalidFlags::SEGMENTS);
    }
}

fn codon_of(gene_bases: &[Base], codon_index: usize) -> [Base; CODON_LEN] {
    let at = codon_index * CODON_LEN;
    [gene_bases[at], gene_bases[at + 1], gene_bases[at + 2]]
}

/// A trivector `(i-1, i, i+1)` (conceptually) is coherent iff its two
/// consecutive directional transitions each differ by at most one 45° step —
/// equivalently all three directions lie in a closed arc of <= 90° (spec
/// §4.2 glossary).
fn is_coherent_trivector(acids: &[Acid], start: usize) -> bool {
    if start + 2 >= acids.len() {
        return false;
    }
    let (a, b, c) = (acids[start], acids[start + 1], acids[start + 2]);
    if a.is_stop() || b.is_stop() || c.is_stop() {
        return false;
    }
    let ab = a.direction().step_distance(b.direction());
    let bc = b.direction().step_distance(c.direction());
    matches!((ab, bc), (Some(x), Some(y)) if x <= 1 && y <= 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    fn bases_of(s: &str) -> Vec<Base> {
        s.chars().map(|c| Base::try_from(c).unwrap()).collect()
    }

    #[test]
    fn compiles_start_and_stop_as_zero_length() {
        let bases = bases_of("ATGTCTTAA");
        let mut gene = Gene::new(Range::new(0, bases.len() - 1), Point::ORIGIN);
        let table = CodonTable::standard();
        gene.ensure_acids(&bases, &table).unwrap();
        assert_eq!(gene.acids.len(), 3);
        assert_eq!(gene.points[0], Point::ORIGIN);
        assert!(gene.acids[0].is_stop());
        assert!(gene.acids[2].is_stop());
    }

    #[test]
    fn rejects_gene_without_start_codon() {
        let bases = bases_of("TTTTCTTAA");
        let mut gene = Gene::new(Range::new(0, bases.len() - 1), Point::ORIGIN);
        let table = CodonTable::standard();
        assert!(gene.ensure_acids(&bases, &table).is_err());
    }

    #[test]
    fn points_accumulate_from_origin() {
        let bases = bases_of("ATGTCTTAA");
        let mut gene = Gene::new(Range::new(0, bases.len() - 1), Point::new(5.0, 5.0));
        let table = CodonTable::standard();
        gene.ensure_acids(&bases, &table).unwrap();
        assert_eq!(gene.points[0], Point::new(5.0, 5.0));
        let acid = gene.acids[1];
        assert_eq!(gene.points[1], acid.apply(gene.points[0]));
    }
}
