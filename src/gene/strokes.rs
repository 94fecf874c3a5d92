//! Assigning coherent segments to strokes (spec §4.3).
//!
//! On a gene's first compilation there is no prior stroke list, so each
//! maximal coherent run (with short incoherent dropouts bridged in) seeds a
//! new stroke, in segment order. After an edit, strokes already exist with
//! Han-stroke bindings (`stroke_to_han`) that must survive the edit, so the
//! existing strokes are instead walked in parallel with the new segment list
//! and each one's acid range is grown or shrunk to match — the six-relation
//! walk spec §4.3 describes. A stroke that cannot claim any coherent segment
//! this way loses its binding and the gene is invalid for this trial.

use crate::{
    error::{ValidationFailure, ValidationReason},
    geometry::Range,
};

use super::{Gene, InvalidFlags, Stroke};

impl Gene {
    /// Rebuild or realign `strokes` from `segments` (spec §4.3).
    pub fn ensure_strokes(&mut self, max_dropout_len: usize) -> Result<(), ValidationFailure> {
        if !self.invalid.contains(InvalidFlags::STROKES) {
            return Ok(());
        }

        if self.strokes.is_empty() {
            self.strokes = initial_strokes(&self.segments, max_dropout_len);
        } else {
            self.realign_strokes(max_dropout_len)?;
        }

        self.invalid.clear(InvalidFlags::STROKES);
        Ok(())
    }

    /// Walk the existing stroke list against the current segments, in
    /// order, growing/shrinking each stroke's acid range to the coherent
    /// segments it now overlaps (spec §4.3's six geometric relations,
    /// collapsed here into a sequential claim-and-extend walk since strokes
    /// are disjoint and segment-ordered by construction).
    fn realign_strokes(&mut self, max_dropout_len: usize) -> Result<(), ValidationFailure> {
        let previous = std::mem::take(&mut self.strokes);
        let mut realigned = Vec::with_capacity(previous.len());
        let mut seg_idx = 0usize;

        for old in &previous {
            while seg_idx < self.segments.len() && self.segments[seg_idx].range.end < old.acids.start {
                seg_idx += 1;
            }

            let mut acids: Option<Range> = None;
            let mut segment_count = 0u32;
            let mut dropout_count = 0u32;
            let mut j = seg_idx;

            loop {
                let Some(seg) = self.segments.get(j) else { break };
                if seg.coherent {
                    match acids {
                        Some(claimed) if seg.range.start <= claimed.end + 1 => {
                            acids = Some(Range::new(claimed.start, seg.range.end));
                        }
                        Some(_) => break, // A gap opened up: this segment starts the next stroke.
                        None => {
                            acids = Some(seg.range);
                        }
                    }
                    segment_count += 1;
                    j += 1;
                } else if acids.is_some() && seg.len() <= max_dropout_len {
                    match self.segments.get(j + 1) {
                        Some(after) if after.coherent => {
                            let claimed = acids.unwrap();
                            acids = Some(Range::new(claimed.start, seg.range.end));
                            dropout_count += 1;
                            j += 1;
                        }
                        _ => break, // A trailing dropout is not absorbed.
                    }
                } else {
                    break;
                }
            }
            seg_idx = j;

            let Some(acids) = acids else {
                return Err(ValidationFailure::new(
                    ValidationReason::Strokes,
                    "stroke lost to incoherent segment",
                ));
            };

            let mut stroke = Stroke::new(acids);
            stroke.segment_count = segment_count;
            stroke.dropout_count = dropout_count;
            realigned.push(stroke);
        }

        self.strokes = realigned;
        Ok(())
    }

    /// Bind stroke `stroke` to Han reference stroke `han_stroke`, replacing
    /// any prior binding for either side (spec §4.3 "one-to-one stroke
    /// assignment").
    pub fn bind_stroke(&mut self, stroke: usize, han_stroke: usize) {
        if let Some(prev_han) = self.stroke_to_han.remove(&stroke) {
            self.han_to_stroke.remove(&prev_han);
        }
        if let Some(prev_stroke) = self.han_to_stroke.remove(&han_stroke) {
            self.stroke_to_han.remove(&prev_stroke);
        }
        self.stroke_to_han.insert(stroke, han_stroke);
        self.han_to_stroke.insert(han_stroke, stroke);
    }

    /// Every stroke index with no Han-stroke binding (spec §4.3 "unassigned
    /// strokes count against placement/dropout scoring").
    pub fn unassigned_strokes(&self) -> Vec<usize> {
        (0..self.strokes.len())
            .filter(|i| !self.stroke_to_han.contains_key(i))
            .collect()
    }
}

/// First-compile stroke seeding: one stroke per maximal coherent run, with
/// incoherent dropouts no longer than `max_dropout_len` bridged in as long as
/// another coherent segment follows.
fn initial_strokes(segments: &[super::Segment], max_dropout_len: usize) -> Vec<Stroke> {
    let mut strokes = Vec::new();
    let mut i = 0;
    while i < segments.len() {
        let seg = segments[i];
        if !seg.coherent {
            i += 1;
            continue;
        }

        let mut acids = seg.range;
        let mut segment_count = 1u32;
        let mut dropout_count = 0u32;
        let mut j = i + 1;

        loop {
            let Some(next) = segments.get(j) else { break };
            if next.coherent {
                acids = Range::new(acids.start, next.range.end);
                segment_count += 1;
                j += 1;
            } else if next.len() <= max_dropout_len {
                match segments.get(j + 1) {
                    Some(after) if after.coherent => {
                        acids = Range::new(acids.start, next.range.end);
                        dropout_count += 1;
                        j += 1;
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }

        let mut stroke = Stroke::new(acids);
        stroke.segment_count = segment_count;
        stroke.dropout_count = dropout_count;
        strokes.push(stroke);
        i = j;
    }
    strokes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{acid::CodonTable, geometry::Point};

    fn bases_of(s: &str) -> Vec<crate::acid::Base> {
        s.chars().map(|c| crate::acid::Base::try_from(c).unwrap()).collect()
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
    fn single_coherent_run_becomes_one_stroke() {
        // Interior all GGT (Cardinal West Short): every trivector is coherent.
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        gene.ensure_strokes(0).unwrap();
        assert_eq!(gene.strokes.len(), 1);
    }

    #[test]
    fn bind_stroke_replaces_existing_binding() {
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        gene.ensure_strokes(0).unwrap();
        gene.strokes.push(Stroke::new(Range::new(0, 1)));
        gene.bind_stroke(0, 5);
        gene.bind_stroke(1, 5);
        assert_eq!(gene.stroke_to_han.get(&1), Some(&5));
        assert!(!gene.stroke_to_han.contains_key(&0));
        assert_eq!(gene.han_to_stroke.get(&5), Some(&1));
    }

    #[test]
    fn unassigned_strokes_lists_unbound_indices() {
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        gene.ensure_strokes(0).unwrap();
        assert_eq!(gene.unassigned_strokes(), vec![0]);
        gene.bind_stroke(0, 0);
        assert!(gene.unassigned_strokes().is_empty());
    }

    #[test]
    fn realignment_preserves_binding_across_an_edit() {
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        gene.ensure_strokes(0).unwrap();
        gene.bind_stroke(0, 7);

        // Re-run on the same segments: the single stroke's binding to Han
        // stroke 7 must survive, because realignment walks the existing
        // stroke list rather than discarding it.
        gene.invalid.set(InvalidFlags::STROKES);
        gene.ensure_strokes(0).unwrap();
        assert_eq!(gene.strokes.len(), 1);
        assert_eq!(gene.stroke_to_han.get(&0), Some(&7));
    }
}
