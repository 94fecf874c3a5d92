//! Applying and undoing reversible base-buffer edits (spec §3
//! "Modifications", §4.7 mutation legality rules, §4.8 rollback).
//!
//! A [`ResolvedMutation`] is a fully-sampled edit — every field
//! [`crate::sampling`] would otherwise draw at random has already been
//! filled in — ready to mutate `genome.bases` in place. Applying one pushes
//! its inverse onto the genome's accepted-modification stack; undoing walks
//! that stack back off.

use crate::{
    acid::{is_start_codon, is_stop_codon, Base, Codon, CODON_LEN},
    error::MutationRejection,
    gene::{compile::ChangeKind, InvalidFlags},
    genome::Genome,
    geometry::Range,
    modifications::Modification,
};

/// A fully-resolved edit, ready to apply to `genome.bases` (spec §4.7's
/// per-mutation-kind field set with every sampled/defaulted value filled in).
#[derive(Debug, Clone)]
pub enum ResolvedMutation {
    Change {
        gene: usize,
        target: usize,
        bases_after: Vec<Base>,
    },
    Copy {
        gene: usize,
        source: Range,
        target: usize,
    },
    Delete {
        gene: usize,
        target: usize,
        len: usize,
    },
    Insert {
        gene: usize,
        target: usize,
        bases: Vec<Base>,
    },
    Transpose {
        gene_src: usize,
        gene_dst: usize,
        source: Range,
        target: usize,
    },
}

impl Genome {
    /// Apply one resolved mutation: mutate `bases`, push the [`Modification`]
    /// that undoes it, and mark the touched gene(s) dirty (spec §4.2
    /// `mark_invalid`).
    pub fn apply_mutation(&mut self, mutation: ResolvedMutation) -> Result<(), MutationRejection> {
        let result = match mutation {
            ResolvedMutation::Change { gene, target, bases_after } => self.apply_change(gene, target, bases_after),
            ResolvedMutation::Copy { gene, source, target } => self.apply_copy(gene, source, target),
            ResolvedMutation::Delete { gene, target, len } => self.apply_delete(gene, target, len),
            ResolvedMutation::Insert { gene, target, bases } => self.apply_insert(gene, target, bases),
            ResolvedMutation::Transpose { gene_src, gene_dst, source, target } => {
                self.apply_transpose(gene_src, gene_dst, source, target)
            }
        };
        if let Err(reason) = &result {
            log::debug!("mutation rejected: {reason}");
        }
        result
    }

    fn apply_change(&mut self, gene: usize, target: usize, bases_after: Vec<Base>) -> Result<(), MutationRejection> {
        if bases_after.is_empty() {
            return Err(MutationRejection::EmptyIndexRange);
        }
        let bases_before: Vec<Base> = self.bases[target..target + bases_after.len()].to_vec();
        let silent = bases_before == bases_after;
        if silent && bases_after.len() == 1 && self.reject_silent {
            return Err(MutationRejection::SilentChangeRejected);
        }

        let gene_range = self.genes[gene].range;
        check_codon_legality(&self.bases, gene_range, target, &bases_after)?;

        self.bases[target..target + bases_after.len()].copy_from_slice(&bases_after);
        let codon = (target - gene_range.start) / CODON_LEN;
        self.genes[gene].mark_invalid(ChangeKind::PointChange { codon, silent });

        self.modifications.push_accepted(Modification::Change {
            gene,
            target,
            bases_before,
            bases_after,
            silent,
        });
        Ok(())
    }

    /// Whole-codon insertion at a codon-aligned `target` strictly inside
    /// `gene`'s interior (spec §4.7 "Insertions ... work in whole codons and
    /// align to codon boundaries").
    fn apply_insert(&mut self, gene: usize, target: usize, bases: Vec<Base>) -> Result<(), MutationRejection> {
        if bases.is_empty() || bases.len() % CODON_LEN != 0 {
            return Err(MutationRejection::EmptyIndexRange);
        }
        reject_new_boundary_codons(&bases)?;

        let ranges_before = self.snapshot_stroke_ranges(gene);
        self.bases.splice(target..target, bases.iter().copied());
        self.shift_trailing_genes(gene, target, bases.len() as isize);

        let codon_delta = (bases.len() / CODON_LEN) as isize;
        let codon = (target - self.genes[gene].range.start) / CODON_LEN;
        self.genes[gene].mark_invalid(ChangeKind::Indel { codon, codon_delta });
        self.push_stroke_ranges_if_changed(gene, ranges_before);

        self.modifications.push_accepted(Modification::Insert { gene, target, bases });
        Ok(())
    }

    /// Whole-codon deletion; rejects removing the gene's own start or stop
    /// codon (spec §8 "Deletion that would remove the start or stop codon of
    /// a gene is rejected").
    fn apply_delete(&mut self, gene: usize, target: usize, len: usize) -> Result<(), MutationRejection> {
        if len == 0 || len % CODON_LEN != 0 {
            return Err(MutationRejection::EmptyIndexRange);
        }
        let gene_range = self.genes[gene].range;
        if target < gene_range.start + CODON_LEN || target + len > gene_range.end - CODON_LEN + 1 {
            return Err(MutationRejection::TransposeCrossesBoundary);
        }

        let bases_removed: Vec<Base> = self.bases[target..target + len].to_vec();
        let ranges_before = self.snapshot_stroke_ranges(gene);
        self.bases.drain(target..target + len);
        self.shift_trailing_genes(gene, target, -(len as isize));

        let codon_delta = -((len / CODON_LEN) as isize);
        let codon = (target - self.genes[gene].range.start) / CODON_LEN;
        self.genes[gene].mark_invalid(ChangeKind::Indel { codon, codon_delta });
        self.push_stroke_ranges_if_changed(gene, ranges_before);

        self.modifications.push_accepted(Modification::Delete { gene, target, bases_removed });
        Ok(())
    }

    /// Duplicate `source` (whole codons, within one gene's interior) to
    /// `target` (spec §4.7 "Copies ... reject sources that would cross the
    /// gene-start or gene-stop codons").
    fn apply_copy(&mut self, gene: usize, source: Range, target: usize) -> Result<(), MutationRejection> {
        let gene_range = self.genes[gene].range;
        reject_boundary_crossing_source(gene_range, source)?;
        if source.contains(target) || Range::new(target, target + source.len() - 1).overlaps(&source) {
            return Err(MutationRejection::TargetOverlapsSource);
        }

        let bases: Vec<Base> = self.bases[source.start..=source.end].to_vec();
        reject_new_boundary_codons(&bases)?;

        let ranges_before = self.snapshot_stroke_ranges(gene);
        self.bases.splice(target..target, bases.iter().copied());
        self.shift_trailing_genes(gene, target, bases.len() as isize);

        let codon_delta = (bases.len() / CODON_LEN) as isize;
        let codon = (target - self.genes[gene].range.start) / CODON_LEN;
        self.genes[gene].mark_invalid(ChangeKind::Indel { codon, codon_delta });
        self.push_stroke_ranges_if_changed(gene, ranges_before);

        self.modifications.push_accepted(Modification::Copy { gene, source, target, bases });
        Ok(())
    }

    /// Move `source` (whole codons, from `gene_src`'s interior) to `target`
    /// in `gene_dst`: delete then insert, adjusting `target` when `source`
    /// precedes it (spec §3 "Transpose").
    fn apply_transpose(
        &mut self,
        gene_src: usize,
        gene_dst: usize,
        source: Range,
        target: usize,
    ) -> Result<(), MutationRejection> {
        let src_range = self.genes[gene_src].range;
        reject_boundary_crossing_source(src_range, source)?;
        if source.contains(target) {
            return Err(MutationRejection::TargetOverlapsSource);
        }

        let bases: Vec<Base> = self.bases[source.start..=source.end].to_vec();

        let src_ranges_before = self.snapshot_stroke_ranges(gene_src);
        self.bases.drain(source.start..=source.end);
        self.shift_trailing_genes(gene_src, source.start, -(bases.len() as isize));

        let delete_codon = (source.start - self.genes[gene_src].range.start) / CODON_LEN;
        self.genes[gene_src]
            .mark_invalid(ChangeKind::Indel { codon: delete_codon, codon_delta: -((bases.len() / CODON_LEN) as isize) });
        self.push_stroke_ranges_if_changed(gene_src, src_ranges_before);

        let adjusted_target = if source.start < target { target - bases.len() } else { target };
        reject_new_boundary_codons(&bases)?;

        let dst_ranges_before = self.snapshot_stroke_ranges(gene_dst);
        self.bases.splice(adjusted_target..adjusted_target, bases.iter().copied());
        self.shift_trailing_genes(gene_dst, adjusted_target, bases.len() as isize);

        let insert_codon = (adjusted_target - self.genes[gene_dst].range.start) / CODON_LEN;
        self.genes[gene_dst]
            .mark_invalid(ChangeKind::Indel { codon: insert_codon, codon_delta: (bases.len() / CODON_LEN) as isize });
        self.push_stroke_ranges_if_changed(gene_dst, dst_ranges_before);

        self.modifications.push_accepted(Modification::Transpose {
            gene_src,
            gene_dst,
            source,
            target: adjusted_target,
            bases,
        });
        Ok(())
    }

    fn snapshot_stroke_ranges(&self, gene: usize) -> Vec<Range> {
        self.genes[gene].strokes.iter().map(|s| s.acids).collect()
    }

    fn push_stroke_ranges_if_changed(&mut self, gene: usize, ranges_before: Vec<Range>) {
        let changed = self.genes[gene]
            .strokes
            .iter()
            .zip(&ranges_before)
            .any(|(s, before)| s.acids != *before)
            || self.genes[gene].strokes.len() != ranges_before.len();
        if changed {
            self.modifications.push_accepted(Modification::StrokeRanges { gene, ranges_before });
        }
    }

    /// Absolute base positions beyond the edited gene's own range shift by
    /// `delta`; the edited gene's own range grows/shrinks in place since the
    /// edit is strictly interior to it.
    fn shift_trailing_genes(&mut self, edited_gene: usize, at: usize, delta: isize) {
        let range = self.genes[edited_gene].range;
        self.genes[edited_gene].range = Range::new(range.start, (range.end as isize + delta) as usize);
        for (i, gene) in self.genes.iter_mut().enumerate() {
            if i != edited_gene && gene.range.start >= at {
                gene.range = gene.range.shift(delta);
            }
        }
    }

    /// Undo a single modification, restoring `bases` and, for stroke-range
    /// snapshots, the affected gene's stroke ranges (spec §4.8). Forces a
    /// full recompile of the touched gene(s) rather than replaying the
    /// incremental resize in reverse, so that a rolled-back gene is
    /// byte-identical to the state before the edit regardless of how many
    /// intervening considerations ran (spec §8 "byte-identical" invariant).
    pub fn undo_modification(&mut self, modification: &Modification) {
        match modification {
            Modification::Change { gene, target, bases_before, .. } => {
                self.bases[*target..*target + bases_before.len()].copy_from_slice(bases_before);
                self.genes[*gene].invalid.set(InvalidFlags::ALL);
            }
            Modification::Insert { gene, target, bases } => {
                self.bases.drain(*target..*target + bases.len());
                self.shift_trailing_genes(*gene, *target, -(bases.len() as isize));
                self.genes[*gene].invalid.set(InvalidFlags::ALL);
            }
            Modification::Delete { gene, target, bases_removed } => {
                self.bases.splice(*target..*target, bases_removed.iter().copied());
                self.shift_trailing_genes(*gene, *target, bases_removed.len() as isize);
                self.genes[*gene].invalid.set(InvalidFlags::ALL);
            }
            Modification::Copy { gene, target, bases, .. } => {
                self.bases.drain(*target..*target + bases.len());
                self.shift_trailing_genes(*gene, *target, -(bases.len() as isize));
                self.genes[*gene].invalid.set(InvalidFlags::ALL);
            }
            Modification::Transpose { gene_src, gene_dst, source, target, bases } => {
                self.bases.drain(*target..*target + bases.len());
                self.shift_trailing_genes(*gene_dst, *target, -(bases.len() as isize));
                let restore_at = if source.start >= *target { source.start - bases.len() } else { source.start };
                self.bases.splice(restore_at..restore_at, bases.iter().copied());
                self.shift_trailing_genes(*gene_src, restore_at, bases.len() as isize);
                self.genes[*gene_src].invalid.set(InvalidFlags::ALL);
                self.genes[*gene_dst].invalid.set(InvalidFlags::ALL);
            }
            Modification::StrokeRanges { gene, ranges_before } => {
                for (i, range) in ranges_before.iter().enumerate() {
                    if let Some(stroke) = self.genes[*gene].strokes.get_mut(i) {
                        stroke.acids = *range;
                    }
                }
            }
        }
    }
}

/// Neither the affected codon (if interior) nor any newly-written codon may
/// become a stop codon inside a gene, and no codon but the gene's own first
/// may become a start codon (spec §4.7).
fn check_codon_legality(bases: &[Base], gene_range: Range, target: usize, new_bases: &[Base]) -> Result<(), MutationRejection> {
    if new_bases.len() != 1 && new_bases.len() != CODON_LEN {
        return Ok(());
    }
    let codon_start = gene_range.start + ((target - gene_range.start) / CODON_LEN) * CODON_LEN;
    let codon_index = (codon_start - gene_range.start) / CODON_LEN;
    let gene_codon_count = gene_range.len() / CODON_LEN;

    let mut codon = [Base::T; CODON_LEN];
    for (i, slot) in codon.iter_mut().enumerate() {
        let pos = codon_start + i;
        *slot = if pos >= target && pos < target + new_bases.len() {
            new_bases[pos - target]
        } else {
            bases[pos]
        };
    }

    let is_interior = codon_index != 0 && codon_index + 1 != gene_codon_count;
    if is_interior && is_stop_codon(codon) {
        return Err(MutationRejection::IllegalStopCodon);
    }
    if codon_index != 0 && is_start_codon(codon) {
        return Err(MutationRejection::IllegalStartCodon);
    }
    Ok(())
}

/// None of a freshly-written whole-codon run may itself be a start or stop
/// codon (spec §4.7 "Inserts ... that would create a new start codon outside
/// a gene, or a new stop codon anywhere inside a gene, are rejected").
fn reject_new_boundary_codons(bases: &[Base]) -> Result<(), MutationRejection> {
    for codon in bases.chunks_exact(CODON_LEN) {
        let codon: Codon = [codon[0], codon[1], codon[2]];
        if is_stop_codon(codon) {
            return Err(MutationRejection::IllegalStopCodon);
        }
        if is_start_codon(codon) {
            return Err(MutationRejection::IllegalStartCodon);
        }
    }
    Ok(())
}

fn reject_boundary_crossing_source(gene_range: Range, source: Range) -> Result<(), MutationRejection> {
    let first_codon = Range::new(gene_range.start, gene_range.start + CODON_LEN - 1);
    let last_codon = Range::new(gene_range.end - CODON_LEN + 1, gene_range.end);
    if source.overlaps(&first_codon) || source.overlaps(&last_codon) {
        return Err(MutationRejection::CopyCrossesBoundary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{acid::CodonTable, gene::Gene, geometry::Point};

    fn bases_of(s: &str) -> Vec<Base> {
        s.chars().map(|c| Base::try_from(c).unwrap()).collect()
    }

    fn loaded_genome(dna: &str) -> Genome {
        let bases = bases_of(dna);
        let gene = Gene::new(Range::new(0, bases.len() - 1), Point::ORIGIN);
        let mut genome = Genome::new("g", "tester", 1);
        genome.load(bases, vec![gene], vec![], CodonTable::standard()).unwrap();
        genome
    }

    #[test]
    fn silent_change_is_recorded_and_flips_only_score() {
        // ATG TCT TAA, change position 6 T -> C stays silent per the scenario
        // in spec §8 ("Silent point mutation"): TCT and TCC both decode to
        // Diagonal(SouthEast, Medium) in the standard table, so the acid
        // trace is unaffected; only scoring needs to rerun.
        let mut genome = loaded_genome("ATGTCTTAA");
        genome.genes[0].invalid = InvalidFlags::NONE;
        genome.apply_mutation(ResolvedMutation::Change { gene: 0, target: 6, bases_after: vec![Base::C] }).unwrap();
        assert_eq!(genome.bases, bases_of("ATGTCCTAA"));
        assert!(genome.genes[0].invalid.contains(InvalidFlags::SCORE));
        assert!(!genome.genes[0].invalid.contains(InvalidFlags::ACIDS));
    }

    #[test]
    fn change_introducing_interior_stop_codon_is_rejected() {
        let mut genome = loaded_genome("ATGGCGGCGTAA");
        let err = genome
            .apply_mutation(ResolvedMutation::Change { gene: 0, target: 3, bases_after: bases_of("TAA") })
            .unwrap_err();
        assert_eq!(err, MutationRejection::IllegalStopCodon);
    }

    #[test]
    fn insert_grows_bases_and_shifts_trailing_gene() {
        let mut genome = loaded_genome("ATGTCTTAA");
        genome.genes.push(Gene::new(Range::new(9, 17), Point::ORIGIN));
        genome
            .apply_mutation(ResolvedMutation::Insert { gene: 0, target: 6, bases: bases_of("GCG") })
            .unwrap();
        assert_eq!(genome.bases, bases_of("ATGTCTGCGTAA"));
        assert_eq!(genome.genes[0].range, Range::new(0, 11));
        assert_eq!(genome.genes[1].range, Range::new(12, 20));
    }

    #[test]
    fn delete_of_start_codon_is_rejected() {
        let mut genome = loaded_genome("ATGGCGGCGTAA");
        let err = genome.apply_mutation(ResolvedMutation::Delete { gene: 0, target: 0, len: 3 }).unwrap_err();
        assert_eq!(err, MutationRejection::TransposeCrossesBoundary);
    }

    #[test]
    fn undo_change_restores_original_base() {
        let mut genome = loaded_genome("ATGTCTTAA");
        genome.apply_mutation(ResolvedMutation::Change { gene: 0, target: 6, bases_after: bases_of("C") }).unwrap();
        let modification = genome.modifications.accepted.last().unwrap().clone();
        genome.undo_modification(&modification);
        assert_eq!(genome.bases, bases_of("ATGTCTTAA"));
    }

    #[test]
    fn undo_insert_restores_original_length_and_gene_range() {
        let mut genome = loaded_genome("ATGTCTTAA");
        genome.apply_mutation(ResolvedMutation::Insert { gene: 0, target: 6, bases: bases_of("GCG") }).unwrap();
        let modification = genome.modifications.accepted.last().unwrap().clone();
        genome.undo_modification(&modification);
        assert_eq!(genome.bases, bases_of("ATGTCTTAA"));
        assert_eq!(genome.genes[0].range, Range::new(0, 8));
    }

    proptest::proptest! {
        /// Apply-then-undo of a single-base change restores the bases
        /// buffer exactly, for any interior position and any replacement
        /// base (spec §8 "Apply-then-undo of any single modification kind
        /// restores the bases buffer exactly").
        ///
        /// The gene body is built from `GGG` codons: substituting any one
        /// base of `GGG` can never produce a start (`ATG`) or stop (`TAA`/
        /// `TAG`/`TGA`) codon, so every draw here is legal and the mutation
        /// never gets rejected before it has a chance to round-trip.
        #[test]
        fn change_apply_then_undo_restores_bases(
            codon_count in 1usize..6,
            which_codon in 0usize..6,
            which_base in 0usize..3,
            new_base_idx in 0usize..4,
        ) {
            let which_codon = which_codon % codon_count;
            let bases_str = format!("ATG{}TAA", "GGG".repeat(codon_count));
            let original = bases_of(&bases_str);
            let mut genome = loaded_genome(&bases_str);

            let target = 3 + which_codon * CODON_LEN + which_base;
            let new_base = ALL_BASES[new_base_idx];
            genome
                .apply_mutation(ResolvedMutation::Change { gene: 0, target, bases_after: vec![new_base] })
                .unwrap();
            let modification = genome.modifications.accepted.last().unwrap().clone();
            genome.undo_modification(&modification);

            proptest::prop_assert_eq!(genome.bases, original);
        }
    }

    const ALL_BASES: [Base; 4] = [Base::T, Base::C, Base::A, Base::G];
}
