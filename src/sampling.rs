//! Resolving a [`Step`]'s [`IndexRange`] against a live genome, and turning a
//! [`StepMutation`] recipe plus a [`Prng`] draw into a concrete
//! [`ResolvedMutation`] (spec §4.7 "mutation selection").

use crate::{
    acid::{Base, CODON_LEN},
    genome::Genome,
    geometry::Range,
    mutate::ResolvedMutation,
    plan::{IndexRange, MutationKind, Step, StepMutation},
    prng::Prng,
};

const ALL_BASES: [Base; 4] = [Base::T, Base::C, Base::A, Base::G];

/// Resolve a step's [`IndexRange`] to an absolute, codon-aligned base range
/// within `genome` (spec §4.7: every index range variant names a window of
/// one gene's interior, never its start/stop codon).
pub fn resolve_index_range(genome: &Genome, range: &IndexRange) -> Range {
    match *range {
        IndexRange::Explicit(r) => r,
        IndexRange::WholeGene(gene) => interior_bases(genome, gene),
        IndexRange::PercentOfGene { gene, from, to } => {
            let interior = interior_bases(genome, gene);
            let codons = interior.len() / CODON_LEN;
            let start_codon = ((codons as f64) * from.clamp(0.0, 1.0)).floor() as usize;
            let end_codon = (((codons as f64) * to.clamp(0.0, 1.0)).ceil() as usize).saturating_sub(1).min(codons - 1);
            Range::new(
                interior.start + start_codon * CODON_LEN,
                interior.start + end_codon * CODON_LEN + (CODON_LEN - 1),
            )
        }
        IndexRange::HanStroke { gene, han_stroke } => {
            let g = &genome.genes[gene];
            let stroke_idx = *g.han_to_stroke.get(&han_stroke).expect("han stroke must be bound before sampling");
            let acids = g.strokes[stroke_idx].acids;
            let base_start = g.range.start + acids.start * CODON_LEN;
            let base_end = g.range.start + acids.end * CODON_LEN + (CODON_LEN - 1);
            Range::new(base_start, base_end)
        }
    }
}

fn interior_bases(genome: &Genome, gene: usize) -> Range {
    let g = genome.genes[gene].range;
    Range::new(g.start + CODON_LEN, g.end - CODON_LEN)
}

/// Pick the `StepMutation` recipe to use for one draw, weighted by
/// `likelihood` (spec §4.7's per-step mutation weights, normalized to 1.0).
fn choose_recipe<'s>(prng: &mut impl Prng, mutations: &'s [StepMutation]) -> Option<&'s StepMutation> {
    if mutations.is_empty() {
        return None;
    }
    let roll = prng.uniform_unit();
    let mut cumulative = 0.0;
    for m in mutations {
        cumulative += m.likelihood;
        if roll <= cumulative {
            return Some(m);
        }
    }
    mutations.last()
}

/// Draw `n` mutations from `step.mutations` per the weighted distribution in
/// `step.mode`'s `Random { counts }` (spec §4.7 "Random mode"). `index_shift`
/// is the step's `dIndex` already scaled by how many trials of this step
/// have run (spec §4.7 "an optional dIndex shift applied to its index range
/// every trial").
pub fn sample_random_mutations(
    prng: &mut impl Prng,
    genome: &Genome,
    step: &Step,
    counts: &[(u32, f64)],
    index_shift: isize,
) -> Vec<ResolvedMutation> {
    let n = draw_count(prng, counts);
    (0..n).filter_map(|_| sample_one(prng, genome, step, index_shift)).collect()
}

fn draw_count(prng: &mut impl Prng, counts: &[(u32, f64)]) -> u32 {
    if counts.is_empty() {
        return 0;
    }
    let roll = prng.uniform_unit();
    let mut cumulative = 0.0;
    for &(n, weight) in counts {
        cumulative += weight;
        if roll <= cumulative {
            return n;
        }
    }
    counts.last().map(|&(n, _)| n).unwrap_or(0)
}

fn sample_one(prng: &mut impl Prng, genome: &Genome, step: &Step, index_shift: isize) -> Option<ResolvedMutation> {
    let recipe = choose_recipe(prng, &step.mutations)?;
    let range = recipe
        .index_range
        .clone()
        .map(|r| resolve_index_range(genome, &r))
        .unwrap_or_else(|| resolve_index_range(genome, &step.index_range))
        .shift(index_shift);
    let gene = genome.gene_at(range.start)?;

    match recipe.kind() {
        MutationKind::Change => {
            let target = recipe.target_index.unwrap_or_else(|| uniform_index(prng, range));
            let base_before = genome.bases.get(target).copied()?;
            let transversion_p = recipe.transversion_likelihood.unwrap_or(2.0 / 3.0);
            let bases_after = match &recipe.bases {
                Some(bases) => bases.clone(),
                None => {
                    let base = if prng.uniform_unit() < transversion_p {
                        base_before.transversion()
                    } else {
                        base_before.transition()
                    };
                    vec![base]
                }
            };
            Some(ResolvedMutation::Change { gene, target, bases_after })
        }
        MutationKind::Insert => {
            let count = round_up_to_codon(recipe.count_bases.unwrap_or(CODON_LEN));
            let target = recipe.target_index.unwrap_or_else(|| codon_aligned_index(prng, range));
            let bases = recipe.bases.clone().unwrap_or_else(|| random_bases(prng, count));
            Some(ResolvedMutation::Insert { gene, target, bases })
        }
        MutationKind::Delete => {
            let len = round_up_to_codon(recipe.count_bases.unwrap_or(CODON_LEN));
            let target = recipe.target_index.unwrap_or_else(|| codon_aligned_index(prng, range));
            Some(ResolvedMutation::Delete { gene, target, len })
        }
        MutationKind::Copy => {
            let len = round_up_to_codon(recipe.count_bases.unwrap_or(CODON_LEN));
            let source_start = recipe.source_index.unwrap_or_else(|| codon_aligned_index(prng, range));
            let source = Range::new(source_start, source_start + len - 1);
            let target = recipe.target_index.unwrap_or_else(|| codon_aligned_index(prng, range));
            Some(ResolvedMutation::Copy { gene, source, target })
        }
        MutationKind::Transpose => {
            let len = round_up_to_codon(recipe.count_bases.unwrap_or(CODON_LEN));
            let source_start = recipe.source_index.unwrap_or_else(|| codon_aligned_index(prng, range));
            let source = Range::new(source_start, source_start + len - 1);
            let target = recipe.target_index.unwrap_or_else(|| codon_aligned_index(prng, range));
            let gene_dst = genome.gene_at(target).unwrap_or(gene);
            Some(ResolvedMutation::Transpose { gene_src: gene, gene_dst, source, target })
        }
    }
}

/// Round up to the nearest whole-codon count, minimum one codon.
fn round_up_to_codon(n: usize) -> usize {
    n.max(CODON_LEN).div_ceil(CODON_LEN) * CODON_LEN
}

fn uniform_index(prng: &mut impl Prng, range: Range) -> usize {
    prng.uniform_i64(range.start as i64, range.end as i64) as usize
}

fn codon_aligned_index(prng: &mut impl Prng, range: Range) -> usize {
    let codons = (range.len() / CODON_LEN).max(1);
    let codon = prng.uniform_i64(0, (codons - 1) as i64) as usize;
    range.start + codon * CODON_LEN
}

fn random_bases(prng: &mut impl Prng, n: usize) -> Vec<Base> {
    (0..n)
        .map(|_| ALL_BASES[prng.uniform_i64(0, 3) as usize])
        .collect()
}

/// Every `(position, replacement base)` pair in `range`, excluding the base
/// already present (spec §4.7 "Exhaustive mode enumerates every position and
/// every alternate base as a separate consideration").
pub fn exhaustive_considerations(genome: &Genome, gene: usize, range: Range) -> Vec<ResolvedMutation> {
    let mut out = Vec::new();
    for pos in range.start..=range.end {
        let Some(current) = genome.bases.get(pos).copied() else { continue };
        for &base in &ALL_BASES {
            if base != current {
                out.push(ResolvedMutation::Change { gene, target: pos, bases_after: vec![base] });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acid::CodonTable;
    use crate::gene::Gene;

    fn bases_of(s: &str) -> Vec<Base> {
        s.chars().map(|c| Base::try_from(c).unwrap()).collect()
    }

    fn loaded_genome(dna: &str) -> Genome {
        let bases = bases_of(dna);
        let gene = Gene::new(Range::new(0, bases.len() - 1), crate::geometry::Point::ORIGIN);
        let mut genome = Genome::new("g", "tester", 1);
        genome.load(bases, vec![gene], vec![], CodonTable::standard()).unwrap();
        genome
    }

    #[test]
    fn whole_gene_excludes_start_and_stop_codons() {
        let genome = loaded_genome("ATGTCTGCGTAA");
        let range = resolve_index_range(&genome, &IndexRange::WholeGene(0));
        assert_eq!(range, Range::new(3, 8));
    }

    #[test]
    fn exhaustive_lists_three_alternates_per_position() {
        let genome = loaded_genome("ATGTCTTAA");
        let considerations = exhaustive_considerations(&genome, 0, Range::new(3, 5));
        assert_eq!(considerations.len(), 9);
    }

    struct LowPrng;
    impl Prng for LowPrng {
        fn set_seed(&mut self, _seed: &str) {}
        fn get_seed(&self) -> String {
            "0 0".to_owned()
        }
        fn uniform_f64(&mut self, low: f64, _high: f64) -> f64 {
            low
        }
        fn uniform_i64(&mut self, low: i64, _high: i64) -> i64 {
            low
        }
        fn uniform_unit(&mut self) -> f64 {
            0.0
        }
        fn uuid_v4(&mut self) -> String {
            "00000000-0000-4000-8000-000000000000".to_owned()
        }
    }

    #[test]
    fn random_sampling_shifts_the_index_range_by_d_index() {
        let genome = loaded_genome("ATGTCTGCGTCAGCGTAA");
        let step = Step {
            trial_count: 1,
            d_index: 3,
            index_range: IndexRange::WholeGene(0),
            trial_conditions: None,
            mode: MutationConditionMode::Random { counts: vec![(1, 1.0)] },
            mutations: vec![StepMutation {
                kind: Some(MutationKind::Change),
                likelihood: 1.0,
                ..Default::default()
            }],
        };
        let unshifted = resolve_index_range(&genome, &step.index_range);

        let mut prng = LowPrng;
        let mutations = sample_random_mutations(&mut prng, &genome, &step, &[(1, 1.0)], 3);
        match mutations.first() {
            Some(ResolvedMutation::Change { target, .. }) => assert_eq!(*target, unshifted.start + 3),
            other => panic!("expected a shifted Change mutation, got {other:?}"),
        }
    }

    #[test]
    fn percent_of_gene_is_codon_aligned() {
        let genome = loaded_genome("ATGTCTGCGGCGTAA");
        let range = resolve_index_range(
            &genome,
            &IndexRange::PercentOfGene { gene: 0, from: 0.0, to: 0.5 },
        );
        assert_eq!(range.len() % CODON_LEN, 0);
    }
}
