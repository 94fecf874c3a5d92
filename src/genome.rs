//! Genome state machine, bases buffer, genes, and accumulated statistics
//! (spec §3 "Genome", §4.6 "Genome state machine").

use crate::{
    acid::{Base, CodonTable},
    error::{StylusError, StylusResult, ValidationFailure},
    gene::Gene,
    geometry::{Point, Range},
    han::HanRef,
    modifications::ModificationStack,
    plan::CostModel,
    scoring::{aggregate_gene_score, GroupScoreMode, ScoreWeights},
};

/// `original_source/src/core/genome.hpp`'s `GENOMESTATE` enum, reproduced
/// verbatim as the fixed state set (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenomeState {
    Alive,
    Compiled,
    Compiling,
    Dead,
    Invalid,
    Loading,
    Mutating,
    Recording,
    Rollback,
    Restoring,
    Scored,
    Scoring,
    Spawning,
    Validated,
    Validating,
}

impl GenomeState {
    /// The fixed transition matrix (spec §4.6): every edge this state
    /// machine allows. `enter_state` rejects anything not listed here.
    fn allowed_next(self) -> &'static [GenomeState] {
        use GenomeState::*;
        match self {
            Dead => &[Loading],
            Loading => &[Alive, Dead],
            Alive => &[Spawning, Mutating, Loading, Restoring],
            Spawning => &[Invalid, Dead],
            Invalid => &[Compiling, Mutating, Restoring, Loading],
            Compiling => &[Compiled, Invalid, Dead],
            Compiled => &[Validating],
            Validating => &[Validated, Invalid, Dead],
            Validated => &[Scoring],
            Scoring => &[Scored, Invalid, Dead],
            Scored => &[Recording],
            Recording => &[Alive, Invalid, Dead],
            Mutating => &[Invalid, Rollback, Dead],
            Rollback => &[Invalid, Dead],
            Restoring => &[Alive, Dead],
        }
    }
}

/// Accumulated counters across the lifetime of a loaded genome (spec §3
/// "accumulated statistics", §6 `statistics` maxima/minima per trial-range).
#[derive(Debug, Clone, Copy, Default)]
pub struct Statistics {
    pub trials: u64,
    pub attempts: u64,
    pub rollbacks: u64,
    pub accepted_mutations: u64,
    pub rejected_mutations: u64,
    pub best_score: Option<f64>,
    pub best_fitness: Option<f64>,
}

/// What gets recorded for each accepted trial (spec §4.7 "Recording").
#[derive(Debug, Clone, Copy)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub status_rate: u64,
}
impl Default for RecordingConfig {
    fn default() -> Self {
        Self { enabled: true, status_rate: 1 }
    }
}

pub struct Genome {
    state: GenomeState,
    pub bases: Vec<Base>,
    pub genes: Vec<Gene>,
    /// Exactly one Han reference per gene, same index (spec §1 Non-goals:
    /// "exactly one Han reference per gene in this version").
    pub han_refs: Vec<HanRef>,
    pub codon_table: CodonTable,
    pub modifications: ModificationStack,
    pub statistics: Statistics,
    pub recording: RecordingConfig,
    pub uuid: String,
    pub author: String,
    pub seed: u32,

    /// Max incoherent-run length absorbed as a dropout inside a stroke
    /// (spec §3 glossary "dropout").
    pub max_dropout_len: usize,
    pub score_weights: ScoreWeights,
    pub group_score_mode: GroupScoreMode,
    pub cost_model: CostModel,
    /// Reject a single-base change whose `bases_after == bases_before`
    /// (spec §6 `options/rejectSilent`).
    pub reject_silent: bool,
}

impl Genome {
    pub fn new(uuid: impl Into<String>, author: impl Into<String>, seed: u32) -> Self {
        Self {
            state: GenomeState::Dead,
            bases: Vec::new(),
            genes: Vec::new(),
            han_refs: Vec::new(),
            codon_table: CodonTable::standard(),
            modifications: ModificationStack::default(),
            statistics: Statistics::default(),
            recording: RecordingConfig::default(),
            uuid: uuid.into(),
            author: author.into(),
            seed,
            max_dropout_len: 1,
            score_weights: ScoreWeights::default(),
            group_score_mode: GroupScoreMode::default(),
            cost_model: CostModel::default(),
            reject_silent: false,
        }
    }

    pub fn state(&self) -> GenomeState {
        self.state
    }

    /// The single checked transition function every outward-facing
    /// operation routes through (spec §4.6 "gated by `enter_state`").
    pub fn enter_state(&mut self, next: GenomeState) -> StylusResult<()> {
        if self.state == next {
            return Ok(());
        }
        if self.state.allowed_next().contains(&next) {
            log::trace!("genome {}: {:?} -> {next:?}", self.uuid, self.state);
            self.state = next;
            Ok(())
        } else {
            log::warn!("genome {}: illegal transition {:?} -> {next:?}", self.uuid, self.state);
            Err(StylusError::InvalidState {
                from: format!("{:?}", self.state),
                to: format!("{next:?}"),
            })
        }
    }

    /// Replace the whole genome with a freshly parsed bases buffer, gene
    /// set, and one Han reference per gene (spec §6 `setGenome`), the only
    /// transition permitted from `Dead`.
    pub fn load(
        &mut self,
        bases: Vec<Base>,
        genes: Vec<Gene>,
        han_refs: Vec<HanRef>,
        codon_table: CodonTable,
    ) -> StylusResult<()> {
        self.enter_state(GenomeState::Loading)?;
        self.bases = bases;
        self.genes = genes;
        self.han_refs = han_refs;
        self.codon_table = codon_table;
        self.modifications.clear_on_spawn();
        self.statistics = Statistics::default();
        self.enter_state(GenomeState::Alive)
    }

    /// Begin a new spawn: reset the per-spawn modification log (spec §3
    /// "since the last spawn").
    pub fn spawn(&mut self) -> StylusResult<()> {
        self.enter_state(GenomeState::Spawning)?;
        self.modifications.clear_on_spawn();
        self.enter_state(GenomeState::Invalid)
    }

    pub fn raw_bases(&self) -> &[Base] {
        &self.bases
    }

    /// The bases buffer rendered as `TCAG` text (spec §6 `getGenomeBases`).
    pub fn raw_bases_text(&self) -> String {
        crate::acid::BaseSlice::ref_cast(&self.bases).to_string()
    }

    pub fn gene_range(&self, gene: usize) -> Range {
        self.genes[gene].range
    }

    /// Total acid-vector "unit" length across every gene, excluding start
    /// and stop codons (spec §4.7 "Cost is ... per_unit · gene_units").
    pub fn total_units(&self) -> usize {
        self.genes.iter().map(Gene::unit_count).sum()
    }

    pub fn origin_for(&self, gene: usize) -> Point {
        self.genes[gene].origin
    }

    /// The gene index whose range contains base position `pos`, if any.
    pub fn gene_at(&self, pos: usize) -> Option<usize> {
        self.genes.iter().position(|g| g.range.contains(pos))
    }

    /// Drive [`Gene::recompile`] for whichever genes currently carry any
    /// `invalid_flags` (spec §2's data-flow summary, "compile incrementally
    /// → validate → score").
    pub fn recompile_dirty(&mut self) -> Result<(), ValidationFailure> {
        for (i, gene) in self.genes.iter_mut().enumerate() {
            if gene.invalid.any() {
                gene.recompile(&self.bases, &self.codon_table, self.max_dropout_len, &self.han_refs[i], &self.score_weights)?;
            }
        }
        Ok(())
    }

    /// Total gene score across every gene, rolled up from each gene's
    /// groups per [`GroupScoreMode`] (spec §2 "group and gene score
    /// aggregation").
    pub fn total_score(&self) -> f64 {
        self.genes.iter().map(|g| aggregate_gene_score(g, self.group_score_mode)).sum()
    }

    /// Total cost across every gene (spec §4.7 `fixed + per_base ·
    /// gene_length + per_unit · gene_units`, summed per gene and then
    /// across genes since cost is additive over independent traces).
    pub fn total_cost(&self) -> f64 {
        self.genes
            .iter()
            .map(|g| self.cost_model.cost(g.range.len(), g.unit_count()))
            .sum()
    }

    /// `score / cost` (spec §8 invariant 7). `0.0` when cost is zero so an
    /// empty or cost-free genome never produces `NaN`/`inf` fitness.
    pub fn fitness(&self) -> f64 {
        let cost = self.total_cost();
        if cost <= crate::unit::EPSILON {
            0.0
        } else {
            self.total_score() / cost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_genome_only_accepts_loading() {
        let mut genome = Genome::new("g1", "tester", 42);
        assert_eq!(genome.state(), GenomeState::Dead);
        assert!(genome.enter_state(GenomeState::Alive).is_err());
        assert!(genome.enter_state(GenomeState::Loading).is_ok());
    }

    #[test]
    fn load_leaves_genome_alive() {
        let mut genome = Genome::new("g1", "tester", 42);
        genome.load(vec![], vec![], vec![], CodonTable::standard()).unwrap();
        assert_eq!(genome.state(), GenomeState::Alive);
    }

    #[test]
    fn dead_is_terminal_except_for_loading() {
        let mut genome = Genome::new("g1", "tester", 42);
        genome.load(vec![], vec![], vec![], CodonTable::standard()).unwrap();
        genome.enter_state(GenomeState::Mutating).unwrap();
        genome.enter_state(GenomeState::Dead).unwrap();
        assert!(genome.enter_state(GenomeState::Alive).is_err());
        assert!(genome.enter_state(GenomeState::Loading).is_ok());
    }

    #[test]
    fn full_success_cycle_returns_to_alive() {
        let mut genome = Genome::new("g1", "tester", 42);
        genome.load(vec![], vec![], vec![], CodonTable::standard()).unwrap();
        genome.enter_state(GenomeState::Mutating).unwrap();
        genome.enter_state(GenomeState::Invalid).unwrap();
        genome.enter_state(GenomeState::Compiling).unwrap();
        genome.enter_state(GenomeState::Compiled).unwrap();
        genome.enter_state(GenomeState::Validating).unwrap();
        genome.enter_state(GenomeState::Validated).unwrap();
        genome.enter_state(GenomeState::Scoring).unwrap();
        genome.enter_state(GenomeState::Scored).unwrap();
        genome.enter_state(GenomeState::Recording).unwrap();
        genome.enter_state(GenomeState::Alive).unwrap();
        assert_eq!(genome.state(), GenomeState::Alive);
    }
}
