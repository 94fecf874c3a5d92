//! Mutation plans: steps, step mutations, trial conditions, and the
//! termination conditions that bound a run against a genome.

use crate::{acid::Base, geometry::Range};

/// Where a step's mutations are drawn from.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexRange {
    /// An explicit, absolute base range.
    Explicit(Range),
    /// A percentage window `[from, to)` (0.0..=1.0) of one gene's length.
    PercentOfGene { gene: usize, from: f64, to: f64 },
    /// The whole of one gene.
    WholeGene(usize),
    /// The acid range of a gene's stroke already bound to a given Han stroke.
    HanStroke { gene: usize, han_stroke: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Change,
    Copy,
    Delete,
    Insert,
    Transpose,
}

/// A single weighted mutation recipe within a step. Any field left `None` is
/// sampled uniformly at use time from the step's index range.
#[derive(Debug, Clone, Default)]
pub struct StepMutation {
    pub kind: Option<MutationKind>,
    pub likelihood: f64,
    pub source_index: Option<usize>,
    pub target_index: Option<usize>,
    pub count_bases: Option<usize>,
    pub bases: Option<Vec<Base>>,
    /// Probability of a transversion (vs. transition) for a 1-base change.
    /// Default `2/3`.
    pub transversion_likelihood: Option<f64>,
    pub index_range: Option<IndexRange>,
}
impl StepMutation {
    pub fn kind(&self) -> MutationKind {
        self.kind.expect("mutation kind must be resolved before use")
    }
}

/// A step's mutation-selection mode (spec §4.7 "mutation condition modes").
#[derive(Debug, Clone, PartialEq)]
pub enum MutationConditionMode {
    /// Draw `n` from `counts` (values sum to 1.0 over their weights) and
    /// apply `n` mutations sequentially per attempt.
    Random { counts: Vec<(u32, f64)> },
    /// Enumerate every `(position, new_base)` pair in the index range as a
    /// separate consideration and keep the best.
    Exhaustive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionMode {
    None,
    Maintain,
    Increase,
    Decrease,
}

/// An acceptance condition on one of score/cost/fitness (spec §4.7 "Trial
/// acceptance conditions").
#[derive(Debug, Clone, Copy)]
pub struct TrialCondition {
    pub mode: ConditionMode,
    pub threshold: f64,
}
impl Default for TrialCondition {
    fn default() -> Self {
        Self { mode: ConditionMode::None, threshold: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TrialConditions {
    pub score: TrialCondition,
    pub cost: TrialCondition,
    pub fitness: TrialCondition,
}
impl TrialConditions {
    /// Exactly one of score/cost/fitness must be non-`None` when a step
    /// allows more than one mutation per attempt (spec §4.7).
    pub fn exactly_one_active(&self) -> bool {
        [self.score, self.cost, self.fitness]
            .iter()
            .filter(|c| c.mode != ConditionMode::None)
            .count()
            == 1
    }
}

#[derive(Debug, Clone)]
pub struct Step {
    pub trial_count: u64,
    /// Index-range shift applied every trial.
    pub d_index: isize,
    pub index_range: IndexRange,
    pub trial_conditions: Option<TrialConditions>,
    pub mode: MutationConditionMode,
    pub mutations: Vec<StepMutation>,
}
impl Step {
    /// A step's mutations must carry weights summing to 1.0 (spec §4.7).
    pub fn weights_are_normalized(&self) -> bool {
        let sum: f64 = self.mutations.iter().map(|m| m.likelihood).sum();
        (sum - 1.0).abs() <= 1e-6
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminationConditions {
    pub max_trials: Option<u64>,
    pub max_attempts: Option<u64>,
    pub max_rollbacks_per_trial: Option<u64>,
    pub min_fitness: Option<f64>,
    pub max_fitness: Option<f64>,
}

/// Cost model coefficients (spec §4.7 `fixed + per_base · gene_length +
/// per_unit · gene_units`).
#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub fixed: f64,
    pub per_base: f64,
    pub per_unit: f64,
}
impl CostModel {
    pub fn cost(&self, gene_length: usize, gene_units: usize) -> f64 {
        self.fixed + self.per_base * gene_length as f64 + self.per_unit * gene_units as f64
    }
}
impl Default for CostModel {
    fn default() -> Self {
        Self { fixed: 0.0, per_base: 0.0, per_unit: 0.0 }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<Step>,
    pub global_trial_conditions: Option<TrialConditions>,
    pub termination: TerminationConditions,
    pub cost_model: CostModel,
    /// After each accepted trial that is a multiple of this, the status
    /// callback runs. `0` disables the callback.
    pub status_rate: u64,
    /// Exhaustive mode's tie window: candidates within this distance of the
    /// maximum performance are considered tied (spec §4.7
    /// `getPerformancePrecision()`, §8 "ties ... broken uniformly at random").
    pub performance_precision: f64,
}
impl Default for Plan {
    fn default() -> Self {
        Self {
            steps: Vec::new(),
            global_trial_conditions: None,
            termination: TerminationConditions::default(),
            cost_model: CostModel::default(),
            status_rate: 0,
            performance_precision: 1e-6,
        }
    }
}

/// Why a termination condition fired (spec §4.7 "Termination conditions",
/// §4.7 "Status callback").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    TrialLimit,
    AttemptLimit,
    RollbackLimit,
    FitnessBounds,
    Callback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_model_combines_fixed_and_scaled_terms() {
        let model = CostModel { fixed: 1.0, per_base: 0.1, per_unit: 0.5 };
        assert!((model.cost(100, 20) - (1.0 + 10.0 + 10.0)).abs() < 1e-9);
    }

    #[test]
    fn step_weights_must_sum_to_one() {
        let step = Step {
            trial_count: 1,
            d_index: 0,
            index_range: IndexRange::WholeGene(0),
            trial_conditions: None,
            mode: MutationConditionMode::Exhaustive,
            mutations: vec![
                StepMutation { likelihood: 0.5, ..Default::default() },
                StepMutation { likelihood: 0.5, ..Default::default() },
            ],
        };
        assert!(step.weights_are_normalized());
    }

    #[test]
    fn trial_conditions_reject_more_than_one_active() {
        let mut conditions = TrialConditions::default();
        assert!(!conditions.exactly_one_active());
        conditions.score.mode = ConditionMode::Increase;
        assert!(conditions.exactly_one_active());
        conditions.cost.mode = ConditionMode::Decrease;
        assert!(!conditions.exactly_one_active());
    }
}
