//! Drives a [`Plan`] against a [`Genome`]: mutation selection, attempt/trial
//! accounting, rollback, and the status callback (spec §4.7, §4.8).

use crate::{
    error::StylusResult,
    genome::{Genome, GenomeState},
    mutate::ResolvedMutation,
    plan::{ConditionMode, MutationConditionMode, Plan, Step, TerminationReason, TrialCondition, TrialConditions},
    prng::Prng,
    sampling::{exhaustive_considerations, resolve_index_range, sample_random_mutations},
};

/// Current best-known performance figures, updated as `increase`/`decrease`
/// trial conditions accept new trials (spec §4.7 "automatic threshold
/// update on acceptance").
#[derive(Debug, Clone, Copy, Default)]
pub struct Performance {
    pub score: f64,
    pub cost: f64,
    pub fitness: f64,
}
impl Performance {
    fn of(genome: &Genome) -> Self {
        Self {
            score: genome.total_score(),
            cost: genome.total_cost(),
            fitness: genome.fitness(),
        }
    }
}

/// One accepted or abandoned attempt, reported to [`Executor::run`]'s
/// caller for diagnostics (not part of the genome's own statistics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted,
    RolledBack,
}

/// A `trace!`-level span guard for one trial or attempt (spec §6
/// `setTraceLevel/Trial/Attempt`, "enable/clear trace regions"). Logs on
/// entry and again on drop so a trace-level log stream brackets every
/// region without the caller having to thread an exit log through every
/// early return.
struct TraceScope {
    label: &'static str,
    index: u64,
}
impl TraceScope {
    fn enter(label: &'static str, index: u64) -> Self {
        log::trace!("{label} {index}: enter");
        Self { label, index }
    }
}
impl Drop for TraceScope {
    fn drop(&mut self) {
        log::trace!("{} {}: exit", self.label, self.index);
    }
}

pub struct Executor<'g, P: Prng> {
    genome: &'g mut Genome,
    prng: P,
    best: Performance,
}

impl<'g, P: Prng> Executor<'g, P> {
    pub fn new(genome: &'g mut Genome, prng: P) -> Self {
        Self { genome, prng, best: Performance::default() }
    }

    /// Runs `plan` to completion (or until a termination condition fires),
    /// invoking `status` after every accepted trial that is a multiple of
    /// `plan.status_rate` (a `true` return ends the run early, reason
    /// `Callback`).
    pub fn run(&mut self, plan: &Plan, mut status: impl FnMut(&Genome, u64) -> bool) -> StylusResult<TerminationReason> {
        let mut trial = 0u64;
        let mut attempt = 0u64;

        'outer: for step in &plan.steps {
            for trial_within_step in 0..step.trial_count {
                let conditions = step.trial_conditions.unwrap_or_else(|| {
                    plan.global_trial_conditions.unwrap_or_default()
                });
                let index_shift = step.d_index.saturating_mul(trial_within_step as isize);

                if let Some(max) = plan.termination.max_trials {
                    if trial >= max {
                        break 'outer;
                    }
                }

                let _trial_span = TraceScope::enter("trial", trial);
                let mut rollbacks_this_trial = 0u64;
                loop {
                    if let Some(max) = plan.termination.max_attempts {
                        if attempt >= max {
                            break 'outer;
                        }
                    }
                    attempt += 1;
                    self.genome.statistics.attempts += 1;
                    let _attempt_span = TraceScope::enter("attempt", attempt);

                    match self.run_attempt(step, &conditions, plan.performance_precision, index_shift) {
                        Ok(true) => {
                            trial += 1;
                            self.genome.statistics.trials += 1;
                            log::debug!(
                                "trial {trial} accepted after {rollbacks_this_trial} rollback(s), score={:.6} fitness={:.6}",
                                self.best.score,
                                self.best.fitness,
                            );
                            if let Some(min) = plan.termination.min_fitness {
                                if self.best.fitness < min {
                                    log::debug!("fitness {} below minimum {min}, terminating", self.best.fitness);
                                    break 'outer;
                                }
                            }
                            if let Some(max) = plan.termination.max_fitness {
                                if self.best.fitness > max {
                                    log::debug!("fitness {} above maximum {max}, terminating", self.best.fitness);
                                    break 'outer;
                                }
                            }
                            if plan.status_rate != 0 && trial % plan.status_rate == 0 {
                                if status(self.genome, trial) {
                                    log::debug!("plan terminated by status callback at trial {trial}");
                                    return Ok(TerminationReason::Callback);
                                }
                            }
                            break;
                        }
                        Ok(false) => {
                            rollbacks_this_trial += 1;
                            self.genome.statistics.rollbacks += 1;
                            log::trace!("attempt {attempt} rejected by trial conditions, rolling back");
                            if let Some(max) = plan.termination.max_rollbacks_per_trial {
                                if rollbacks_this_trial > max {
                                    log::warn!("rollback cap ({max}) exceeded in trial {trial}, terminating plan");
                                    break 'outer;
                                }
                            }
                        }
                        Err(failure) => {
                            rollbacks_this_trial += 1;
                            self.genome.statistics.rollbacks += 1;
                            log::warn!("attempt {attempt} failed validation ({failure}), rolling back");
                        }
                    }
                }
            }
        }

        Ok(if plan.termination.max_trials.is_some_and(|m| trial >= m) {
            TerminationReason::TrialLimit
        } else if plan.termination.max_attempts.is_some_and(|m| attempt >= m) {
            TerminationReason::AttemptLimit
        } else {
            TerminationReason::FitnessBounds
        })
    }

    /// One full attempt: select and apply mutations, recompile/validate,
    /// score, evaluate trial conditions, and either accept (advance counters
    /// and return `Ok(true)`) or roll back (`Ok(false)`) — spec §2's
    /// data-flow summary and §4.8.
    fn run_attempt(
        &mut self,
        step: &Step,
        conditions: &TrialConditions,
        performance_precision: f64,
        index_shift: isize,
    ) -> Result<bool, crate::error::ValidationFailure> {
        self.genome.enter_state(GenomeState::Mutating).map_err(|_| {
            crate::error::ValidationFailure::new(crate::error::ValidationReason::Strokes, "cannot mutate from current state")
        })?;

        let mark = self.genome.modifications.accepted.len();

        // A genome with no genes yet (e.g. before the first `load` of real
        // data) has nothing to mutate; treat the attempt as a no-op rather
        // than resolving an index range against a gene that doesn't exist.
        let outcome = if self.genome.genes.is_empty() {
            Ok(())
        } else {
            match &step.mode {
                MutationConditionMode::Random { counts } => self.run_random_attempt(step, counts, index_shift),
                MutationConditionMode::Exhaustive => {
                    self.run_exhaustive_attempt(step, conditions, performance_precision, index_shift)
                }
            }
        };

        match outcome {
            Ok(()) => {
                let accept = self.evaluate(conditions);
                if accept {
                    self.genome.modifications.accepted.truncate(mark);
                    self.genome.statistics.accepted_mutations += 1;
                    // Drive through the legal chain (spec §4.6): an accepted
                    // attempt has already been compiled/validated/scored by
                    // `recompile_dirty` above, so these are bookkeeping
                    // transitions rather than fresh compute.
                    self.genome.enter_state(GenomeState::Invalid).ok();
                    self.genome.enter_state(GenomeState::Compiling).ok();
                    self.genome.enter_state(GenomeState::Compiled).ok();
                    self.genome.enter_state(GenomeState::Validating).ok();
                    self.genome.enter_state(GenomeState::Validated).ok();
                    self.genome.enter_state(GenomeState::Scoring).ok();
                    self.genome.enter_state(GenomeState::Scored).ok();
                    self.genome.enter_state(GenomeState::Recording).ok();
                    self.genome.enter_state(GenomeState::Alive).ok();
                    Ok(true)
                } else {
                    self.rollback(mark);
                    self.genome.statistics.rejected_mutations += 1;
                    Ok(false)
                }
            }
            Err(failure) => {
                self.rollback(mark);
                self.genome.statistics.rejected_mutations += 1;
                Err(failure)
            }
        }
    }

    /// Apply every sampled mutation sequentially, then recompile once (spec
    /// §4.7 "Random mode applies its draw in a single attempt").
    fn run_random_attempt(
        &mut self,
        step: &Step,
        counts: &[(u32, f64)],
        index_shift: isize,
    ) -> Result<(), crate::error::ValidationFailure> {
        let mutations = sample_random_mutations(&mut self.prng, self.genome, step, counts, index_shift);
        for mutation in mutations {
            if self.genome.apply_mutation(mutation).is_err() {
                continue; // An illegally-formed draw just contributes nothing this attempt.
            }
        }
        self.genome.recompile_dirty()
    }

    /// Enumerate every `(position, base)` consideration in the step's index
    /// range, score each in isolation (rolling back between), and keep
    /// whichever performs best, breaking ties within `performance_precision`
    /// uniformly at random (spec §4.7 "Exhaustive mode", §8).
    fn run_exhaustive_attempt(
        &mut self,
        step: &Step,
        conditions: &TrialConditions,
        performance_precision: f64,
        index_shift: isize,
    ) -> Result<(), crate::error::ValidationFailure> {
        let range = resolve_index_range(self.genome, &step.index_range).shift(index_shift);
        let Some(gene) = self.genome.gene_at(range.start) else {
            return Ok(());
        };
        let considerations = exhaustive_considerations(self.genome, gene, range);

        let mut best: Option<(ResolvedMutation, Performance)> = None;
        let mut tied: Vec<(ResolvedMutation, Performance)> = Vec::new();

        for consideration in considerations {
            let mark = self.genome.modifications.accepted.len();
            let applied = self.genome.apply_mutation(consideration.clone()).is_ok()
                && self.genome.recompile_dirty().is_ok();
            let performance = if applied { Performance::of(self.genome) } else { Performance::default() };

            let undo = self.genome.modifications.split_off_accepted(mark);
            for modification in &undo {
                self.genome.undo_modification(modification);
            }
            let _ = self.genome.recompile_dirty();

            if !applied {
                continue;
            }

            let candidate_score = axis_value(conditions, performance);
            match &best {
                None => {
                    best = Some((consideration.clone(), performance));
                    tied = vec![(consideration, performance)];
                }
                Some((_, best_perf)) => {
                    let best_score = axis_value(conditions, *best_perf);
                    if candidate_score > best_score + performance_precision {
                        best = Some((consideration.clone(), performance));
                        tied = vec![(consideration, performance)];
                    } else if (candidate_score - best_score).abs() <= performance_precision {
                        tied.push((consideration, performance));
                    }
                }
            }
        }

        let Some((chosen, _)) = tied_pick(&mut self.prng, tied) else {
            return Ok(());
        };
        self.genome.apply_mutation(chosen).ok();
        self.genome.recompile_dirty()
    }

    fn evaluate(&mut self, conditions: &TrialConditions) -> bool {
        let performance = Performance::of(self.genome);
        let accept_axis = |condition: TrialCondition, current: f64, best: f64| match condition.mode {
            ConditionMode::None => true,
            ConditionMode::Maintain => (current - best).abs() <= condition.threshold,
            ConditionMode::Increase => current > best,
            ConditionMode::Decrease => current < best,
        };

        let accept = accept_axis(conditions.score, performance.score, self.best.score)
            && accept_axis(conditions.cost, performance.cost, self.best.cost)
            && accept_axis(conditions.fitness, performance.fitness, self.best.fitness);

        if accept {
            self.best = performance;
        }
        accept
    }

    /// Undo every modification recorded since `mark`, in reverse order
    /// (spec §4.8).
    fn rollback(&mut self, mark: usize) {
        self.genome.enter_state(GenomeState::Rollback).ok();
        let undo_order = self.genome.modifications.split_off_accepted(mark);
        log::trace!("rolling back {} modification(s)", undo_order.len());
        for modification in &undo_order {
            self.genome.undo_modification(modification);
        }
        let _ = self.genome.recompile_dirty();
        self.genome.enter_state(GenomeState::Invalid).ok();
    }
}

/// Which performance axis an exhaustive comparison ranks by: whichever of
/// score/cost/fitness carries the step's single active trial condition
/// (spec §4.7 requires exactly one when more than one mutation is possible;
/// exhaustive mode's per-consideration ranking uses the same axis, falling
/// back to score when none is set).
fn axis_value(conditions: &TrialConditions, performance: Performance) -> f64 {
    if conditions.fitness.mode != ConditionMode::None {
        performance.fitness
    } else if conditions.cost.mode != ConditionMode::None {
        -performance.cost
    } else {
        performance.score
    }
}

fn tied_pick<P: Prng>(prng: &mut P, mut tied: Vec<(ResolvedMutation, Performance)>) -> Option<(ResolvedMutation, Performance)> {
    if tied.is_empty() {
        return None;
    }
    let idx = prng.uniform_i64(0, (tied.len() - 1) as i64) as usize;
    Some(tied.swap_remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        acid::{Base, CodonTable},
        plan::{CostModel, IndexRange, MutationConditionMode, Step, TerminationConditions},
    };

    struct FixedPrng;
    impl Prng for FixedPrng {
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

    fn alive_genome() -> Genome {
        let mut genome = Genome::new("g1", "tester", 1);
        genome.load(Vec::<Base>::new(), Vec::new(), Vec::new(), CodonTable::standard()).unwrap();
        genome
    }

    fn trivial_plan(trials: u64) -> Plan {
        Plan {
            steps: vec![Step {
                trial_count: trials,
                d_index: 0,
                index_range: IndexRange::WholeGene(0),
                trial_conditions: None,
                mode: MutationConditionMode::Exhaustive,
                mutations: vec![],
            }],
            global_trial_conditions: Some(TrialConditions::default()),
            termination: TerminationConditions::default(),
            cost_model: CostModel::default(),
            status_rate: 0,
            performance_precision: 1e-6,
        }
    }

    #[test]
    fn unconditioned_attempts_always_accept() {
        let mut genome = alive_genome();
        let mut executor = Executor::new(&mut genome, FixedPrng);
        let reason = executor.run(&trivial_plan(3), |_, _| false).unwrap();
        assert_eq!(reason, TerminationReason::TrialLimit);
        assert_eq!(genome_trials(&executor), 3);
    }

    fn genome_trials<P: Prng>(executor: &Executor<'_, P>) -> u64 {
        executor.genome.statistics.trials
    }

    #[test]
    fn status_callback_can_end_the_run_early() {
        let mut genome = alive_genome();
        let mut plan = trivial_plan(10);
        plan.status_rate = 1;
        let mut executor = Executor::new(&mut genome, FixedPrng);
        let reason = executor.run(&plan, |_, trial| trial >= 2).unwrap();
        assert_eq!(reason, TerminationReason::Callback);
        assert_eq!(genome_trials(&executor), 2);
    }

    #[test]
    fn exhaustive_attempt_on_a_real_gene_picks_a_legal_base_change() {
        let bases: Vec<Base> = "ATGTCTGCGTAA".chars().map(|c| Base::try_from(c).unwrap()).collect();
        let gene = crate::gene::Gene::new(crate::geometry::Range::new(0, bases.len() - 1), crate::geometry::Point::ORIGIN);
        let han = crate::han::HanRef {
            unicode: '一',
            length: 1.0,
            bounds: crate::geometry::Rectangle { top_left: crate::geometry::Point::new(0.0, 1.0), bottom_right: crate::geometry::Point::new(1.0, 0.0) },
            minimum_stroke_length: 0.1,
            groups: vec![],
            strokes: vec![],
            overlaps: vec![],
        };
        let mut genome = Genome::new("g1", "tester", 1);
        genome.load(bases, vec![gene], vec![han], CodonTable::standard()).unwrap();

        let mut plan = trivial_plan(1);
        plan.steps[0].index_range = IndexRange::WholeGene(0);
        let mut executor = Executor::new(&mut genome, FixedPrng);
        let reason = executor.run(&plan, |_, _| false).unwrap();
        assert_eq!(reason, TerminationReason::TrialLimit);
    }

    #[test]
    fn a_maximum_fitness_bound_alone_terminates_the_run() {
        // Only `max_fitness` is set (no `min_fitness`); an empty genome's
        // fitness is always 0.0, which is already above the bound, so the
        // very first accepted trial must end the plan (spec §4.7 "minimum
        // and/or maximum").
        let mut genome = alive_genome();
        let mut plan = trivial_plan(10);
        plan.termination.max_fitness = Some(-0.1);
        let mut executor = Executor::new(&mut genome, FixedPrng);
        let reason = executor.run(&plan, |_, _| false).unwrap();
        assert_eq!(reason, TerminationReason::FitnessBounds);
        assert_eq!(genome_trials(&executor), 1);
    }

    #[test]
    fn a_minimum_fitness_bound_alone_terminates_the_run() {
        let mut genome = alive_genome();
        let mut plan = trivial_plan(10);
        plan.termination.min_fitness = Some(0.1);
        let mut executor = Executor::new(&mut genome, FixedPrng);
        let reason = executor.run(&plan, |_, _| false).unwrap();
        assert_eq!(reason, TerminationReason::FitnessBounds);
        assert_eq!(genome_trials(&executor), 1);
    }
}
