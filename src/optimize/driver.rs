use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::deadline::Deadline;
use crate::error::OptimizerError;

use super::{
    crowding_distance, fast_nondominated_sort, operators, order_key, Individual, Problem,
};

/// Best fitness must improve by at least this fraction to reset the
/// stagnation counter.
const STAGNATION_TOLERANCE: f64 = 0.01;

/// Consecutive stagnant generations before the run stops early.
const STAGNATION_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct Nsga2Params {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_prob: f64,
    /// Base per-gene mutation probability, annealed by `(1 - g/G)²`.
    pub mutation_prob: f64,
    pub eta_crossover: f64,
    pub eta_mutation: f64,
    pub seed: u64,
}

impl Default for Nsga2Params {
    fn default() -> Self {
        Self {
            population_size: 30,
            generations: 15,
            crossover_prob: 0.9,
            mutation_prob: 0.2,
            eta_crossover: 15.0,
            eta_mutation: 20.0,
            seed: 42,
        }
    }
}

/// Result of an NSGA-II run: the final first front plus the single best
/// individual under the total order.
#[derive(Debug)]
pub struct OptimizerOutcome {
    pub front: Vec<Individual>,
    pub best: Individual,
    pub generations_run: usize,
    /// True when the deadline cut the run short.
    pub partial: bool,
}

/// Evaluate a batch of gene vectors in parallel. `collect` preserves input
/// order, so aggregation is deterministic regardless of scheduling.
fn evaluate_batch<P: Problem>(problem: &P, genes: Vec<Vec<f64>>) -> Vec<Individual> {
    genes
        .into_par_iter()
        .map(|g| {
            let eval = problem.evaluate(&g);
            Individual::new(g, eval)
        })
        .collect()
}

/// Scalar used only for the early-stop test: the objective sum of the best
/// feasible individual, or the smallest violation when none is feasible.
fn best_scalar(pop: &[Individual]) -> f64 {
    pop.iter()
        .filter(|ind| ind.is_feasible())
        .map(|ind| ind.objectives.iter().sum::<f64>())
        .fold(f64::INFINITY, f64::min)
        .min(
            pop.iter()
                .filter(|ind| !ind.is_feasible())
                .map(|ind| ind.violation)
                .fold(f64::INFINITY, f64::min)
                + 1e12, // infeasible scalars sort far behind feasible ones
        )
}

/// Rank + crowd the population and sort it into selection order.
fn rank_population(pop: &mut Vec<Individual>) {
    // Fitness results are ordered by gene hash before ranking so that two
    // runs with the same seed produce identical Pareto fronts.
    pop.sort_by_key(Individual::gene_hash);
    let fronts = fast_nondominated_sort(pop);
    for front in &fronts {
        crowding_distance(pop, front);
    }
    pop.sort_by(order_key);
}

/// Run NSGA-II against `problem`. Returns the final front; stops at the
/// generation budget, on 10 stagnant generations, or at the deadline
/// (marked partial).
pub fn run<P: Problem>(
    problem: &P,
    params: &Nsga2Params,
    deadline: Deadline,
) -> Result<OptimizerOutcome, OptimizerError> {
    let bounds = problem.bounds();
    let mut rng = StdRng::seed_from_u64(params.seed);

    let initial: Vec<Vec<f64>> =
        (0..params.population_size).map(|_| bounds.sample(&mut rng)).collect();
    let mut pop = evaluate_batch(problem, initial);
    rank_population(&mut pop);

    let mut best = best_scalar(&pop);
    let mut stagnant = 0usize;
    let mut partial = false;
    let mut generations_run = 0usize;

    for generation in 0..params.generations {
        if deadline.expired() {
            partial = true;
            break;
        }
        generations_run = generation + 1;

        // Mutation anneals toward zero over the run.
        let progress = generation as f64 / params.generations as f64;
        let mutation_rate = params.mutation_prob * (1.0 - progress).powi(2);

        // Selection, crossover and mutation stay single-threaded; only
        // fitness evaluation fans out.
        let mut offspring_genes = Vec::with_capacity(params.population_size);
        while offspring_genes.len() < params.population_size {
            let a = operators::tournament(&pop, &mut rng);
            let b = operators::tournament(&pop, &mut rng);
            let (mut c1, mut c2) = operators::sbx_crossover(
                &pop[a].genes,
                &pop[b].genes,
                bounds,
                params.eta_crossover,
                params.crossover_prob,
                &mut rng,
            );
            operators::polynomial_mutation(&mut c1, bounds, params.eta_mutation, mutation_rate, &mut rng);
            operators::polynomial_mutation(&mut c2, bounds, params.eta_mutation, mutation_rate, &mut rng);
            bounds.clamp(&mut c1);
            bounds.clamp(&mut c2);
            offspring_genes.push(c1);
            if offspring_genes.len() < params.population_size {
                offspring_genes.push(c2);
            }
        }

        let offspring = evaluate_batch(problem, offspring_genes);

        // μ+λ elitism: parents and offspring compete for survival.
        pop.extend(offspring);
        rank_population(&mut pop);
        pop.truncate(params.population_size);

        let current = best_scalar(&pop);
        let improvement = if best.is_finite() && best.abs() > f64::EPSILON {
            (best - current) / best.abs()
        } else {
            1.0
        };
        if improvement < STAGNATION_TOLERANCE {
            stagnant += 1;
        } else {
            stagnant = 0;
        }
        best = best.min(current);

        if generation % 5 == 0 {
            debug!(
                "gen {generation}: best {current:.3} | front size {} | mutation {mutation_rate:.3}",
                pop.iter().filter(|i| i.rank == 0).count(),
            );
        }

        if stagnant >= STAGNATION_LIMIT {
            debug!("early stop at generation {generation}: {STAGNATION_LIMIT} stagnant generations");
            break;
        }
    }

    let front: Vec<Individual> =
        pop.iter().filter(|ind| ind.rank == 0).cloned().collect();
    if front.iter().all(|ind| !ind.is_feasible()) {
        return Err(OptimizerError::NoFeasibleSolution {
            generations: generations_run,
        });
    }
    let best = front
        .iter()
        .filter(|ind| ind.is_feasible())
        .min_by(|a, b| order_key(a, b))
        .cloned()
        .expect("front has at least one feasible individual");

    Ok(OptimizerOutcome { front, best, generations_run, partial })
}
