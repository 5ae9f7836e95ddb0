use std::cmp::Ordering;

use super::Individual;

/// Constraint-domination (Deb): a feasible solution dominates any
/// infeasible one; between two infeasibles the smaller total violation
/// dominates; between two feasibles, ordinary Pareto dominance applies.
pub fn dominates(a: &Individual, b: &Individual) -> bool {
    match (a.is_feasible(), b.is_feasible()) {
        (true, false) => true,
        (false, true) => false,
        (false, false) => a.violation < b.violation,
        (true, true) => {
            let mut strictly_better = false;
            for (x, y) in a.objectives.iter().zip(&b.objectives) {
                if x > y {
                    return false;
                }
                if x < y {
                    strictly_better = true;
                }
            }
            strictly_better
        }
    }
}

/// Fast non-dominated sort. Assigns `rank` on every individual and returns
/// the fronts as index lists, best front first.
pub fn fast_nondominated_sort(pop: &mut [Individual]) -> Vec<Vec<usize>> {
    let n = pop.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];
    let mut fronts: Vec<Vec<usize>> = vec![Vec::new()];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&pop[i], &pop[j]) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&pop[j], &pop[i]) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
        if domination_count[i] == 0 {
            pop[i].rank = 0;
            fronts[0].push(i);
        }
    }

    let mut current = 0;
    while !fronts[current].is_empty() {
        let mut next = Vec::new();
        for &i in &fronts[current] {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    pop[j].rank = current + 1;
                    next.push(j);
                }
            }
        }
        current += 1;
        fronts.push(next);
    }
    fronts.pop(); // trailing empty front
    fronts
}

/// Crowding distance within one front, written onto the individuals.
/// Boundary solutions get infinite distance.
pub fn crowding_distance(pop: &mut [Individual], front: &[usize]) {
    for &i in front {
        pop[i].crowding = 0.0;
    }
    if front.len() <= 2 {
        for &i in front {
            pop[i].crowding = f64::INFINITY;
        }
        return;
    }
    let num_objectives = pop[front[0]].objectives.len();
    let mut order: Vec<usize> = front.to_vec();

    for m in 0..num_objectives {
        order.sort_by(|&a, &b| {
            pop[a].objectives[m]
                .partial_cmp(&pop[b].objectives[m])
                .unwrap_or(Ordering::Equal)
        });
        let min = pop[order[0]].objectives[m];
        let max = pop[*order.last().unwrap()].objectives[m];
        let span = max - min;
        pop[order[0]].crowding = f64::INFINITY;
        pop[*order.last().unwrap()].crowding = f64::INFINITY;
        if span <= f64::EPSILON {
            continue;
        }
        for w in order.windows(3) {
            let (prev, mid, next) = (w[0], w[1], w[2]);
            if pop[mid].crowding.is_finite() {
                pop[mid].crowding +=
                    (pop[next].objectives[m] - pop[prev].objectives[m]) / span;
            }
        }
    }
}

/// Total order used for tournament selection and elitist truncation:
/// lower rank first, larger crowding next, gene hash as the stable
/// tie-break so replays are deterministic.
pub fn order_key(a: &Individual, b: &Individual) -> Ordering {
    a.rank
        .cmp(&b.rank)
        .then_with(|| {
            b.crowding
                .partial_cmp(&a.crowding)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.gene_hash().cmp(&b.gene_hash()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimize::Evaluation;

    fn ind(objectives: Vec<f64>, violation: f64) -> Individual {
        Individual::new(vec![0.0], Evaluation { objectives, violation })
    }

    #[test]
    fn pareto_dominance_requires_strict_improvement() {
        let a = ind(vec![1.0, 1.0], 0.0);
        let b = ind(vec![1.0, 2.0], 0.0);
        let c = ind(vec![1.0, 1.0], 0.0);
        assert!(dominates(&a, &b));
        assert!(!dominates(&b, &a));
        assert!(!dominates(&a, &c));
    }

    #[test]
    fn feasible_dominates_infeasible_regardless_of_objectives() {
        let feasible = ind(vec![100.0], 0.0);
        let infeasible = ind(vec![0.0], 5.0);
        assert!(dominates(&feasible, &infeasible));
        assert!(!dominates(&infeasible, &feasible));
    }

    #[test]
    fn smaller_violation_dominates_between_infeasibles() {
        let better = ind(vec![0.0], 1.0);
        let worse = ind(vec![0.0], 2.0);
        assert!(dominates(&better, &worse));
    }

    #[test]
    fn sort_layers_fronts() {
        let mut pop = vec![
            ind(vec![0.0, 0.0], 0.0),
            ind(vec![1.0, 1.0], 0.0),
            ind(vec![2.0, 2.0], 0.0),
            ind(vec![0.0, 3.0], 0.0),
        ];
        let fronts = fast_nondominated_sort(&mut pop);
        // (0,0) dominates everything; (1,1) and (0,3) are mutually
        // non-dominated; (2,2) sits behind (1,1).
        assert_eq!(fronts[0], vec![0]);
        assert_eq!(pop[1].rank, 1);
        assert_eq!(pop[3].rank, 1);
        assert_eq!(pop[2].rank, 2);
    }

    #[test]
    fn crowding_favours_boundary_points() {
        let mut pop = vec![
            ind(vec![0.0, 4.0], 0.0),
            ind(vec![1.0, 2.0], 0.0),
            ind(vec![2.0, 1.5], 0.0),
            ind(vec![4.0, 0.0], 0.0),
        ];
        let front: Vec<usize> = (0..pop.len()).collect();
        crowding_distance(&mut pop, &front);
        assert!(pop[0].crowding.is_infinite());
        assert!(pop[3].crowding.is_infinite());
        assert!(pop[1].crowding.is_finite() && pop[1].crowding > 0.0);
    }
}
