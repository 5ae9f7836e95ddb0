use log::debug;

use crate::deadline::Deadline;
use crate::error::SolverError;

/// Widths are solved in integer centimetres.
const SCALE: f64 = 100.0;

/// Penalty per centimetre of deviation from the target width.
const DEVIATION_PENALTY: i64 = 50;

/// A solved frontage subdivision.
#[derive(Debug, Clone, PartialEq)]
pub struct WidthSolution {
    /// Lot widths in metres; they sum to the frontage exactly (to the cm).
    pub widths: Vec<f64>,
    /// `Σ wᵢ·100 − penalty·Σ|wᵢ − target·100|`, the maximised objective.
    pub objective: i64,
    /// True when the deadline cut the search short.
    pub partial: bool,
}

/// Split a frontage of `length` metres into lots with widths in
/// `[min_width, max_width]` metres, summing to the frontage exactly and
/// deviating as little as possible from `target_width`.
///
/// The search enumerates every feasible lot count and scores the
/// near-equal split for each; since the width sum is pinned by the
/// equality constraint, total deviation per count is bounded below by
/// `|length − count·target|`, which the near-equal split attains. Larger
/// counts win ties so the frontage is cut as finely as the bounds allow.
pub fn solve_widths(
    length: f64,
    min_width: f64,
    max_width: f64,
    target_width: f64,
    deadline: Deadline,
) -> Result<WidthSolution, SolverError> {
    let infeasible = || SolverError::Infeasible {
        frontage: length,
        min_width,
        max_width,
    };
    if length <= 0.0 || min_width <= 0.0 || min_width > max_width {
        return Err(infeasible());
    }

    let length_cm = (length * SCALE).round() as i64;
    let min_cm = (min_width * SCALE).round() as i64;
    let max_cm = (max_width * SCALE).round() as i64;
    let target_cm = (target_width.clamp(min_width, max_width) * SCALE).round() as i64;

    // Feasible lot counts: k·min ≤ length ≤ k·max.
    let k_min = ((length_cm + max_cm - 1) / max_cm).max(1);
    let k_max = length_cm / min_cm;
    if k_max < k_min {
        return Err(infeasible());
    }

    let mut best: Option<(i64, Vec<i64>)> = None;
    let mut partial = false;

    for k in k_min..=k_max {
        if deadline.expired() {
            partial = true;
            break;
        }
        let base = length_cm / k;
        let remainder = (length_cm % k) as usize;
        // `remainder` lots of base+1 cm, the rest of base cm.
        let widths: Vec<i64> = (0..k as usize)
            .map(|i| if i < remainder { base + 1 } else { base })
            .collect();
        if widths.iter().any(|&w| w < min_cm || w > max_cm) {
            continue;
        }
        let deviation: i64 = widths.iter().map(|&w| (w - target_cm).abs()).sum();
        let objective = length_cm - DEVIATION_PENALTY * deviation;

        let better = match &best {
            None => true,
            // Larger k wins ties: cut the frontage as finely as allowed.
            Some((obj, widths_prev)) => {
                objective > *obj || (objective == *obj && widths.len() > widths_prev.len())
            }
        };
        if better {
            best = Some((objective, widths));
        }
    }

    match best {
        Some((objective, widths)) => {
            debug!(
                "frontage {length:.1} m split into {} lots (objective {objective})",
                widths.len()
            );
            Ok(WidthSolution {
                widths: widths.into_iter().map(|w| w as f64 / SCALE).collect(),
                objective,
                partial,
            })
        }
        None if partial => Err(SolverError::Timeout),
        None => Err(infeasible()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_sum_to_the_frontage() {
        let solution = solve_widths(100.0, 10.0, 20.0, 10.0, Deadline::none()).unwrap();
        let total: f64 = solution.widths.iter().sum();
        assert!((total - 100.0).abs() < 1e-9);
        assert!(!solution.partial);
    }

    #[test]
    fn exact_target_division_uses_the_target() {
        let solution = solve_widths(120.0, 20.0, 80.0, 40.0, Deadline::none()).unwrap();
        assert_eq!(solution.widths.len(), 3);
        for w in &solution.widths {
            assert!((w - 40.0).abs() < 1e-9);
        }
    }

    #[test]
    fn widths_stay_within_bounds() {
        let solution = solve_widths(95.0, 20.0, 30.0, 25.0, Deadline::none()).unwrap();
        let total: f64 = solution.widths.iter().sum();
        assert!((total - 95.0).abs() < 0.011);
        for w in &solution.widths {
            assert!(*w >= 20.0 - 1e-9 && *w <= 30.0 + 1e-9, "width {w}");
        }
    }

    #[test]
    fn frontage_below_min_width_is_infeasible() {
        assert!(matches!(
            solve_widths(15.0, 20.0, 80.0, 40.0, Deadline::none()),
            Err(SolverError::Infeasible { .. })
        ));
    }

    #[test]
    fn inverted_bounds_are_infeasible() {
        assert!(solve_widths(100.0, 50.0, 20.0, 30.0, Deadline::none()).is_err());
    }

    #[test]
    fn expired_deadline_times_out() {
        assert!(matches!(
            solve_widths(100.0, 10.0, 20.0, 15.0, Deadline::after_secs(0.0)),
            Err(SolverError::Timeout)
        ));
    }

    #[test]
    fn near_equal_split_beats_lopsided_alternatives() {
        // 7 lots of ~14.29 m deviate less in total than any 6- or 8-lot split.
        let solution = solve_widths(100.0, 10.0, 20.0, 14.0, Deadline::none()).unwrap();
        assert_eq!(solution.widths.len(), 7);
        for w in &solution.widths {
            assert!((w - 100.0 / 7.0).abs() < 0.011, "width {w}");
        }
    }
}
