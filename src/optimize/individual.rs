use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::Rng;

/// Per-gene search bounds.
#[derive(Debug, Clone)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert!(lower.len() == upper.len(), "bound vectors must have equal length");
        debug_assert!(
            lower.iter().zip(&upper).all(|(l, u)| l <= u),
            "each lower bound must not exceed its upper bound"
        );
        Self { lower, upper }
    }

    #[inline] pub fn len(&self) -> usize { self.lower.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.lower.is_empty() }

    /// Clamp a gene vector into the bounds in place.
    pub fn clamp(&self, genes: &mut [f64]) {
        for (gene, (lo, hi)) in genes.iter_mut().zip(self.lower.iter().zip(&self.upper)) {
            *gene = gene.clamp(*lo, *hi);
        }
    }

    /// Sample a uniform random gene vector.
    pub fn sample(&self, rng: &mut StdRng) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(&lo, &hi)| if hi > lo { rng.random_range(lo..hi) } else { lo })
            .collect()
    }
}

/// Objectives plus summed constraint violation for one gene vector.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub objectives: Vec<f64>,
    /// Sum of positive constraint violations; 0 for feasible solutions.
    pub violation: f64,
}

impl Evaluation {
    pub fn feasible(objectives: Vec<f64>) -> Self {
        Self { objectives, violation: 0.0 }
    }
}

/// A member of the NSGA-II population.
#[derive(Debug, Clone)]
pub struct Individual {
    pub genes: Vec<f64>,
    pub objectives: Vec<f64>,
    pub violation: f64,
    pub rank: usize,
    pub crowding: f64,
}

impl Individual {
    pub fn new(genes: Vec<f64>, eval: Evaluation) -> Self {
        Self {
            genes,
            objectives: eval.objectives,
            violation: eval.violation,
            rank: usize::MAX,
            crowding: 0.0,
        }
    }

    #[inline]
    pub fn is_feasible(&self) -> bool {
        self.violation <= 0.0
    }

    /// Stable hash of the gene bit patterns. Used to order identical
    /// (rank, crowding) pairs so replays are byte-identical.
    pub fn gene_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for gene in &self.genes {
            gene.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}
