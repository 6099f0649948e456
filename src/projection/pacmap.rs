//! Pair-based neighbor-graph projection (PaCMAP-style).
//!
//! Three pair sets drive the layout: near pairs (local structure), mid-near
//! pairs (global structure early on) and further pairs (repulsion). The
//! embedding starts from scaled PCA scores and is optimised with Adam under a
//! three-phase weight schedule. All sampling uses a seeded RNG.

use anyhow::{ensure, Result};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::pca::pca_scores;
use super::Projector;
use crate::config::ProjectionConfig;

/// Extra candidates examined when choosing near pairs by scaled distance.
const EXTRA_CANDIDATES: usize = 50;
const MID_NEAR_SAMPLES: usize = 6;
const PHASE_ONE_ITERS: usize = 100;
const PHASE_TWO_ITERS: usize = 200;
const W_MN_INIT: f32 = 1000.0;
const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const ADAM_EPS: f32 = 1e-7;

pub struct PacmapProjector {
    config: ProjectionConfig,
}

#[derive(Debug, Default)]
struct PairSet {
    near: Vec<(usize, usize)>,
    mid_near: Vec<(usize, usize)>,
    further: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PhaseWeights {
    near: f32,
    mid_near: f32,
    further: f32,
}

impl PacmapProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Near-neighbour count for a corpus of `n` items.
    pub fn n_neighbors(&self, n: usize) -> usize {
        self.config.n_neighbors.unwrap_or_else(|| auto_neighbors(n))
    }
}

impl Default for PacmapProjector {
    fn default() -> Self {
        Self::new(ProjectionConfig::default())
    }
}

/// 10 up to 10 000 points, growing logarithmically beyond.
pub fn auto_neighbors(n: usize) -> usize {
    if n <= 10_000 {
        10
    } else {
        (10.0 + 15.0 * ((n as f64).log10() - 4.0)).round() as usize
    }
}

impl Projector for PacmapProjector {
    fn min_samples(&self, n: usize) -> usize {
        self.n_neighbors(n) + 1
    }

    fn fit_transform(&self, data: &[&[f32]], target_dims: usize) -> Result<Vec<Vec<f32>>> {
        let n = data.len();
        ensure!(n >= 2, "need at least two input vectors, got {n}");
        let dim = data[0].len();
        ensure!(dim > 0, "input vectors are empty");
        ensure!(
            data.iter().all(|row| row.len() == dim),
            "input vectors have mixed dimensions"
        );
        let n_neighbors = self.n_neighbors(n);
        ensure!(
            n > n_neighbors,
            "{n} points is too few for {n_neighbors} neighbours"
        );

        let flat: Vec<f32> = data.iter().flat_map(|row| row.iter().copied()).collect();
        let x = Array2::from_shape_vec((n, dim), flat)?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let n_mid_near = (n_neighbors as f32 * self.config.mn_ratio).round() as usize;
        let n_further = (n_neighbors as f32 * self.config.fp_ratio).round() as usize;

        tracing::info!(
            points = n,
            dim,
            target_dims,
            n_neighbors,
            n_mid_near,
            n_further,
            "projecting corpus"
        );

        let pairs = sample_pairs(&x, n_neighbors, n_mid_near, n_further, &mut rng);
        let mut y = initial_layout(&x, target_dims, &mut rng);
        optimize(&mut y, &pairs, self.config.num_iters, self.config.learning_rate);

        ensure!(
            y.iter().all(|v| v.is_finite()),
            "projection diverged (non-finite coordinates)"
        );
        tracing::info!(points = n, "projection complete");

        Ok(y.outer_iter().map(|row| row.to_vec()).collect())
    }
}

fn squared_distance(x: &Array2<f32>, i: usize, j: usize) -> f32 {
    x.row(i)
        .iter()
        .zip(x.row(j).iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}

/// The `k` nearest other points of `i`, as (euclidean distance, index), ascending.
fn nearest(x: &Array2<f32>, i: usize, k: usize) -> Vec<(f32, usize)> {
    let mut candidates: Vec<(f32, usize)> = (0..x.nrows())
        .filter(|&j| j != i)
        .map(|j| (squared_distance(x, i, j).sqrt(), j))
        .collect();
    let k = k.min(candidates.len());
    if k < candidates.len() {
        candidates.select_nth_unstable_by(k, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(k);
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    candidates
}

/// Local scale: mean distance to the 4th-6th nearest neighbours.
fn local_scale(neighbors: &[(f32, usize)]) -> f32 {
    let upper = neighbors.len().min(6);
    let lower = 3.min(upper.saturating_sub(1));
    let slice = &neighbors[lower..upper];
    let sigma = if slice.is_empty() {
        0.0
    } else {
        slice.iter().map(|(d, _)| d).sum::<f32>() / slice.len() as f32
    };
    sigma.max(1e-10)
}

fn sample_pairs(
    x: &Array2<f32>,
    n_neighbors: usize,
    n_mid_near: usize,
    n_further: usize,
    rng: &mut StdRng,
) -> PairSet {
    let n = x.nrows();
    let mut pairs = PairSet::default();

    let candidates: Vec<Vec<(f32, usize)>> = (0..n)
        .map(|i| nearest(x, i, n_neighbors + EXTRA_CANDIDATES))
        .collect();
    let sigma: Vec<f32> = candidates.iter().map(|c| local_scale(c)).collect();

    let mut neighbor_sets: Vec<Vec<usize>> = Vec::with_capacity(n);
    for (i, cands) in candidates.iter().enumerate() {
        let mut scaled: Vec<(f32, usize)> = cands
            .iter()
            .map(|&(d, j)| (d * d / (sigma[i] * sigma[j]), j))
            .collect();
        scaled.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        let chosen: Vec<usize> = scaled.iter().take(n_neighbors).map(|&(_, j)| j).collect();
        pairs.near.extend(chosen.iter().map(|&j| (i, j)));
        neighbor_sets.push(chosen);
    }

    for i in 0..n {
        for _ in 0..n_mid_near {
            let mut sampled: Vec<(f32, usize)> = (0..MID_NEAR_SAMPLES)
                .map(|_| {
                    let j = random_other(rng, n, i);
                    (squared_distance(x, i, j), j)
                })
                .collect();
            sampled.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            pairs.mid_near.push((i, sampled[1].1));
        }
    }

    for (i, neighbors) in neighbor_sets.iter().enumerate() {
        let available = n - 1 - neighbors.len();
        let wanted = n_further.min(available);
        let mut picked: Vec<usize> = Vec::with_capacity(wanted);
        while picked.len() < wanted {
            let j = random_other(rng, n, i);
            if !neighbors.contains(&j) && !picked.contains(&j) {
                picked.push(j);
            }
        }
        pairs.further.extend(picked.into_iter().map(|j| (i, j)));
    }

    tracing::debug!(
        near = pairs.near.len(),
        mid_near = pairs.mid_near.len(),
        further = pairs.further.len(),
        "pairs sampled"
    );
    pairs
}

/// Uniform index in `0..n` other than `i`. Requires `n >= 2`.
fn random_other(rng: &mut StdRng, n: usize, i: usize) -> usize {
    let j = rng.random_range(0..n - 1);
    if j >= i { j + 1 } else { j }
}

/// PCA scores scaled so the first column has standard deviation 0.01.
fn initial_layout(x: &Array2<f32>, target_dims: usize, rng: &mut StdRng) -> Array2<f32> {
    let mut y = pca_scores(x, target_dims, rng);
    let spread = y.column(0).std(0.0);
    if spread > f32::EPSILON {
        let scale = 0.01 / spread;
        y.mapv_inplace(|v| v * scale);
    } else {
        // Degenerate input: start from a tiny random cloud instead.
        y.mapv_inplace(|_| rng.random_range(-1e-4f32..1e-4));
    }
    y
}

fn phase_weights(iter: usize) -> PhaseWeights {
    if iter < PHASE_ONE_ITERS {
        let t = iter as f32 / PHASE_ONE_ITERS as f32;
        PhaseWeights {
            near: 2.0,
            mid_near: (1.0 - t) * W_MN_INIT + t * 3.0,
            further: 1.0,
        }
    } else if iter < PHASE_TWO_ITERS {
        PhaseWeights {
            near: 3.0,
            mid_near: 3.0,
            further: 1.0,
        }
    } else {
        PhaseWeights {
            near: 1.0,
            mid_near: 0.0,
            further: 1.0,
        }
    }
}

/// Loss gradient for the current layout, same shape as `y`.
fn gradient(y: &Array2<f32>, pairs: &PairSet, w: PhaseWeights) -> Array2<f32> {
    let dims = y.ncols();
    let mut grad = Array2::<f32>::zeros(y.raw_dim());
    let mut diff = vec![0.0f32; dims];

    let mut apply = |i: usize, j: usize, coeff: &dyn Fn(f32) -> f32, attract: bool| {
        let mut d_ij = 1.0f32;
        for (k, slot) in diff.iter_mut().enumerate() {
            *slot = y[[i, k]] - y[[j, k]];
            d_ij += *slot * *slot;
        }
        let c = coeff(d_ij);
        let sign = if attract { 1.0 } else { -1.0 };
        for (k, &delta) in diff.iter().enumerate() {
            grad[[i, k]] += sign * c * delta;
            grad[[j, k]] -= sign * c * delta;
        }
    };

    if w.near > 0.0 {
        for &(i, j) in &pairs.near {
            apply(i, j, &|d| w.near * 20.0 / ((10.0 + d) * (10.0 + d)), true);
        }
    }
    if w.mid_near > 0.0 {
        for &(i, j) in &pairs.mid_near {
            apply(i, j, &|d| w.mid_near * 20_000.0 / ((10_000.0 + d) * (10_000.0 + d)), true);
        }
    }
    if w.further > 0.0 {
        for &(i, j) in &pairs.further {
            apply(i, j, &|d| w.further * 2.0 / ((1.0 + d) * (1.0 + d)), false);
        }
    }
    grad
}

fn optimize(y: &mut Array2<f32>, pairs: &PairSet, num_iters: usize, learning_rate: f32) {
    let mut m = Array2::<f32>::zeros(y.raw_dim());
    let mut v = Array2::<f32>::zeros(y.raw_dim());

    for iter in 0..num_iters {
        let grad = gradient(y, pairs, phase_weights(iter));
        let step = (iter + 1) as i32;
        let lr_t = learning_rate * (1.0 - BETA2.powi(step)).sqrt() / (1.0 - BETA1.powi(step));

        ndarray::Zip::from(&mut *y)
            .and(&mut m)
            .and(&mut v)
            .and(&grad)
            .for_each(|y, m, v, &g| {
                *m += (1.0 - BETA1) * (g - *m);
                *v += (1.0 - BETA2) * (g * g - *v);
                *y -= lr_t * *m / (v.sqrt() + ADAM_EPS);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two well separated clusters of `per` points each in 8 dimensions.
    fn two_clusters(per: usize) -> Vec<Vec<f32>> {
        let mut rng = StdRng::seed_from_u64(3);
        let mut out = Vec::new();
        for c in 0..2 {
            for _ in 0..per {
                let mut v = vec![0.0f32; 8];
                for (k, x) in v.iter_mut().enumerate() {
                    let center = if k == c { 10.0 } else { 0.0 };
                    *x = center + rng.random_range(-0.5f32..0.5);
                }
                out.push(v);
            }
        }
        out
    }

    fn small_config() -> ProjectionConfig {
        ProjectionConfig {
            n_neighbors: Some(5),
            num_iters: 250,
            ..Default::default()
        }
    }

    fn centroid(points: &[Vec<f32>]) -> Vec<f32> {
        let dims = points[0].len();
        (0..dims)
            .map(|k| points.iter().map(|p| p[k]).sum::<f32>() / points.len() as f32)
            .collect()
    }

    fn dist(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    }

    #[test]
    fn auto_neighbor_count() {
        assert_eq!(auto_neighbors(50), 10);
        assert_eq!(auto_neighbors(10_000), 10);
        assert_eq!(auto_neighbors(100_000), 25);
        let projector = PacmapProjector::default();
        assert_eq!(projector.min_samples(100), 11);
    }

    #[test]
    fn output_shape_matches_input() {
        let data = two_clusters(10);
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        let projector = PacmapProjector::new(small_config());
        for dims in [2, 3] {
            let out = projector.fit_transform(&refs, dims).unwrap();
            assert_eq!(out.len(), 20);
            assert!(out.iter().all(|p| p.len() == dims));
        }
    }

    #[test]
    fn deterministic_for_same_seed() {
        let data = two_clusters(8);
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        let a = PacmapProjector::new(small_config()).fit_transform(&refs, 2).unwrap();
        let b = PacmapProjector::new(small_config()).fit_transform(&refs, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn clusters_stay_separated() {
        let data = two_clusters(12);
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        let out = PacmapProjector::new(small_config()).fit_transform(&refs, 2).unwrap();

        let (first, second) = out.split_at(12);
        let c1 = centroid(first);
        let c2 = centroid(second);
        let between = dist(&c1, &c2);
        let within = first
            .iter()
            .map(|p| dist(p, &c1))
            .chain(second.iter().map(|p| dist(p, &c2)))
            .sum::<f32>()
            / out.len() as f32;
        assert!(
            between > within,
            "clusters overlap: between {between}, mean within {within}"
        );
    }

    #[test]
    fn rejects_too_few_points() {
        let data = two_clusters(2);
        let refs: Vec<&[f32]> = data.iter().map(Vec::as_slice).collect();
        assert!(PacmapProjector::new(small_config())
            .fit_transform(&refs, 2)
            .is_err());
    }

    #[test]
    fn near_pairs_prefer_same_cluster() {
        let data = two_clusters(10);
        let flat: Vec<f32> = data.iter().flatten().copied().collect();
        let x = Array2::from_shape_vec((20, 8), flat).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let pairs = sample_pairs(&x, 5, 3, 10, &mut rng);
        assert_eq!(pairs.near.len(), 20 * 5);
        assert_eq!(pairs.mid_near.len(), 20 * 3);
        assert_eq!(pairs.further.len(), 20 * 10);
        assert!(pairs.near.iter().all(|&(i, j)| (i < 10) == (j < 10)));
        assert!(pairs.further.iter().all(|&(i, j)| i != j));
    }

    #[test]
    fn weight_schedule_phases() {
        assert_eq!(phase_weights(0).mid_near, 1000.0);
        assert!((phase_weights(50).mid_near - 501.5).abs() < 1e-3);
        assert_eq!(phase_weights(150).near, 3.0);
        assert_eq!(phase_weights(300).mid_near, 0.0);
    }
}
