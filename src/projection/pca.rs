//! Principal component scores via deflated power iteration.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;

const POWER_ITERS: usize = 200;
const TOLERANCE: f32 = 1e-6;

/// Scores of the centered `data` on its top `k` principal components.
///
/// Columns beyond the data's rank (or beyond its column count) are zero.
pub fn pca_scores(data: &Array2<f32>, k: usize, rng: &mut StdRng) -> Array2<f32> {
    let (n, d) = data.dim();
    let mut scores = Array2::<f32>::zeros((n, k));
    if n == 0 || d == 0 {
        return scores;
    }

    let mean = data
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(d));
    let centered = data - &mean;

    let mut components: Vec<Array1<f32>> = Vec::with_capacity(k);
    for _ in 0..k.min(d) {
        let mut v = Array1::from_shape_fn(d, |_| rng.random_range(-1.0f32..1.0));
        orthogonalize(&mut v, &components);
        if !normalize(&mut v) {
            break;
        }

        for _ in 0..POWER_ITERS {
            let xv = centered.dot(&v);
            let mut next = centered.t().dot(&xv);
            orthogonalize(&mut next, &components);
            if !normalize(&mut next) {
                // No variance left outside the found components.
                break;
            }
            let delta: f32 = (&next - &v).mapv(f32::abs).sum();
            v = next;
            if delta < TOLERANCE {
                break;
            }
        }

        // Fix the sign so the largest loading is positive.
        let pivot = v
            .iter()
            .copied()
            .fold(0.0f32, |acc, x| if x.abs() > acc.abs() { x } else { acc });
        if pivot < 0.0 {
            v.mapv_inplace(|x| -x);
        }
        components.push(v);
    }

    for (j, component) in components.iter().enumerate() {
        scores.column_mut(j).assign(&centered.dot(component));
    }
    scores
}

fn orthogonalize(v: &mut Array1<f32>, basis: &[Array1<f32>]) {
    for b in basis {
        let proj = v.dot(b);
        v.scaled_add(-proj, b);
    }
}

/// Scale to unit length. Returns false for a (near) zero vector.
fn normalize(v: &mut Array1<f32>) -> bool {
    let norm = v.dot(v).sqrt();
    if norm <= f32::EPSILON {
        return false;
    }
    v.mapv_inplace(|x| x / norm);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn first_component_follows_dominant_axis() {
        // Points spread along x, tiny jitter along y.
        let rows: Vec<f32> = (0..20)
            .flat_map(|i| {
                let x = i as f32 - 10.0;
                let y = if i % 2 == 0 { 0.01 } else { -0.01 };
                [x, y, 5.0]
            })
            .collect();
        let data = Array2::from_shape_vec((20, 3), rows).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let scores = pca_scores(&data, 2, &mut rng);

        assert_eq!(scores.dim(), (20, 2));
        let first = scores.column(0);
        // Scores along the dominant axis reproduce the centered x values (up to sign).
        assert!((first[0].abs() - 10.0).abs() < 1e-3);
        assert!(first.std(0.0) > scores.column(1).std(0.0));
    }

    #[test]
    fn constant_data_gives_zero_scores() {
        let data = Array2::from_elem((5, 4), 3.0f32);
        let mut rng = StdRng::seed_from_u64(1);
        let scores = pca_scores(&data, 2, &mut rng);
        assert!(scores.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn more_components_than_columns_pads_with_zeros() {
        let data = Array2::from_shape_vec((3, 1), vec![1.0f32, 2.0, 3.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(9);
        let scores = pca_scores(&data, 3, &mut rng);
        assert_eq!(scores.dim(), (3, 3));
        assert!(scores.column(1).iter().all(|&x| x == 0.0));
        assert!(scores.column(2).iter().all(|&x| x == 0.0));
    }
}
