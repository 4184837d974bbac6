//! Synthetic two-moons data for adaptation experiments
//!
//! The classic interleaved half-circles, recentered on the origin so that a
//! rotation produces a covariate-shifted target domain with the same label
//! structure.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Generate `n` two-moon samples with Gaussian noise.
///
/// Returns (features [n × 2], binary labels [n]); label 0 is the upper
/// moon, label 1 the lower. The x-coordinate is shifted by -0.5 so the
/// figure is centered for rotation.
pub fn two_moons(n: usize, noise_std: f32, rng: &mut impl Rng) -> (Array2<f32>, Array1<f32>) {
    assert!(
        noise_std.is_finite() && noise_std >= 0.0,
        "noise_std must be a non-negative finite value"
    );
    let n_outer = n / 2;
    let n_inner = n - n_outer;
    let noise = Normal::new(0.0f32, noise_std.max(f32::EPSILON))
        .expect("standard deviation is positive and finite");

    let mut x = Array2::zeros((n, 2));
    let mut y = Array1::zeros(n);

    for i in 0..n_outer {
        let t = std::f32::consts::PI * i as f32 / (n_outer.max(2) - 1) as f32;
        x[[i, 0]] = t.cos() + noise.sample(rng);
        x[[i, 1]] = t.sin() + noise.sample(rng);
    }
    for i in 0..n_inner {
        let t = std::f32::consts::PI * i as f32 / (n_inner.max(2) - 1) as f32;
        let row = n_outer + i;
        x[[row, 0]] = 1.0 - t.cos() + noise.sample(rng);
        x[[row, 1]] = 0.5 - t.sin() + noise.sample(rng);
        y[row] = 1.0;
    }

    // Center horizontally so rotations pivot around the origin.
    for i in 0..n {
        x[[i, 0]] -= 0.5;
    }

    (x, y)
}

/// Rotate 2-D points counterclockwise by `degrees` around the origin.
pub fn rotate_2d(x: &Array2<f32>, degrees: f32) -> Array2<f32> {
    assert_eq!(x.ncols(), 2, "rotation is defined for 2-D points");
    let theta = degrees.to_radians();
    let (sin, cos) = theta.sin_cos();

    let mut out = Array2::zeros(x.raw_dim());
    for i in 0..x.nrows() {
        let (px, py) = (x[[i, 0]], x[[i, 1]]);
        out[[i, 0]] = cos * px - sin * py;
        out[[i, 1]] = sin * px + cos * py;
    }
    out
}
