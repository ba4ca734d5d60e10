//! Symmetric-matrix helpers shared by the estimators and the simulator.
//!
//! Covariance matrices and normal-equation systems in this crate are tiny
//! (a handful of rows), so everything goes through a full symmetric
//! eigen-decomposition: it gives condition numbers, PSD repair and matrix
//! square roots from one factorization.

use nalgebra::DMatrix;

/// Condition number above which a normal-equation system gets ridge jitter.
pub const CONDITION_LIMIT: f64 = 1e10;

/// Relative eigenvalue below which a covariance matrix counts as singular.
pub const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Number of ×10 jitter escalations tried before giving up.
const MAX_JITTER_STEPS: usize = 14;

/// Starting jitter, relative to the mean diagonal.
const BASE_JITTER: f64 = 1e-10;

/// `(M + M') / 2`.
pub fn symmetrize(m: &DMatrix<f64>) -> DMatrix<f64> {
    (m + m.transpose()) * 0.5
}

/// Eigenvalue extremes `(min, max)` of a symmetric matrix.
pub fn eigen_range(m: &DMatrix<f64>) -> (f64, f64) {
    let eig = symmetrize(m).symmetric_eigen();
    let min = eig.eigenvalues.iter().copied().fold(f64::INFINITY, f64::min);
    let max = eig.eigenvalues.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

/// Spectral condition number of a symmetric matrix (`inf` when not PD).
pub fn condition_number(m: &DMatrix<f64>) -> f64 {
    let (min, max) = eigen_range(m);
    if !(min > 0.0 && max.is_finite()) {
        return f64::INFINITY;
    }
    max / min
}

/// True when the smallest eigenvalue is negligible next to the largest.
pub fn is_singular(m: &DMatrix<f64>) -> bool {
    if m.nrows() == 0 {
        return true;
    }
    let (min, max) = eigen_range(m);
    !(max > 0.0) || min <= SINGULAR_TOLERANCE * max
}

/// Solution of `A X = B` plus the ridge jitter that was needed.
#[derive(Debug, Clone)]
pub struct SpdSolve {
    pub solution: DMatrix<f64>,
    /// Amount added to the diagonal of `A` (0 when the raw system was fine).
    pub jitter: f64,
}

/// Solve `A X = B` for symmetric `A`, adding diagonal jitter while `A` is
/// ill-conditioned or fails to factorize.
pub fn solve_spd_adaptive(a: &DMatrix<f64>, b: &DMatrix<f64>) -> Option<SpdSolve> {
    let a = symmetrize(a);
    let n = a.nrows();
    if n == 0 || b.nrows() != n {
        return None;
    }
    let scale = (a.trace() / n as f64).abs().max(f64::MIN_POSITIVE);

    let mut jitter = 0.0;
    for step in 0..=MAX_JITTER_STEPS {
        let mut work = a.clone();
        for i in 0..n {
            work[(i, i)] += jitter;
        }
        if condition_number(&work) <= CONDITION_LIMIT {
            if let Some(chol) = work.cholesky() {
                let solution = chol.solve(b);
                if solution.iter().all(|v| v.is_finite()) {
                    return Some(SpdSolve { solution, jitter });
                }
            }
        }
        jitter = scale * BASE_JITTER * 10f64.powi(step as i32);
    }

    None
}

/// Clamp the eigenvalues of a symmetric matrix to at least `floor`.
///
/// Returns the repaired matrix and whether any eigenvalue was materially
/// below the floor (rounding-level negatives do not count).
pub fn floor_eigenvalues(m: &DMatrix<f64>, floor: f64) -> (DMatrix<f64>, bool) {
    let mut eig = symmetrize(m).symmetric_eigen();
    let max_abs = eig.eigenvalues.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = SINGULAR_TOLERANCE * max_abs.max(1.0);

    let mut floored = false;
    for v in eig.eigenvalues.iter_mut() {
        if *v < floor {
            if *v < floor - tolerance {
                floored = true;
            }
            *v = floor;
        }
    }

    (symmetrize(&eig.recompose()), floored)
}

/// A square root `S` with `S S' = M` for a PSD matrix (negative eigenvalues
/// are treated as zero).
pub fn psd_sqrt(m: &DMatrix<f64>) -> DMatrix<f64> {
    let eig = symmetrize(m).symmetric_eigen();
    let mut root = eig.eigenvectors.clone();
    for (j, &lambda) in eig.eigenvalues.iter().enumerate() {
        let s = lambda.max(0.0).sqrt();
        for i in 0..root.nrows() {
            root[(i, j)] *= s;
        }
    }
    root
}
