//! Companion form of a VAR(p) and its stability check.
//!
//! The lag-`p` system
//!
//! ```text
//! y_t = c + A_1 y_{t-1} + ... + A_p y_{t-p} + e_t
//! ```
//!
//! is rewritten as a lag-1 system on the stacked state
//! `s_t = [y_t, y_{t-1}, ..., y_{t-p+1}]` with the `(n·p) × (n·p)` matrix
//!
//! ```text
//! [ A_1  A_2  ...  A_p ]
//! [ I    0    ...  0   ]
//! [ 0    I    ...  0   ]
//! ```
//!
//! The VAR is stable iff every eigenvalue of this matrix lies strictly inside
//! the unit circle.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// One (possibly complex) companion eigenvalue.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Eigenvalue {
    pub re: f64,
    pub im: f64,
}

impl Eigenvalue {
    pub fn modulus(&self) -> f64 {
        self.re.hypot(self.im)
    }
}

/// Build the companion matrix from `Beta` (`n × (1 + n·p)`, intercept first).
pub fn companion_matrix(beta: &DMatrix<f64>, n: usize, p: usize) -> DMatrix<f64> {
    let np = n * p;
    let mut c = DMatrix::zeros(np, np);
    for i in 0..n {
        for k in 0..np {
            c[(i, k)] = beta[(i, 1 + k)];
        }
    }
    for k in n..np {
        c[(k, k - n)] = 1.0;
    }
    c
}

/// Eigenvalues of the companion matrix, sorted by decreasing modulus.
pub fn companion_eigenvalues(beta: &DMatrix<f64>, n: usize, p: usize) -> Vec<Eigenvalue> {
    let c = companion_matrix(beta, n, p);
    let mut out: Vec<Eigenvalue> = c
        .complex_eigenvalues()
        .iter()
        .map(|z| Eigenvalue { re: z.re, im: z.im })
        .collect();
    out.sort_by(|a, b| b.modulus().total_cmp(&a.modulus()));
    out
}

/// Largest eigenvalue modulus (0 for an empty set).
pub fn max_modulus(eigenvalues: &[Eigenvalue]) -> f64 {
    eigenvalues.iter().map(Eigenvalue::modulus).fold(0.0, f64::max)
}

/// `max |λ| < 1`, treating non-finite moduli as unstable.
pub fn is_stable(eigenvalues: &[Eigenvalue]) -> bool {
    let m = max_modulus(eigenvalues);
    m.is_finite() && m < 1.0 && eigenvalues.iter().all(|e| e.modulus().is_finite())
}
