//! Small dense linear algebra for the curation solver.
//!
//! Matrices are stored row-major in a flat `Vec<f64>`; element (i, j) lives at
//! `i * dim + j`. Only what Newton's method needs is here: accumulating a
//! symmetric matrix and solving `A x = b` through a Cholesky factorization.

/// Linear algebra failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinalgError {
    /// Matrix is not positive definite (Cholesky failed)
    NotPositiveDefinite,
    /// Matrix and vector sizes disagree
    DimensionMismatch,
}

impl std::fmt::Display for LinalgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinalgError::NotPositiveDefinite => write!(f, "Matrix is not positive definite"),
            LinalgError::DimensionMismatch => write!(f, "Matrix dimensions are incompatible"),
        }
    }
}

impl std::error::Error for LinalgError {}

/// A square matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SquareMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; dim * dim],
        }
    }

    pub fn identity(dim: usize) -> Self {
        let mut m = Self::zeros(dim);
        m.add_diagonal(1.0);
        m
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.dim + j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.dim + j] = value;
    }

    #[inline]
    pub fn add_at(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.dim + j] += value;
    }

    /// Add `lambda` to every diagonal element.
    pub fn add_diagonal(&mut self, lambda: f64) {
        for i in 0..self.dim {
            self.add_at(i, i, lambda);
        }
    }

    /// Add `weight * v v^T`.
    pub fn add_outer(&mut self, v: &[f64], weight: f64) {
        debug_assert_eq!(v.len(), self.dim);
        for i in 0..self.dim {
            let wi = weight * v[i];
            if wi == 0.0 {
                continue;
            }
            for j in 0..self.dim {
                self.add_at(i, j, wi * v[j]);
            }
        }
    }

    /// Lower triangular L such that A = L L^T.
    pub fn cholesky(&self) -> Result<Self, LinalgError> {
        let n = self.dim;
        let mut l = Self::zeros(n);

        for j in 0..n {
            for i in j..n {
                let mut sum = self.get(i, j);
                for k in 0..j {
                    sum -= l.get(i, k) * l.get(j, k);
                }

                if i == j {
                    if sum <= 0.0 || !sum.is_finite() {
                        return Err(LinalgError::NotPositiveDefinite);
                    }
                    l.set(i, j, sum.sqrt());
                } else {
                    let l_jj = l.get(j, j);
                    if l_jj.abs() < 1e-15 {
                        return Err(LinalgError::NotPositiveDefinite);
                    }
                    l.set(i, j, sum / l_jj);
                }
            }
        }

        Ok(l)
    }

    /// Solve A x = b for symmetric positive definite A.
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
        if b.len() != self.dim {
            return Err(LinalgError::DimensionMismatch);
        }
        let l = self.cholesky()?;
        let n = self.dim;

        // L y = b
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[i];
            for j in 0..i {
                sum -= l.get(i, j) * y[j];
            }
            y[i] = sum / l.get(i, i);
        }

        // L^T x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = y[i];
            for j in (i + 1)..n {
                sum -= l.get(j, i) * x[j];
            }
            x[i] = sum / l.get(i, i);
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_solve() {
        let m = SquareMatrix::identity(3);
        let x = m.solve(&[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_spd_solve() {
        // [[4, 2], [2, 3]] x = [2, 1] -> x = [0.5, 0]
        let mut m = SquareMatrix::zeros(2);
        m.set(0, 0, 4.0);
        m.set(0, 1, 2.0);
        m.set(1, 0, 2.0);
        m.set(1, 1, 3.0);

        let x = m.solve(&[2.0, 1.0]).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_outer_product_accumulation() {
        let mut m = SquareMatrix::zeros(2);
        m.add_outer(&[1.0, 2.0], 0.5);
        assert_eq!(m.get(0, 0), 0.5);
        assert_eq!(m.get(0, 1), 1.0);
        assert_eq!(m.get(1, 1), 2.0);
    }

    #[test]
    fn test_not_positive_definite() {
        let m = SquareMatrix::zeros(2);
        assert_eq!(m.cholesky(), Err(LinalgError::NotPositiveDefinite));
        assert_eq!(
            SquareMatrix::identity(2).solve(&[1.0]),
            Err(LinalgError::DimensionMismatch)
        );
    }
}
