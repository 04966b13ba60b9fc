//! Confidence-based dataset curation.
//!
//! Every feature column is standardized over the whole table, a logistic
//! model is fitted on the standardized features (`Genuine` is the positive
//! class), and each row is scored by the same model. A row survives only if
//! its probability sits clearly on its own label's side of 0.5:
//!
//! - `Genuine` rows need `p > 0.5 + margin`
//! - `Imposter` rows need `p < 0.5 - margin`
//!
//! The scored rows are the training rows, so this removes samples that are
//! inconsistent with the rest of the corpus rather than estimating
//! generalization. Curating an already curated table refits on fewer rows
//! and may remove more.

use crate::core::label::Label;
use crate::core::linalg::{LinalgError, SquareMatrix};
use crate::dataset::LabeledTable;
use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;
use statrs::statistics::Statistics;

/// Added to the intercept's Hessian entry so a saturated fit stays solvable.
const INTERCEPT_JITTER: f64 = 1e-10;

/// Smallest backtracking step before a Newton step is taken as-is.
const MIN_STEP: f64 = 1e-8;

/// Curation settings. All solver parameters are explicit so a run does not
/// depend on library defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationConfig {
    /// Half-width of the ambiguous band around 0.5
    pub margin: f64,
    /// Iteration cap for the solver
    pub max_iter: usize,
    /// Convergence threshold on the largest gradient component
    pub tolerance: f64,
    /// Inverse L2 regularization strength (larger = weaker penalty)
    pub inverse_regularization: f64,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            margin: 0.25,
            max_iter: 1000,
            tolerance: 1e-4,
            inverse_regularization: 1.0,
        }
    }
}

impl CurationConfig {
    pub fn with_margin(margin: f64) -> Self {
        Self {
            margin,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CurationError> {
        if !(0.0..=0.5).contains(&self.margin) {
            return Err(CurationError::InvalidConfig(format!(
                "margin must be within [0, 0.5], got {}",
                self.margin
            )));
        }
        if self.max_iter == 0 {
            return Err(CurationError::InvalidConfig(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if !(self.tolerance > 0.0) {
            return Err(CurationError::InvalidConfig(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.inverse_regularization > 0.0) {
            return Err(CurationError::InvalidConfig(format!(
                "inverse_regularization must be positive, got {}",
                self.inverse_regularization
            )));
        }
        Ok(())
    }
}

/// Curation failures. Any of these ends the run without output.
#[derive(Debug, Clone, PartialEq)]
pub enum CurationError {
    EmptyTable,
    NoFeatureColumns,
    /// Only one label is present; a classifier cannot be fitted
    SingleClass(Label),
    InvalidConfig(String),
    /// A feature value is NaN or infinite (0-based row and feature index)
    NonFiniteValue { row: usize, feature: usize },
    /// The solver produced a NaN or infinite gradient
    Diverged { iterations: usize },
    Solver(LinalgError),
}

impl std::fmt::Display for CurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CurationError::EmptyTable => write!(f, "Input table has no rows"),
            CurationError::NoFeatureColumns => write!(f, "Input table has no feature columns"),
            CurationError::SingleClass(label) => {
                write!(f, "Input table only contains '{label}' rows")
            }
            CurationError::InvalidConfig(e) => write!(f, "Invalid curation config: {e}"),
            CurationError::NonFiniteValue { row, feature } => {
                write!(f, "Row {row}, feature {feature} is not a finite number")
            }
            CurationError::Diverged { iterations } => {
                write!(f, "Solver diverged after {iterations} iterations")
            }
            CurationError::Solver(e) => write!(f, "Solver error: {e}"),
        }
    }
}

impl std::error::Error for CurationError {}

impl From<LinalgError> for CurationError {
    fn from(e: LinalgError) -> Self {
        CurationError::Solver(e)
    }
}

/// Per-column standardization fitted on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations. Constant columns
    /// get a scale of 1 so they standardize to 0.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let mut means = Vec::with_capacity(width);
        let mut scales = Vec::with_capacity(width);

        for col in 0..width {
            let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            let mean = column.iter().mean();
            let std_dev = column.iter().population_std_dev();

            means.push(mean);
            scales.push(if std_dev.is_finite() && std_dev > 10.0 * f64::EPSILON {
                std_dev
            } else {
                1.0
            });
        }

        Self { means, scales }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.scales))
            .map(|(value, (mean, scale))| (value - mean) / scale)
            .collect()
    }

    pub fn means(&self) -> &[f64] {
        &self.means
    }

    pub fn scales(&self) -> &[f64] {
        &self.scales
    }
}

/// L2-regularized logistic regression fitted by Newton's method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    intercept: f64,
    iterations: usize,
    converged: bool,
}

impl LogisticModel {
    /// Fit on rows `x` against boolean targets `y` (true = positive class).
    ///
    /// Minimizes `C * sum(log-loss) + 0.5 * |w|^2`; the intercept is not
    /// penalized.
    pub fn fit(x: &[Vec<f64>], y: &[bool], config: &CurationConfig) -> Result<Self, CurationError> {
        let n_features = x.first().map_or(0, Vec::len);
        let c = config.inverse_regularization;
        let mut beta = vec![0.0; n_features + 1];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < config.max_iter {
            let (gradient, hessian) = newton_terms(x, y, &beta, c);
            if gradient.iter().any(|g| !g.is_finite()) {
                return Err(CurationError::Diverged { iterations });
            }
            let largest = gradient.iter().fold(0.0_f64, |m, g| m.max(g.abs()));
            if largest <= config.tolerance {
                converged = true;
                break;
            }

            let step = hessian.solve(&gradient)?;
            let current = penalized_loss(x, y, &beta, c);
            let mut t = 1.0;
            let mut candidate = beta.clone();
            loop {
                for (next, (b, s)) in candidate.iter_mut().zip(beta.iter().zip(&step)) {
                    *next = b - t * s;
                }
                if penalized_loss(x, y, &candidate, c) <= current || t < MIN_STEP {
                    break;
                }
                t *= 0.5;
            }

            beta = candidate;
            iterations += 1;
        }

        if !converged {
            tracing::warn!(
                iterations,
                "logistic fit stopped at the iteration cap before converging"
            );
        }

        let intercept = beta.pop().unwrap_or(0.0);
        Ok(Self {
            weights: beta,
            intercept,
            iterations,
            converged,
        })
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        logistic(self.decision(row))
    }

    pub fn decision(&self, row: &[f64]) -> f64 {
        self.weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}

/// Gradient and Hessian of the penalized loss at `beta` (intercept last).
fn newton_terms(x: &[Vec<f64>], y: &[bool], beta: &[f64], c: f64) -> (Vec<f64>, SquareMatrix) {
    let dim = beta.len();
    let n_features = dim - 1;
    let mut gradient = vec![0.0; dim];
    let mut hessian = SquareMatrix::zeros(dim);
    let mut augmented = vec![1.0; dim];

    for (row, &target) in x.iter().zip(y) {
        augmented[..n_features].copy_from_slice(row);
        let p = logistic(dot(&augmented, beta));
        let residual = p - if target { 1.0 } else { 0.0 };

        for (g, v) in gradient.iter_mut().zip(&augmented) {
            *g += c * residual * v;
        }
        hessian.add_outer(&augmented, c * p * (1.0 - p));
    }

    for j in 0..n_features {
        gradient[j] += beta[j];
        hessian.add_at(j, j, 1.0);
    }
    hessian.add_at(n_features, n_features, INTERCEPT_JITTER);

    (gradient, hessian)
}

fn penalized_loss(x: &[Vec<f64>], y: &[bool], beta: &[f64], c: f64) -> f64 {
    let n_features = beta.len() - 1;
    let (weights, intercept) = (&beta[..n_features], beta[n_features]);

    let data_loss: f64 = x
        .iter()
        .zip(y)
        .map(|(row, &target)| {
            let z = dot(row, weights) + intercept;
            softplus(z) - if target { z } else { 0.0 }
        })
        .sum();
    let penalty: f64 = weights.iter().map(|w| w * w).sum::<f64>() * 0.5;

    c * data_loss + penalty
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Whether a row's probability is confidently on its own label's side.
pub fn is_confident(label: Label, probability: f64, margin: f64) -> bool {
    match label {
        Label::Genuine => probability > 0.5 + margin,
        Label::Imposter => probability < 0.5 - margin,
    }
}

/// Outcome of a curation run.
#[derive(Debug, Clone)]
pub struct CurationReport {
    /// Retained rows, unchanged and in input order
    pub curated: LabeledTable,
    /// Positive-class probability of every input row, in input order
    pub probabilities: Vec<f64>,
    pub scaler: StandardScaler,
    pub model: LogisticModel,
    pub original_rows: usize,
}

impl CurationReport {
    pub fn retained_rows(&self) -> usize {
        self.curated.len()
    }

    pub fn removed_rows(&self) -> usize {
        self.original_rows - self.curated.len()
    }

    pub fn summary(&self) -> String {
        let (genuine, imposter) = self.curated.label_counts();
        format!(
            "Curation Summary:\n\
             - Original dataset size: {} rows\n\
             - Curated dataset size: {} rows\n\
             - Removed as ambiguous: {} rows\n\
             - Retained Genuine / Imposter: {} / {}\n\
             - Solver: {} iterations ({})",
            self.original_rows,
            self.retained_rows(),
            self.removed_rows(),
            genuine,
            imposter,
            self.model.iterations(),
            if self.model.converged() {
                "converged"
            } else {
                "iteration cap reached"
            }
        )
    }
}

/// Remove ambiguous rows from a labeled table.
pub fn curate(table: &LabeledTable, config: &CurationConfig) -> Result<CurationReport, CurationError> {
    config.validate()?;

    if table.is_empty() {
        return Err(CurationError::EmptyTable);
    }
    if table.feature_count() == 0 {
        return Err(CurationError::NoFeatureColumns);
    }
    match table.label_counts() {
        (0, _) => return Err(CurationError::SingleClass(Label::Imposter)),
        (_, 0) => return Err(CurationError::SingleClass(Label::Genuine)),
        _ => {}
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        if let Some(feature) = row.features().iter().position(|v| !v.is_finite()) {
            return Err(CurationError::NonFiniteValue {
                row: row_idx,
                feature,
            });
        }
    }

    let raw: Vec<Vec<f64>> = table.rows().iter().map(|r| r.features().to_vec()).collect();
    let scaler = StandardScaler::fit(&raw);
    let x: Vec<Vec<f64>> = raw.iter().map(|row| scaler.transform(row)).collect();
    let y: Vec<bool> = table.rows().iter().map(|r| r.label().is_positive()).collect();

    let model = LogisticModel::fit(&x, &y, config)?;
    let probabilities: Vec<f64> = x.iter().map(|row| model.predict_proba(row)).collect();

    let keep: Vec<usize> = table
        .rows()
        .iter()
        .zip(&probabilities)
        .enumerate()
        .filter(|(_, (row, p))| is_confident(row.label(), **p, config.margin))
        .map(|(idx, _)| idx)
        .collect();
    let curated = table.select(&keep);

    tracing::info!(
        original = table.len(),
        retained = curated.len(),
        iterations = model.iterations(),
        converged = model.converged(),
        "curation finished"
    );

    Ok(CurationReport {
        curated,
        probabilities,
        scaler,
        model,
        original_rows: table.len(),
    })
}
