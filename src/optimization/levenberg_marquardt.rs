//! Bounded Levenberg-Marquardt least squares with inequality targets.
//!
//! Residuals are weighted by the tolerances: `r_i = (calculated_i - target_i) / tolerance_i`. A
//! value whose inequality is satisfied has neither residual nor derivative. Every step solves
//!
//! ```text
//! (α + λ·diag(α))·δ = β,   α = JᵀJ,   β = -Jᵀr
//! ```
//!
//! on the free parameters only. A parameter sitting on one of its bounds is fixed while the
//! gradient pushes it outwards.
use log::debug;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
    error::{FilmError, FilmResult},
    targets::{chi_2, Inequality},
    utils::usize_to_f64,
};

const MIN_DIAGONAL: f64 = 1e-20;
const MIN_LAMBDA: f64 = 1e-15;

/// A model fitted by [`LevenbergMarquardt`].
pub trait LeastSquaresModel {
    /// Calculated values for `parameters`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the model cannot be evaluated.
    fn values(&mut self, parameters: &[f64]) -> FilmResult<Vec<f64>>;
    /// Derivatives of the values (rows) with respect to the parameters (columns).
    ///
    /// # Errors
    ///
    /// This function will return an error if the model cannot be evaluated.
    fn jacobian(&mut self, parameters: &[f64]) -> FilmResult<DMatrix<f64>>;
}

/// Outcome of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Status {
    /// the merit function decreased
    Improving,
    /// the merit function reached the acceptable value
    Chi2IsOk,
    /// the merit function decreased by less than the minimal relative change
    Chi2ChangeTooSmall,
    /// no step decreases the merit function
    NotImproving,
}

/// Position of a parameter with respect to its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BoundStatus {
    /// strictly inside its bounds
    Free,
    /// on its lower bound
    Lower,
    /// on its upper bound
    Upper,
}

/// Convergence criteria and damping schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// `χ²` below which the fit is good enough
    pub acceptable_chi_2: f64,
    /// minimal relative decrease of `χ²` per iteration
    pub min_chi_2_change: f64,
    /// initial damping
    pub initial_lambda: f64,
    /// damping factor applied after a rejected step, its inverse after an accepted one
    pub lambda_factor: f64,
    /// damping above which the fit is not improving anymore
    pub max_lambda: f64,
}
impl Default for LmConfig {
    fn default() -> Self {
        Self {
            acceptable_chi_2: 0.0,
            min_chi_2_change: 1e-5,
            initial_lambda: 1e-3,
            lambda_factor: 10.0,
            max_lambda: 1e10,
        }
    }
}

/// Bounded Levenberg-Marquardt solver.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    parameters: Vec<f64>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    targets: Vec<f64>,
    tolerances: Vec<f64>,
    inequalities: Vec<Inequality>,
    config: LmConfig,
    lambda: f64,
    values: Vec<f64>,
    jacobian: DMatrix<f64>,
    chi_2: f64,
    prepared: bool,
}
impl LevenbergMarquardt {
    /// Creates a new solver. All parameters are unbounded and all targets are equalities.
    ///
    /// # Errors
    ///
    /// This function will return an error if targets and tolerances differ in length or a
    /// tolerance is not positive.
    pub fn new(
        parameters: Vec<f64>,
        targets: Vec<f64>,
        tolerances: Vec<f64>,
        config: LmConfig,
    ) -> FilmResult<Self> {
        if targets.len() != tolerances.len() {
            return Err(FilmError::Optimization(format!(
                "{} tolerances given for {} targets",
                tolerances.len(),
                targets.len()
            )));
        }
        if tolerances.iter().any(|t| !(*t > 0.0)) {
            return Err(FilmError::Optimization(
                "tolerances must be positive".into(),
            ));
        }
        let nb_parameters = parameters.len();
        let nb_values = targets.len();
        Ok(Self {
            parameters,
            lower: vec![f64::NEG_INFINITY; nb_parameters],
            upper: vec![f64::INFINITY; nb_parameters],
            targets,
            tolerances,
            inequalities: vec![Inequality::Equal; nb_values],
            lambda: config.initial_lambda,
            config,
            values: Vec::new(),
            jacobian: DMatrix::zeros(nb_values, nb_parameters),
            chi_2: f64::INFINITY,
            prepared: false,
        })
    }
    /// Set the bounds of the parameters.
    ///
    /// # Errors
    ///
    /// This function will return an error if a bound list has the wrong length or a lower bound
    /// exceeds its upper bound.
    pub fn set_limits(&mut self, lower: Vec<f64>, upper: Vec<f64>) -> FilmResult<()> {
        if lower.len() != self.parameters.len() || upper.len() != self.parameters.len() {
            return Err(FilmError::Optimization(
                "one bound per parameter is required".into(),
            ));
        }
        if lower.iter().zip(&upper).any(|(l, u)| l > u) {
            return Err(FilmError::Optimization(
                "lower bound above upper bound".into(),
            ));
        }
        self.lower = lower;
        self.upper = upper;
        self.prepared = false;
        Ok(())
    }
    /// Set the inequality of every target value.
    ///
    /// # Errors
    ///
    /// This function will return an error if the list has the wrong length.
    pub fn set_inequalities(&mut self, inequalities: Vec<Inequality>) -> FilmResult<()> {
        if inequalities.len() != self.targets.len() {
            return Err(FilmError::Optimization(
                "one inequality per target is required".into(),
            ));
        }
        self.inequalities = inequalities;
        self.prepared = false;
        Ok(())
    }
    /// Clamp the parameters into their bounds and evaluate the model.
    ///
    /// # Errors
    ///
    /// This function will return an error if the model fails or returns the wrong number of
    /// values or derivatives.
    pub fn prepare<M: LeastSquaresModel>(&mut self, model: &mut M) -> FilmResult<()> {
        for ((p, l), u) in self.parameters.iter_mut().zip(&self.lower).zip(&self.upper) {
            *p = p.clamp(*l, *u);
        }
        let values = model.values(&self.parameters)?;
        self.check_values(&values)?;
        self.chi_2 = self.chi_2_of(&values);
        self.values = values;
        self.jacobian = model.jacobian(&self.parameters)?;
        self.check_jacobian()?;
        self.lambda = self.config.initial_lambda;
        self.prepared = true;
        debug!(
            "fit prepared with {} parameters and {} values, chi² = {}",
            self.parameters.len(),
            self.targets.len(),
            self.chi_2
        );
        Ok(())
    }
    fn check_values(&self, values: &[f64]) -> FilmResult<()> {
        if values.len() != self.targets.len() {
            return Err(FilmError::Optimization(format!(
                "model returned {} values for {} targets",
                values.len(),
                self.targets.len()
            )));
        }
        Ok(())
    }
    fn check_jacobian(&self) -> FilmResult<()> {
        if self.jacobian.shape() != (self.targets.len(), self.parameters.len()) {
            return Err(FilmError::Optimization(format!(
                "model returned a {:?} jacobian for {} values and {} parameters",
                self.jacobian.shape(),
                self.targets.len(),
                self.parameters.len()
            )));
        }
        Ok(())
    }
    fn chi_2_of(&self, values: &[f64]) -> f64 {
        chi_2(values, &self.targets, &self.tolerances, &self.inequalities)
    }
    /// Weighted jacobian and residuals. Rows of satisfied inequalities are zero.
    fn weighted(&self) -> (DMatrix<f64>, DVector<f64>) {
        let mut j_w = self.jacobian.clone();
        let mut r_w = DVector::zeros(self.targets.len());
        for i in 0..self.targets.len() {
            let residual = self.inequalities[i].residual(self.values[i], self.targets[i]);
            let inactive = self.inequalities[i] != Inequality::Equal && residual == 0.0;
            let weight = if inactive { 0.0 } else { 1.0 / self.tolerances[i] };
            r_w[i] = residual * weight;
            for j in 0..self.parameters.len() {
                j_w[(i, j)] *= weight;
            }
        }
        (j_w, r_w)
    }
    fn pinned(&self, j: usize, descent: f64) -> bool {
        match self.bound_status(j) {
            BoundStatus::Free => false,
            BoundStatus::Lower => descent <= 0.0,
            BoundStatus::Upper => descent >= 0.0,
        }
    }
    /// Perform one Levenberg-Marquardt step. The damping is increased until a step decreases
    /// `χ²` or the maximal damping is reached.
    ///
    /// # Errors
    ///
    /// This function will return an error if the solver was not prepared or the model fails.
    pub fn iterate<M: LeastSquaresModel>(&mut self, model: &mut M) -> FilmResult<Status> {
        if !self.prepared {
            return Err(FilmError::Optimization("solver is not prepared".into()));
        }
        if self.chi_2 <= self.config.acceptable_chi_2 {
            return Ok(Status::Chi2IsOk);
        }
        let (j_w, r_w) = self.weighted();
        let alpha = j_w.transpose() * &j_w;
        let beta = -(j_w.transpose() * &r_w);
        let free: Vec<usize> = (0..self.parameters.len())
            .filter(|j| !self.pinned(*j, beta[*j]))
            .collect();
        if free.is_empty() {
            return Ok(Status::NotImproving);
        }
        let b = DVector::from_fn(free.len(), |r, _| beta[free[r]]);
        loop {
            let mut a = DMatrix::from_fn(free.len(), free.len(), |r, c| alpha[(free[r], free[c])]);
            for k in 0..free.len() {
                let diagonal = a[(k, k)];
                a[(k, k)] = self.lambda.mul_add(diagonal.max(MIN_DIAGONAL), diagonal);
            }
            if let Some(delta) = solve(a, &b) {
                let mut trial = self.parameters.clone();
                for (k, j) in free.iter().enumerate() {
                    trial[*j] = (trial[*j] + delta[k]).clamp(self.lower[*j], self.upper[*j]);
                }
                let values = model.values(&trial)?;
                self.check_values(&values)?;
                let chi_2 = self.chi_2_of(&values);
                if chi_2 < self.chi_2 {
                    let previous = self.chi_2;
                    self.parameters = trial;
                    self.values = values;
                    self.chi_2 = chi_2;
                    self.jacobian = model.jacobian(&self.parameters)?;
                    self.check_jacobian()?;
                    self.lambda = (self.lambda / self.config.lambda_factor).max(MIN_LAMBDA);
                    let status = if chi_2 <= self.config.acceptable_chi_2 {
                        Status::Chi2IsOk
                    } else if (previous - chi_2) / previous < self.config.min_chi_2_change {
                        Status::Chi2ChangeTooSmall
                    } else {
                        Status::Improving
                    };
                    debug!("chi² {previous} -> {chi_2} ({status})");
                    return Ok(status);
                }
            }
            self.lambda *= self.config.lambda_factor;
            if self.lambda > self.config.max_lambda {
                model.values(&self.parameters)?;
                self.lambda = self.config.initial_lambda;
                return Ok(Status::NotImproving);
            }
        }
    }
    /// Current parameters.
    #[must_use]
    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }
    /// Values calculated for the current parameters.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
    /// Current merit function `χ² = Σ r_i² / m`.
    #[must_use]
    pub const fn chi_2(&self) -> f64 {
        self.chi_2
    }
    /// Current damping.
    #[must_use]
    pub const fn lambda(&self) -> f64 {
        self.lambda
    }
    /// Gradient of `χ²` with respect to every parameter.
    #[must_use]
    pub fn gradient(&self) -> Vec<f64> {
        if self.values.is_empty() {
            return vec![0.0; self.parameters.len()];
        }
        let (j_w, r_w) = self.weighted();
        let scale = 2.0 / usize_to_f64(self.targets.len());
        (j_w.transpose() * r_w).iter().map(|g| g * scale).collect()
    }
    /// Norm of the gradient restricted to the parameters which are free to move.
    #[must_use]
    pub fn norm_gradient(&self) -> f64 {
        self.gradient()
            .iter()
            .enumerate()
            .filter(|(j, g)| !self.pinned(*j, -**g))
            .map(|(_, g)| g * g)
            .sum::<f64>()
            .sqrt()
    }
    /// Correlation matrix of the parameters. `None` if the curvature matrix is singular.
    #[must_use]
    pub fn correlation_matrix(&self) -> Option<DMatrix<f64>> {
        if self.values.is_empty() {
            return None;
        }
        let (j_w, _) = self.weighted();
        let covariance = (j_w.transpose() * &j_w).try_inverse()?;
        let n = covariance.nrows();
        Some(DMatrix::from_fn(n, n, |r, c| {
            covariance[(r, c)] / (covariance[(r, r)] * covariance[(c, c)]).sqrt()
        }))
    }
    /// Position of parameter `j` with respect to its bounds.
    ///
    /// # Panics
    ///
    /// Panics if `j` is not a parameter number.
    #[must_use]
    pub fn bound_status(&self, j: usize) -> BoundStatus {
        let p = self.parameters[j];
        let close = |bound: f64| (p - bound).abs() <= 1e-12 * bound.abs().max(1.0);
        if self.lower[j].is_finite() && close(self.lower[j]) {
            BoundStatus::Lower
        } else if self.upper[j].is_finite() && close(self.upper[j]) {
            BoundStatus::Upper
        } else {
            BoundStatus::Free
        }
    }
}

/// Solve the symmetric system, falling back to LU when it is not positive definite.
fn solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(cholesky) = a.clone().cholesky() {
        return Some(cholesky.solve(b));
    }
    a.lu().solve(b).filter(|x| x.iter().all(|v| v.is_finite()))
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use assert_matches::assert_matches;

    /// `y = a·exp(-b·x)` sampled on a few points.
    struct Decay {
        x: Vec<f64>,
        calls: usize,
    }
    impl LeastSquaresModel for Decay {
        fn values(&mut self, p: &[f64]) -> FilmResult<Vec<f64>> {
            self.calls += 1;
            Ok(self.x.iter().map(|x| p[0] * (-p[1] * x).exp()).collect())
        }
        fn jacobian(&mut self, p: &[f64]) -> FilmResult<DMatrix<f64>> {
            Ok(DMatrix::from_fn(self.x.len(), 2, |i, j| {
                let e = (-p[1] * self.x[i]).exp();
                if j == 0 {
                    e
                } else {
                    -p[0] * self.x[i] * e
                }
            }))
        }
    }
    fn decay() -> (Decay, Vec<f64>) {
        let x: Vec<f64> = (0..10).map(|i| f64::from(i) * 0.3).collect();
        let y = x.iter().map(|x| 2.0 * (-0.7 * x).exp()).collect();
        (Decay { x, calls: 0 }, y)
    }
    fn run(solver: &mut LevenbergMarquardt, model: &mut Decay) -> Status {
        for _ in 0..200 {
            let status = solver.iterate(model).unwrap();
            if status != Status::Improving {
                return status;
            }
        }
        Status::Improving
    }
    #[test]
    fn unprepared() {
        let (mut model, y) = decay();
        let mut solver =
            LevenbergMarquardt::new(vec![1.0, 1.0], y, vec![0.01; 10], LmConfig::default())
                .unwrap();
        assert_matches!(solver.iterate(&mut model), Err(FilmError::Optimization(_)));
    }
    #[test]
    fn fits_exact_data() {
        let (mut model, y) = decay();
        let config = LmConfig {
            acceptable_chi_2: 1e-16,
            ..LmConfig::default()
        };
        let mut solver = LevenbergMarquardt::new(vec![1.0, 0.2], y, vec![0.01; 10], config).unwrap();
        solver.prepare(&mut model).unwrap();
        let first = solver.chi_2();
        let status = run(&mut solver, &mut model);
        assert_ne!(status, Status::Improving);
        assert!(solver.chi_2() < first);
        assert_abs_diff_eq!(solver.parameters()[0], 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(solver.parameters()[1], 0.7, epsilon = 1e-5);
        assert!(solver.norm_gradient() < 1e-3);
        let correlation = solver.correlation_matrix().unwrap();
        assert_abs_diff_eq!(correlation[(0, 0)], 1.0, epsilon = 1e-12);
        assert!(correlation[(0, 1)].abs() <= 1.0);
    }
    #[test]
    fn respects_bounds() {
        let (mut model, y) = decay();
        let mut solver =
            LevenbergMarquardt::new(vec![1.0, 0.2], y, vec![0.01; 10], LmConfig::default())
                .unwrap();
        solver
            .set_limits(vec![0.0, 0.0], vec![1.5, 10.0])
            .unwrap();
        solver.prepare(&mut model).unwrap();
        run(&mut solver, &mut model);
        assert_abs_diff_eq!(solver.parameters()[0], 1.5);
        assert_eq!(solver.bound_status(0), BoundStatus::Upper);
        assert_eq!(solver.bound_status(1), BoundStatus::Free);
        assert!(solver.parameters()[1] < 0.7);
    }
    #[test]
    fn satisfied_inequalities_do_not_count() {
        let (mut model, y) = decay();
        let mut solver = LevenbergMarquardt::new(
            vec![2.0, 0.7],
            y.iter().map(|v| v + 1.0).collect(),
            vec![0.01; 10],
            LmConfig::default(),
        )
        .unwrap();
        solver
            .set_inequalities(vec![Inequality::Smaller; 10])
            .unwrap();
        solver.prepare(&mut model).unwrap();
        assert_eq!(solver.chi_2(), 0.0);
        assert_eq!(solver.iterate(&mut model).unwrap(), Status::Chi2IsOk);
        assert!(solver.gradient().iter().all(|g| *g == 0.0));
    }
    #[test]
    fn invalid_setup() {
        assert!(LevenbergMarquardt::new(vec![1.0], vec![1.0], vec![], LmConfig::default()).is_err());
        assert!(LevenbergMarquardt::new(vec![1.0], vec![1.0], vec![0.0], LmConfig::default()).is_err());
        let mut solver =
            LevenbergMarquardt::new(vec![1.0], vec![1.0], vec![1.0], LmConfig::default()).unwrap();
        assert!(solver.set_limits(vec![1.0], vec![0.0]).is_err());
        assert!(solver.set_inequalities(vec![]).is_err());
    }
}
