//! Scalar root finding with forward-mode automatic differentiation.
//!
//! The equilibrium engine solves one nonlinear equation per stage call: the
//! pH at which the solution charge balance closes. Residuals are written over
//! [`Dual64`] so a single evaluation yields both the value and the exact
//! derivative, which drives a Newton step kept inside a sign-changing bracket.
//!
//! # Example
//!
//! ```
//! use degasser::autodiff::BracketedNewton;
//! use num_dual::Dual64;
//!
//! // Root of x^2 - 2 on [0, 2]
//! let newton = BracketedNewton::new(1e-12, 50);
//! let root = newton.solve(|x: Dual64| x * x - 2.0, 0.0, 2.0, 1.0).unwrap();
//! assert!((root.x - 2f64.sqrt()).abs() < 1e-10);
//! ```

use num_dual::Dual64;

/// Errors from the bracketed Newton iteration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RootError {
    #[error("Root not bracketed on [{lo}, {hi}] (f = {f_lo:.3e}, {f_hi:.3e})")]
    NotBracketed { lo: f64, hi: f64, f_lo: f64, f_hi: f64 },

    #[error("Non-finite residual at x = {0}")]
    NonFinite(f64),

    #[error("Root search did not converge after {iterations} iterations (x = {x})")]
    NoConvergence { iterations: usize, x: f64 },
}

/// Value and first derivative of a scalar function at `x`.
pub fn value_and_derivative<F>(f: F, x: f64) -> (f64, f64)
where
    F: Fn(Dual64) -> Dual64,
{
    let result = f(Dual64::from(x).derivative());
    (result.re, result.eps)
}

/// Converged root with its iteration count.
#[derive(Debug, Clone, Copy)]
pub struct Root {
    pub x: f64,
    pub residual: f64,
    pub iterations: usize,
}

/// Newton iteration safeguarded by bisection.
///
/// Each step is a Newton step when it stays strictly inside the current
/// bracket, otherwise the bracket midpoint. The bracket shrinks every
/// iteration, so the method cannot diverge.
#[derive(Debug, Clone, Copy)]
pub struct BracketedNewton {
    /// Absolute tolerance on `x`
    pub tolerance: f64,
    /// Maximum number of residual evaluations
    pub max_iterations: usize,
}

impl BracketedNewton {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        BracketedNewton { tolerance, max_iterations }
    }

    /// Finds a root of `f` in `[lo, hi]` starting from `x0`.
    pub fn solve<F>(&self, f: F, lo: f64, hi: f64, x0: f64) -> Result<Root, RootError>
    where
        F: Fn(Dual64) -> Dual64,
    {
        let (f_lo, _) = value_and_derivative(&f, lo);
        let (f_hi, _) = value_and_derivative(&f, hi);
        if !f_lo.is_finite() || !f_hi.is_finite() {
            return Err(RootError::NonFinite(if f_lo.is_finite() { hi } else { lo }));
        }
        if f_lo == 0.0 {
            return Ok(Root { x: lo, residual: 0.0, iterations: 0 });
        }
        if f_hi == 0.0 {
            return Ok(Root { x: hi, residual: 0.0, iterations: 0 });
        }
        if f_lo.signum() == f_hi.signum() {
            return Err(RootError::NotBracketed { lo, hi, f_lo, f_hi });
        }

        // Orient so that f(neg) < 0 < f(pos)
        let (mut neg, mut pos) = if f_lo < 0.0 { (lo, hi) } else { (hi, lo) };
        let mut x = x0.clamp(lo.min(hi), lo.max(hi));

        for iteration in 1..=self.max_iterations {
            let (fx, dfx) = value_and_derivative(&f, x);
            if !fx.is_finite() {
                return Err(RootError::NonFinite(x));
            }
            if fx == 0.0 {
                return Ok(Root { x, residual: fx, iterations: iteration });
            }
            if fx < 0.0 {
                neg = x;
            } else {
                pos = x;
            }

            let midpoint = 0.5 * (neg + pos);
            let newton = x - fx / dfx;
            let inside = newton.is_finite() && (newton - neg) * (newton - pos) < 0.0;
            let next = if inside { newton } else { midpoint };

            if (next - x).abs() < self.tolerance || (pos - neg).abs() < self.tolerance {
                let (residual, _) = value_and_derivative(&f, next);
                return Ok(Root { x: next, residual, iterations: iteration });
            }
            x = next;
        }

        Err(RootError::NoConvergence { iterations: self.max_iterations, x })
    }
}
