//! Simple linear regression with significance test
//!
//! Least-squares fit of `y = slope * x + intercept` with Pearson r and the
//! two-sided p-value of the slope under a Student t distribution with
//! `n - 2` degrees of freedom.

use geowatch_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

const TINY: f64 = 1.0e-20;

/// Result of an ordinary least-squares line fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Pearson correlation coefficient
    pub r_value: f64,
    pub r_squared: f64,
    /// Two-sided p-value for a zero slope
    pub p_value: f64,
    /// Standard error of the slope
    pub std_err: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a line through `(x, y)` pairs.
///
/// Needs at least two points and some spread in `x`. A constant `y` gives
/// a zero slope with `r = 0` and `p = 1`.
pub fn linear_regression(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(Error::Validation(format!(
            "regression inputs differ in length: {} vs {}",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(Error::InsufficientData {
            context: "linear regression",
            required: 2,
            actual: n,
        });
    }

    let nf = n as f64;
    let x_mean = x.iter().sum::<f64>() / nf;
    let y_mean = y.iter().sum::<f64>() / nf;

    let (mut ssxm, mut ssym, mut ssxym) = (0.0, 0.0, 0.0);
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - x_mean;
        let dy = yi - y_mean;
        ssxm += dx * dx;
        ssym += dy * dy;
        ssxym += dx * dy;
    }
    ssxm /= nf;
    ssym /= nf;
    ssxym /= nf;

    if ssxm == 0.0 {
        return Err(Error::Validation(
            "cannot fit a line when all x values are identical".into(),
        ));
    }

    let r = if ssym == 0.0 {
        0.0
    } else {
        (ssxym / (ssxm * ssym).sqrt()).clamp(-1.0, 1.0)
    };
    let slope = ssxym / ssxm;
    let intercept = y_mean - slope * x_mean;

    let (p_value, std_err) = if n == 2 {
        // Two points always fit exactly.
        (if r == 0.0 { 1.0 } else { 0.0 }, 0.0)
    } else {
        let df = (n - 2) as f64;
        let t = r * (df / ((1.0 - r) * (1.0 + r) + TINY)).sqrt();
        let p = student_t_two_sided(t, df)?;
        let se = ((1.0 - r * r) * ssym / ssxm / df).max(0.0).sqrt();
        (p, se)
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_value: r,
        r_squared: r * r,
        p_value,
        std_err,
    })
}

/// Two-sided tail probability `P(|T| >= |t|)` for Student's t with `df` degrees of freedom
pub fn student_t_two_sided(t: f64, df: f64) -> Result<f64> {
    if t.is_nan() {
        return Ok(f64::NAN);
    }
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| Error::InvalidParameter {
        name: "degrees_of_freedom",
        value: df.to_string(),
        reason: e.to_string(),
    })?;
    Ok((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_perfect_line() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|d| 0.5 + 0.001 * d).collect();
        let fit = linear_regression(&x, &y).unwrap();
        assert_abs_diff_eq!(fit.slope, 0.001, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.intercept, 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(fit.r_squared, 1.0, epsilon = 1e-9);
        assert!(fit.p_value < 1e-10);
        assert_abs_diff_eq!(fit.predict(10.0), 0.51, epsilon = 1e-12);
    }

    #[test]
    fn test_constant_series() {
        let fit = linear_regression(&[0.0, 1.0, 2.0, 3.0], &[0.4; 4]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert_eq!(fit.r_value, 0.0);
        assert_abs_diff_eq!(fit.p_value, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_identical_x_rejected() {
        assert!(linear_regression(&[1.0, 1.0, 1.0], &[0.1, 0.2, 0.3]).is_err());
        assert!(linear_regression(&[1.0], &[0.1]).is_err());
        assert!(linear_regression(&[1.0, 2.0], &[0.1]).is_err());
    }

    #[test]
    fn test_student_t_known_values() {
        // Cauchy (df = 1): P(|T| >= 1) = 0.5
        assert_abs_diff_eq!(student_t_two_sided(1.0, 1.0).unwrap(), 0.5, epsilon = 1e-9);
        // 97.5% quantile for df = 10
        assert_abs_diff_eq!(student_t_two_sided(2.228_138_852, 10.0).unwrap(), 0.05, epsilon = 1e-7);
        assert_abs_diff_eq!(student_t_two_sided(2.0, 10.0).unwrap(), 0.073_388, epsilon = 1e-6);
        assert_abs_diff_eq!(student_t_two_sided(-10.0, 2.0).unwrap(), 0.009_852, epsilon = 1e-6);
        assert_abs_diff_eq!(student_t_two_sided(0.0, 5.0).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_student_t_rejects_bad_dof() {
        assert!(matches!(
            student_t_two_sided(1.0, 0.0),
            Err(Error::InvalidParameter { name: "degrees_of_freedom", .. })
        ));
        assert!(student_t_two_sided(f64::NAN, 3.0).unwrap().is_nan());
    }

    #[test]
    fn test_noisy_line_is_significant() {
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|d| 0.2 + 0.05 * d + if *d as usize % 2 == 0 { 0.01 } else { -0.01 })
            .collect();
        let fit = linear_regression(&x, &y).unwrap();
        assert!(fit.p_value < 1e-6);
        assert!(fit.std_err > 0.0);
    }
}
