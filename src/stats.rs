//! Small numeric helpers shared by the estimators

/// Floor added to every standard deviation so z-scores stay finite
pub const EPSILON: f64 = 1e-6;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by n)
pub fn population_std(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Round to one decimal place
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Least-squares line through `(i, values[i])` for i = 0..n
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a line over evenly spaced points; needs at least two values
pub fn linear_fit(values: &[f64]) -> Option<LinearFit> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        numerator += dx * (y - y_mean);
        denominator += dx * dx;
    }

    let slope = numerator / denominator;
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        assert_eq!(mean(&[]), None);
        assert!((mean(&[1.0, 2.0, 3.0]).unwrap() - 2.0).abs() < 1e-12);
        assert!((population_std(&[1.0, 3.0, 1.0, 3.0]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(population_std(&[5.0]), Some(0.0));
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(72.34), 72.3);
        assert_eq!(round1(72.36), 72.4);
        assert_eq!(round1(100.0), 100.0);
    }

    #[test]
    fn test_linear_fit_declining_scores() {
        let fit = linear_fit(&[80.0, 78.0, 75.0, 70.0, 65.0]).unwrap();
        assert!((fit.slope - (-3.8)).abs() < 1e-9);
        assert!((fit.intercept - 81.2).abs() < 1e-9);
        assert!((fit.at(4.0) - 66.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_fit_needs_two_points() {
        assert_eq!(linear_fit(&[50.0]), None);
        let fit = linear_fit(&[70.0, 60.0]).unwrap();
        assert!((fit.slope + 10.0).abs() < 1e-12);
        assert!((fit.intercept - 70.0).abs() < 1e-12);
    }
}
