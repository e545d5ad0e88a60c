//! Pearson correlation between two signals.

use super::Answer;
use crate::data::Dataset;
use tracing::warn;

/// Pearson coefficient over the common prefix of `a` and `b`. `None` when
/// fewer than two samples overlap or either side has zero variance.
pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (x - mean_a, y - mean_b);
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Qualitative band for a coefficient.
pub fn strength_label(r: f64) -> &'static str {
    if r >= 0.8 {
        "strong positive"
    } else if r >= 0.5 {
        "moderate positive"
    } else if r >= 0.2 {
        "weak positive"
    } else if r > -0.2 {
        "negligible"
    } else if r > -0.5 {
        "weak negative"
    } else if r > -0.8 {
        "moderate negative"
    } else {
        "strong negative"
    }
}

pub fn answer(signals: &[String], dataset: &Dataset) -> Answer {
    let (first, second) = match signals {
        [first, second, ..] => (first, second),
        _ => {
            return Answer::new(
                "correlation",
                "I need at least two signals to analyze correlation. \
Please specify which signals you want to compare.",
                0.5,
            )
        }
    };

    let (Some(a), Some(b)) = (dataset.signal(first), dataset.signal(second)) else {
        return Answer::new(
            "correlation",
            "I couldn't find one or both of the signals you mentioned in the data.",
            0.5,
        );
    };

    let Some(r) = pearson(&a.samples, &b.samples) else {
        warn!("Correlation between {} and {} is undefined", first, second);
        return Answer::new(
            "correlation",
            format!(
                "I cannot compute a correlation between {} and {} because one of them is constant.",
                first, second
            ),
            0.5,
        )
        .with("signals", vec![first.clone(), second.clone()]);
    };

    let mut text = format!(
        "There is a {} correlation ({:.2}) between {} and {}.",
        strength_label(r),
        r,
        first,
        second
    );
    if r > 0.5 {
        text.push_str(&format!(
            " As {} increases, {} tends to increase as well.",
            first, second
        ));
    } else if r < -0.5 {
        text.push_str(&format!(" As {} increases, {} tends to decrease.", first, second));
    }

    Answer::new("correlation", text, 0.9)
        .with("correlation", r)
        .with("strength", strength_label(r))
        .with("signals", vec![first.clone(), second.clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::tests::scenario_dataset;

    #[test]
    fn test_identical_signals_are_strong_positive() {
        let ds = scenario_dataset();
        let names = vec!["engineRPM".to_string(), "vehicleSpeed".to_string()];
        let a = answer(&names, &ds);
        assert!(a.text.starts_with("There is a strong positive correlation (1.00)"));
        assert!(a.text.ends_with("tends to increase as well."));
        assert_eq!(a.confidence, 0.9);
    }

    #[test]
    fn test_bands() {
        assert_eq!(strength_label(0.8), "strong positive");
        assert_eq!(strength_label(0.5), "moderate positive");
        assert_eq!(strength_label(0.2), "weak positive");
        assert_eq!(strength_label(0.0), "negligible");
        assert_eq!(strength_label(-0.3), "weak negative");
        assert_eq!(strength_label(-0.6), "moderate negative");
        assert_eq!(strength_label(-0.8), "strong negative");
    }

    #[test]
    fn test_negative_and_constant() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&a, &b).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&a, &[5.0; 4]), None);
        assert_eq!(pearson(&[1.0], &[2.0]), None);
    }

    #[test]
    fn test_needs_two_signals() {
        let ds = scenario_dataset();
        let a = answer(&["engineRPM".to_string()], &ds);
        assert_eq!(a.confidence, 0.5);
        assert!(a.text.starts_with("I need at least two signals"));
    }
}
