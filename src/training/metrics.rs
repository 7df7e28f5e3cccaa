//! Binary classification metrics

use crate::error::{CardioError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-class scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Held-out evaluation of a binary classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    /// Scores for class 0 then class 1
    pub classes: Vec<ClassMetrics>,
    /// `confusion_matrix[actual][predicted]`
    pub confusion_matrix: [[usize; 2]; 2],
    pub n_samples: usize,
}

impl ClassificationReport {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(CardioError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(CardioError::InvalidInput(
                "cannot evaluate on zero samples".to_string(),
            ));
        }

        let mut matrix = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let actual = (t > 0.5) as usize;
            let predicted = (p > 0.5) as usize;
            matrix[actual][predicted] += 1;
        }

        let n_samples = y_true.len();
        let correct = matrix[0][0] + matrix[1][1];
        let classes = (0..2)
            .map(|c| {
                let tp = matrix[c][c];
                let predicted = matrix[0][c] + matrix[1][c];
                let support = matrix[c][0] + matrix[c][1];
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: c as u8,
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        Ok(Self {
            accuracy: correct as f64 / n_samples as f64,
            classes,
            confusion_matrix: matrix,
            n_samples,
        })
    }

    /// Unweighted mean F1 over both classes
    pub fn macro_f1(&self) -> f64 {
        self.classes.iter().map(|c| c.f1_score).sum::<f64>() / self.classes.len() as f64
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} {:>10} {:>10} {:>10} {:>10}", "class", "precision", "recall", "f1-score", "support")?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>8} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                c.label, c.precision, c.recall, c.f1_score, c.support
            )?;
        }
        writeln!(f, "{:>8} {:>32.2} {:>10}", "accuracy", self.accuracy, self.n_samples)?;
        write!(
            f,
            "confusion matrix: [[{}, {}], [{}, {}]]",
            self.confusion_matrix[0][0],
            self.confusion_matrix[0][1],
            self.confusion_matrix[1][0],
            self.confusion_matrix[1][1]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_report() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_pred = array![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];

        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.confusion_matrix, [[3, 1], [1, 3]]);
        assert_eq!(report.classes[1].precision, 0.75);
        assert_eq!(report.classes[1].recall, 0.75);
        assert_eq!(report.classes[0].support, 4);
        assert!((report.macro_f1() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_no_positive_predictions() {
        let y_true = array![1.0, 0.0];
        let y_pred = array![0.0, 0.0];
        let report = ClassificationReport::compute(&y_true, &y_pred).unwrap();
        assert_eq!(report.classes[1].precision, 0.0);
        assert_eq!(report.classes[1].f1_score, 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let y_true = array![1.0, 0.0];
        let y_pred = array![1.0];
        assert!(ClassificationReport::compute(&y_true, &y_pred).is_err());
    }

    #[test]
    fn test_display() {
        let report = ClassificationReport::compute(&array![1.0, 0.0], &array![1.0, 0.0]).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("confusion matrix"));
    }
}
