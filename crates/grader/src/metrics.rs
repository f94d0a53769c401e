//! F1 scoring for multi-class label codes

use crate::errors::{GradeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How per-class F1 values are combined into one score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Averaging {
    /// Unweighted mean over every class seen in either sequence
    #[default]
    Macro,
    /// Global TP/FP/FN counts; equals accuracy for single-label data
    Micro,
    /// Per-class F1 weighted by the number of true instances
    Weighted,
}

impl Averaging {
    pub fn as_str(&self) -> &'static str {
        match self {
            Averaging::Macro => "macro",
            Averaging::Micro => "micro",
            Averaging::Weighted => "weighted",
        }
    }
}

impl fmt::Display for Averaging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Averaging {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "macro" => Ok(Averaging::Macro),
            "micro" => Ok(Averaging::Micro),
            "weighted" => Ok(Averaging::Weighted),
            other => Err(format!(
                "unknown averaging '{other}' (expected macro, micro or weighted)"
            )),
        }
    }
}

/// Confusion counts for one class
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    /// Number of true instances of the class
    pub support: u64,
}

impl ConfusionCounts {
    /// F1 for this class; 0.0 when the class never occurs in either sequence.
    pub fn f1(&self) -> f64 {
        f1_from_counts(self.true_positives, self.false_positives, self.false_negatives)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    fn is_present(&self) -> bool {
        self.support > 0 || self.false_positives > 0
    }
}

/// Per-class counts for codes `0..num_classes`.
pub fn confusion_counts(
    y_true: &[u32],
    y_pred: &[u32],
    num_classes: usize,
) -> Result<Vec<ConfusionCounts>> {
    if y_true.len() != y_pred.len() {
        return Err(GradeError::ShapeMismatch {
            given: y_pred.len(),
            expected: y_true.len(),
        });
    }

    let mut counts = vec![ConfusionCounts::default(); num_classes];
    for (&truth, &pred) in y_true.iter().zip(y_pred) {
        let (truth, pred) = (truth as usize, pred as usize);
        if truth >= num_classes || pred >= num_classes {
            continue;
        }
        counts[truth].support += 1;
        if truth == pred {
            counts[truth].true_positives += 1;
        } else {
            counts[truth].false_negatives += 1;
            counts[pred].false_positives += 1;
        }
    }
    Ok(counts)
}

/// F1 score of `y_pred` against `y_true`.
///
/// Precision or recall with a zero denominator counts as 0. An empty input
/// scores 0.0.
pub fn f1_score(
    y_true: &[u32],
    y_pred: &[u32],
    num_classes: usize,
    averaging: Averaging,
) -> Result<f64> {
    let counts = confusion_counts(y_true, y_pred, num_classes)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }

    let score = match averaging {
        Averaging::Macro => {
            let present: Vec<f64> = counts
                .iter()
                .filter(|c| c.is_present())
                .map(ConfusionCounts::f1)
                .collect();
            if present.is_empty() {
                0.0
            } else {
                present.iter().sum::<f64>() / present.len() as f64
            }
        }
        Averaging::Micro => {
            let (tp, fp, fn_) = counts.iter().fold((0, 0, 0), |(tp, fp, fn_), c| {
                (
                    tp + c.true_positives,
                    fp + c.false_positives,
                    fn_ + c.false_negatives,
                )
            });
            f1_from_counts(tp, fp, fn_)
        }
        Averaging::Weighted => {
            let total: u64 = counts.iter().map(|c| c.support).sum();
            if total == 0 {
                0.0
            } else {
                counts
                    .iter()
                    .map(|c| c.f1() * c.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        }
    };

    Ok(score)
}

fn f1_from_counts(tp: u64, fp: u64, fn_: u64) -> f64 {
    ratio(2 * tp, 2 * tp + fp + fn_)
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_perfect_prediction_scores_one() {
        let y = [0, 1, 2, 1, 0];
        for averaging in [Averaging::Macro, Averaging::Micro, Averaging::Weighted] {
            assert_eq!(f1_score(&y, &y, 3, averaging).unwrap(), 1.0);
        }
    }

    #[test]
    fn test_macro_f1_hand_computed() {
        // class 0: tp=1 fp=0 fn=1 -> 2/3
        // class 1: tp=1 fp=1 fn=0 -> 2/3
        // class 2: tp=1 fp=0 fn=0 -> 1
        let y_true = [0, 0, 1, 2];
        let y_pred = [0, 1, 1, 2];
        let score = f1_score(&y_true, &y_pred, 3, Averaging::Macro).unwrap();
        assert!((score - (2.0 / 3.0 + 2.0 / 3.0 + 1.0) / 3.0).abs() < EPS);
    }

    #[test]
    fn test_micro_f1_equals_accuracy() {
        let y_true = [0, 0, 1, 2];
        let y_pred = [0, 1, 1, 2];
        let score = f1_score(&y_true, &y_pred, 3, Averaging::Micro).unwrap();
        assert!((score - 0.75).abs() < EPS);
    }

    #[test]
    fn test_weighted_f1_uses_support() {
        // supports: class 0 = 2, class 1 = 1, class 2 = 1
        let y_true = [0, 0, 1, 2];
        let y_pred = [0, 1, 1, 2];
        let score = f1_score(&y_true, &y_pred, 3, Averaging::Weighted).unwrap();
        let expected = (2.0 * (2.0 / 3.0) + 2.0 / 3.0 + 1.0) / 4.0;
        assert!((score - expected).abs() < EPS);
    }

    #[test]
    fn test_macro_skips_absent_classes() {
        // class 2 exists in the table but never appears
        let y_true = [0, 1];
        let y_pred = [0, 1];
        assert_eq!(f1_score(&y_true, &y_pred, 3, Averaging::Macro).unwrap(), 1.0);
    }

    #[test]
    fn test_all_wrong_scores_zero() {
        let y_true = [0, 0, 0];
        let y_pred = [1, 1, 1];
        assert_eq!(f1_score(&y_true, &y_pred, 2, Averaging::Macro).unwrap(), 0.0);
        assert_eq!(f1_score(&y_true, &y_pred, 2, Averaging::Micro).unwrap(), 0.0);
    }

    #[test]
    fn test_length_mismatch() {
        let err = f1_score(&[0, 1], &[0], 2, Averaging::Macro).unwrap_err();
        assert!(matches!(
            err,
            GradeError::ShapeMismatch {
                given: 1,
                expected: 2
            }
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(f1_score(&[], &[], 2, Averaging::Macro).unwrap(), 0.0);
    }

    #[test]
    fn test_averaging_parse() {
        assert_eq!("Macro".parse::<Averaging>().unwrap(), Averaging::Macro);
        assert_eq!(" micro ".parse::<Averaging>().unwrap(), Averaging::Micro);
        assert_eq!("weighted".parse::<Averaging>().unwrap(), Averaging::Weighted);
        assert!("binary".parse::<Averaging>().is_err());
        assert_eq!(Averaging::default(), Averaging::Macro);
    }

    #[test]
    fn test_precision_and_recall() {
        // class 1: tp=1 fp=1 fn=0, class 0: tp=1 fp=0 fn=1
        let counts = confusion_counts(&[0, 0, 1, 2], &[0, 1, 1, 2], 3).unwrap();
        assert!((counts[1].precision() - 0.5).abs() < EPS);
        assert!((counts[1].recall() - 1.0).abs() < EPS);
        assert!((counts[0].precision() - 1.0).abs() < EPS);
        assert!((counts[0].recall() - 0.5).abs() < EPS);
        assert_eq!(counts[0].support, 2);

        let absent = ConfusionCounts::default();
        assert_eq!(absent.precision(), 0.0);
        assert_eq!(absent.recall(), 0.0);
    }

    #[test]
    fn test_averaging_serde_names() {
        for averaging in [Averaging::Macro, Averaging::Micro, Averaging::Weighted] {
            let json = serde_json::to_string(&averaging).unwrap();
            assert_eq!(json, format!("\"{}\"", averaging.as_str()));
            assert_eq!(serde_json::from_str::<Averaging>(&json).unwrap(), averaging);
        }
        assert!(serde_json::from_str::<Averaging>("\"Macro\"").is_err());
    }
}
