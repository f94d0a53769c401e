//! Submission grading
//!
//! A [`Grader`] is built once from the reference labels and then scores any
//! number of submissions. It holds no interior state, so a single instance can
//! be shared across threads.

use crate::cell::Cell;
use crate::encoder::EncodingTable;
use crate::errors::{GradeError, Result};
use crate::metrics::{f1_score, Averaging};
use crate::table::{read_reference_labels, LabelTable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Default header of the label column
pub const DEFAULT_LABEL_COLUMN: &str = "newsgroup";

/// Upper bound on unknown labels written to a single log event
const MAX_LOGGED_LABELS: usize = 20;

/// Grader configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraderConfig {
    /// Header of the label column in reference and submission files
    pub label_column: String,
    /// F1 averaging strategy
    pub averaging: Averaging,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            averaging: Averaging::default(),
        }
    }
}

/// Scores submissions against the ground truth
#[derive(Clone, Debug)]
pub struct Grader {
    table: EncodingTable,
    ground_truth: Vec<u32>,
    config: GraderConfig,
}

impl Grader {
    /// Create a grader from an already built table and the reference labels.
    pub fn new<S: AsRef<str>>(
        table: EncodingTable,
        reference_labels: &[S],
        config: GraderConfig,
    ) -> Result<Self> {
        let ground_truth = table.encode(reference_labels)?;
        Ok(Self {
            table,
            ground_truth,
            config,
        })
    }

    /// Build the encoding table and the ground truth in one step.
    pub fn from_reference<S: AsRef<str>>(
        reference_labels: &[S],
        config: GraderConfig,
    ) -> Result<Self> {
        let table = EncodingTable::build(reference_labels)?;
        Self::new(table, reference_labels, config)
    }

    /// Load the reference labels from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P, config: GraderConfig) -> Result<Self> {
        let labels = read_reference_labels(path, &config.label_column)?;
        Self::from_reference(&labels, config)
    }

    /// Grade a parsed submission table.
    pub fn grade(&self, predicted: &LabelTable) -> Result<f64> {
        let cells = predicted.column(&self.config.label_column)?;
        self.grade_cells(&cells)
    }

    /// Grade raw CSV bytes.
    pub fn grade_csv(&self, bytes: &[u8]) -> Result<f64> {
        let table = LabelTable::from_bytes(bytes)?;
        self.grade(&table)
    }

    /// Grade an already extracted label column.
    ///
    /// The length is checked before any entry is inspected; entries are then
    /// validated in order, so the reported index is always the first bad one.
    pub fn grade_cells(&self, cells: &[Cell]) -> Result<f64> {
        self.check_shape(cells.len())?;

        let predicted = self
            .table
            .encode_cells(cells)
            .map_err(|err| self.log_unknown_labels(err, cells))?;

        self.score(&predicted)
    }

    /// Grade plain string labels.
    pub fn grade_labels<S: AsRef<str>>(&self, labels: &[S]) -> Result<f64> {
        self.check_shape(labels.len())?;
        let predicted = self.table.encode(labels).map_err(|err| {
            let cells: Vec<Cell> = labels.iter().map(|label| Cell::text(label.as_ref())).collect();
            self.log_unknown_labels(err, &cells)
        })?;
        self.score(&predicted)
    }

    /// Log every unknown label, not only the one the error reports.
    fn log_unknown_labels(&self, err: GradeError, cells: &[Cell]) -> GradeError {
        if let GradeError::UnknownLabel { .. } = err {
            let unknown = self.table.unknown_labels(cells);
            warn!(
                count = unknown.len(),
                first = ?unknown.iter().take(MAX_LOGGED_LABELS).collect::<Vec<_>>(),
                "submission contains unknown labels"
            );
        }
        err
    }

    fn check_shape(&self, given: usize) -> Result<()> {
        let expected = self.ground_truth.len();
        if given != expected {
            return Err(GradeError::ShapeMismatch { given, expected });
        }
        Ok(())
    }

    fn score(&self, predicted: &[u32]) -> Result<f64> {
        let score = f1_score(
            &self.ground_truth,
            predicted,
            self.table.len(),
            self.config.averaging,
        )?;
        debug!(
            rows = predicted.len(),
            averaging = %self.config.averaging,
            score,
            "graded submission"
        );
        Ok(score)
    }

    pub fn table(&self) -> &EncodingTable {
        &self.table
    }

    /// Encoded reference labels
    pub fn ground_truth(&self) -> &[u32] {
        &self.ground_truth
    }

    pub fn config(&self) -> &GraderConfig {
        &self.config
    }

    /// Number of rows every submission must have
    pub fn expected_rows(&self) -> usize {
        self.ground_truth.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    fn grader() -> Grader {
        Grader::from_reference(&["a", "b", "a", "c"], GraderConfig::default()).unwrap()
    }

    #[test]
    fn test_ground_truth_is_encoded_reference() {
        let grader = grader();
        assert_eq!(grader.ground_truth(), &[0, 1, 0, 2]);
        assert_eq!(grader.expected_rows(), 4);
    }

    #[test]
    fn test_grade_table_uses_configured_column() {
        let grader = grader();
        let table = LabelTable::from_bytes(b"id,newsgroup\n1,a\n2,b\n3,a\n4,c\n").unwrap();
        assert_eq!(grader.grade(&table).unwrap(), 1.0);
    }

    #[test]
    fn test_grade_csv_missing_column() {
        let grader = grader();
        let err = grader.grade_csv(b"label\na\nb\na\nc\n").unwrap_err();
        assert!(matches!(err, GradeError::MissingColumn { .. }));
    }

    #[test]
    fn test_shape_checked_before_types() {
        let grader = grader();
        let cells = vec![Cell::Integer(1), Cell::Integer(2)];
        assert!(matches!(
            grader.grade_cells(&cells),
            Err(GradeError::ShapeMismatch {
                given: 2,
                expected: 4
            })
        ));
    }

    #[test]
    fn test_missing_entry_is_a_type_error() {
        let grader = grader();
        let err = grader.grade_csv(b"newsgroup\na\n\nb\nc\n");
        // the blank line is skipped by the CSV reader, leaving three rows
        assert!(matches!(err, Err(GradeError::ShapeMismatch { given: 3, .. })));

        let err = grader.grade_csv(b"id,newsgroup\n1,a\n2,\n3,a\n4,c\n").unwrap_err();
        assert!(matches!(err, GradeError::InvalidType { index: 1, value: Cell::Missing }));
        assert_eq!(err.to_string(), "Label 1 (nan) is missing instead of a string.");
    }

    #[test]
    fn test_micro_configuration() {
        let config = GraderConfig {
            averaging: Averaging::Micro,
            ..GraderConfig::default()
        };
        let grader = Grader::from_reference(&["a", "b", "a", "c"], config).unwrap();
        let score = grader.grade_labels(&["a", "b", "c", "c"]).unwrap();
        assert!((score - 0.75).abs() < 1e-12);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_every_unknown_label_is_logged() {
        let grader = grader();
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();

        let err = tracing::subscriber::with_default(subscriber, || {
            grader
                .grade_csv(b"newsgroup\na\nxenon\na\nyttrium\n")
                .unwrap_err()
        });

        // the error still names only the first offender
        assert!(matches!(err, GradeError::UnknownLabel { index: 1, .. }));
        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("submission contains unknown labels"));
        assert!(output.contains("count=2"));
        assert!(output.contains("xenon"));
        assert!(output.contains("yttrium"));
    }
}
