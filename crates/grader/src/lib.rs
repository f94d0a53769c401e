//! Hackboard grader - submission validation and scoring
//!
//! Builds a label encoding table once from the reference answers and scores
//! candidate predictions against it with a configurable F1 average.

pub mod cell;
pub mod encoder;
pub mod errors;
pub mod grader;
pub mod metrics;
pub mod table;

pub use cell::Cell;
pub use encoder::EncodingTable;
pub use errors::{GradeError, Result};
pub use grader::{Grader, GraderConfig, DEFAULT_LABEL_COLUMN};
pub use metrics::{confusion_counts, f1_score, Averaging, ConfusionCounts};
pub use table::{read_reference_labels, reference_labels_from_bytes, LabelTable};
