//! Label encoding
//!
//! Maps the distinct reference labels to dense integer codes. Codes follow
//! the lexicographic order of the labels, so the same reference file always
//! produces the same table.

use crate::cell::Cell;
use crate::errors::{GradeError, Result};
use std::collections::{BTreeSet, HashMap};

/// Immutable label → code table built from the reference labels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodingTable {
    classes: Vec<String>,
    codes: HashMap<String, u32>,
}

impl EncodingTable {
    /// Build the table from the reference label sequence.
    ///
    /// Every label must infer as text, the same way submission fields are
    /// typed; numeric or empty labels are rejected.
    pub fn build<S: AsRef<str>>(reference_labels: &[S]) -> Result<Self> {
        if reference_labels.is_empty() {
            return Err(GradeError::EmptyReference);
        }
        for (index, label) in reference_labels.iter().enumerate() {
            let value = Cell::infer(label.as_ref());
            if !value.is_text() {
                return Err(GradeError::InvalidReference { index, value });
            }
        }

        let classes: Vec<String> = reference_labels
            .iter()
            .map(|label| label.as_ref())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        let codes = classes
            .iter()
            .enumerate()
            .map(|(code, label)| (label.clone(), code as u32))
            .collect();

        Ok(Self { classes, codes })
    }

    /// Encode labels, failing on the first one not present in the table.
    pub fn encode<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<u32>> {
        labels
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let label = label.as_ref();
                self.code_of(label).ok_or_else(|| GradeError::UnknownLabel {
                    index,
                    value: label.to_string(),
                })
            })
            .collect()
    }

    /// Encode raw cells. Every cell is type-checked and looked up in order.
    pub fn encode_cells(&self, cells: &[Cell]) -> Result<Vec<u32>> {
        cells
            .iter()
            .enumerate()
            .map(|(index, cell)| self.encode_cell(index, cell))
            .collect()
    }

    fn encode_cell(&self, index: usize, cell: &Cell) -> Result<u32> {
        let label = cell.as_text().ok_or_else(|| GradeError::InvalidType {
            index,
            value: cell.clone(),
        })?;
        self.code_of(label).ok_or_else(|| GradeError::UnknownLabel {
            index,
            value: label.to_string(),
        })
    }

    /// Every text cell that is not a known label, with its index. Cells of
    /// other types are left to the type check.
    pub fn unknown_labels(&self, cells: &[Cell]) -> Vec<(usize, String)> {
        cells
            .iter()
            .enumerate()
            .filter_map(|(index, cell)| {
                let label = cell.as_text()?;
                (!self.contains(label)).then(|| (index, label.to_string()))
            })
            .collect()
    }

    pub fn code_of(&self, label: &str) -> Option<u32> {
        self.codes.get(label).copied()
    }

    pub fn decode(&self, code: u32) -> Option<&str> {
        self.classes.get(code as usize).map(String::as_str)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.codes.contains_key(label)
    }

    /// Distinct labels in code order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
