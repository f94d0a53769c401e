//! CSV table loading
//!
//! Submissions arrive as CSV with a header row. Every field is typed with
//! [`Cell::infer`]; reference data is read as plain text.

use crate::cell::Cell;
use crate::errors::{GradeError, Result};
use std::io::Read;
use std::path::Path;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A parsed submission table
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl LabelTable {
    /// Build a single-column table, mostly useful for callers that already
    /// hold the predictions in memory.
    pub fn from_column<S: Into<String>>(name: S, cells: Vec<Cell>) -> Self {
        Self {
            headers: vec![name.into()],
            rows: cells.into_iter().map(|cell| vec![cell]).collect(),
        }
    }

    /// Parse CSV bytes. Ragged rows are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers = reader
            .headers()?
            .iter()
            .map(|header| header.to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Cell::infer).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        Self::from_bytes(&buffer)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    /// Position of a header, if present
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Extract a column as an ordered sequence of cells.
    pub fn column(&self, name: &str) -> Result<Vec<Cell>> {
        let index = self
            .column_index(name)
            .ok_or_else(|| GradeError::MissingColumn {
                column: name.to_string(),
                available: self.headers.join(", "),
            })?;

        Ok(self
            .rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or(Cell::Missing))
            .collect())
    }

    /// Number of data rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read the reference label column from a CSV file.
///
/// Fields are returned verbatim; [`EncodingTable::build`] rejects any that a
/// submission could not reproduce as text.
///
/// [`EncodingTable::build`]: crate::encoder::EncodingTable::build
pub fn read_reference_labels<P: AsRef<Path>>(path: P, column: &str) -> Result<Vec<String>> {
    let bytes = std::fs::read(path.as_ref())?;
    reference_labels_from_bytes(&bytes, column)
}

pub fn reference_labels_from_bytes(bytes: &[u8], column: &str) -> Result<Vec<String>> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers = reader.headers()?.clone();
    let index = headers
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| GradeError::MissingColumn {
            column: column.to_string(),
            available: headers.iter().collect::<Vec<_>>().join(", "),
        })?;

    let mut labels = Vec::new();
    for record in reader.records() {
        let record = record?;
        labels.push(record.get(index).unwrap_or_default().to_string());
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_typed_cells() -> anyhow::Result<()> {
        let table = LabelTable::from_bytes(b"id,newsgroup\n1,sci.space\n2,5\n3,\n")?;

        assert_eq!(table.headers, vec!["id", "newsgroup"]);
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.column("newsgroup")?,
            vec![Cell::text("sci.space"), Cell::Integer(5), Cell::Missing]
        );
        assert_eq!(
            table.column("id")?,
            vec![Cell::Integer(1), Cell::Integer(2), Cell::Integer(3)]
        );
        Ok(())
    }

    #[test]
    fn test_missing_column() {
        let table = LabelTable::from_bytes(b"label\na\n").unwrap();
        let err = table.column("newsgroup").unwrap_err();
        assert!(matches!(err, GradeError::MissingColumn { .. }));
        assert!(err.to_string().contains("label"));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = LabelTable::from_bytes(b"a,b\n1,2\n3\n").unwrap_err();
        assert!(matches!(err, GradeError::Csv(_)));
    }

    #[test]
    fn test_bom_is_stripped() -> anyhow::Result<()> {
        let table = LabelTable::from_bytes(b"\xEF\xBB\xBFnewsgroup\nrec.autos\n")?;
        assert_eq!(table.column("newsgroup")?, vec![Cell::text("rec.autos")]);
        Ok(())
    }

    #[test]
    fn test_quoted_fields_with_commas() -> anyhow::Result<()> {
        let table = LabelTable::from_bytes(b"newsgroup\n\"talk, politics\"\n")?;
        assert_eq!(table.column("newsgroup")?, vec![Cell::text("talk, politics")]);
        Ok(())
    }

    #[test]
    fn test_reference_labels_read_verbatim() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "newsgroup,text")?;
        writeln!(file, "alt.atheism,hello")?;
        writeln!(file, "7,numbers")?;
        file.flush()?;

        let labels = read_reference_labels(file.path(), "newsgroup")?;
        assert_eq!(labels, vec!["alt.atheism".to_string(), "7".to_string()]);
        Ok(())
    }

    #[test]
    fn test_from_reader_matches_from_bytes() -> anyhow::Result<()> {
        let bytes: &[u8] = b"newsgroup\nsci.med\n3\n";
        let table = LabelTable::from_reader(std::io::Cursor::new(bytes))?;
        assert_eq!(table, LabelTable::from_bytes(bytes)?);
        assert_eq!(table.column("newsgroup")?, vec![Cell::text("sci.med"), Cell::Integer(3)]);
        Ok(())
    }
}
