use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;
use tempfile::NamedTempFile;

/// An in-memory CSV table: one header row plus string cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Build a dataset from headers and rows
    /// Every row must have exactly one cell per header
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        for (index, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                anyhow::bail!(
                    "Row {} has {} fields, expected {}",
                    index,
                    row.len(),
                    headers.len()
                );
            }
        }
        Ok(Self { headers, rows })
    }

    /// Load a whole CSV file into memory
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to read CSV {}", path.display()))
    }

    /// Parse CSV from any reader. The first record is the header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new().from_reader(reader);

        let headers = csv_reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (index, record) in csv_reader.records().enumerate() {
            let record = record.with_context(|| format!("Malformed record at row {}", index))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Read only the header row of a CSV file
    pub fn read_headers(path: &Path) -> Result<Vec<String>> {
        let mut csv_reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers = csv_reader
            .headers()
            .with_context(|| format!("Failed to read header row of {}", path.display()))?;
        Ok(headers.iter().map(str::to_string).collect())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Number of data rows (the header is not counted)
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Like [`Dataset::column_index`] but fails with a message listing the available columns
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Column '{}' not found (available: {})",
                name,
                self.headers.join(", ")
            )
        })
    }

    /// Cell value at (row, column)
    pub fn value(&self, row: usize, column: usize) -> &str {
        &self.rows[row][column]
    }

    /// Copy of a contiguous range of rows with the same headers
    pub fn slice(&self, range: Range<usize>) -> Dataset {
        Dataset {
            headers: self.headers.clone(),
            rows: self.rows[range].to_vec(),
        }
    }

    /// Replace the column `name` with `values`, or append it if it doesn't exist
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            anyhow::bail!(
                "Column '{}' has {} values but the dataset has {} rows",
                name,
                values.len(),
                self.rows.len()
            );
        }

        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }

        Ok(())
    }

    /// Append the rows of another dataset with identical headers
    pub fn extend(&mut self, other: Dataset) -> Result<()> {
        if self.headers != other.headers {
            anyhow::bail!(
                "Header mismatch: [{}] vs [{}]",
                self.headers.join(", "),
                other.headers.join(", ")
            );
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Write as CSV (header first) to any writer
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.headers)?;
        for row in &self.rows {
            csv_writer.write_record(row)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Write as CSV to `path`, atomically.
    ///
    /// The data goes to a temp file in the destination directory which then
    /// replaces `path`, so a crash never leaves a half-written file behind.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;

        let temp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;

        let mut buffered = BufWriter::new(temp);
        self.write_to(&mut buffered)?;
        let temp = buffered
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush {}: {}", path.display(), e.error()))?;

        temp.persist(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
