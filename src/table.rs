//! Percentile-table CSV: the writer used by the table generator and the
//! reader used by plotting consumers.
//!
//! One row per `(alpha, total, prop_w)` combination:
//!
//! ```text
//! alpha,total,prop_w,bpa_25,bpa_50,bpa_75,bpa_90,bpa_99,bbp_25,bbp_50,bbp_75,bbp_90,bbp_99
//! ```
//!
//! `bpa_*` columns are fractions of the population, `bbp_*` columns are
//! sampling rates.  Rows are flushed as soon as they are written so a long
//! run keeps its finished combinations if it is interrupted.

use crate::error::{AuditError, Result};
use crate::quantile::{PercentileSummary, QUANTILES};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header line of the percentile table.
pub const TABLE_HEADER: &str =
    "alpha,total,prop_w,bpa_25,bpa_50,bpa_75,bpa_90,bpa_99,bbp_25,bbp_50,bbp_75,bbp_90,bbp_99";

/// Value substituted when a table lacks `bbp_90`.
pub const MISSING_BBP_90: f64 = 0.01;

/// Splits one CSV line into fields, honouring double quotes.
pub(crate) fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// Parses a ballot count, ignoring thousands separators.
pub(crate) fn parse_count(raw: &str, field: &str, line: usize) -> Result<u64> {
    let cleaned: String = raw
        .chars()
        .filter(|ch| !matches!(ch, ',' | '_') && !ch.is_whitespace())
        .collect();
    cleaned.parse::<u64>().map_err(|_| AuditError::InvalidNumber {
        line,
        field: field.to_string(),
        value: raw.to_string(),
    })
}

fn parse_real(raw: &str, field: &str, line: usize) -> Result<f64> {
    raw.trim().parse::<f64>().map_err(|_| AuditError::InvalidNumber {
        line,
        field: field.to_string(),
        value: raw.to_string(),
    })
}

/// Column positions of a CSV header.
#[derive(Debug, Clone)]
pub(crate) struct HeaderIndex {
    columns: HashMap<String, usize>,
}

impl HeaderIndex {
    /// Indexes `line`, failing if any of `required` is absent.
    pub(crate) fn parse(line: &str, required: &[&str]) -> Result<Self> {
        let columns: HashMap<String, usize> = split_record(line)
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (name.trim().to_string(), idx))
            .collect();
        if let Some(missing) = required.iter().find(|name| !columns.contains_key(**name)) {
            return Err(AuditError::MissingColumn((*missing).to_string()));
        }
        Ok(Self { columns })
    }

    /// Non-empty value of `name`, if present.
    pub(crate) fn optional<'f>(&self, fields: &'f [String], name: &str) -> Option<&'f str> {
        self.columns
            .get(name)
            .and_then(|&idx| fields.get(idx))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Non-empty value of `name`, or a [`AuditError::MissingField`].
    pub(crate) fn field<'f>(&self, fields: &'f [String], name: &str, line: usize) -> Result<&'f str> {
        self.optional(fields, name)
            .ok_or_else(|| AuditError::MissingField {
                line,
                field: name.to_string(),
            })
    }
}

/// One parameter combination of the percentile table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    /// Risk limit.
    pub alpha: f64,
    /// Population size.
    pub total: u64,
    /// Winner's share of the population.
    pub prop_w: f64,
    /// Monte-Carlo workload fractions.
    pub bpa: PercentileSummary,
    /// Analytic sampling rates.
    pub bbp: PercentileSummary,
}

impl TableRow {
    /// CSV line without the trailing newline.
    pub fn to_csv_line(&self) -> String {
        let mut fields = vec![
            self.alpha.to_string(),
            self.total.to_string(),
            self.prop_w.to_string(),
        ];
        fields.extend(self.bpa.values().iter().map(f64::to_string));
        fields.extend(self.bbp.values().iter().map(f64::to_string));
        fields.join(",")
    }
}

/// Writes the percentile table, flushing after every row.
#[derive(Debug)]
pub struct TableWriter<W: Write> {
    inner: W,
    rows: usize,
}

impl TableWriter<BufWriter<File>> {
    /// Creates `path` (and its parent directories) and writes the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> TableWriter<W> {
    /// Wraps `inner` and writes the header.
    pub fn new(mut inner: W) -> Result<Self> {
        writeln!(inner, "{TABLE_HEADER}")?;
        inner.flush()?;
        Ok(Self { inner, rows: 0 })
    }

    /// Appends `row` and flushes it.
    pub fn write_row(&mut self, row: &TableRow) -> Result<()> {
        writeln!(self.inner, "{}", row.to_csv_line())?;
        self.inner.flush()?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// A percentile table read back for plotting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotTable {
    rows: Vec<TableRow>,
}

impl PlotTable {
    /// Parses a table written by [`TableWriter`].
    ///
    /// A missing `bbp_90` column or value is read as `0.01`.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines().enumerate();
        let header_line = match lines.next() {
            Some((_, line)) => line?,
            None => return Ok(Self::default()),
        };
        let mut required = vec!["alpha".to_string(), "total".into(), "prop_w".into()];
        for prefix in ["bpa", "bbp"] {
            for q in QUANTILES {
                if prefix == "bbp" && q == 90 {
                    continue;
                }
                required.push(format!("{prefix}_{q}"));
            }
        }
        let required_refs: Vec<&str> = required.iter().map(String::as_str).collect();
        let header = HeaderIndex::parse(&header_line, &required_refs)?;

        let mut rows = Vec::new();
        for (idx, line) in lines {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = idx + 1;
            let fields = split_record(&line);
            let real = |name: &str| -> Result<f64> {
                parse_real(header.field(&fields, name, line_no)?, name, line_no)
            };
            let summary = |prefix: &str| -> Result<PercentileSummary> {
                let mut values = [0.0; 5];
                for (slot, q) in values.iter_mut().zip(QUANTILES) {
                    let name = format!("{prefix}_{q}");
                    *slot = match (prefix, q) {
                        ("bbp", 90) => match header.optional(&fields, &name) {
                            Some(raw) if raw != "None" => parse_real(raw, &name, line_no)?,
                            _ => MISSING_BBP_90,
                        },
                        _ => real(&name)?,
                    };
                }
                Ok(PercentileSummary::new(values))
            };
            rows.push(TableRow {
                alpha: real("alpha")?,
                total: parse_count(header.field(&fields, "total", line_no)?, "total", line_no)?,
                prop_w: real("prop_w")?,
                bpa: summary("bpa")?,
                bbp: summary("bbp")?,
            });
        }
        Ok(Self { rows })
    }

    /// Reads the table stored at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::read(std::io::BufReader::new(file))
    }

    /// All rows in file order.
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Row for `(alpha, prop_w, total)`.
    pub fn get(&self, alpha: f64, prop_w: f64, total: u64) -> Option<&TableRow> {
        self.rows.iter().find(|row| {
            row.total == total
                && (row.alpha - alpha).abs() < 1e-9
                && (row.prop_w - prop_w).abs() < 1e-9
        })
    }
}

/// Default output location relative to the working directory.
pub fn default_output() -> PathBuf {
    PathBuf::from("data.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn sample_row() -> TableRow {
        TableRow {
            alpha: 0.1,
            total: 10_000,
            prop_w: 0.55,
            bpa: PercentileSummary::new([0.01, 0.02, 0.04, 0.07, 0.15]),
            bbp: PercentileSummary::new([0.02, 0.03, 0.05, 0.08, 0.2]),
        }
    }

    #[test]
    fn splits_quoted_fields() {
        assert_eq!(
            split_record("a,\"1,234\",\"say \"\"hi\"\"\",\r"),
            vec!["a", "1,234", "say \"hi\"", ""]
        );
    }

    #[test]
    fn counts_ignore_thousands_separators() {
        assert_eq!(parse_count(" 1,234,567 ", "total", 1).unwrap(), 1_234_567);
        assert!(matches!(
            parse_count("12.5", "total", 3),
            Err(AuditError::InvalidNumber { line: 3, .. })
        ));
    }

    #[test]
    fn row_format_matches_header() {
        let line = sample_row().to_csv_line();
        assert_eq!(line, "0.1,10000,0.55,0.01,0.02,0.04,0.07,0.15,0.02,0.03,0.05,0.08,0.2");
        assert_eq!(line.split(',').count(), TABLE_HEADER.split(',').count());
    }

    #[test]
    fn writer_output_reads_back() {
        let mut writer = TableWriter::new(Vec::new()).unwrap();
        writer.write_row(&sample_row()).unwrap();
        assert_eq!(writer.rows(), 1);
        let bytes = writer.into_inner();
        let table = PlotTable::read(Cursor::new(bytes)).unwrap();
        assert_eq!(table.rows(), &[sample_row()]);
        assert!(table.get(0.1, 0.55, 10_000).is_some());
        assert!(table.get(0.05, 0.55, 10_000).is_none());
    }

    #[test]
    fn missing_bbp_90_defaults() {
        let csv = format!(
            "{TABLE_HEADER}\n0.1,100,0.6,0.1,0.2,0.3,0.4,0.5,0.1,0.2,0.3,,0.5\n\
             0.1,100,0.7,0.1,0.2,0.3,0.4,0.5,0.1,0.2,0.3,None,0.5\n"
        );
        let table = PlotTable::read(Cursor::new(csv)).unwrap();
        for row in table.rows() {
            assert_eq!(row.bbp.get(90), Some(MISSING_BBP_90));
        }

        let without_column = "alpha,total,prop_w,bpa_25,bpa_50,bpa_75,bpa_90,bpa_99,bbp_25,bbp_50,bbp_75,bbp_99\n\
                              0.1,100,0.6,0.1,0.2,0.3,0.4,0.5,0.1,0.2,0.3,0.5\n";
        let table = PlotTable::read(Cursor::new(without_column)).unwrap();
        assert_eq!(table.rows()[0].bbp.get(90), Some(MISSING_BBP_90));
        assert_eq!(table.rows()[0].bbp.get(99), Some(0.5));
    }

    #[test]
    fn missing_required_value_fails() {
        let csv = format!("{TABLE_HEADER}\n0.1,100,,0.1,0.2,0.3,0.4,0.5,0.1,0.2,0.3,0.4,0.5\n");
        assert!(matches!(
            PlotTable::read(Cursor::new(csv)),
            Err(AuditError::MissingField { line: 2, .. })
        ));
    }

    #[test]
    fn create_writes_header_to_disk() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("audit_power_table_{unique}"));
        let path = dir.join("nested").join("data.csv");
        let mut writer = TableWriter::create(&path).unwrap();
        writer.write_row(&sample_row()).unwrap();
        drop(writer);
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with(TABLE_HEADER));
        assert_eq!(contents.lines().count(), 2);
        let table = PlotTable::open(&path).unwrap();
        assert_eq!(table.rows().len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }
}
