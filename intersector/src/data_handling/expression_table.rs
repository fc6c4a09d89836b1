// Differential-expression table loading.
//
// Inputs arrive as CSV, TSV or spreadsheets straight out of DESeq2/edgeR-style
// tools. Columns are read by position: gene id, log2 fold change, p-value.

use std::collections::HashMap;
use std::path::Path;

use csv::ReaderBuilder;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::errors::{IntersectError, Result};
use crate::helper_functions::dataframe_to_tsv;
use crate::models::GeneExpressionRecord;

const EXPECTED_COLUMNS: usize = 3;

/// Tokens DE tools emit for missing statistics.
const NA_TOKENS: [&str; 5] = ["", "NA", "NaN", "nan", "N/A"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Spreadsheet,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(TableFormat::Csv),
            "tsv" | "txt" => Ok(TableFormat::Tsv),
            "xls" | "xlsx" | "xlsm" | "ods" => Ok(TableFormat::Spreadsheet),
            _ => Err(IntersectError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    /// Drop the first row as column names.
    pub has_header: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self { has_header: true }
    }
}

/// Normalized expression table, unique by gene id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionTable {
    records: Vec<GeneExpressionRecord>,
    index: HashMap<String, usize>,
}

impl ExpressionTable {
    pub fn load(path: &Path, options: &LoaderOptions) -> Result<Self> {
        let format = TableFormat::from_path(path)?;
        if !path.exists() {
            return Err(IntersectError::MissingInput(path.to_path_buf()));
        }
        info!("Reading {:?} expression table from {}", format, path.display());

        let rows = match format {
            TableFormat::Csv => read_text_rows(path, b',', options.has_header)?,
            TableFormat::Tsv => read_text_rows(path, b'\t', options.has_header)?,
            TableFormat::Spreadsheet => read_spreadsheet_rows(path, options.has_header)?,
        };

        // Rows are numbered as they appear in the file, header included.
        let first_row = if options.has_header { 2 } else { 1 };
        let mut table = ExpressionTable::default();
        for (i, row) in rows.into_iter().enumerate() {
            if let Some(record) = parse_row(path, first_row + i, row)? {
                table.push(record);
            }
        }

        info!("Loaded {} genes from {}", table.len(), path.display());
        Ok(table)
    }

    /// Adds a record; a repeated gene id overwrites the earlier values in place.
    pub fn push(&mut self, record: GeneExpressionRecord) {
        match self.index.get(&record.gene_id) {
            Some(&idx) => {
                debug!("Duplicate gene id {}; keeping the later row", record.gene_id);
                self.records[idx] = record;
            }
            None => {
                self.index.insert(record.gene_id.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn records(&self) -> &[GeneExpressionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        records_to_dataframe(&self.records)
    }

    /// Persists the canonical headerless TSV (gene, log2fc, pval).
    pub fn write_normalized(&self, path: &Path) -> Result<()> {
        let mut df = self.to_dataframe()?;
        dataframe_to_tsv(&mut df, path, false)?;
        Ok(())
    }
}

impl FromIterator<GeneExpressionRecord> for ExpressionTable {
    fn from_iter<I: IntoIterator<Item = GeneExpressionRecord>>(iter: I) -> Self {
        let mut table = ExpressionTable::default();
        for record in iter {
            table.push(record);
        }
        table
    }
}

pub fn records_to_dataframe(records: &[GeneExpressionRecord]) -> PolarsResult<DataFrame> {
    let genes = Series::new(
        PlSmallStr::from("gene"),
        records.iter().map(|r| r.gene_id.as_str()).collect::<Vec<_>>(),
    );
    let lfc = Series::new(
        PlSmallStr::from("log2fc"),
        records.iter().map(|r| r.log2_fold_change).collect::<Vec<f64>>(),
    );
    let pval = Series::new(
        PlSmallStr::from("pval"),
        records.iter().map(|r| r.p_value).collect::<Vec<f64>>(),
    );
    DataFrame::new(vec![Column::from(genes), Column::from(lfc), Column::from(pval)])
}

/// Raw cells of one row, still as text.
type RawRow = Vec<Option<String>>;

fn read_text_rows(path: &Path, separator: u8, has_header: bool) -> Result<Vec<RawRow>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(separator)
        .has_headers(has_header)
        .flexible(false)
        .from_path(path)?;

    if has_header {
        let header = reader.byte_headers()?;
        debug!("Expression table header has {} fields", header.len());
        if header.len() != EXPECTED_COLUMNS {
            return Err(IntersectError::ColumnCount {
                path: path.to_path_buf(),
                found: header.len(),
            });
        }
    }

    let mut out = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ragged_row(path, e))?;
        if record.len() != EXPECTED_COLUMNS {
            return Err(IntersectError::ColumnCount {
                path: path.to_path_buf(),
                found: record.len(),
            });
        }
        out.push(
            record
                .iter()
                .map(|field| {
                    let cell = String::from_utf8_lossy(field).into_owned();
                    (!cell.is_empty()).then_some(cell)
                })
                .collect(),
        );
    }
    debug!("Expression table has {} data rows", out.len());
    Ok(out)
}

/// A row whose width differs from the rows before it.
fn ragged_row(path: &Path, err: csv::Error) -> IntersectError {
    match err.kind() {
        csv::ErrorKind::UnequalLengths { pos, expected_len, len } => IntersectError::Malformed {
            path: path.to_path_buf(),
            row: pos.as_ref().map_or(0, |p| p.line() as usize),
            reason: format!("row has {len} fields, expected {expected_len}"),
        },
        _ => IntersectError::Csv(err),
    }
}

fn cell_to_string(cell: &calamine::DataType) -> Option<String> {
    use calamine::DataType as Ct;
    match cell {
        Ct::Empty => None,
        Ct::String(s) => Some(s.clone()),
        // Numeric ids such as Entrez come through as floats.
        Ct::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
        Ct::Float(n) => Some(n.to_string()),
        Ct::Int(i) => Some(i.to_string()),
        Ct::Bool(b) => Some(b.to_string()),
        Ct::DateTime(f) | Ct::Duration(f) => Some(f.to_string()),
        Ct::DateTimeIso(s) | Ct::DurationIso(s) => Some(s.clone()),
        Ct::Error(e) => Some(format!("ERR({e:?})")),
    }
}

fn read_spreadsheet_rows(path: &Path, has_header: bool) -> Result<Vec<RawRow>> {
    use calamine::{open_workbook_auto, Reader};

    let mut wb = open_workbook_auto(path)?;
    let range = wb.worksheet_range_at(0).ok_or_else(|| IntersectError::Malformed {
        path: path.to_path_buf(),
        row: 0,
        reason: "workbook has no worksheets".into(),
    })??;

    let mut rows = range.rows();
    if has_header {
        if let Some(header) = rows.next() {
            debug!("Spreadsheet header = {:?}", header.iter().map(cell_to_string).collect::<Vec<_>>());
        }
    }

    let mut out = Vec::with_capacity(range.height());
    for row in rows {
        let mut cells: RawRow = row.iter().map(cell_to_string).collect();
        // Formatting can extend the used range past the data.
        while cells.len() > EXPECTED_COLUMNS && cells.last().map_or(false, Option::is_none) {
            cells.pop();
        }
        if cells.iter().all(Option::is_none) {
            continue;
        }
        if cells.len() != EXPECTED_COLUMNS {
            return Err(IntersectError::ColumnCount {
                path: path.to_path_buf(),
                found: cells.len(),
            });
        }
        out.push(cells);
    }
    Ok(out)
}

fn parse_stat(path: &Path, row: usize, column: &str, raw: Option<&str>) -> Result<f64> {
    let value = raw.map(str::trim).unwrap_or("");
    if NA_TOKENS.contains(&value) {
        return Ok(f64::NAN);
    }
    value.parse::<f64>().map_err(|_| IntersectError::Malformed {
        path: path.to_path_buf(),
        row,
        reason: format!("{column} value `{value}` is not a number"),
    })
}

fn parse_row(path: &Path, row: usize, cells: RawRow) -> Result<Option<GeneExpressionRecord>> {
    let gene_id = cells[0].as_deref().map(str::trim).unwrap_or("").to_string();
    if gene_id.is_empty() {
        warn!("{}: row {} has no gene id; skipping", path.display(), row);
        return Ok(None);
    }
    let log2_fold_change = parse_stat(path, row, "log2 fold change", cells[1].as_deref())?;
    let p_value = parse_stat(path, row, "p-value", cells[2].as_deref())?;
    Ok(Some(GeneExpressionRecord {
        gene_id,
        log2_fold_change,
        p_value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.tsv")).unwrap(), TableFormat::Tsv);
        assert_eq!(TableFormat::from_path(Path::new("a.xlsx")).unwrap(), TableFormat::Spreadsheet);
        assert!(matches!(
            TableFormat::from_path(Path::new("a.bed")),
            Err(IntersectError::UnsupportedFormat(_))
        ));
        assert!(TableFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn loads_csv_positionally_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "deg.csv",
            "whatever,names,here\nG1,1.2,0.01\nG2,-0.9,0.02\nG3,0.1,0.5\n",
        );
        let table = ExpressionTable::load(&path, &LoaderOptions::default()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.records()[1],
            GeneExpressionRecord { gene_id: "G2".into(), log2_fold_change: -0.9, p_value: 0.02 }
        );
    }

    #[test]
    fn headerless_tsv_keeps_first_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deg.tsv", "G1\t1.2\t0.01\nG2\t-0.9\t0.02\n");
        let table = ExpressionTable::load(&path, &LoaderOptions { has_header: false }).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].gene_id, "G1");
    }

    #[test]
    fn later_duplicate_overwrites_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deg.tsv", "g\tl\tp\nG1\t1.2\t0.01\nG2\t0.3\t0.5\nG1\t-2.0\t0.001\n");
        let table = ExpressionTable::load(&path, &LoaderOptions::default()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0].gene_id, "G1");
        assert_eq!(table.records()[0].log2_fold_change, -2.0);
    }

    #[test]
    fn na_statistics_load_as_nan() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deg.csv", "g,l,p\nG1,NA,0.01\nG2,1.0,\n");
        let table = ExpressionTable::load(&path, &LoaderOptions::default()).unwrap();
        assert!(table.records()[0].log2_fold_change.is_nan());
        assert!(table.records()[1].p_value.is_nan());
    }

    #[test]
    fn wrong_column_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deg.csv", "g,base,l,p\nG1,10,1.2,0.01\n");
        let err = ExpressionTable::load(&path, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, IntersectError::ColumnCount { found: 4, .. }));
    }

    #[test]
    fn short_row_is_rejected_with_its_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deg.csv", "g,l,p\nG1,1.2,0.01\nG2,-0.9\n");
        let err = ExpressionTable::load(&path, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, IntersectError::Malformed { row: 3, .. }), "{err:?}");

        let tsv = write(dir.path(), "deg.tsv", "G1\t1.2\t0.01\nG2\t-0.9\t0.02\t7\n");
        let err = ExpressionTable::load(&tsv, &LoaderOptions { has_header: false }).unwrap_err();
        assert!(matches!(err, IntersectError::Malformed { row: 2, .. }), "{err:?}");
    }

    #[test]
    fn non_numeric_statistic_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "deg.csv", "g,l,p\nG1,1.2,0.01\nG2,high,0.01\n");
        let err = ExpressionTable::load(&path, &LoaderOptions::default()).unwrap_err();
        assert!(matches!(err, IntersectError::Malformed { row: 3, .. }));
    }

    #[test]
    fn missing_file_and_bad_extension() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.csv");
        assert!(matches!(
            ExpressionTable::load(&missing, &LoaderOptions::default()),
            Err(IntersectError::MissingInput(_))
        ));
        let bed = write(dir.path(), "peaks.bed", "chr1\t1\t2\n");
        assert!(matches!(
            ExpressionTable::load(&bed, &LoaderOptions::default()),
            Err(IntersectError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn normalized_artifact_has_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let table: ExpressionTable = vec![
            GeneExpressionRecord { gene_id: "G1".into(), log2_fold_change: 1.5, p_value: 0.01 },
            GeneExpressionRecord { gene_id: "G2".into(), log2_fold_change: -2.0, p_value: 0.5 },
        ]
        .into_iter()
        .collect();
        let out = dir.path().join("new_deg_file.tsv");
        table.write_normalized(&out).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("G1\t"));

        let reread = ExpressionTable::load(&out, &LoaderOptions { has_header: false }).unwrap();
        assert_eq!(reread, table);
    }
}
