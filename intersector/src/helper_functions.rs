use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, warn};

pub fn dataframe_to_tsv(df: &mut DataFrame, path: &Path, include_header: bool) -> PolarsResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(include_header)
        .with_separator(b'\t')
        .finish(df)?;
    debug!("Wrote {} rows to {}", df.height(), path.display());
    Ok(())
}

/// One gene per line, in iteration order.
pub fn write_lines<'a>(path: &Path, lines: impl IntoIterator<Item = &'a str>) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for line in lines {
        writeln!(out, "{line}")?;
    }
    out.flush()
}

/// Removes an intermediate file; a failure is only worth a warning.
pub fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed intermediate {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not delete intermediate {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsv_header_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tsv");
        let mut df = df!("gene" => ["A", "B"], "pval" => ["0.01", "0.2"]).unwrap();

        dataframe_to_tsv(&mut df, &path, true).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "gene\tpval\nA\t0.01\nB\t0.2\n");
        dataframe_to_tsv(&mut df, &path, false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A\t0.01\nB\t0.2\n");
    }

    #[test]
    fn write_lines_terminates_each_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.txt");
        write_lines(&path, ["Myc", "Sox2"]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Myc\nSox2\n");
    }
}
