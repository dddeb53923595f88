//! CSV interchange
//!
//! Readers and writers for every tabular input and artifact: edge lists,
//! gene index, drug-target and expression tables, synergy records, raw
//! chemical target lists and labeled matrices (first column = row label).

use crate::matrix::{LabeledMatrix, MatrixError};
use crate::network::{parse_gene_id, Edge, Gene, GeneUniverse};
use ndarray::Array2;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Table errors
#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} line {line}: invalid {what} {value:?}")]
    InvalidValue {
        path: PathBuf,
        line: u64,
        what: &'static str,
        value: String,
    },

    #[error("{path:?} has no column named {column:?}")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path:?}: {source}")]
    Matrix {
        path: PathBuf,
        #[source]
        source: MatrixError,
    },
}

pub type TableResult<T> = Result<T, TableError>;

/// One synergy measurement of a drug pair on a cell line
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SynergyRecord {
    #[serde(rename = "drug_a_name")]
    pub drug_a: String,
    #[serde(rename = "drug_b_name")]
    pub drug_b: String,
    pub cell_line: String,
    pub synergy: f64,
}

/// Raw chemical with its comma-separated entrez targets
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChemicalRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "combin_entrez", default)]
    pub targets: Option<String>,
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> TableError + '_ {
    move |source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn reader(path: &Path, delimiter: u8, has_headers: bool) -> TableResult<csv::Reader<fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error(path))
}

fn line_of(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn parse_f64(path: &Path, record: &csv::StringRecord, raw: &str, what: &'static str) -> TableResult<f64> {
    // Blank cells read as 0
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.parse::<f64>().map_err(|_| TableError::InvalidValue {
        path: path.to_path_buf(),
        line: line_of(record),
        what,
        value: raw.to_string(),
    })
}

/// Read an `entrez_a, entrez_b, association` edge list.
///
/// A header row is skipped when `has_headers` is set; columns beyond the
/// third are ignored.
pub fn read_edge_list(path: &Path, delimiter: u8, has_headers: bool) -> TableResult<Vec<Edge>> {
    let mut rdr = reader(path, delimiter, has_headers)?;
    let mut edges = Vec::new();

    for result in rdr.records() {
        let record = result.map_err(csv_error(path))?;
        if record.len() < 3 {
            return Err(TableError::InvalidValue {
                path: path.to_path_buf(),
                line: line_of(&record),
                what: "edge row",
                value: record.iter().collect::<Vec<_>>().join(","),
            });
        }

        let gene = |raw: &str| {
            parse_gene_id(raw).ok_or_else(|| TableError::InvalidValue {
                path: path.to_path_buf(),
                line: line_of(&record),
                what: "entrez id",
                value: raw.to_string(),
            })
        };
        let a = gene(&record[0])?;
        let b = gene(&record[1])?;
        let association = parse_f64(path, &record, &record[2], "association")?;
        edges.push(Edge::new(a, b, association));
    }

    debug!("Read {} edges from {:?}", edges.len(), path);
    Ok(edges)
}

/// Read the gene index (`entrez` column required, `symbol` optional)
pub fn read_gene_index(path: &Path) -> TableResult<GeneUniverse> {
    let mut rdr = reader(path, b',', true)?;
    let headers = rdr.headers().map_err(csv_error(path))?.clone();

    let entrez_col = headers
        .iter()
        .position(|h| h == "entrez")
        .ok_or_else(|| TableError::MissingColumn {
            path: path.to_path_buf(),
            column: "entrez".to_string(),
        })?;
    let symbol_col = headers.iter().position(|h| h == "symbol");

    let mut genes = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_error(path))?;
        let raw = record.get(entrez_col).unwrap_or("");
        let entrez = parse_gene_id(raw).ok_or_else(|| TableError::InvalidValue {
            path: path.to_path_buf(),
            line: line_of(&record),
            what: "entrez id",
            value: raw.to_string(),
        })?;
        let symbol = symbol_col
            .and_then(|c| record.get(c))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        genes.push(Gene { entrez, symbol });
    }

    let universe = GeneUniverse::new(genes);
    debug!("Read {} genes from {:?}", universe.len(), path);
    Ok(universe)
}

/// Read a labeled matrix: header row of column labels (its first cell is the
/// index name and ignored), then one row per label.
pub fn read_matrix(path: &Path) -> TableResult<LabeledMatrix> {
    let mut rdr = reader(path, b',', true)?;
    let headers = rdr.headers().map_err(csv_error(path))?.clone();
    let cols: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    let mut flat = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_error(path))?;
        if record.len() != cols.len() + 1 {
            return Err(TableError::Matrix {
                path: path.to_path_buf(),
                source: MatrixError::ShapeMismatch {
                    context: format!("cells on line {}", line_of(&record)),
                    expected: cols.len() + 1,
                    found: record.len(),
                },
            });
        }
        rows.push(record[0].to_string());
        for raw in record.iter().skip(1) {
            flat.push(parse_f64(path, &record, raw, "matrix value")?);
        }
    }

    let values = Array2::from_shape_vec((rows.len(), cols.len()), flat).map_err(|_| {
        TableError::Matrix {
            path: path.to_path_buf(),
            source: MatrixError::ShapeMismatch {
                context: "matrix cells".to_string(),
                expected: rows.len() * cols.len(),
                found: 0,
            },
        }
    })?;

    LabeledMatrix::new(rows, cols, values).map_err(|source| TableError::Matrix {
        path: path.to_path_buf(),
        source,
    })
}

/// Write a labeled matrix, replacing any existing file. Values use the
/// shortest representation that parses back to the same `f64`.
pub fn write_matrix(path: &Path, matrix: &LabeledMatrix) -> TableResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| TableError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut wtr = csv::Writer::from_path(path).map_err(csv_error(path))?;

    let mut header = Vec::with_capacity(matrix.ncols() + 1);
    header.push(String::new());
    header.extend(matrix.col_labels().iter().cloned());
    wtr.write_record(&header).map_err(csv_error(path))?;

    for (label, row) in matrix.row_labels().iter().zip(matrix.values().rows()) {
        let mut record = Vec::with_capacity(row.len() + 1);
        record.push(label.clone());
        record.extend(row.iter().map(|v| v.to_string()));
        wtr.write_record(&record).map_err(csv_error(path))?;
    }

    wtr.flush().map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Read raw rows (header skipped), e.g. drug pairs
pub fn read_rows(path: &Path) -> TableResult<Vec<Vec<String>>> {
    let mut rdr = reader(path, b',', true)?;
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(csv_error(path))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn read_records<T>(path: &Path) -> TableResult<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let mut rdr = reader(path, b',', true)?;
    let mut out = Vec::new();
    for result in rdr.deserialize() {
        out.push(result.map_err(csv_error(path))?);
    }
    Ok(out)
}

/// Read synergy records (`drug_a_name, drug_b_name, cell_line, synergy`)
pub fn read_synergy(path: &Path) -> TableResult<Vec<SynergyRecord>> {
    let records = read_records(path)?;
    debug!("Read {} synergy records from {:?}", records.len(), path);
    Ok(records)
}

/// Read raw chemicals (`Name, combin_entrez`)
pub fn read_chemicals(path: &Path) -> TableResult<Vec<ChemicalRecord>> {
    read_records(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_edge_list_tab_separated_without_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("network");
        fs::write(&path, "1\t2\t0.4\n2\t3.0\t0.6\n").unwrap();

        let edges = read_edge_list(&path, b'\t', false).unwrap();
        assert_eq!(edges, vec![Edge::new(1, 2, 0.4), Edge::new(2, 3, 0.6)]);
    }

    #[test]
    fn test_read_edge_list_rejects_bad_id() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("network.csv");
        fs::write(&path, "entrez_a,entrez_b,association\n1,abc,0.4\n").unwrap();

        let err = read_edge_list(&path, b',', true).unwrap_err();
        assert!(matches!(err, TableError::InvalidValue { what: "entrez id", .. }));
    }

    #[test]
    fn test_read_gene_index() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("genes.csv");
        fs::write(&path, "symbol,entrez\nTP53,7157\nKRAS,3845\n").unwrap();

        let genes = read_gene_index(&path).unwrap();
        assert_eq!(genes.ids().collect::<Vec<_>>(), vec![7157, 3845]);
        assert_eq!(genes.resolve("KRAS"), Some(3845));
    }

    #[test]
    fn test_read_gene_index_requires_entrez() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("genes.csv");
        fs::write(&path, "symbol\nTP53\n").unwrap();

        assert!(matches!(
            read_gene_index(&path),
            Err(TableError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_read_matrix_with_blank_cells() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("m.csv");
        fs::write(&path, "gene,DrugA,DrugB\nTP53,1,\nKRAS,0,1\n").unwrap();

        let m = read_matrix(&path).unwrap();
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.get("TP53", "DrugB"), Some(0.0));
        assert_eq!(m.get("KRAS", "DrugB"), Some(1.0));
    }

    #[test]
    fn test_read_synergy_ignores_extra_columns() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("synergy.csv");
        fs::write(
            &path,
            ",drug_a_name,drug_b_name,cell_line,synergy\n5-FU_ABT-888_A2058,5-FU,ABT-888,A2058,7.69\n",
        )
        .unwrap();

        let records = read_synergy(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].drug_b, "ABT-888");
        assert_eq!(records[0].cell_line, "A2058");
    }

    #[test]
    fn test_read_chemicals_missing_targets() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("chemicals.csv");
        fs::write(&path, "Name,combin_entrez\nA,\"1,2\"\nB,\n").unwrap();

        let chemicals = read_chemicals(&path).unwrap();
        assert_eq!(chemicals[0].targets.as_deref(), Some("1,2"));
        assert_eq!(chemicals[1].targets, None);
    }
}
