use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::field::find_col_index;

/// One column-restricted fragment of the dataset.
#[derive(Debug, Clone)]
pub struct Batch {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Precomputed per-column min/max, when the source can report them cheaply.
#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    pub min: HashMap<String, f64>,
    pub max: HashMap<String, f64>,
}

impl ColumnStats {
    pub fn min_of(&self, column: &str) -> Option<f64> {
        self.min.get(column).copied()
    }

    pub fn max_of(&self, column: &str) -> Option<f64> {
        self.max.get(column).copied()
    }
}

/// A finite tabular data source. `scan` starts a fresh pass over the data
/// each time it is called; the returned iterator itself is not restartable.
pub trait DataSource {
    /// Origin identifier, reported in the output descriptor.
    fn name(&self) -> &str;

    /// Format tag, reported in the output descriptor.
    fn format(&self) -> &str;

    fn headers(&self) -> &[String];

    fn stats(&self) -> Option<&ColumnStats> {
        None
    }

    /// Lazily yield batches restricted to `columns`, in order.
    fn scan<'a>(&'a self, columns: &[String]) -> Result<BatchIter<'a>>;
}

pub type BatchIter<'a> = Box<dyn Iterator<Item = Result<Batch>> + 'a>;

// =============================================================================
// CSV source
// =============================================================================

/// CSV-backed source. With a chunk size, `scan` yields fixed-size row
/// fragments; without one, the whole file arrives as a single batch.
pub struct CsvSource {
    path: PathBuf,
    display: String,
    headers: Vec<String>,
    chunk_size: Option<usize>,
}

impl CsvSource {
    pub fn open(path: impl AsRef<Path>, chunk_size: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !ext.eq_ignore_ascii_case("csv") {
            return Err(Error::FormatMismatch {
                expected: ".csv".to_string(),
                path: path.display().to_string(),
            });
        }

        let mut rdr = csv::Reader::from_path(&path)?;
        let headers = rdr.headers()?.iter().map(|h| h.to_string()).collect();

        Ok(Self {
            display: path.display().to_string(),
            path,
            headers,
            chunk_size,
        })
    }
}

impl DataSource for CsvSource {
    fn name(&self) -> &str {
        &self.display
    }

    fn format(&self) -> &str {
        "csv"
    }

    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn scan<'a>(&'a self, columns: &[String]) -> Result<BatchIter<'a>> {
        let take = restrict(&self.headers, columns)?;
        let headers: Vec<String> = take.iter().map(|&i| self.headers[i].clone()).collect();
        let rdr = csv::Reader::from_path(&self.path)?;
        Ok(Box::new(CsvScan {
            records: rdr.into_records(),
            take,
            headers,
            chunk_size: self.chunk_size,
            done: false,
        }))
    }
}

struct CsvScan {
    records: csv::StringRecordsIntoIter<File>,
    take: Vec<usize>,
    headers: Vec<String>,
    chunk_size: Option<usize>,
    done: bool,
}

impl Iterator for CsvScan {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let limit = self.chunk_size.unwrap_or(usize::MAX);
        let mut rows = Vec::new();
        for record in self.records.by_ref() {
            let record = match record {
                Ok(r) => r,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };
            let row = self
                .take
                .iter()
                .map(|&i| record.get(i).unwrap_or("").to_string())
                .collect();
            rows.push(row);
            if rows.len() >= limit {
                return Some(Ok(Batch {
                    headers: self.headers.clone(),
                    rows,
                }));
            }
        }
        self.done = true;
        if rows.is_empty() {
            None
        } else {
            Some(Ok(Batch {
                headers: self.headers.clone(),
                rows,
            }))
        }
    }
}

// =============================================================================
// In-memory source
// =============================================================================

/// Source over rows already in memory. Used by tests and embedders.
pub struct MemorySource {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    stats: Option<ColumnStats>,
    batch_size: Option<usize>,
}

impl MemorySource {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: "memory".to_string(),
            headers,
            rows,
            stats: None,
            batch_size: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_stats(mut self, stats: ColumnStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Yield rows in fragments of `n` instead of a single batch.
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }
}

impl DataSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> &str {
        "memory"
    }

    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn stats(&self) -> Option<&ColumnStats> {
        self.stats.as_ref()
    }

    fn scan<'a>(&'a self, columns: &[String]) -> Result<BatchIter<'a>> {
        let take = restrict(&self.headers, columns)?;
        let headers: Vec<String> = take.iter().map(|&i| self.headers[i].clone()).collect();
        let size = self.batch_size.unwrap_or(usize::MAX).max(1);
        let batches: Vec<Batch> = self
            .rows
            .chunks(size.min(self.rows.len().max(1)))
            .map(|chunk| Batch {
                headers: headers.clone(),
                rows: chunk
                    .iter()
                    .map(|row| take.iter().map(|&i| row[i].clone()).collect())
                    .collect(),
            })
            .collect();
        Ok(Box::new(batches.into_iter().map(Ok)))
    }
}

/// Map requested column names to indices, deduplicating while preserving
/// request order.
fn restrict(headers: &[String], columns: &[String]) -> Result<Vec<usize>> {
    let mut take = Vec::new();
    for name in columns {
        let idx = find_col_index(headers, name)?;
        if !take.contains(&idx) {
            take.push(idx);
        }
    }
    Ok(take)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_source(batch_size: Option<usize>) -> MemorySource {
        let source = MemorySource::new(
            vec!["x".to_string(), "y".to_string(), "cat".to_string()],
            vec![
                vec!["1".to_string(), "2".to_string(), "A".to_string()],
                vec!["3".to_string(), "4".to_string(), "B".to_string()],
                vec!["5".to_string(), "6".to_string(), "A".to_string()],
            ],
        );
        match batch_size {
            Some(n) => source.with_batch_size(n),
            None => source,
        }
    }

    #[test]
    fn test_memory_single_batch() {
        let source = make_source(None);
        let cols = vec!["x".to_string(), "cat".to_string()];
        let batches: Vec<Batch> = source.scan(&cols).unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].headers, vec!["x", "cat"]);
        assert_eq!(batches[0].rows[1], vec!["3", "B"]);
    }

    #[test]
    fn test_memory_chunked() {
        let source = make_source(Some(2));
        let cols = vec!["x".to_string(), "y".to_string(), "cat".to_string()];
        let batches: Vec<Batch> = source.scan(&cols).unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].rows.len(), 2);
        assert_eq!(batches[1].rows.len(), 1);
    }

    #[test]
    fn test_memory_rescan_is_fresh() {
        let source = make_source(Some(2));
        let cols = vec!["x".to_string()];
        let first: usize = source.scan(&cols).unwrap().count();
        let second: usize = source.scan(&cols).unwrap().count();
        assert_eq!(first, second);
    }

    #[test]
    fn test_restrict_unknown_column() {
        let source = make_source(None);
        let result = source.scan(&vec!["nope".to_string()]);
        assert!(matches!(result, Err(Error::MissingColumn { .. })));
    }

    #[test]
    fn test_csv_extension_check() {
        let result = CsvSource::open("data.parq", None);
        assert!(matches!(result, Err(Error::FormatMismatch { .. })));
    }

    #[test]
    fn test_csv_scan_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "x,y,cat").unwrap();
        for i in 0..5 {
            writeln!(f, "{},{},A", i, i * 2).unwrap();
        }

        let source = CsvSource::open(&path, Some(2)).unwrap();
        assert_eq!(source.format(), "csv");
        assert_eq!(source.headers(), &["x", "y", "cat"]);

        let cols = vec!["x".to_string(), "y".to_string()];
        let batches: Vec<Batch> = source.scan(&cols).unwrap().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].rows, vec![vec!["0", "0"], vec!["1", "2"]]);
        assert_eq!(batches[2].rows, vec![vec!["4", "8"]]);
    }
}
