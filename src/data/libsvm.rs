//! LibSVM format dataset implementation
//!
//! Supports loading datasets in the libsvm format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8
//! -1 2:0.3 5:2.1
//!
//! Labels are kept as written (class ids or regression targets) and feature
//! indices keep their 1-based numbering.

use crate::core::{Dataset, Problem, Result, SVMError, SparseVector, TrainingInstance};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Training problem read from a LibSVM format file
#[derive(Debug, Clone)]
pub struct LibSVMDataset {
    problem: Problem,
}

impl LibSVMDataset {
    /// Load a dataset from a LibSVM format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(SVMError::IoError)?;
        let reader = BufReader::new(file);
        Self::from_reader(reader)
    }

    /// Load a dataset from a reader (for testing and flexibility)
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut problem = Problem::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(SVMError::IoError)?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            Self::parse_line(line)
                .and_then(|instance| problem.add(instance))
                .map_err(|e| {
                    SVMError::ParseError(format!("Error parsing line {}: {}", line_num + 1, e))
                })?;
        }

        if problem.is_empty() {
            return Err(SVMError::ParseError(
                "dataset contains no instances".to_string(),
            ));
        }

        Ok(LibSVMDataset { problem })
    }

    /// Parse a single line in libsvm format
    fn parse_line(line: &str) -> Result<TrainingInstance> {
        let mut parts = line.split_whitespace();

        let label_str = parts
            .next()
            .ok_or_else(|| SVMError::ParseError("Empty line".to_string()))?;
        let label = label_str
            .parse::<f64>()
            .map_err(|_| SVMError::ParseError(format!("Invalid label: {label_str}")))?;

        let mut features = Vec::new();
        for feature_str in parts {
            let (index, value) = feature_str.split_once(':').ok_or_else(|| {
                SVMError::ParseError(format!("Invalid feature format: {feature_str}"))
            })?;

            let index = index
                .parse::<i32>()
                .map_err(|_| SVMError::ParseError(format!("Invalid feature index: {index}")))?;
            if index <= 0 {
                return Err(SVMError::ParseError(format!(
                    "Feature index must be positive: {index}"
                )));
            }

            let value = value
                .parse::<f64>()
                .map_err(|_| SVMError::ParseError(format!("Invalid feature value: {value}")))?;

            features.push((index, value));
        }

        Ok(TrainingInstance::new(label, features))
    }

    /// Borrow the parsed problem
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Take the parsed problem
    pub fn into_problem(self) -> Problem {
        self.problem
    }
}

impl Dataset for LibSVMDataset {
    fn len(&self) -> usize {
        self.problem.len()
    }

    fn dim(&self) -> usize {
        Dataset::dim(&self.problem)
    }

    fn instance(&self, i: usize) -> (&SparseVector, f64) {
        Dataset::instance(&self.problem, i)
    }

    fn labels(&self) -> &[f64] {
        self.problem.labels()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_line_basic() {
        let instance = LibSVMDataset::parse_line("+1 1:0.5 3:1.2").expect("line should parse");

        assert_eq!(instance.label, 1.0);
        assert_eq!(instance.features, vec![(1, 0.5), (3, 1.2)]);
    }

    #[test]
    fn test_parse_line_keeps_labels() {
        let instance = LibSVMDataset::parse_line("3 2:0.3").expect("line should parse");
        assert_eq!(instance.label, 3.0);

        let instance = LibSVMDataset::parse_line("-0.75 1:1.0").expect("line should parse");
        assert_eq!(instance.label, -0.75);
    }

    #[test]
    fn test_parse_line_invalid_format() {
        // Invalid feature format
        assert!(LibSVMDataset::parse_line("+1 1").is_err());

        // Invalid index
        assert!(LibSVMDataset::parse_line("+1 abc:1.0").is_err());

        // Invalid value
        assert!(LibSVMDataset::parse_line("+1 1:abc").is_err());

        // Zero index (libsvm is 1-based)
        assert!(LibSVMDataset::parse_line("+1 0:1.0").is_err());
    }

    #[test]
    fn test_from_reader_basic() {
        let data = "+1 1:0.5 3:1.2\n-1 2:0.3 5:2.1\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).expect("dataset should load");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5);

        let (vector, label) = dataset.instance(1);
        assert_eq!(label, -1.0);
        assert_eq!(vector.get(5), 2.1);
        assert!(vector.is_complete());
    }

    #[test]
    fn test_from_reader_unsorted_features() {
        let data = "1 7:0.7 2:0.2\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).expect("dataset should load");

        let indices: Vec<i32> = dataset.instance(0).0.entries().map(|n| n.index).collect();
        assert_eq!(indices, vec![2, 7]);
    }

    #[test]
    fn test_from_reader_duplicate_index_reports_line() {
        let data = "1 1:0.5\n-1 2:0.1 2:0.3\n";
        let err = LibSVMDataset::from_reader(Cursor::new(data))
            .expect_err("duplicate index should fail");

        match err {
            SVMError::ParseError(msg) => assert!(msg.contains("line 2"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_from_reader_empty_lines_and_comments() {
        let data = "# Comment line\n+1 1:0.5\n\n# Another comment\n-1 2:0.3\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).expect("dataset should load");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels(), &[1.0, -1.0]);
    }

    #[test]
    fn test_from_reader_empty_dataset() {
        let data = "# Only comments\n\n";
        let result = LibSVMDataset::from_reader(Cursor::new(data));
        assert!(matches!(result, Err(SVMError::ParseError(_))));
    }

    #[test]
    fn test_large_dimension_handling() {
        let data = "+1 1:1.0 1000:2.0 5000:3.0\n-1 2:1.0 500:2.0\n";
        let dataset = LibSVMDataset::from_reader(Cursor::new(data)).expect("dataset should load");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.dim(), 5000);
        assert_eq!(dataset.problem().max_index(), 5000);
    }

    #[test]
    fn test_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(temp_file, "+1 1:0.5 3:1.2").expect("Failed to write");
        writeln!(temp_file, "-1 2:0.3 5:2.1").expect("Failed to write");
        temp_file.flush().expect("Failed to flush");

        let dataset = LibSVMDataset::from_file(temp_file.path()).expect("dataset should load");
        let problem = dataset.into_problem();

        assert_eq!(problem.len(), 2);
        assert_eq!(problem.labels(), &[1.0, -1.0]);
    }

    #[test]
    fn test_from_file_io_error() {
        let result = LibSVMDataset::from_file("/non/existent/file.libsvm");
        assert!(matches!(result, Err(SVMError::IoError(_))));
    }
}
