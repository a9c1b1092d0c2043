//! Top-k extraction from classifier outputs.

use crate::core::{ArchError, ArchResult};

/// The `k` best labels of one prediction row.
#[derive(Debug, Clone, PartialEq)]
pub struct TopkResult {
    /// Label indexes, best first.
    pub indexes: Vec<usize>,
    /// Scores matching `indexes`.
    pub scores: Vec<f32>,
    /// Label names matching `indexes`, when names were supplied.
    pub names: Option<Vec<String>>,
}

/// Picks the highest-scoring labels from classifier output rows.
#[derive(Debug, Default, Clone)]
pub struct Topk {
    class_names: Option<Vec<String>>,
}

impl Topk {
    /// Creates a Topk processor without class names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Topk processor that also reports class names; the vector
    /// index is the label index.
    pub fn from_class_names(class_names: Vec<String>) -> Self {
        Self {
            class_names: Some(class_names),
        }
    }

    /// Extracts the top `k` labels of every row. `k` larger than the row
    /// width is clamped.
    pub fn process(&self, predictions: &[Vec<f32>], k: usize) -> ArchResult<Vec<TopkResult>> {
        if k == 0 {
            return Err(ArchError::invalid_input("k must be greater than 0"));
        }
        predictions
            .iter()
            .map(|row| self.process_row(row, k))
            .collect()
    }

    fn process_row(&self, row: &[f32], k: usize) -> ArchResult<TopkResult> {
        if row.is_empty() {
            return Err(ArchError::invalid_input("empty prediction vector"));
        }
        let mut indexed: Vec<(usize, f32)> = row.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
        let (indexes, scores): (Vec<usize>, Vec<f32>) = indexed.into_iter().unzip();

        let names = self.class_names.as_ref().map(|names| {
            indexes
                .iter()
                .map(|&idx| {
                    names
                        .get(idx)
                        .cloned()
                        .unwrap_or_else(|| format!("class_{idx}"))
                })
                .collect()
        });

        Ok(TopkResult {
            indexes,
            scores,
            names,
        })
    }
}
