//! Mapping of raw model scores to a disease label.

use crate::error::{InferenceError, LabelMappingError};
use serde::Serialize;
use std::{cmp::Ordering, fmt, path::Path};

/// Output width of the packaged model.
pub const NUM_CLASSES: usize = 3;

/// Labels the packaged model was trained for, in output order.
pub const SUGARCANE_LABELS: [&str; NUM_CLASSES] = ["Red Strip", "Healthy", "Rust"];

/// Per-class scores, index-aligned with a [`ClassTable`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rejects NaN and infinite scores, which only a failing backend produces.
    pub fn ensure_finite(self) -> Result<Self, InferenceError> {
        match self.0.iter().position(|score| !score.is_finite()) {
            Some(index) => Err(InferenceError::NonFiniteScore {
                index,
                value: self.0[index],
            }),
            None => Ok(self),
        }
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    labels: Vec<String>,
}

impl ClassTable {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// The table matching the packaged sugarcane model.
    pub fn sugarcane() -> Self {
        Self::new(SUGARCANE_LABELS)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.iter().map(String::as_str)
    }
}

impl Default for ClassTable {
    fn default() -> Self {
        Self::sugarcane()
    }
}

/// Opaque reference to the image a result was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        Self(path.display().to_string())
    }
}

impl From<String> for ImageRef {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

impl From<&str> for ImageRef {
    fn from(uri: &str) -> Self {
        Self(uri.to_string())
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub index: usize,
    pub label: String,
    /// Raw score of the winning class, as produced by the backend.
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ImageRef>,
}

impl ClassificationResult {
    pub fn with_source(mut self, source: impl Into<ImageRef>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// `classify` always names a class, even for an all-zero score vector.
    /// Callers that need a "no confident class" outcome apply a threshold here.
    pub fn is_confident(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// Index and value of the maximum score. Ties keep the lowest index, so an
/// all-zero vector selects index 0.
fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
}

pub fn classify(
    scores: &ScoreVector,
    class_table: &ClassTable,
) -> Result<ClassificationResult, LabelMappingError> {
    let mismatch = LabelMappingError {
        scores: scores.len(),
        classes: class_table.len(),
    };
    if scores.len() != class_table.len() {
        return Err(mismatch);
    }

    let (index, confidence) = argmax(scores.as_slice()).ok_or_else(|| mismatch.clone())?;
    let label = class_table.get(index).ok_or(mismatch)?;

    Ok(ClassificationResult {
        index,
        label: label.to_string(),
        confidence,
        source: None,
    })
}

/// The `k` highest scores, best first. Equal scores keep ascending index order.
pub fn top_k(
    scores: &ScoreVector,
    class_table: &ClassTable,
    k: usize,
) -> Result<Vec<(usize, String, f32)>, LabelMappingError> {
    if scores.len() != class_table.len() {
        return Err(LabelMappingError {
            scores: scores.len(),
            classes: class_table.len(),
        });
    }

    let mut indexed: Vec<(usize, f32)> = scores.as_slice().iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    Ok(indexed
        .into_iter()
        .take(k)
        .filter_map(|(index, score)| {
            class_table
                .get(index)
                .map(|label| (index, label.to_string(), score))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(values: &[f32]) -> ScoreVector {
        ScoreVector::from(values.to_vec())
    }

    #[test]
    fn test_classify_picks_maximum() {
        let result = classify(&scores(&[0.1, 0.9, 0.0]), &ClassTable::sugarcane()).unwrap();

        assert_eq!(result.index, 1);
        assert_eq!(result.label, "Healthy");
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.source, None);
    }

    #[test]
    fn test_tie_keeps_first_maximum() {
        let result = classify(&scores(&[0.5, 0.5, 0.2]), &ClassTable::sugarcane()).unwrap();

        assert_eq!(result.index, 0);
        assert_eq!(result.label, "Red Strip");
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_all_zero_scores_select_first_class() {
        let result = classify(&scores(&[0.0, 0.0, 0.0]), &ClassTable::sugarcane()).unwrap();

        assert_eq!(result.index, 0);
        assert_eq!(result.confidence, 0.0);
        assert!(!result.is_confident(0.5));
    }

    #[test]
    fn test_negative_scores_report_raw_maximum() {
        let result = classify(&scores(&[-3.0, -1.5, -2.0]), &ClassTable::sugarcane()).unwrap();

        assert_eq!(result.index, 1);
        assert_eq!(result.confidence, -1.5);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let table = ClassTable::sugarcane();
        let input = scores(&[0.2, 0.3, 0.5]);

        let first = classify(&input, &table).unwrap();
        for _ in 0..10 {
            assert_eq!(classify(&input, &table).unwrap(), first);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let err = classify(&scores(&[0.4, 0.6]), &ClassTable::sugarcane()).unwrap_err();
        assert_eq!(
            err,
            LabelMappingError {
                scores: 2,
                classes: 3
            }
        );

        let err = classify(&scores(&[]), &ClassTable::new(Vec::<String>::new())).unwrap_err();
        assert_eq!(
            err,
            LabelMappingError {
                scores: 0,
                classes: 0
            }
        );
    }

    #[test]
    fn test_top_k_orders_by_score() {
        let ranked = top_k(&scores(&[0.3, 0.6, 0.3]), &ClassTable::sugarcane(), 5).unwrap();

        assert_eq!(
            ranked,
            vec![
                (1, "Healthy".to_string(), 0.6),
                (0, "Red Strip".to_string(), 0.3),
                (2, "Rust".to_string(), 0.3),
            ]
        );
    }

    #[test]
    fn test_top_k_agrees_with_classify_on_signed_zero() {
        let input = scores(&[-0.0, 0.0, -1.0]);
        let table = ClassTable::sugarcane();

        let best = classify(&input, &table).unwrap();
        let ranked = top_k(&input, &table, 1).unwrap();

        assert_eq!(best.index, 0);
        assert_eq!(ranked[0].0, best.index);
    }

    #[test]
    fn test_ensure_finite() {
        assert!(scores(&[0.1, 0.2, 0.7]).ensure_finite().is_ok());
        assert!(matches!(
            scores(&[0.1, f32::NAN, 0.7]).ensure_finite(),
            Err(InferenceError::NonFiniteScore { index: 1, .. })
        ));
    }

    #[test]
    fn test_result_serializes_with_source() {
        let result = classify(&scores(&[0.1, 0.9, 0.0]), &ClassTable::sugarcane())
            .unwrap()
            .with_source("leaf.jpg");

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["label"], "Healthy");
        assert_eq!(json["index"], 1);
        assert_eq!(json["source"], "leaf.jpg");
    }
}
