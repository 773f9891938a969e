//! Prediction model boundary
//!
//! - `Classifier`: the opaque capability the rest of the crate talks to
//! - `ForestModel`: random-forest artifact loaded from JSON
//! - `Predictor`: validate → encode → predict → `Verdict`
//!
//! A `ForestModel` averages per-tree leaf class probabilities and returns
//! the class with the highest mean (lower index wins ties). Splits send a
//! value left when `value <= threshold`; an absent value follows
//! `missing_left`.

use crate::applicant::{ApplicantRecord, RawApplicant};
use crate::encoder::{self, FeatureVector};
use crate::error::{ModelError, PredictionError, PredictionResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Classifier capability
// ---------------------------------------------------------------------------

/// A trained binary classifier.
pub trait Classifier: Send + Sync {
    /// Ordered input columns the model was trained on.
    fn feature_names(&self) -> &[String];

    /// Predict the label of a single row.
    fn predict(&self, row: &FeatureVector) -> Result<i64, ModelError>;
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Denied,
}

impl Verdict {
    /// 1 → Approved, 0 → Denied, anything else is a contract violation.
    pub fn from_label(label: i64) -> PredictionResult<Self> {
        match label {
            1 => Ok(Verdict::Approved),
            0 => Ok(Verdict::Denied),
            other => Err(PredictionError::UnexpectedLabel(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "Approved",
            Verdict::Denied => "Denied",
        }
    }

    /// Text shown to the user
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Approved => "Loan Approved ✅",
            Verdict::Denied => "Loan Denied ❌",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Random forest artifact
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default = "default_true")]
        missing_left: bool,
    },
    Leaf {
        proba: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root to a leaf. Children always sit after their
    /// parent (checked at load), so the walk terminates.
    fn leaf_proba(&self, values: &[Option<f64>]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let go_left = match values[*feature] {
                        Some(value) => value <= *threshold,
                        None => *missing_left,
                    };
                    index = if go_left { *left } else { *right };
                }
            }
        }
    }

    fn validate(&self, tree_index: usize, n_features: usize, n_classes: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidArtifact(format!(
                "tree {} has no nodes",
                tree_index
            )));
        }

        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {} node {}: feature index {} out of range",
                            tree_index, i, feature
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {} node {}: threshold is not finite",
                            tree_index, i
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(ModelError::InvalidArtifact(format!(
                                "tree {} node {}: child {} must follow its parent and exist",
                                tree_index, i, child
                            )));
                        }
                    }
                }
                Node::Leaf { proba } => {
                    if proba.len() != n_classes {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {} node {}: leaf has {} probabilities, model has {} classes",
                            tree_index,
                            i,
                            proba.len(),
                            n_classes
                        )));
                    }
                    if proba.iter().any(|p| !p.is_finite() || *p < 0.0) {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {} node {}: leaf probabilities must be finite and non-negative",
                            tree_index, i
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Random-forest classifier deserialized from a JSON artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestModel {
    pub feature_names_in: Vec<String>,
    pub classes: Vec<i64>,
    pub trees: Vec<Tree>,

    #[serde(skip)]
    fingerprint: String,
}

impl ForestModel {
    /// Parse and validate an artifact. The fingerprint is the SHA-256 of
    /// the exact bytes given.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let mut model: ForestModel = serde_json::from_str(json)
            .map_err(|e| ModelError::InvalidArtifact(format!("failed to parse JSON: {e}")))?;
        model.validate()?;

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        model.fingerprint = format!("{:x}", hasher.finalize());

        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {}", path.display()))?;
        let model = Self::from_json(&json)
            .with_context(|| format!("Failed to load model artifact {}", path.display()))?;

        info!(
            path = %path.display(),
            trees = model.trees.len(),
            features = model.feature_names_in.len(),
            fingerprint = %model.fingerprint,
            "Loaded model artifact"
        );

        Ok(model)
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names_in.is_empty() {
            return Err(ModelError::InvalidArtifact("feature_names_in is empty".to_string()));
        }
        if self.classes.is_empty() {
            return Err(ModelError::InvalidArtifact("classes is empty".to_string()));
        }
        if self.trees.is_empty() {
            return Err(ModelError::InvalidArtifact("model has no trees".to_string()));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, self.feature_names_in.len(), self.classes.len())?;
        }

        Ok(())
    }

    /// Mean class probabilities for one row, in `classes` order.
    pub fn predict_proba(&self, row: &FeatureVector) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.feature_names_in.len() {
            return Err(ModelError::WidthMismatch {
                expected: self.feature_names_in.len(),
                found: row.len(),
            });
        }
        for (position, (found, expected)) in row.names().zip(&self.feature_names_in).enumerate() {
            if found != expected {
                return Err(ModelError::SchemaMismatch {
                    position,
                    expected: expected.clone(),
                    found: found.to_string(),
                });
            }
        }

        let values = row.values();
        let mut totals = vec![0.0; self.classes.len()];

        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.leaf_proba(&values)) {
                *total += p;
            }
        }

        let n = self.trees.len() as f64;
        Ok(totals.into_iter().map(|t| t / n).collect())
    }
}

impl Classifier for ForestModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names_in
    }

    fn predict(&self, row: &FeatureVector) -> Result<i64, ModelError> {
        let proba = self.predict_proba(row)?;

        let mut best = 0;
        for (i, p) in proba.iter().enumerate() {
            if *p > proba[best] {
                best = i;
            }
        }

        Ok(self.classes[best])
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Runs applicants through the model. Cheap to clone.
#[derive(Clone)]
pub struct Predictor {
    model: Arc<dyn Classifier>,
}

impl Predictor {
    pub fn new(model: impl Classifier + 'static) -> Self {
        Self {
            model: Arc::new(model),
        }
    }

    pub fn schema(&self) -> &[String] {
        self.model.feature_names()
    }

    /// Encode a typed record and predict it.
    pub fn predict_record(&self, record: &ApplicantRecord) -> PredictionResult<Verdict> {
        let row = encoder::encode(record, self.model.feature_names())?;
        debug!(row = ?row, "Encoded applicant");

        let label = self.model.predict(&row)?;
        Verdict::from_label(label)
    }

    /// Validate raw input at the boundary, then predict.
    pub fn predict(&self, raw: &RawApplicant) -> PredictionResult<Verdict> {
        let record = raw.validate()?;
        self.predict_record(&record)
    }
}
