// 🔢 Feature Encoder - ApplicantRecord → model-ready Feature Vector
// Pure: the output depends only on the record and the model's schema.

use crate::applicant::{
    ApplicantRecord, Education, Gender, PropertyArea, YesNo, CREDIT_HISTORY, DEPENDENTS,
    EDUCATION, GENDER, MARRIED, PROPERTY_AREA, SELF_EMPLOYED,
};
use crate::error::{PredictionError, PredictionResult};
use serde::ser::{Serialize, SerializeMap, Serializer};

// ============================================================================
// ENCODED COLUMNS
// ============================================================================

pub const APPLICANT_INCOME_LOG: &str = "ApplicantIncomelog";
pub const LOAN_AMOUNT_LOG: &str = "LoanAmountLog";
pub const LOAN_AMOUNT_TERM_LOG: &str = "Loan_Amount_Term_log";

/// Every column the encoder produces, in its native order.
pub const ENCODED_COLUMNS: [&str; 10] = [
    GENDER,
    MARRIED,
    DEPENDENTS,
    EDUCATION,
    SELF_EMPLOYED,
    APPLICANT_INCOME_LOG,
    LOAN_AMOUNT_LOG,
    LOAN_AMOUNT_TERM_LOG,
    CREDIT_HISTORY,
    PROPERTY_AREA,
];

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// One model input row: ordered `(column, value)` pairs.
///
/// `None` marks an absent feature (a log transform skipped on a
/// non-positive amount). It is never replaced by 0.0 or NaN here; the
/// classifier decides how absent values are routed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    columns: Vec<(String, Option<f64>)>,
}

impl FeatureVector {
    pub fn from_pairs(columns: Vec<(String, Option<f64>)>) -> Self {
        Self { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.columns.iter().map(|(_, value)| *value).collect()
    }

    /// `None` if the column is not in the vector, `Some(None)` if it is
    /// present but absent-valued.
    pub fn get(&self, column: &str) -> Option<Option<f64>> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| *value)
    }

    /// Columns whose value is absent
    pub fn absent_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

// Serializes as an ordered JSON object; absent values become `null`.
impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ============================================================================
// ENCODING
// ============================================================================

fn yes_no(value: YesNo) -> f64 {
    match value {
        YesNo::Yes => 1.0,
        YesNo::No => 0.0,
    }
}

fn gender(value: Gender) -> f64 {
    match value {
        Gender::Male => 1.0,
        Gender::Female => 0.0,
    }
}

fn education(value: Education) -> f64 {
    match value {
        Education::Graduate => 1.0,
        Education::NotGraduate => 0.0,
    }
}

fn property_area(value: PropertyArea) -> f64 {
    match value {
        PropertyArea::Urban => 2.0,
        PropertyArea::Semiurban => 1.0,
        PropertyArea::Rural => 0.0,
    }
}

/// Natural log for strictly positive input, absent otherwise.
fn log_if_positive(value: f64) -> Option<f64> {
    if value > 0.0 {
        Some(value.ln())
    } else {
        None
    }
}

/// Encode every column in `ENCODED_COLUMNS` order.
pub fn encode_all(record: &ApplicantRecord) -> [(&'static str, Option<f64>); 10] {
    [
        (GENDER, Some(gender(record.gender))),
        (MARRIED, Some(yes_no(record.married))),
        (DEPENDENTS, Some(f64::from(record.dependents.count()))),
        (EDUCATION, Some(education(record.education))),
        (SELF_EMPLOYED, Some(yes_no(record.self_employed))),
        (APPLICANT_INCOME_LOG, log_if_positive(record.applicant_income)),
        (LOAN_AMOUNT_LOG, log_if_positive(record.loan_amount)),
        (LOAN_AMOUNT_TERM_LOG, log_if_positive(record.loan_amount_term)),
        (CREDIT_HISTORY, Some(record.credit_history.value())),
        (PROPERTY_AREA, Some(property_area(record.property_area))),
    ]
}

/// Encode `record` and select/reorder the columns to match `schema`.
///
/// Columns the schema does not name are dropped. A schema column the
/// encoder does not produce fails with `SchemaMismatch`.
pub fn encode(record: &ApplicantRecord, schema: &[String]) -> PredictionResult<FeatureVector> {
    let encoded = encode_all(record);

    let columns = schema
        .iter()
        .map(|column| {
            encoded
                .iter()
                .find(|(name, _)| *name == column.as_str())
                .map(|(_, value)| (column.clone(), *value))
                .ok_or_else(|| PredictionError::SchemaMismatch {
                    column: column.clone(),
                })
        })
        .collect::<PredictionResult<Vec<_>>>()?;

    Ok(FeatureVector::from_pairs(columns))
}

/// The encoder's native column order as an owned schema.
pub fn default_schema() -> Vec<String> {
    ENCODED_COLUMNS.iter().map(|c| c.to_string()).collect()
}
