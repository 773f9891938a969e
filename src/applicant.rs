// 📝 Applicant Record - raw form input and its typed counterpart
// RawApplicant mirrors what a form, CSV row or JSON body carries;
// ApplicantRecord is what the encoder accepts.

use crate::error::{PredictionError, PredictionResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

// ============================================================================
// FIELD NAMES (column headers of the applicant form)
// ============================================================================

pub const GENDER: &str = "Gender";
pub const MARRIED: &str = "Married";
pub const DEPENDENTS: &str = "Dependents";
pub const EDUCATION: &str = "Education";
pub const SELF_EMPLOYED: &str = "Self_Employed";
pub const APPLICANT_INCOME: &str = "ApplicantIncome";
pub const LOAN_AMOUNT: &str = "LoanAmount";
pub const LOAN_AMOUNT_TERM: &str = "Loan_Amount_Term";
pub const CREDIT_HISTORY: &str = "Credit_History";
pub const PROPERTY_AREA: &str = "Property_Area";

// ============================================================================
// CATEGORICAL FIELDS
// ============================================================================

/// A categorical form field with a closed set of labels.
pub trait Choice: Copy + PartialEq + 'static {
    /// Form field this choice belongs to
    const FIELD: &'static str;

    /// Every variant, in display order
    const ALL: &'static [Self];

    fn label(&self) -> &'static str;

    /// Decode a user-facing label. Anything outside `ALL` is `InvalidInput`.
    fn from_label(value: &str) -> PredictionResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|choice| choice.label() == value)
            .ok_or_else(|| PredictionError::InvalidInput {
                field: Self::FIELD,
                value: value.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Choice for Gender {
    const FIELD: &'static str = GENDER;
    const ALL: &'static [Self] = &[Gender::Male, Gender::Female];

    fn label(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

/// Yes/No answer. Used by both `Married` and `Self_Employed`, which differ
/// only in the field name reported on a bad value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub const ALL: &'static [YesNo] = &[YesNo::Yes, YesNo::No];

    pub fn label(&self) -> &'static str {
        match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        }
    }

    pub fn parse(field: &'static str, value: &str) -> PredictionResult<Self> {
        match value {
            "Yes" => Ok(YesNo::Yes),
            "No" => Ok(YesNo::No),
            other => Err(PredictionError::InvalidInput {
                field,
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dependents {
    Zero,
    One,
    Two,
    ThreePlus,
}

impl Dependents {
    /// Numeric value handed to the model. "3+" counts as 3.
    pub fn count(&self) -> u8 {
        match self {
            Dependents::Zero => 0,
            Dependents::One => 1,
            Dependents::Two => 2,
            Dependents::ThreePlus => 3,
        }
    }
}

impl Choice for Dependents {
    const FIELD: &'static str = DEPENDENTS;
    const ALL: &'static [Self] = &[
        Dependents::Zero,
        Dependents::One,
        Dependents::Two,
        Dependents::ThreePlus,
    ];

    fn label(&self) -> &'static str {
        match self {
            Dependents::Zero => "0",
            Dependents::One => "1",
            Dependents::Two => "2",
            Dependents::ThreePlus => "3+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Education {
    Graduate,
    NotGraduate,
}

impl Choice for Education {
    const FIELD: &'static str = EDUCATION;
    const ALL: &'static [Self] = &[Education::Graduate, Education::NotGraduate];

    fn label(&self) -> &'static str {
        match self {
            Education::Graduate => "Graduate",
            Education::NotGraduate => "Not Graduate",
        }
    }
}

/// Credit history flag. The form offers 1.0 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditHistory {
    Meets,
    DoesNotMeet,
}

impl CreditHistory {
    pub fn value(&self) -> f64 {
        match self {
            CreditHistory::Meets => 1.0,
            CreditHistory::DoesNotMeet => 0.0,
        }
    }

    pub fn from_value(value: f64) -> PredictionResult<Self> {
        if value == 1.0 {
            Ok(CreditHistory::Meets)
        } else if value == 0.0 {
            Ok(CreditHistory::DoesNotMeet)
        } else {
            Err(PredictionError::InvalidInput {
                field: CREDIT_HISTORY,
                value: value.to_string(),
            })
        }
    }
}

impl Choice for CreditHistory {
    const FIELD: &'static str = CREDIT_HISTORY;
    const ALL: &'static [Self] = &[CreditHistory::Meets, CreditHistory::DoesNotMeet];

    fn label(&self) -> &'static str {
        match self {
            CreditHistory::Meets => "1.0",
            CreditHistory::DoesNotMeet => "0.0",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyArea {
    Urban,
    Semiurban,
    Rural,
}

impl Choice for PropertyArea {
    const FIELD: &'static str = PROPERTY_AREA;
    const ALL: &'static [Self] = &[
        PropertyArea::Urban,
        PropertyArea::Semiurban,
        PropertyArea::Rural,
    ];

    fn label(&self) -> &'static str {
        match self {
            PropertyArea::Urban => "Urban",
            PropertyArea::Semiurban => "Semiurban",
            PropertyArea::Rural => "Rural",
        }
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// Applicant attributes exactly as entered.
///
/// Serde names match the form/CSV column headers, so a CSV row or a JSON
/// request body deserializes straight into this type. Unknown columns such
/// as `Loan_ID` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawApplicant {
    #[serde(rename = "Gender")]
    pub gender: String,

    #[serde(rename = "Married")]
    pub married: String,

    #[serde(rename = "Dependents")]
    pub dependents: String,

    #[serde(rename = "Education")]
    pub education: String,

    #[serde(rename = "Self_Employed")]
    pub self_employed: String,

    #[serde(rename = "ApplicantIncome")]
    pub applicant_income: f64,

    #[serde(rename = "LoanAmount")]
    pub loan_amount: f64,

    #[serde(rename = "Loan_Amount_Term")]
    pub loan_amount_term: f64,

    #[serde(rename = "Credit_History")]
    pub credit_history: f64,

    #[serde(rename = "Property_Area")]
    pub property_area: String,
}

/// Typed applicant record, the encoder's input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApplicantRecord {
    pub gender: Gender,
    pub married: YesNo,
    pub dependents: Dependents,
    pub education: Education,
    pub self_employed: YesNo,
    pub applicant_income: f64,
    pub loan_amount: f64,
    pub loan_amount_term: f64,
    pub credit_history: CreditHistory,
    pub property_area: PropertyArea,
}

impl RawApplicant {
    /// Decode the categorical fields. Numeric fields are copied as-is, so a
    /// non-positive amount survives into the record (the encoder then leaves
    /// its log feature absent). Surfaces should call `validate` instead.
    pub fn parse(&self) -> PredictionResult<ApplicantRecord> {
        Ok(ApplicantRecord {
            gender: Gender::from_label(&self.gender)?,
            married: YesNo::parse(MARRIED, &self.married)?,
            dependents: Dependents::from_label(&self.dependents)?,
            education: Education::from_label(&self.education)?,
            self_employed: YesNo::parse(SELF_EMPLOYED, &self.self_employed)?,
            applicant_income: self.applicant_income,
            loan_amount: self.loan_amount,
            loan_amount_term: self.loan_amount_term,
            credit_history: CreditHistory::from_value(self.credit_history)?,
            property_area: PropertyArea::from_label(&self.property_area)?,
        })
    }

    /// Boundary validation: amounts must be strictly positive (checked in
    /// form order, first failure wins), then categoricals are decoded.
    pub fn validate(&self) -> PredictionResult<ApplicantRecord> {
        check_positive(APPLICANT_INCOME, "Applicant Income", self.applicant_income)?;
        check_positive(LOAN_AMOUNT, "Loan Amount", self.loan_amount)?;
        check_positive(LOAN_AMOUNT_TERM, "Loan Amount Term", self.loan_amount_term)?;
        self.parse()
    }
}

fn check_positive(field: &'static str, label: &'static str, value: f64) -> PredictionResult<()> {
    if value.is_infinite() {
        return Err(PredictionError::InvalidInput {
            field,
            value: value.to_string(),
        });
    }
    // NaN fails this comparison too
    if value > 0.0 {
        Ok(())
    } else {
        Err(PredictionError::NonPositiveNumeric { field, label, value })
    }
}

impl From<&ApplicantRecord> for RawApplicant {
    fn from(record: &ApplicantRecord) -> Self {
        RawApplicant {
            gender: record.gender.label().to_string(),
            married: record.married.label().to_string(),
            dependents: record.dependents.label().to_string(),
            education: record.education.label().to_string(),
            self_employed: record.self_employed.label().to_string(),
            applicant_income: record.applicant_income,
            loan_amount: record.loan_amount,
            loan_amount_term: record.loan_amount_term,
            credit_history: record.credit_history.value(),
            property_area: record.property_area.label().to_string(),
        }
    }
}

// ============================================================================
// CSV BATCHES
// ============================================================================

/// Read applicants from CSV. Each row is returned separately so one bad
/// row does not discard the batch.
pub fn read_applicants<R: Read>(reader: R) -> Vec<Result<RawApplicant, csv::Error>> {
    let mut rdr = csv::Reader::from_reader(reader);
    rdr.deserialize().collect()
}

pub fn load_applicants_csv(csv_path: &Path) -> Result<Vec<Result<RawApplicant, csv::Error>>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;
    Ok(read_applicants(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_raw() -> RawApplicant {
        RawApplicant {
            gender: "Male".to_string(),
            married: "Yes".to_string(),
            dependents: "0".to_string(),
            education: "Graduate".to_string(),
            self_employed: "No".to_string(),
            applicant_income: 6000.0,
            loan_amount: 150.0,
            loan_amount_term: 360.0,
            credit_history: 1.0,
            property_area: "Urban".to_string(),
        }
    }

    #[test]
    fn test_parse_valid_applicant() {
        let record = sample_raw().parse().unwrap();

        assert_eq!(record.gender, Gender::Male);
        assert_eq!(record.married, YesNo::Yes);
        assert_eq!(record.dependents, Dependents::Zero);
        assert_eq!(record.education, Education::Graduate);
        assert_eq!(record.self_employed, YesNo::No);
        assert_eq!(record.credit_history, CreditHistory::Meets);
        assert_eq!(record.property_area, PropertyArea::Urban);
    }

    #[test]
    fn test_unknown_property_area_is_invalid_input() {
        let mut raw = sample_raw();
        raw.property_area = "Atlantis".to_string();

        let err = raw.parse().unwrap_err();
        assert_eq!(
            err,
            PredictionError::InvalidInput {
                field: PROPERTY_AREA,
                value: "Atlantis".to_string(),
            }
        );
        assert!(err.is_user_input());
    }

    #[test]
    fn test_yes_no_reports_its_own_field() {
        let mut raw = sample_raw();
        raw.self_employed = "Sometimes".to_string();

        match raw.parse() {
            Err(PredictionError::InvalidInput { field, .. }) => assert_eq!(field, SELF_EMPLOYED),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!(Gender::from_label("male").is_err());
        assert!(Education::from_label("Not Graduate").is_ok());
        assert!(Education::from_label("NotGraduate").is_err());
    }

    #[test]
    fn test_credit_history_only_accepts_zero_or_one() {
        assert_eq!(CreditHistory::from_value(1.0).unwrap(), CreditHistory::Meets);
        assert_eq!(CreditHistory::from_value(0.0).unwrap(), CreditHistory::DoesNotMeet);
        assert!(CreditHistory::from_value(0.5).is_err());
    }

    #[test]
    fn test_dependents_three_plus_counts_as_three() {
        assert_eq!(Dependents::from_label("3+").unwrap().count(), 3);
        assert!(Dependents::from_label("4").is_err());
    }

    #[test]
    fn test_parse_keeps_non_positive_amounts() {
        let mut raw = sample_raw();
        raw.applicant_income = 0.0;

        let record = raw.parse().unwrap();
        assert_eq!(record.applicant_income, 0.0);
    }

    #[test]
    fn test_validate_rejects_non_positive_in_form_order() {
        let mut raw = sample_raw();
        raw.loan_amount = 0.0;
        raw.loan_amount_term = -12.0;

        let err = raw.validate().unwrap_err();
        assert_eq!(err.to_string(), "Loan Amount must be greater than zero.");

        raw.applicant_income = -1.0;
        let err = raw.validate().unwrap_err();
        assert_eq!(err.to_string(), "Applicant Income must be greater than zero.");
    }

    #[test]
    fn test_validate_rejects_nan_and_infinity() {
        let mut raw = sample_raw();
        raw.loan_amount = f64::NAN;
        assert!(matches!(
            raw.validate(),
            Err(PredictionError::NonPositiveNumeric { field: LOAN_AMOUNT, .. })
        ));

        raw.loan_amount = f64::INFINITY;
        assert!(matches!(
            raw.validate(),
            Err(PredictionError::InvalidInput { field: LOAN_AMOUNT, .. })
        ));
    }

    #[test]
    fn test_record_converts_back_to_raw() {
        let raw = sample_raw();
        let record = raw.parse().unwrap();
        assert_eq!(RawApplicant::from(&record), raw);
    }

    #[test]
    fn test_read_applicants_csv_with_extra_columns() {
        let data = "\
Loan_ID,Gender,Married,Dependents,Education,Self_Employed,ApplicantIncome,CoapplicantIncome,LoanAmount,Loan_Amount_Term,Credit_History,Property_Area,Loan_Status
LP001002,Male,No,0,Graduate,No,5849,0,128,360,1,Urban,Y
LP001003,Male,Yes,1,Graduate,No,4583,1508,,360,1,Rural,N
LP001005,Female,Yes,3+,Not Graduate,Yes,3000,0,66,360,0,Semiurban,Y
";
        let rows = read_applicants(data.as_bytes());

        assert_eq!(rows.len(), 3);
        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.applicant_income, 5849.0);
        assert_eq!(first.property_area, "Urban");

        // Empty LoanAmount cannot deserialize into f64
        assert!(rows[1].is_err());

        let third = rows[2].as_ref().unwrap().parse().unwrap();
        assert_eq!(third.dependents, Dependents::ThreePlus);
        assert_eq!(third.credit_history, CreditHistory::DoesNotMeet);
    }
}
