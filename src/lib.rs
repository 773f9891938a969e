// Loan Approval Gate - Core Library
// Exposes all modules for use in CLI/TUI, API server, and tests

pub mod applicant;   // Applicant Record - raw form input + typed record
pub mod config;
pub mod credentials; // Credential Store - register/login gate
pub mod db;
pub mod encoder;     // Feature Encoder - record → model columns
pub mod error;
pub mod model;       // Classifier boundary + random-forest artifact
pub mod session;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use applicant::{
    ApplicantRecord, Choice, CreditHistory, Dependents, Education, Gender, PropertyArea,
    RawApplicant, YesNo, load_applicants_csv, read_applicants,
};
pub use config::AppConfig;
pub use credentials::{CredentialStore, RegisterOutcome, UserStorage};
pub use db::{Event, SqliteUserStore, UserRecord, setup_database};
pub use encoder::{FeatureVector, ENCODED_COLUMNS, default_schema, encode};
pub use error::{ModelError, PredictionError, PredictionResult};
pub use model::{Classifier, ForestModel, Predictor, Verdict};
pub use session::{Notice, NoticeLevel, Page, Session};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
