//! Integrity checks for raw price files, run before a file is trusted.

pub mod data_integrity;

pub use data_integrity::{
    CheckResult, DataIntegrityReport, DataIntegrityValidator, ValidationError, ValidationResult,
    MAX_ABS_DAILY_RETURN,
};
