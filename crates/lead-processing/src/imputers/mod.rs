//! Imputation module for handling missing values.
//!
//! This module provides:
//! - Statistical fills (mean, median, mode) and the mode table
//! - Fitted imputation values persisted for replay at inference

mod statistical;
mod values;

pub use statistical::StatisticalImputer;
pub use values::{map_missing_customer_code, ImputationValues};
