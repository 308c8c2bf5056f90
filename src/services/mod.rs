//! Services of the reconciliation core.
//!
//! - `name_validator`: bucket naming rules
//! - `upload_set_builder`: local files to object keys, plus existence
//! - `selection_scanner`: expands selected files and directories
//! - `operation_log`: leveled, append-only log for the user

pub mod name_validator;
pub mod operation_log;
pub mod selection_scanner;
pub mod upload_set_builder;
