//! Value types exchanged between the reconciliation core and its caller.
//!
//! Everything here is plain data: it serializes to the shapes the desktop
//! frontend already consumes and carries no behaviour beyond accessors.

pub mod log_entry;
pub mod upload_set;
pub mod validation;
