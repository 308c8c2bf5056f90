//! Reconciliation and validation core of the airlock upload tool.
//!
//! Given a destination bucket and a selection of local files, the core
//! validates the bucket name, derives an object key for every file and asks
//! an injected [`ExistenceProbe`] which of those keys are already taken. The
//! caller receives an [`UploadSet`] and decides per file whether to skip,
//! overwrite or rename before transferring anything.
//!
//! ```no_run
//! use airlock::{FileDescriptor, MemoryProbe, NamingPolicy, UploadSetBuilder};
//!
//! # async fn demo() -> airlock::AirlockResult<()> {
//! let probe = MemoryProbe::new().with_objects("my-bucket", ["a/x.txt"]);
//! let files = [FileDescriptor::from("a/x.txt"), FileDescriptor::from("a/y.txt")];
//! let set = UploadSetBuilder::new(NamingPolicy::default())
//!     .build("my-bucket", &files, &probe)
//!     .await?;
//! assert_eq!(set.exists(), [true, false]);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod models;
pub mod probe;
pub mod services;

pub use errors::{AirlockError, AirlockResult};
pub use models::log_entry::{LogEntry, LogLevel};
pub use models::upload_set::{Destination, FileDescriptor, UploadEntry, UploadSet};
pub use models::validation::{
    Check, NameReport, Rule, Severity, ValidationHelper, ValidationResult,
};
pub use probe::{DirectoryProbe, ExistenceProbe, MemoryProbe, ProbeError, RetryingProbe};
pub use services::name_validator::{ExistingNames, NameValidator, NamingPolicy, UniquenessMode};
pub use services::operation_log::OperationLog;
pub use services::selection_scanner::scan_selection;
pub use services::upload_set_builder::UploadSetBuilder;
