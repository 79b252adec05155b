/// Recovery driver, copy collaborators and run reports
pub mod driver;
pub mod fs_ops;
pub mod report;
pub mod verification;

pub use driver::{RecoveryConfig, RecoveryDriver, RecoveryProgress};

pub use fs_ops::{FileOps, StdFileOps};

pub use report::{recovery_rate, FileRecoveryResult, RecoveryReport, RecoveryStatus};

pub use verification::{calculate_file_hash, calculate_hash, verify_copy};
