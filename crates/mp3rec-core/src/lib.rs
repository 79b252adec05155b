use std::path::Path;

pub mod error;
pub mod naming;
pub mod recovery;
pub mod resolve;
pub mod scanner;
pub mod tags;

pub use error::{RecoveryError, ScanError, TagError};
pub use naming::{build_output_path, sanitize, CollisionPolicy};
pub use recovery::{
    FileOps, FileRecoveryResult, RecoveryConfig, RecoveryDriver, RecoveryProgress, RecoveryReport,
    RecoveryStatus, StdFileOps,
};
pub use resolve::{resolve, ResolvedTag};
pub use scanner::{scan, FileRecord, Scanner};
pub use tags::{ExtendedFrame, FileTags, LegacyTag, TagSource, TextEncoding};

/// Recover every tagged file under `input_root` into `output_root` using
/// the default configuration.
pub fn recover_directory(input_root: &Path, output_root: &Path) -> Result<RecoveryReport, ScanError> {
    recover_directory_with_config(input_root, output_root, RecoveryConfig::default())
}

/// Recover with a custom configuration
pub fn recover_directory_with_config(
    input_root: &Path,
    output_root: &Path,
    config: RecoveryConfig,
) -> Result<RecoveryReport, ScanError> {
    tracing::info!(
        "Starting recovery of {} into {}",
        input_root.display(),
        output_root.display()
    );

    let mut driver = RecoveryDriver::new(config);
    driver.run(input_root, output_root)
}
