//! Exit codes for the CLI tool.

use jarwright::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Fatal error occurred
pub const FATAL_ERROR: i32 = 2;
/// Archive content could not be decoded
pub const BAD_ARCHIVE: i32 = 3;
/// Two merged jars provide the same path
pub const DUPLICATE_CONFLICT: i32 = 4;
/// I/O error
pub const IO_ERROR: i32 = 5;
/// Ctrl+C (128 + SIGINT)
pub const USER_INTERRUPT: i32 = 130;
/// Invalid command line arguments or chain file
pub const BAD_ARGS: i32 = 255;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    FatalError,
    BadArchive,
    DuplicateConflict,
    IoError,
    BadArgs,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::FatalError => FATAL_ERROR,
            Self::BadArchive => BAD_ARCHIVE,
            Self::DuplicateConflict => DUPLICATE_CONFLICT,
            Self::IoError => IO_ERROR,
            Self::BadArgs => BAD_ARGS,
        }
    }
}

/// Converts a jarwright error to an exit code
///
/// Context wrappers (transformer name, entry path) are looked through.
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    let error = error.root_cause();
    if matches!(error, Error::DuplicateConflict { .. }) {
        return ExitCode::DuplicateConflict;
    }
    if error.is_corruption() {
        return ExitCode::BadArchive;
    }
    if error.is_configuration_error() {
        return ExitCode::BadArgs;
    }
    match error {
        Error::Io(_) | Error::Zip(_) => ExitCode::IoError,
        Error::ArchiveNotFound { .. } | Error::EntryNotFound { .. } => ExitCode::IoError,
        Error::InvalidEntryPath(_) => ExitCode::BadArgs,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::FatalError,
    }
}
