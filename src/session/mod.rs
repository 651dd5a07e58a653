//! Session string handling.
//!
//! Provides the session string codec and export format used by the
//! generator and the client, plus the offline validator.

pub mod codec;
mod export;
mod validator;

pub use export::{EXPORTED_LENGTH, ExportError, ExportedSession, FORMAT_VERSION};
pub use validator::{
    Compatibility, MAX_STRING_LENGTH, MIN_DECODED_LENGTH, MIN_STRING_LENGTH, NEXUS_SESSION_TYPE,
    SessionAnalysis, SessionComparison, SessionInfo, UNKNOWN_SESSION_TYPE, ValidationReport,
    analyze, compare, quick_validate, validate,
};
