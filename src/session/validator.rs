//! Session string validation and analysis.
//!
//! All checks here are plausibility heuristics. The only way to know a
//! session really works is to connect with it.

use std::collections::HashSet;

use serde::Serialize;

use super::codec;
use super::export::{DC_ID_RANGE, ExportedSession};

/// Strings shorter than this are rejected outright.
pub const MIN_STRING_LENGTH: usize = 300;

/// Strings longer than this only produce a warning.
pub const MAX_STRING_LENGTH: usize = 2000;

/// Minimum decoded size of a usable session.
pub const MIN_DECODED_LENGTH: usize = 350;

/// `estimated_type` of strings in the exported session format.
pub const NEXUS_SESSION_TYPE: &str = "nexus_session";

/// `estimated_type` of anything else that decodes.
pub const UNKNOWN_SESSION_TYPE: &str = "unknown";

/// Basic facts extracted from a session string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub string_length: usize,
    pub decoded_length: usize,
    pub estimated_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dc_id: Option<u16>,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub error: Option<String>,
    pub warnings: Vec<String>,
    pub info: Option<SessionInfo>,
}

impl ValidationReport {
    fn rejected(error: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            warnings,
            info: None,
        }
    }
}

/// Which client libraries a session string is expected to work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Compatibility {
    pub grammers: bool,
    pub pyrogram: bool,
}

/// Outcome of [`analyze`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionAnalysis {
    #[serde(flatten)]
    pub report: ValidationReport,
    pub security_score: u8,
    pub recommendations: Vec<String>,
    pub compatibility: Compatibility,
}

/// Outcome of [`compare`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionComparison {
    pub session1_valid: bool,
    pub session2_valid: bool,
    pub identical: bool,
    pub differences: Vec<String>,
    pub same_dc: bool,
}

/// Validates the format of a session string.
///
/// Never fails: every problem is reported through the returned value.
pub fn validate(session_string: &str) -> ValidationReport {
    if session_string.is_empty() {
        return ValidationReport::rejected("Session string is empty", Vec::new());
    }

    let string_length = session_string.chars().count();
    if string_length < MIN_STRING_LENGTH {
        return ValidationReport::rejected("Session string too short (likely invalid)", Vec::new());
    }

    let mut warnings = Vec::new();
    if string_length > MAX_STRING_LENGTH {
        warnings.push("Session string unusually long".to_owned());
    }

    let decoded = match codec::decode(session_string) {
        Ok(decoded) => decoded,
        Err(e) => return ValidationReport::rejected(format!("Base64 decode failed: {e}"), warnings),
    };

    if decoded.len() < MIN_DECODED_LENGTH {
        return ValidationReport::rejected("Decoded session data too short", warnings);
    }

    let mut info = SessionInfo {
        string_length,
        decoded_length: decoded.len(),
        estimated_type: if ExportedSession::from_bytes(&decoded).is_ok() {
            NEXUS_SESSION_TYPE
        } else {
            UNKNOWN_SESSION_TYPE
        },
        dc_id: None,
    };

    // The first two bytes are read as a little-endian DC id. Exported
    // sessions put it there; other strings only get a plausibility check.
    match decoded.get(..2) {
        Some(&[lo, hi]) => {
            let dc_id = u16::from_le_bytes([lo, hi]);
            if DC_ID_RANGE.contains(&dc_id) {
                info.dc_id = Some(dc_id);
            } else {
                warnings.push("Unusual DC ID detected".to_owned());
            }
        }
        _ => warnings.push("Could not extract DC ID".to_owned()),
    }

    ValidationReport {
        valid: true,
        error: None,
        warnings,
        info: Some(info),
    }
}

/// Returns whether the session string passes [`validate`].
pub fn quick_validate(session_string: &str) -> bool {
    validate(session_string).valid
}

/// Validates and scores a session string.
///
/// Invalid strings get a zero score and no recommendations beyond the
/// validation error already in the report.
pub fn analyze(session_string: &str) -> SessionAnalysis {
    let report = validate(session_string);
    let compatibility = Compatibility {
        grammers: report
            .info
            .as_ref()
            .is_some_and(|info| report.valid && info.estimated_type == NEXUS_SESSION_TYPE),
        pyrogram: false,
    };

    let Some(info) = report.info.as_ref().filter(|_| report.valid) else {
        return SessionAnalysis {
            report,
            security_score: 0,
            recommendations: Vec::new(),
            compatibility,
        };
    };

    let mut score: u8 = 0;
    let mut recommendations = Vec::new();

    score += match info.string_length {
        400.. => 30,
        350.. => 20,
        _ => 10,
    };

    score += if report.warnings.is_empty() { 30 } else { 10 };

    let unique_chars = session_string.chars().collect::<HashSet<_>>().len();
    score += match unique_chars {
        51.. => 25,
        31.. => 15,
        _ => {
            recommendations.push("Session string has low entropy".to_owned());
            5
        }
    };

    let repeated = session_string.chars().filter(|&c| c == 'A').count();
    if repeated * 10 > info.string_length {
        recommendations.push("High repetition detected - verify session quality".to_owned());
    }

    recommendations.push(
        match score {
            0..50 => "Consider regenerating session string",
            50..75 => "Session appears functional but could be improved",
            _ => "Session string appears to be high quality",
        }
        .to_owned(),
    );

    SessionAnalysis {
        report,
        security_score: score,
        recommendations,
        compatibility,
    }
}

/// Compares two session strings.
pub fn compare(first: &str, second: &str) -> SessionComparison {
    let a = validate(first);
    let b = validate(second);

    let mut comparison = SessionComparison {
        session1_valid: a.valid,
        session2_valid: b.valid,
        identical: first == second,
        ..SessionComparison::default()
    };

    if let (Some(info_a), Some(info_b)) = (&a.info, &b.info) {
        if info_a.string_length != info_b.string_length {
            comparison.differences.push("Different string lengths".to_owned());
        }
        if info_a.decoded_length != info_b.decoded_length {
            comparison.differences.push("Different decoded lengths".to_owned());
        }
        if let (Some(dc_a), Some(dc_b)) = (info_a.dc_id, info_b.dc_id) {
            if dc_a == dc_b {
                comparison.same_dc = true;
            } else {
                comparison.differences.push("Different data centers".to_owned());
            }
        }
    }

    comparison
}
