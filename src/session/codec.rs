//! Session string encoding.
//!
//! A session string is the base64 encoding of an exported session. Decoding
//! ignores whitespace, tolerates missing padding and accepts both the
//! standard and URL-safe alphabets.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};

/// Appends `=` until the length is a multiple of four.
#[must_use]
pub fn pad(session_string: &str) -> Cow<'_, str> {
    match session_string.len() % 4 {
        0 => Cow::Borrowed(session_string),
        rem => {
            let mut padded = String::with_capacity(session_string.len() + 4 - rem);
            padded.push_str(session_string);
            padded.extend(std::iter::repeat_n('=', 4 - rem));
            Cow::Owned(padded)
        }
    }
}

/// Drops ASCII whitespace, such as line breaks from wrapped pastes.
fn strip_whitespace(session_string: &str) -> Cow<'_, str> {
    if session_string.contains(|c: char| c.is_ascii_whitespace()) {
        Cow::Owned(
            session_string
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect(),
        )
    } else {
        Cow::Borrowed(session_string)
    }
}

/// Decodes a session string after whitespace removal and padding correction.
///
/// # Errors
///
/// Returns the standard-alphabet decode error when neither alphabet accepts
/// the input.
pub fn decode(session_string: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact = strip_whitespace(session_string);
    let padded = pad(&compact);
    STANDARD
        .decode(padded.as_bytes())
        .or_else(|err| URL_SAFE.decode(padded.as_bytes()).map_err(|_| err))
}

/// Encodes raw session bytes into a session string.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad() {
        assert_eq!(pad("abcd"), "abcd");
        assert_eq!(pad("abc"), "abc=");
        assert_eq!(pad("ab"), "ab==");
        assert_eq!(pad("abcde"), "abcde===");
    }

    #[test]
    fn test_decode_without_padding() {
        let encoded = encode(b"hello!!");
        let stripped = encoded.trim_end_matches('=');
        assert_eq!(decode(stripped).unwrap(), b"hello!!");
    }

    #[test]
    fn test_decode_url_safe() {
        let bytes = [0xfb_u8, 0xff, 0xbf, 0x01];
        let url_safe = URL_SAFE.encode(bytes);
        assert!(url_safe.contains('-') || url_safe.contains('_'));
        assert_eq!(decode(&url_safe).unwrap(), bytes);
    }

    #[test]
    fn test_decode_ignores_line_breaks() {
        let bytes: Vec<u8> = (0..=255).collect();
        let encoded = encode(&bytes);
        let wrapped = encoded
            .as_bytes()
            .chunks(64)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");

        assert_eq!(decode(&format!(" {wrapped}\n")).unwrap(), bytes);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not base64 at all!").is_err());
        // One leftover char cannot be fixed by padding
        assert!(decode("abcde").is_err());
    }
}
