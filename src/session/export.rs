//! Compact session string format.
//!
//! A session string carries what is needed to rebuild a grammers session
//! on a fresh machine: the home data center, its authorization key and the
//! production DC endpoints. Layout, integers little-endian:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 2    | home DC id                              |
//! | 2      | 1    | format version                          |
//! | 3      | 1    | flags (bit 0: bot account)              |
//! | 4      | 4    | API id the session was created with     |
//! | 8      | 32   | API hash (ASCII)                        |
//! | 40     | 8    | user id                                 |
//! | 48     | 8    | creation time, Unix seconds             |
//! | 56     | 256  | authorization key of the home DC        |
//! | 312    | 18   | home DC IPv6 address and port           |
//! | 330    | 30   | IPv4 address and port of DCs 1 to 5     |
//!
//! The leading DC id is what [`super::validate`] reads.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};
use std::ops::RangeInclusive;

use thiserror::Error;

use super::codec;

/// Current layout version.
pub const FORMAT_VERSION: u8 = 1;

/// Telegram production data centers are numbered 1 to 5.
pub const DC_ID_RANGE: RangeInclusive<u16> = 1..=5;

pub const DC_COUNT: usize = 5;
pub const AUTH_KEY_LENGTH: usize = 256;
pub const API_HASH_LENGTH: usize = 32;

/// Size of an encoded session before base64.
pub const EXPORTED_LENGTH: usize = 360;

const FLAG_BOT: u8 = 0b0000_0001;

/// Errors reading or writing the session format.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Session data has {actual} bytes, expected {expected}")]
    Length { actual: usize, expected: usize },

    #[error("Unsupported session format version {0}")]
    Version(u8),

    #[error("Data center {0} is not a production DC")]
    DcId(u16),

    #[error("API hash must be 32 ASCII characters")]
    ApiHash,
}

/// Decoded session string.
#[derive(Clone, PartialEq, Eq)]
pub struct ExportedSession {
    pub dc_id: u16,
    pub is_bot: bool,
    pub api_id: i32,
    pub api_hash: String,
    pub user_id: i64,
    /// Unix seconds.
    pub created_at: i64,
    pub auth_key: [u8; AUTH_KEY_LENGTH],
    pub home_ipv6: SocketAddrV6,
    /// Endpoints of DC 1 to 5, in order.
    pub dc_ipv4: [SocketAddrV4; DC_COUNT],
}

impl ExportedSession {
    /// IPv4 endpoint of the home DC.
    #[must_use]
    pub fn home_ipv4(&self) -> Option<SocketAddrV4> {
        let index = usize::from(self.dc_id).checked_sub(1)?;
        self.dc_ipv4.get(index).copied()
    }

    /// Serializes the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the DC id or API hash cannot be represented.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ExportError> {
        if !DC_ID_RANGE.contains(&self.dc_id) {
            return Err(ExportError::DcId(self.dc_id));
        }
        if self.api_hash.len() != API_HASH_LENGTH || !self.api_hash.is_ascii() {
            return Err(ExportError::ApiHash);
        }

        let mut bytes = Vec::with_capacity(EXPORTED_LENGTH);
        bytes.extend_from_slice(&self.dc_id.to_le_bytes());
        bytes.push(FORMAT_VERSION);
        bytes.push(if self.is_bot { FLAG_BOT } else { 0 });
        bytes.extend_from_slice(&self.api_id.to_le_bytes());
        bytes.extend_from_slice(self.api_hash.as_bytes());
        bytes.extend_from_slice(&self.user_id.to_le_bytes());
        bytes.extend_from_slice(&self.created_at.to_le_bytes());
        bytes.extend_from_slice(&self.auth_key);
        bytes.extend_from_slice(&self.home_ipv6.ip().octets());
        bytes.extend_from_slice(&self.home_ipv6.port().to_le_bytes());
        for addr in &self.dc_ipv4 {
            bytes.extend_from_slice(&addr.ip().octets());
            bytes.extend_from_slice(&addr.port().to_le_bytes());
        }

        debug_assert_eq!(bytes.len(), EXPORTED_LENGTH);
        Ok(bytes)
    }

    /// Parses serialized session data.
    ///
    /// # Errors
    ///
    /// Returns an error on a wrong size, an unknown version, a DC id
    /// outside 1..=5 or a non-ASCII API hash.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ExportError> {
        if bytes.len() != EXPORTED_LENGTH {
            return Err(ExportError::Length {
                actual: bytes.len(),
                expected: EXPORTED_LENGTH,
            });
        }
        let mut reader = Reader { rest: bytes };

        let dc_id = u16::from_le_bytes(reader.take()?);
        if !DC_ID_RANGE.contains(&dc_id) {
            return Err(ExportError::DcId(dc_id));
        }
        let [version] = reader.take()?;
        if version != FORMAT_VERSION {
            return Err(ExportError::Version(version));
        }
        let [flags] = reader.take()?;
        let api_id = i32::from_le_bytes(reader.take()?);
        let api_hash: [u8; API_HASH_LENGTH] = reader.take()?;
        let api_hash = String::from_utf8(api_hash.to_vec())
            .ok()
            .filter(|hash| hash.is_ascii())
            .ok_or(ExportError::ApiHash)?;
        let user_id = i64::from_le_bytes(reader.take()?);
        let created_at = i64::from_le_bytes(reader.take()?);
        let auth_key = reader.take()?;
        let home_ipv6 = SocketAddrV6::new(
            Ipv6Addr::from(reader.take::<16>()?),
            u16::from_le_bytes(reader.take()?),
            0,
            0,
        );

        let mut dc_ipv4 = [SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0); DC_COUNT];
        for addr in &mut dc_ipv4 {
            *addr = SocketAddrV4::new(
                Ipv4Addr::from(reader.take::<4>()?),
                u16::from_le_bytes(reader.take()?),
            );
        }

        Ok(Self {
            dc_id,
            is_bot: flags & FLAG_BOT != 0,
            api_id,
            api_hash,
            user_id,
            created_at,
            auth_key,
            home_ipv6,
            dc_ipv4,
        })
    }

    /// Encodes the session as a session string.
    ///
    /// # Errors
    ///
    /// See [`Self::to_bytes`].
    pub fn encode(&self) -> Result<String, ExportError> {
        Ok(codec::encode(&self.to_bytes()?))
    }

    /// Decodes a session string.
    ///
    /// # Errors
    ///
    /// See [`Self::from_bytes`]; base64 failures are reported too.
    pub fn decode(session_string: &str) -> Result<Self, ExportError> {
        Self::from_bytes(&codec::decode(session_string)?)
    }
}

impl fmt::Debug for ExportedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportedSession")
            .field("dc_id", &self.dc_id)
            .field("is_bot", &self.is_bot)
            .field("api_id", &self.api_id)
            .field("user_id", &self.user_id)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

struct Reader<'a> {
    rest: &'a [u8],
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ExportError> {
        let (head, rest) = self
            .rest
            .split_first_chunk::<N>()
            .ok_or(ExportError::Length {
                actual: self.rest.len(),
                expected: N,
            })?;
        self.rest = rest;
        Ok(*head)
    }
}
