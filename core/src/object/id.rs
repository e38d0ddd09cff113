use std::fmt::{self, Write};
use std::str::FromStr;

use sha1::{Digest, Sha1};
use thiserror::Error;

use super::Kind;

/// An error which can be returned when parsing an object ID.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum ParseIdError {
    /// Value being parsed is empty.
    #[error("cannot parse object ID from empty string")]
    Empty,

    /// Contains an invalid digit.
    ///
    /// Among other causes, this variant will be constructed when parsing a string that
    /// contains an upper-case letter.
    #[error("value contains invalid digit `{0}`")]
    InvalidDigit(char),

    /// ID string is too long.
    #[error("value is more than 40 digits long")]
    Overflow,

    /// ID string is too short.
    #[error("value is less than 40 digits long")]
    Underflow,

    /// Value was zero.
    #[error("ID would be zero")]
    Zero,
}

/// An object ID identifies an object within a repository.
/// It is stored as a 20-byte SHA-1 signature, but can also be represented as 40 hex digits.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Id {
    id: [u8; 20],
}

impl Id {
    /// Create a new ID from a 20-byte slice.
    ///
    /// It is an error if the slice contains anything other than 20 bytes.
    pub fn new(id: &[u8]) -> Result<Id, ParseIdError> {
        match id.len() {
            20 => {
                let mut bytes = [0u8; 20];
                bytes.copy_from_slice(id);
                Ok(Id { id: bytes })
            }
            0 => Err(ParseIdError::Empty),
            n if n < 20 => Err(ParseIdError::Underflow),
            _ => Err(ParseIdError::Overflow),
        }
    }

    /// Convert a 40-character hex ID to an object ID.
    ///
    /// It is an error if the ID contains anything other than 40 lowercase hex digits.
    pub fn from_hex<T: AsRef<[u8]>>(id: T) -> Result<Id, ParseIdError> {
        let hex = id.as_ref();

        match hex.len() {
            40 => {
                let mut bytes = [0u8; 20];
                for (i, pair) in hex.chunks(2).enumerate() {
                    bytes[i] = digit_value(pair[0])? << 4 | digit_value(pair[1])?;
                }

                if bytes.iter().all(|x| *x == 0) {
                    Err(ParseIdError::Zero)
                } else {
                    Ok(Id { id: bytes })
                }
            }
            0 => Err(ParseIdError::Empty),
            n if n < 40 => Err(ParseIdError::Underflow),
            _ => Err(ParseIdError::Overflow),
        }
    }

    /// Computes the ID git would assign to an object of the given kind and content.
    ///
    /// This is functionally equivalent to the
    /// [`git hash-object`](https://git-scm.com/docs/git-hash-object) command
    /// without the `-w` option that would write the object to the repo.
    pub fn for_content(kind: Kind, content: &[u8]) -> Id {
        let mut hasher = Sha1::new();

        hasher.update(kind.to_string());
        hasher.update(b" ");
        hasher.update(content.len().to_string());
        hasher.update(b"\0");
        hasher.update(content);

        let mut id = [0u8; 20];
        id.copy_from_slice(hasher.finalize().as_slice());
        Id { id }
    }

    /// Returns the raw 20-byte signature.
    pub fn as_bytes(&self) -> &[u8] {
        &self.id
    }
}

impl FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::from_hex(s.as_bytes())
    }
}

static CHARS: &[u8] = b"0123456789abcdef";

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in self.id.iter() {
            f.write_char(CHARS[(byte >> 4) as usize].into())?;
            f.write_char(CHARS[(byte & 0xf) as usize].into())?;
        }

        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

fn digit_value(c: u8) -> Result<u8, ParseIdError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(ParseIdError::InvalidDigit(c as char)),
    }
}
