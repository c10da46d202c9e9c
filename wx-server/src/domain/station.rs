//! Weather station identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid ICAO code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ICAO code: {reason}")]
pub struct InvalidIcao {
    reason: &'static str,
}

/// A valid 4-character ICAO location indicator, e.g. `EDDF`.
///
/// The first character is an uppercase ASCII letter; the remaining three are
/// uppercase ASCII letters or digits (some North American stations such as
/// `K1A5` carry digits).
///
/// # Examples
///
/// ```
/// use wx_server::domain::IcaoCode;
///
/// let eddf = IcaoCode::parse("EDDF").unwrap();
/// assert_eq!(eddf.as_str(), "EDDF");
///
/// assert!(IcaoCode::parse("eddf").is_err());
/// assert!(IcaoCode::parse("EDD").is_err());
/// assert!(IcaoCode::parse("1EDD").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IcaoCode([u8; 4]);

impl IcaoCode {
    /// Parse an ICAO code from a string.
    pub fn parse(s: &str) -> Result<Self, InvalidIcao> {
        let bytes = s.as_bytes();

        if bytes.len() != 4 {
            return Err(InvalidIcao {
                reason: "must be exactly 4 characters",
            });
        }

        if !bytes[0].is_ascii_uppercase() {
            return Err(InvalidIcao {
                reason: "must start with an uppercase ASCII letter",
            });
        }

        for &b in &bytes[1..] {
            if !(b.is_ascii_uppercase() || b.is_ascii_digit()) {
                return Err(InvalidIcao {
                    reason: "must be uppercase ASCII letters or digits",
                });
            }
        }

        Ok(IcaoCode([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Parse user input: surrounding whitespace is ignored and lowercase
    /// letters are accepted.
    pub fn parse_normalized(s: &str) -> Result<Self, InvalidIcao> {
        Self::parse(&s.trim().to_ascii_uppercase())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        // Only ASCII is ever stored.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Debug for IcaoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IcaoCode({})", self.as_str())
    }
}

impl fmt::Display for IcaoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for IcaoCode {
    type Error = InvalidIcao;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IcaoCode> for String {
    fn from(code: IcaoCode) -> Self {
        code.as_str().to_string()
    }
}
