//! Well coordinates
//!
//! A part of a collection is addressed by its well: a row letter followed by
//! a 1-based column (`A1`, `H12`). Some routing data carries numeric
//! coordinates of the form `[[row, column]]`; both forms parse to [`Well`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Zero-based (row, column) position inside a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Well {
    row: u16,
    column: u16,
}

impl Well {
    /// Highest row index representable as a single letter
    pub const MAX_ROW: u16 = 25;

    /// Highest zero-based column; its 1-based form must fit in a `u16`
    pub const MAX_COLUMN: u16 = u16::MAX - 1;

    /// Create from zero-based coordinates
    ///
    /// # Errors
    /// Returns error if the row cannot be written as a single letter or the
    /// column has no 1-based form
    #[inline]
    pub fn new(row: u16, column: u16) -> Result<Self, WellError> {
        if row > Self::MAX_ROW {
            return Err(WellError::RowOutOfRange(row));
        }
        if column > Self::MAX_COLUMN {
            return Err(WellError::ColumnOutOfRange(column));
        }
        Ok(Self { row, column })
    }

    /// Zero-based row
    #[inline]
    #[must_use]
    pub const fn row(self) -> u16 {
        self.row
    }

    /// Zero-based column
    #[inline]
    #[must_use]
    pub const fn column(self) -> u16 {
        self.column
    }

    /// Parse the numeric `[[row, column]]` form
    fn parse_numeric(s: &str) -> Result<Self, WellError> {
        let inner = s
            .strip_prefix("[[")
            .and_then(|rest| rest.strip_suffix("]]"))
            .ok_or_else(|| WellError::Malformed(s.to_string()))?;
        let mut parts = inner.split(',').map(str::trim);
        let (Some(row), Some(column), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(WellError::Malformed(s.to_string()));
        };
        let row = row
            .parse::<u16>()
            .map_err(|_| WellError::Malformed(s.to_string()))?;
        let column = column
            .parse::<u16>()
            .map_err(|_| WellError::Malformed(s.to_string()))?;
        Self::new(row, column)
    }
}

impl Display for Well {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // row <= MAX_ROW so this stays within 'A'..='Z'
        #[allow(clippy::cast_possible_truncation)]
        let letter = char::from(b'A' + self.row as u8);
        write!(f, "{}{}", letter, self.column + 1)
    }
}

impl FromStr for Well {
    type Err = WellError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("[[") {
            return Self::parse_numeric(s);
        }

        let mut chars = s.chars();
        let letter = chars
            .next()
            .filter(char::is_ascii_uppercase)
            .ok_or_else(|| WellError::Malformed(s.to_string()))?;
        let column: u16 = chars
            .as_str()
            .parse()
            .map_err(|_| WellError::Malformed(s.to_string()))?;
        if column == 0 {
            return Err(WellError::Malformed(s.to_string()));
        }
        Self::new(letter as u16 - u16::from(b'A'), column - 1)
    }
}

impl Serialize for Well {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Well {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Errors from well parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WellError {
    /// Not a recognizable well coordinate
    #[error("malformed well coordinate: {0}")]
    Malformed(String),

    /// Row beyond `Z`
    #[error("row {0} out of range")]
    RowOutOfRange(u16),

    /// Column with no 1-based form
    #[error("column {0} out of range")]
    ColumnOutOfRange(u16),
}
