use std::{borrow::Borrow, fmt, str::FromStr};

/// Caller-assigned identifier of a single address row.
///
/// The id is opaque: numeric ids are carried in their textual form
/// and echoed back unchanged.
#[derive(Default, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn is_valid(&self) -> bool {
        !self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for RecordId {
    fn from(from: String) -> Self {
        Self(from)
    }
}

impl From<&str> for RecordId {
    fn from(from: &str) -> Self {
        from.to_owned().into()
    }
}

impl From<u64> for RecordId {
    fn from(from: u64) -> Self {
        from.to_string().into()
    }
}

impl From<usize> for RecordId {
    fn from(from: usize) -> Self {
        from.to_string().into()
    }
}

impl From<RecordId> for String {
    fn from(from: RecordId) -> Self {
        from.0
    }
}

impl FromStr for RecordId {
    type Err = ();
    fn from_str(s: &str) -> Result<RecordId, Self::Err> {
        Ok(s.into())
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        self.as_ref()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.as_ref())
    }
}
