//! The canonical process name shared by the registry, the supervisor and
//! the working files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Namespace tag separating managed processes from unrelated OS processes.
pub const PROCESS_PREFIX: &str = "mockoon-";

/// Fallback used when an environment name normalizes to nothing.
const DEFAULT_NAME_TOKEN: &str = "mock";

/// Canonical process name: the unique key shared by the registry, the
/// supervisor and the working file name. Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessName(String);

impl ProcessName {
    /// Normalize a user-facing name into a canonical process name.
    ///
    /// The input is trimmed and lower-cased, whitespace runs become a single
    /// `-`, path separators are replaced so the name is always a valid file
    /// stem, and an empty result falls back to `mock`. The result carries
    /// [`PROCESS_PREFIX`] exactly once, so canonicalizing a canonical name
    /// returns it unchanged.
    pub fn canonical(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let joined = lowered
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .replace(['/', '\\'], "-");
        if joined.len() > PROCESS_PREFIX.len() && joined.starts_with(PROCESS_PREFIX) {
            return Self(joined);
        }
        let body = if joined.is_empty() {
            DEFAULT_NAME_TOKEN
        } else {
            joined.as_str()
        };
        Self(format!("{PROCESS_PREFIX}{body}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a supervisor process name belongs to this tool.
    pub fn is_managed(name: &str) -> bool {
        name.starts_with(PROCESS_PREFIX)
    }

    /// File name of the working file for this process.
    pub fn working_file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl Deref for ProcessName {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ProcessName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ProcessName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
