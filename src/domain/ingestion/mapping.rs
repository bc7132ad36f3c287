//! Header renaming applied to every ingested record

use std::collections::HashMap;

/// Maps source file headers onto document field names.
///
/// Lookups are case-sensitive. Headers without an entry are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderMapping {
    entries: HashMap<String, String>,
}

impl HeaderMapping {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(source, target)| (source.into(), target.into()))
                .collect(),
        }
    }

    /// Header table for user import files
    pub fn users() -> Self {
        Self::new([
            ("firstname", "firstName"),
            ("lastname", "lastName"),
            ("email", "email"),
            ("phone", "phone"),
            ("status", "status"),
            ("provider", "marketingSource"),
            ("birth_date", "birthDate"),
        ])
    }

    /// Field name for a source header, if the header is mapped
    pub fn target(&self, header: &str) -> Option<&str> {
        self.entries.get(header).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HeaderMapping {
    fn default() -> Self {
        Self::users()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_mapping() {
        let mapping = HeaderMapping::users();

        assert_eq!(mapping.len(), 7);
        assert_eq!(mapping.target("provider"), Some("marketingSource"));
        assert_eq!(mapping.target("birth_date"), Some("birthDate"));
        assert_eq!(mapping.target("email"), Some("email"));
    }

    #[test]
    fn test_unmapped_and_case_sensitive() {
        let mapping = HeaderMapping::users();

        assert_eq!(mapping.target("notes"), None);
        assert_eq!(mapping.target("FirstName"), None);
    }
}
