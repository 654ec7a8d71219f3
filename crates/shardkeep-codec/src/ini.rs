//! Ordered INI writer for `cluster.ini` and `server.ini`.
//!
//! The game reads these files with a forgiving parser, but operators read
//! them too, so sections and keys are written in the order they were added.

use std::fmt::{self, Display};

/// A `[NAME]` section with its `key = value` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl IniSection {
    /// Appends a `key = value` line.
    pub fn entry(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.entries.push((key.to_owned(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An INI document built section by section.
///
/// ```
/// use shardkeep_codec::IniDocument;
///
/// let mut ini = IniDocument::new();
/// ini.section("NETWORK").entry("server_port", 10999);
/// ini.section("SHARD").entry("is_master", true).entry("name", "Master");
/// assert_eq!(
///     ini.to_string(),
///     "[NETWORK]\nserver_port = 10999\n\n[SHARD]\nis_master = true\nname = Master\n"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new section and returns it for chaining entries.
    pub fn section(&mut self, name: &str) -> &mut IniSection {
        self.sections.push(IniSection {
            name: name.to_owned(),
            entries: Vec::new(),
        });
        let last = self.sections.len() - 1;
        &mut self.sections[last]
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    /// Finds a section by name.
    pub fn get(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }
}

impl Display for IniDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "[{}]", section.name)?;
            for (key, value) in &section.entries {
                writeln!(f, "{key} = {value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_keep_insertion_order() {
        let mut ini = IniDocument::new();
        ini.section("B").entry("z", 1).entry("a", 2);
        ini.section("A").entry("k", "v");
        let names: Vec<&str> = ini.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
        assert_eq!(ini.get("B").and_then(|s| s.get("a")), Some("2"));
    }

    #[test]
    fn test_empty_document_renders_nothing() {
        assert_eq!(IniDocument::new().to_string(), "");
    }
}
