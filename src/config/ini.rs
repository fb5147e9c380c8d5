//! Ordered, section-based INI model used to render `smb.conf`.
//!
//! Configuration text is never assembled by string concatenation at call
//! sites: callers build [`IniSection`] values and a single serializer
//! ([`IniDocument::render`]) produces the file.  Values are forced onto a
//! single line so a caller-supplied comment cannot smuggle in extra keys or
//! sections.
use thiserror::Error;

/// Errors produced while parsing INI text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IniError {
    /// A key-value line appeared before any `[section]` header.
    #[error("entry outside of section at line {line}: {content}")]
    EntryOutsideSection {
        /// 1-based line number.
        line: usize,
        /// Offending line, trimmed.
        content: String,
    },

    /// A line inside a section is neither a comment nor `key = value`.
    #[error("invalid key-value pair at line {line}: {content}")]
    InvalidEntry {
        /// 1-based line number.
        line: usize,
        /// Offending line, trimmed.
        content: String,
    },
}

/// A named section with ordered `key = value` entries.
///
/// # Examples
///
/// ```
/// use smb_zfs::config::ini::IniSection;
///
/// let section = IniSection::new("shared")
///     .entry("path", "/tank/shared")
///     .entry("read only", "no");
/// assert_eq!(section.get("read only"), Some("no"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniSection {
    /// Section name as written between brackets.
    pub name: String,
    /// Entries in insertion order.
    pub entries: Vec<(String, String)>,
}

impl IniSection {
    /// Create an empty section.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: single_line(&name.into()),
            entries: Vec::new(),
        }
    }

    /// Append an entry, replacing an existing key of the same name.
    #[must_use]
    pub fn entry(mut self, key: &str, value: impl AsRef<str>) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key` to `value`, keeping the key's original position if present.
    pub fn set(&mut self, key: &str, value: impl AsRef<str>) {
        let key = single_line(key);
        let value = single_line(value.as_ref());
        if let Some(existing) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            existing.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Look up a value by key (case-insensitive, as Samba treats keys).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// An ordered collection of [`IniSection`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<IniSection>,
}

impl IniDocument {
    /// Create an empty document.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Parse INI text.  `#` and `;` start comment lines, which are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use smb_zfs::config::ini::IniDocument;
    ///
    /// let doc = IniDocument::parse("[global]\n  workgroup = HOME\n; note\n").unwrap();
    /// assert_eq!(doc.section("global").unwrap().get("workgroup"), Some("HOME"));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error for entries outside a section or lines without `=`.
    pub fn parse(content: &str) -> Result<Self, IniError> {
        let mut sections = Vec::new();
        let mut current: Option<IniSection> = None;

        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(name) = parse_header(trimmed) {
                if let Some(section) = current.take() {
                    sections.push(section);
                }
                current = Some(IniSection::new(name));
            } else if let Some(ref mut section) = current {
                let Some((key, value)) = trimmed.split_once('=') else {
                    return Err(IniError::InvalidEntry {
                        line: idx + 1,
                        content: trimmed.to_string(),
                    });
                };
                section
                    .entries
                    .push((key.trim().to_string(), value.trim().to_string()));
            } else {
                return Err(IniError::EntryOutsideSection {
                    line: idx + 1,
                    content: trimmed.to_string(),
                });
            }
        }

        if let Some(section) = current {
            sections.push(section);
        }
        Ok(Self { sections })
    }

    /// All sections in order.
    #[must_use]
    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    /// Find a section by name (case-insensitive).
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Whether a section named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.section(name).is_some()
    }

    /// Replace the section with the same name in place, or append it.
    pub fn upsert_section(&mut self, section: IniSection) {
        if let Some(existing) = self
            .sections
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(&section.name))
        {
            *existing = section;
        } else {
            self.sections.push(section);
        }
    }

    /// Remove a section; returns `true` if one was removed.
    pub fn remove_section(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| !s.name.eq_ignore_ascii_case(name));
        self.sections.len() != before
    }

    /// Serialize the document.  Sections are separated by a blank line and
    /// entries are indented by four spaces.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (idx, section) in self.sections.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                out.push_str("    ");
                out.push_str(key);
                out.push_str(" = ");
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }
}

fn parse_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    (!inner.is_empty()).then_some(inner)
}

/// Collapse control characters (newlines included) to spaces.
fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
