//! JAR manifest and OSGi header parsing.
//!
//! A manifest is a sequence of sections separated by blank lines. The first
//! section holds the main attributes; each following section starts with a
//! `Name:` attribute naming a path inside the archive. Long values are
//! wrapped onto continuation lines that begin with a single space.
//!
//! `Export-Package` values follow the OSGi header grammar: comma separated
//! clauses, each made of `;` separated package names, `attr=value`
//! attributes and `dir:=value` directives. Quoted values may contain commas
//! and semicolons.

use crate::error::{Result, ScanError};

pub const EXPORT_PACKAGE: &str = "Export-Package";
pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const SPECIFICATION_VERSION: &str = "Specification-Version";
pub const IMPLEMENTATION_VERSION: &str = "Implementation-Version";

/// Attributes of one manifest section. Names compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    values: Vec<(String, String)>,
}

impl Attributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .values
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn append_to_last(&mut self, continuation: &str) -> bool {
        match self.values.last_mut() {
            Some((_, value)) => {
                value.push_str(continuation);
                true
            }
            None => false,
        }
    }
}

/// A parsed `META-INF/MANIFEST.MF`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub main: Attributes,
    /// Per-entry sections keyed by their `Name` attribute, in file order.
    pub entries: Vec<(String, Attributes)>,
}

impl Manifest {
    pub fn parse(content: &str) -> Result<Self> {
        let mut manifest = Manifest::default();
        let mut current = Attributes::default();
        let mut in_main = true;

        for (index, raw_line) in content.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim_end_matches('\r');

            if line.is_empty() {
                manifest.close_section(&mut current, &mut in_main);
                continue;
            }

            if let Some(continuation) = line.strip_prefix(' ') {
                if !current.append_to_last(continuation) {
                    return Err(ScanError::ManifestParse {
                        line: line_number,
                        reason: "continuation line without attribute".to_string(),
                    });
                }
                continue;
            }

            let (name, value) = line.split_once(':').ok_or_else(|| ScanError::ManifestParse {
                line: line_number,
                reason: format!("missing ':' in '{}'", line),
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ScanError::ManifestParse {
                    line: line_number,
                    reason: "empty attribute name".to_string(),
                });
            }
            current.insert(name, value.strip_prefix(' ').unwrap_or(value));
        }

        manifest.close_section(&mut current, &mut in_main);
        Ok(manifest)
    }

    fn close_section(&mut self, current: &mut Attributes, in_main: &mut bool) {
        let section = std::mem::take(current);
        if *in_main {
            self.main = section;
            *in_main = false;
            return;
        }
        if section.is_empty() {
            return;
        }
        // Sections without a Name do not describe an entry.
        if let Some(name) = section.get("Name").map(str::to_string) {
            self.entries.push((name, section));
        }
    }

    pub fn main_attribute(&self, name: &str) -> Option<&str> {
        self.main.get(name)
    }
}

/// One clause of an OSGi header such as `Export-Package`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderClause {
    pub packages: Vec<String>,
    pub attributes: Vec<(String, String)>,
    pub directives: Vec<(String, String)>,
}

impl HeaderClause {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The exported version, honoring the legacy `specification-version`.
    pub fn version(&self) -> Option<&str> {
        self.attribute("version")
            .or_else(|| self.attribute("specification-version"))
    }
}

/// Parses an OSGi header value into clauses.
pub fn parse_header(value: &str) -> Result<Vec<HeaderClause>> {
    let mut clauses = Vec::new();

    for clause_text in split_unquoted(value, ',')? {
        let clause_text = clause_text.trim();
        if clause_text.is_empty() {
            continue;
        }

        let mut clause = HeaderClause::default();
        for part in split_unquoted(clause_text, ';')? {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((key, val)) = part.split_once(":=") {
                clause
                    .directives
                    .push((key.trim().to_string(), unquote(val.trim())));
            } else if let Some((key, val)) = part.split_once('=') {
                clause
                    .attributes
                    .push((key.trim().to_string(), unquote(val.trim())));
            } else {
                clause.packages.push(part.to_string());
            }
        }

        if clause.packages.is_empty() {
            return Err(ScanError::ManifestParse {
                line: 0,
                reason: format!("header clause without name: '{}'", clause_text),
            });
        }
        clauses.push(clause);
    }

    Ok(clauses)
}

fn split_unquoted(value: &str, separator: char) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (index, c) in value.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == separator && !in_quotes {
            parts.push(&value[start..index]);
            start = index + c.len_utf8();
        }
    }

    if in_quotes {
        return Err(ScanError::ManifestParse {
            line: 0,
            reason: format!("unterminated quote in '{}'", value),
        });
    }

    parts.push(&value[start..]);
    Ok(parts)
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}
