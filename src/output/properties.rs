//! Java properties files with multi-valued keys.
//!
//! The dialect matches what framework launchers read: `#` and `!` comments,
//! `=`, `:` or whitespace between key and value, backslash line
//! continuations and escapes, `\uXXXX` code points. Unescaped commas split a
//! value into a list and repeated keys accumulate into one list.

use chrono::Utc;
use std::fmt::Write as _;

/// An ordered set of properties, each holding one or more values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    entries: Vec<(String, Vec<String>)>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(content: &str) -> Self {
        let mut properties = Properties::new();
        for line in logical_lines(content) {
            let line = line.trim_start();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, raw_value) = split_key_value(line);
            let values = split_values(raw_value);
            properties.append(&unescape(key), values);
        }
        properties
    }

    /// First value of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_all(key)?.first().map(String::as_str)
    }

    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Replaces every value of `key`, keeping its position if present.
    pub fn set(&mut self, key: &str, values: Vec<String>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = values,
            None => self.entries.push((key.to_string(), values)),
        }
    }

    fn append(&mut self, key: &str, values: Vec<String>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1.extend(values),
            None => self.entries.push((key.to_string(), values)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the file, one line per value, under a generated-on header.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Generated by bundlescan on {}", Utc::now().to_rfc2822());
        for (key, values) in &self.entries {
            let key = escape(key, true);
            if values.is_empty() {
                let _ = writeln!(out, "{} = ", key);
            }
            for value in values {
                let _ = writeln!(out, "{} = {}", key, escape(value, false));
            }
        }
        out
    }
}

/// Joins continuation lines. A line continues when it ends with an odd
/// number of backslashes.
fn logical_lines(content: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for physical in content.lines() {
        let physical = physical.trim_end_matches('\r');
        let part = match pending {
            Some(_) => physical.trim_start(),
            None => physical,
        };
        let trailing = part.chars().rev().take_while(|c| *c == '\\').count();
        let continues = trailing % 2 == 1;
        let text = if continues { &part[..part.len() - 1] } else { part };

        let mut line = pending.take().unwrap_or_default();
        line.push_str(text);
        if continues {
            pending = Some(line);
        } else {
            lines.push(line);
        }
    }

    if let Some(line) = pending {
        lines.push(line);
    }
    lines
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..index], line[index + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[index..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..index], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

/// Splits a raw value on unescaped commas, unescaping each element. An
/// empty value is an empty list.
fn split_values(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    let mut values = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => push_escape(&mut current, next, &mut chars),
                None => current.push('\\'),
            },
            ',' => values.push(std::mem::take(&mut current).trim().to_string()),
            c => current.push(c),
        }
    }
    values.push(current.trim().to_string());
    values
}

fn unescape(raw: &str) -> String {
    let mut out = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) => push_escape(&mut out, next, &mut chars),
            None => out.push('\\'),
        }
    }
    out
}

fn push_escape(out: &mut String, escape: char, rest: &mut std::str::Chars<'_>) {
    match escape {
        't' => out.push('\t'),
        'n' => out.push('\n'),
        'r' => out.push('\r'),
        'f' => out.push('\u{c}'),
        'u' => {
            let hex: String = rest.clone().take(4).collect();
            match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                Some(decoded) if hex.len() == 4 => {
                    out.push(decoded);
                    for _ in 0..4 {
                        rest.next();
                    }
                }
                _ => out.push('u'),
            }
        }
        other => out.push(other),
    }
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' if !is_key => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            c => out.push(c),
        }
    }
    out
}
