//! Fortran namelists.
//!
//! A namelist file is a sequence of groups:
//!
//! ```text
//! &ocean_nml
//!     dt = 1800.0      ! seconds
//!     diag_list = 'temp', 'salt'
//!     use_gm = .true.
//! /
//! ```
//!
//! and parses to `{"ocean_nml": {"dt": 1800.0, "diag_list": ["temp", "salt"], "use_gm": true}}`.
//! Keys and group names keep their case.
//!
//! Rendering patches the original text line by line: entries whose value did
//! not change are left alone together with every comment and blank line,
//! changed entries are rewritten as `    key = value`, removed entries and
//! groups are dropped, new entries go just before the group terminator and
//! new groups are appended. A group written on shared lines (`&g a=1, b=2 /`)
//! is re-emitted in one-entry-per-line form when anything inside it changes.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};
use tracing::trace;

use crate::error::{FormatError, FormatResult};
use crate::traits::{kind_name, ConfigFormat};

#[derive(Clone, Copy, Debug, Default)]
pub struct NamelistFormat;

impl ConfigFormat for NamelistFormat {
    fn name(&self) -> &'static str {
        "namelist"
    }

    fn parse(&self, text: &str) -> FormatResult<Value> {
        Ok(Document::parse(text)?.to_tree())
    }

    fn render(&self, original: &str, tree: &Value) -> FormatResult<String> {
        let Value::Object(groups) = tree else {
            return Err(FormatError::NotAMapping {
                format: self.name(),
                found: kind_name(tree),
            });
        };
        Document::parse(original)?.patch(original, groups)
    }
}

#[derive(Debug, PartialEq)]
enum Tok {
    Group(String),
    End,
    Slash,
    Eq,
    Comma,
    Word(String),
    Quoted(String),
}

#[derive(Debug)]
struct Token {
    tok: Tok,
    line: usize,
}

fn syntax(line: usize, message: impl Into<String>) -> FormatError {
    FormatError::Namelist {
        line: line + 1,
        message: message.into(),
    }
}

fn is_word_char(c: char) -> bool {
    !(c.is_whitespace() || matches!(c, ',' | '=' | '/' | '!' | '\'' | '"'))
}

fn tokenize(text: &str) -> FormatResult<Vec<Token>> {
    let mut tokens = Vec::new();
    for (line, raw) in text.lines().enumerate() {
        let mut chars = raw.chars().peekable();
        while let Some(&c) = chars.peek() {
            let tok = match c {
                '!' => break,
                c if c.is_whitespace() => {
                    chars.next();
                    continue;
                }
                ',' | '=' | '/' => {
                    chars.next();
                    match c {
                        ',' => Tok::Comma,
                        '=' => Tok::Eq,
                        _ => Tok::Slash,
                    }
                }
                '&' | '$' => {
                    chars.next();
                    let mut name = String::new();
                    while let Some(&n) = chars.peek() {
                        if !(n.is_alphanumeric() || n == '_') {
                            break;
                        }
                        name.push(n);
                        chars.next();
                    }
                    if name.is_empty() {
                        return Err(syntax(line, format!("'{c}' without a group name")));
                    }
                    if name.eq_ignore_ascii_case("end") {
                        Tok::End
                    } else {
                        Tok::Group(name)
                    }
                }
                '\'' | '"' => {
                    chars.next();
                    let mut s = String::new();
                    loop {
                        match chars.next() {
                            Some(q) if q == c => {
                                if chars.peek() == Some(&c) {
                                    chars.next();
                                    s.push(c);
                                } else {
                                    break;
                                }
                            }
                            Some(other) => s.push(other),
                            None => return Err(syntax(line, "unterminated string")),
                        }
                    }
                    Tok::Quoted(s)
                }
                _ => {
                    let mut word = String::new();
                    while let Some(&w) = chars.peek() {
                        if !is_word_char(w) {
                            break;
                        }
                        word.push(w);
                        chars.next();
                    }
                    Tok::Word(word)
                }
            };
            tokens.push(Token { tok, line });
        }
    }
    Ok(tokens)
}

/// Interpret an unquoted value: logical, integer, real (`d` exponents
/// allowed), or the raw text.
fn bare_value(word: &str) -> Value {
    match word.to_ascii_lowercase().as_str() {
        ".true." | ".t." | "t" => return Value::Bool(true),
        ".false." | ".f." | "f" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = word.parse::<i64>() {
        return Value::from(i);
    }
    let normalized = word.replace(['d', 'D'], "e");
    if normalized.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
        if let Some(n) = normalized.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(word.to_string())
}

#[derive(Debug)]
struct Entry {
    key: String,
    values: Vec<Value>,
    start: usize,
    end: usize,
}

impl Entry {
    fn value(&self) -> Value {
        match self.values.as_slice() {
            [] => Value::Null,
            [single] => single.clone(),
            many => Value::Array(many.to_vec()),
        }
    }
}

#[derive(Debug)]
struct Group {
    name: String,
    start: usize,
    end: usize,
    entries: Vec<Entry>,
}

impl Group {
    /// Value of `key` as the tree sees it: the last assignment wins.
    fn last_value(&self, key: &str) -> Option<Value> {
        self.entries.iter().rev().find(|e| e.key == key).map(Entry::value)
    }

    /// Whether `new` holds exactly the values this group already has.
    fn matches(&self, new: &Map<String, Value>) -> bool {
        let mut keys: Vec<&str> = self.entries.iter().map(|e| e.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        new.len() == keys.len() && new.iter().all(|(k, v)| self.last_value(k).as_ref() == Some(v))
    }
}

#[derive(Debug, Default)]
struct Document {
    groups: Vec<Group>,
}

impl Document {
    fn parse(text: &str) -> FormatResult<Self> {
        let tokens = tokenize(text)?;
        let mut groups: Vec<Group> = Vec::new();
        let mut open: Option<Group> = None;

        let mut i = 0;
        while i < tokens.len() {
            let Token { tok, line } = &tokens[i];
            let line = *line;
            i += 1;

            let Some(group) = open.as_mut() else {
                match tok {
                    Tok::Group(name) => {
                        if groups.iter().any(|g| g.name == *name) {
                            return Err(syntax(line, format!("duplicate group '&{name}'")));
                        }
                        open = Some(Group {
                            name: name.clone(),
                            start: line,
                            end: line,
                            entries: Vec::new(),
                        });
                    }
                    other => trace!(line = line + 1, token = ?other, "ignoring text outside a group"),
                }
                continue;
            };

            match tok {
                Tok::Group(name) => {
                    return Err(syntax(
                        line,
                        format!("group '&{name}' opened inside '&{}'", group.name),
                    ));
                }
                Tok::Slash | Tok::End => {
                    group.end = line;
                    if let Some(done) = open.take() {
                        groups.push(done);
                    }
                }
                Tok::Word(key) if matches!(tokens.get(i), Some(Token { tok: Tok::Eq, .. })) => {
                    i += 1;
                    group.entries.push(Entry {
                        key: key.clone(),
                        values: Vec::new(),
                        start: line,
                        end: line,
                    });
                }
                Tok::Word(_) | Tok::Quoted(_) => {
                    let Some(entry) = group.entries.last_mut() else {
                        return Err(syntax(line, "value without a key"));
                    };
                    entry.values.push(match tok {
                        Tok::Word(w) => bare_value(w),
                        Tok::Quoted(s) => Value::String(s.clone()),
                        _ => Value::Null,
                    });
                    entry.end = line;
                }
                Tok::Eq => return Err(syntax(line, "'=' without a key")),
                Tok::Comma => {}
            }
        }

        if let Some(group) = open {
            return Err(syntax(
                group.start,
                format!("group '&{}' is not terminated with '/'", group.name),
            ));
        }
        Ok(Self { groups })
    }

    fn to_tree(&self) -> Value {
        let mut tree = Map::new();
        for group in &self.groups {
            let mut entries = Map::new();
            for entry in &group.entries {
                entries.insert(entry.key.clone(), entry.value());
            }
            tree.insert(group.name.clone(), Value::Object(entries));
        }
        Value::Object(tree)
    }

    /// Groups that share a line with another item (header, entry,
    /// terminator, or another group) cannot be patched line by line.
    fn compact_groups(&self) -> Vec<bool> {
        let mut owners: HashMap<usize, usize> = HashMap::new();
        for group in &self.groups {
            *owners.entry(group.start).or_default() += 1;
            *owners.entry(group.end).or_default() += 1;
            for entry in &group.entries {
                for line in entry.start..=entry.end {
                    *owners.entry(line).or_default() += 1;
                }
            }
        }
        self.groups
            .iter()
            .map(|g| (g.start..=g.end).any(|line| owners.get(&line).copied().unwrap_or(0) > 1))
            .collect()
    }

    /// Compact groups to re-emit whole: those that changed, plus any compact
    /// group sharing a line with a changed or removed one.
    fn groups_to_rewrite(&self, tree: &Map<String, Value>) -> Vec<bool> {
        let compact = self.compact_groups();
        let touched: Vec<bool> = self
            .groups
            .iter()
            .map(|g| match tree.get(&g.name) {
                Some(Value::Object(new)) => !g.matches(new),
                _ => true,
            })
            .collect();
        let mut rewrite: Vec<bool> = compact.iter().zip(&touched).map(|(c, t)| *c && *t).collect();

        let mut spreading = true;
        while spreading {
            spreading = false;
            for i in 0..self.groups.len() {
                if !(compact[i] && touched[i]) && !rewrite[i] {
                    continue;
                }
                for j in 0..self.groups.len() {
                    let (a, b) = (&self.groups[i], &self.groups[j]);
                    if !rewrite[j] && compact[j] && a.start <= b.end && b.start <= a.end {
                        rewrite[j] = true;
                        spreading = true;
                    }
                }
            }
        }
        rewrite
    }

    fn patch(&self, original: &str, tree: &Map<String, Value>) -> FormatResult<String> {
        let lines: Vec<&str> = original.split_inclusive('\n').collect();
        let mut edits = Edits::new(lines.len());
        let rewrite = self.groups_to_rewrite(tree);

        for (group, rewrite) in self.groups.iter().zip(rewrite) {
            let Some(new) = tree.get(&group.name) else {
                edits.delete(group.start..=group.end);
                continue;
            };
            let Value::Object(new) = new else {
                return Err(unrepresentable(&group.name, "a group must be a mapping"));
            };

            if rewrite {
                edits.delete(group.start..=group.end);
                edits.append(group.start, render_group(&group.name, new)?);
                continue;
            }
            if group.matches(new) {
                continue;
            }

            for (idx, entry) in group.entries.iter().enumerate() {
                let is_last = !group.entries[idx + 1..].iter().any(|e| e.key == entry.key);
                match new.get(&entry.key) {
                    None => edits.delete(entry.start..=entry.end),
                    Some(value) if group.last_value(&entry.key).as_ref() == Some(value) => {}
                    Some(value) => {
                        edits.delete(entry.start..=entry.end);
                        if is_last {
                            let path = format!("{}.{}", group.name, entry.key);
                            edits.append(entry.start, vec![render_entry(&entry.key, value, &path)?]);
                        }
                    }
                }
            }

            let mut added = Vec::new();
            for (key, value) in new {
                if group.entries.iter().all(|e| e.key != *key) {
                    added.push(render_entry(key, value, &format!("{}.{key}", group.name))?);
                }
            }
            edits.insert_before(group.end, added);
        }

        let mut out = edits.apply(&lines);

        for (name, value) in tree {
            if self.groups.iter().any(|g| g.name == *name) {
                continue;
            }
            let Value::Object(entries) = value else {
                return Err(unrepresentable(name, "a group must be a mapping"));
            };
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            if !out.is_empty() {
                out.push('\n');
            }
            for line in render_group(name, entries)? {
                out.push_str(&line);
                out.push('\n');
            }
        }
        Ok(out)
    }
}

/// Per-line edit plan over the original text.
struct Edits {
    /// `None` keeps the line; `Some(lines)` replaces it (empty deletes it).
    replace: Vec<Option<Vec<String>>>,
    before: Vec<Vec<String>>,
}

impl Edits {
    fn new(len: usize) -> Self {
        Self {
            replace: vec![None; len],
            before: vec![Vec::new(); len],
        }
    }

    fn delete(&mut self, lines: std::ops::RangeInclusive<usize>) {
        for line in lines {
            if let Some(slot) = self.replace.get_mut(line) {
                slot.get_or_insert_with(Vec::new);
            }
        }
    }

    fn append(&mut self, line: usize, text: Vec<String>) {
        if let Some(slot) = self.replace.get_mut(line) {
            slot.get_or_insert_with(Vec::new).extend(text);
        }
    }

    fn insert_before(&mut self, line: usize, text: Vec<String>) {
        if let Some(slot) = self.before.get_mut(line) {
            slot.extend(text);
        }
    }

    fn apply(self, lines: &[&str]) -> String {
        let mut out = String::new();
        for (idx, line) in lines.iter().enumerate() {
            for inserted in &self.before[idx] {
                out.push_str(inserted);
                out.push('\n');
            }
            match &self.replace[idx] {
                None => out.push_str(line),
                Some(replacement) => {
                    for text in replacement {
                        out.push_str(text);
                        out.push('\n');
                    }
                }
            }
        }
        out
    }
}

fn unrepresentable(path: &str, message: &str) -> FormatError {
    FormatError::Unrepresentable {
        format: "namelist",
        path: path.to_string(),
        message: message.to_string(),
    }
}

fn render_group(name: &str, entries: &Map<String, Value>) -> FormatResult<Vec<String>> {
    let mut lines = vec![format!("&{name}")];
    for (key, value) in entries {
        lines.push(render_entry(key, value, &format!("{name}.{key}"))?);
    }
    lines.push("/".to_string());
    Ok(lines)
}

fn render_entry(key: &str, value: &Value, path: &str) -> FormatResult<String> {
    Ok(format!("    {key} = {}", render_value(value, path)?))
}

/// Fortran spelling of a value.
///
/// Strings that already start with a quote are written as-is so callers can
/// pass pre-quoted lists such as `'u_flux', 'v_flux'`.
pub fn render_value(value: &Value, path: &str) -> FormatResult<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(true) => ".true.".to_string(),
        Value::Bool(false) => ".false.".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:?}"),
            _ => n.to_string(),
        },
        Value::String(s) if s.starts_with('\'') || s.starts_with('"') => s.clone(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Array(_) | Value::Object(_) => {
                    Err(unrepresentable(path, "nested sequences and mappings have no namelist form"))
                }
                scalar => render_value(scalar, path),
            })
            .collect::<FormatResult<Vec<_>>>()?
            .join(", "),
        Value::Object(_) => return Err(unrepresentable(path, "mappings have no namelist form")),
    })
}
