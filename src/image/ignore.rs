//! `.dockerignore`-style path matching
//!
//! Patterns are root-anchored globs over `/`-separated relative paths:
//! `*` and `?` stay within one path segment, `**` spans segments, `[...]`
//! is a character class and `\` escapes the next character. A leading `!`
//! re-includes what earlier patterns excluded; the last matching pattern
//! decides. A path is ignored when it or any of its parent directories is.

use regex::Regex;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Paths never shipped in a build context, before any `.dockerignore` rules
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".terraform",
    ".ghpc",
    ".ansible",
    "vendor",
    "bin",
    "pkg",
    "node_modules",
    "*.log",
    "tmp/",
    ".DS_Store",
    "__pycache__",
];

#[derive(Debug, Error)]
pub enum IgnoreError {
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
struct IgnorePattern {
    source: String,
    regex: Regex,
    exclusion: bool,
}

/// Compiled, ordered set of ignore patterns
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<IgnorePattern>,
}

impl IgnoreMatcher {
    pub fn new<I, S>(patterns: I) -> Result<Self, IgnoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut compiled = Vec::new();
        for raw in patterns {
            let raw = raw.as_ref().trim();
            let (exclusion, body) = match raw.strip_prefix('!') {
                Some(rest) => (true, rest.trim()),
                None => (false, raw),
            };
            let cleaned = clean_pattern(body);
            if cleaned.is_empty() {
                if exclusion {
                    return Err(IgnoreError::InvalidPattern {
                        pattern: raw.to_string(),
                        reason: "empty exclusion".to_string(),
                    });
                }
                continue;
            }
            let regex = compile(&cleaned)?;
            compiled.push(IgnorePattern {
                source: cleaned,
                regex,
                exclusion,
            });
        }
        Ok(Self { patterns: compiled })
    }

    /// Built-in deny-list followed by the context's `.dockerignore`, if any
    pub fn for_context(dir: &Path) -> Result<Self, IgnoreError> {
        let mut patterns: Vec<String> = DEFAULT_IGNORE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        let from_file = read_dockerignore(dir)?;
        if !from_file.is_empty() {
            debug!(count = from_file.len(), dir = %dir.display(), "Loaded .dockerignore patterns");
        }
        patterns.extend(from_file);
        Self::new(patterns)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Cleaned pattern texts, `!`-prefixed for exclusions
    pub fn patterns(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|p| {
                if p.exclusion {
                    format!("!{}", p.source)
                } else {
                    p.source.clone()
                }
            })
            .collect()
    }

    /// Whether `path` (relative, `/`-separated) or one of its parents is ignored
    pub fn is_ignored(&self, path: &str) -> bool {
        let path = clean_path(path);
        if path.is_empty() {
            return false;
        }
        let parents = parent_prefixes(&path);

        let mut ignored = false;
        for pattern in &self.patterns {
            // Only a pattern that could flip the verdict needs checking
            if pattern.exclusion != ignored {
                continue;
            }
            let hit = pattern.regex.is_match(&path)
                || parents.iter().any(|parent| pattern.regex.is_match(parent));
            if hit {
                ignored = !pattern.exclusion;
            }
        }
        ignored
    }
}

/// Non-empty, non-comment lines of `<dir>/.dockerignore`. A missing file yields nothing.
pub fn read_dockerignore(dir: &Path) -> Result<Vec<String>, IgnoreError> {
    let path = dir.join(".dockerignore");
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(IgnoreError::Read { path, source }),
    };
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Lexically clean a pattern: drop `.` and empty segments, resolve `..`,
/// strip leading and trailing slashes.
fn clean_pattern(pattern: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in pattern.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

fn clean_path(path: &str) -> String {
    clean_pattern(&path.replace('\\', "/"))
}

/// `a/b/c` -> `["a", "a/b"]`
fn parent_prefixes(path: &str) -> Vec<&str> {
    path.match_indices('/').map(|(i, _)| &path[..i]).collect()
}

fn compile(pattern: &str) -> Result<Regex, IgnoreError> {
    let invalid = |reason: &str| IgnoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let chars: Vec<char> = pattern.chars().collect();
    let mut re = String::from("^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    while chars.get(i + 1) == Some(&'*') {
                        i += 1;
                    }
                    if chars.get(i + 1) == Some(&'/') {
                        // `**/` matches zero or more whole directories
                        i += 1;
                        re.push_str("(.*/)?");
                    } else {
                        re.push_str(".*");
                    }
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push_str("[^/]"),
            '[' => {
                let mut class = String::from("[");
                let mut j = i + 1;
                if matches!(chars.get(j), Some('!') | Some('^')) {
                    class.push('^');
                    j += 1;
                }
                let start = j;
                while j < chars.len() && (chars[j] != ']' || j == start) {
                    match chars[j] {
                        '\\' => {
                            j += 1;
                            let escaped = chars.get(j).ok_or_else(|| invalid("trailing escape"))?;
                            class.push_str(&regex::escape(&escaped.to_string()));
                        }
                        '[' => class.push_str("\\["),
                        c => class.push(c),
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(invalid("unterminated character class"));
                }
                class.push(']');
                re.push_str(&class);
                i = j;
            }
            '\\' => {
                i += 1;
                let escaped = chars.get(i).ok_or_else(|| invalid("trailing escape"))?;
                re.push_str(&regex::escape(&escaped.to_string()));
            }
            c => re.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }
    re.push('$');

    Regex::new(&re).map_err(|e| invalid(&e.to_string()))
}
