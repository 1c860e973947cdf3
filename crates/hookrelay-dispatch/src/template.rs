//! Message template resolution
//!
//! Templates contain `{field.name}` placeholders resolved against the
//! event's fields. A placeholder may carry a transform pipeline after a
//! pipe: `{world.name|upper|truncate:8}`. Transform arguments are
//! colon-separated; `\:` and `\|` escape literal colons and pipes.
//!
//! Redacted fields render as `[REDACTED]` and never pass through
//! transforms. Missing fields render as the empty string and, when
//! validation is on, emit a one-shot warning.

use hookrelay_core::FieldValue;
use hookrelay_telemetry::WarningTracker;
use regex::Regex;
use std::collections::HashMap;

use crate::redaction::RedactionPolicy;

/// Literal token substituted for redacted fields
pub const REDACTED_TOKEN: &str = "[REDACTED]";

/// Renders message templates against event fields
pub struct TemplateResolver {
    placeholder: Regex,
}

impl TemplateResolver {
    /// Create a new resolver
    pub fn new() -> Self {
        Self {
            placeholder: Regex::new(r"\{([^}]+)\}").expect("placeholder pattern"),
        }
    }

    /// Render `template`, substituting placeholders from `fields`.
    ///
    /// An absent template renders to the empty string. `validate` gates the
    /// missing-placeholder warning only; substitution behavior is the same
    /// either way.
    pub fn resolve(
        &self,
        template: Option<&str>,
        fields: &HashMap<String, FieldValue>,
        redaction: &RedactionPolicy<'_>,
        warnings: &WarningTracker,
        validate: bool,
    ) -> String {
        let Some(template) = template else {
            return String::new();
        };

        self.placeholder
            .replace_all(template, |caps: &regex::Captures<'_>| {
                let inner = &caps[1];
                let (key, transform_spec) = match inner.find('|') {
                    Some(idx) => (inner[..idx].trim(), Some(&inner[idx + 1..])),
                    None => (inner, None),
                };

                if redaction.is_redacted(key) {
                    return REDACTED_TOKEN.to_string();
                }

                let value = fields.get(key);
                if value.is_none() && validate {
                    warnings.warn_once(
                        format!("missing-placeholder:{key}"),
                        format!("missing value for placeholder {{{key}}}"),
                    );
                }
                let raw = value.map(ToString::to_string).unwrap_or_default();
                self.apply_transforms(raw, transform_spec, key, warnings)
            })
            .into_owned()
    }

    fn apply_transforms(
        &self,
        value: String,
        spec: Option<&str>,
        key: &str,
        warnings: &WarningTracker,
    ) -> String {
        let Some(spec) = spec else {
            return value;
        };
        if spec.is_empty() {
            return value;
        }

        let mut current = value;
        for part in split_unescaped(spec, b'|') {
            let part = unescape_pipe_only(part);
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            current = self.apply_single(current, trimmed, key, warnings);
        }
        current
    }

    fn apply_single(
        &self,
        value: String,
        spec: &str,
        key: &str,
        warnings: &WarningTracker,
    ) -> String {
        let Some(transform) = TransformSpec::parse(spec) else {
            return value;
        };
        let args = &transform.args;

        match transform.name.as_str() {
            "trim" => value.trim().to_string(),
            "lower" => value.to_lowercase(),
            "upper" => value.to_uppercase(),
            "default" => {
                if value.is_empty() && !args.is_empty() {
                    args[0].clone()
                } else {
                    value
                }
            }
            "truncate" => match args.first().and_then(|arg| arg.parse::<usize>().ok()) {
                Some(max) if value.chars().count() > max => value.chars().take(max).collect(),
                _ => value,
            },
            "replace" => {
                if args.len() >= 2 {
                    value.replace(&args[0], &args[1])
                } else {
                    value
                }
            }
            "last-path-segment" => value.rsplit('/').next().unwrap_or_default().to_string(),
            "first-path-segment" => value.split('/').next().unwrap_or_default().to_string(),
            "map" => {
                if args.len() % 2 != 0 {
                    return value;
                }
                for pair in args.chunks_exact(2) {
                    if value == pair[0] {
                        return pair[1].clone();
                    }
                }
                value
            }
            "regex" => self.apply_regex(value, args, key, warnings),
            _ => value,
        }
    }

    fn apply_regex(
        &self,
        value: String,
        args: &[String],
        key: &str,
        warnings: &WarningTracker,
    ) -> String {
        if args.len() < 2 {
            return value;
        }
        match Regex::new(&args[0]) {
            Ok(pattern) => pattern.replace_all(&value, args[1].as_str()).into_owned(),
            Err(err) => {
                warnings.warn_once(
                    format!("placeholder-regex-error:{key}"),
                    format!(
                        "regex transform failed for placeholder {{{key}}}: {err}, using untransformed value"
                    ),
                );
                value
            }
        }
    }
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Parsed transform: a name plus colon-separated arguments
struct TransformSpec {
    name: String,
    args: Vec<String>,
}

impl TransformSpec {
    /// Parse `name` or `name:arg1:arg2:…`; the first unescaped colon
    /// separates the name from the arguments.
    fn parse(spec: &str) -> Option<TransformSpec> {
        if spec.is_empty() {
            return None;
        }
        match find_unescaped(spec, b':') {
            None => Some(TransformSpec {
                name: unescape(spec).trim().to_string(),
                args: Vec::new(),
            }),
            Some(idx) => Some(TransformSpec {
                name: unescape(&spec[..idx]).trim().to_string(),
                args: split_unescaped(&spec[idx + 1..], b':')
                    .into_iter()
                    .map(unescape)
                    .collect(),
            }),
        }
    }
}

fn find_unescaped(s: &str, target: u8) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            i += 2;
            continue;
        }
        if bytes[i] == target {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn split_unescaped(s: &str, separator: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            i += 2;
            continue;
        }
        if bytes[i] == separator {
            parts.push(&s[start..i]);
            start = i + 1;
        }
        i += 1;
    }
    parts.push(&s[start..]);
    parts
}

/// Unescape `\:` and `\|`; other backslashes pass through
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek() {
                Some(&next) if next == ':' || next == '|' => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Unescape only `\|`, leaving `\:` for per-transform parsing
fn unescape_pipe_only(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&'|') {
            out.push('|');
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}
