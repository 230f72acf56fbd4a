//! Tokenizer for process arguments.
//!
//! Long flags (`--name`, `--name=value`, `--name value`) are keyed by their
//! name, short flags (`-x`, `-x=value`, `-x value`) by `-x`. Everything after
//! `--` is passthrough.

use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagError {
    #[error("bad flag syntax: {0}")]
    BadFlagSyntax(String),
}

/// Matching open/close quotation marks stripped from flag values.
const QUOTE_PAIRS: [(char, char); 11] = [
    ('"', '"'),
    ('\'', '\''),
    ('`', '`'),
    ('\u{201C}', '\u{201D}'),
    ('\u{2018}', '\u{2019}'),
    ('\u{201E}', '\u{201C}'),
    ('\u{201A}', '\u{2018}'),
    ('\u{00AB}', '\u{00BB}'),
    ('\u{2039}', '\u{203A}'),
    ('\u{300C}', '\u{300D}'),
    ('\u{300E}', '\u{300F}'),
];

fn strip_quotes(value: &str) -> &str {
    let mut chars = value.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return value;
    };
    let matched = (first == last && QUOTE_PAIRS.iter().any(|(open, _)| *open == first))
        || QUOTE_PAIRS.iter().any(|pair| *pair == (first, last));
    if matched {
        &value[first.len_utf8()..value.len() - last.len_utf8()]
    } else {
        value
    }
}

/// Boolean literals as accepted by the flag parser.
pub fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// A parsed flag occurrence. The last occurrence of a name wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    name: String,
    value: Option<String>,
}

impl Flag {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value, or `""` for a valueless flag.
    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn string(&self, default: &str) -> String {
        self.value.clone().unwrap_or_else(|| default.to_owned())
    }

    pub fn int(&self, default: i64) -> i64 {
        self.value
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// A valueless flag counts as set.
    pub fn bool(&self, default: bool) -> bool {
        match self.value.as_deref() {
            Some(v) => parse_bool(v).unwrap_or(default),
            None => true,
        }
    }
}

/// Result of [`CommandLineParser::parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    flags: BTreeMap<String, Flag>,
    args: Vec<String>,
    passthrough: Vec<String>,
}

impl CommandLine {
    /// Looks up `--long`, then `-short`. Either may be empty.
    pub fn flag(&self, long: &str, short: &str) -> Option<&Flag> {
        let by_long = (!long.is_empty()).then(|| self.flags.get(long)).flatten();
        by_long.or_else(|| {
            if short.is_empty() {
                None
            } else {
                self.flags.get(&format!("-{short}"))
            }
        })
    }

    pub fn flags(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }

    /// Positional arguments before `--`.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Everything after `--`.
    pub fn passthrough(&self) -> &[String] {
        &self.passthrough
    }
}

/// Tokenizes an argument vector (without the program name).
#[derive(Debug, Clone)]
pub struct CommandLineParser {
    tokens: Vec<String>,
    bool_hints: HashSet<String>,
    negatable: HashSet<String>,
}

impl CommandLineParser {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: args.into_iter().map(Into::into).collect(),
            bool_hints: HashSet::new(),
            negatable: HashSet::new(),
        }
    }

    /// Declares a flag that takes no value; its bare occurrence means `true`.
    /// A negatable hint also accepts `--no-<long>`, which inverts the value.
    pub fn add_hint_bool(&mut self, long: &str, short: &str, negatable: bool) -> &mut Self {
        if !long.is_empty() {
            self.bool_hints.insert(format!("--{long}"));
            if negatable {
                self.bool_hints.insert(format!("--no-{long}"));
                self.negatable.insert(long.to_owned());
            }
        }
        if !short.is_empty() {
            self.bool_hints.insert(format!("-{short}"));
        }
        self
    }

    pub fn parse(&self) -> Result<CommandLine, FlagError> {
        let mut cmd = CommandLine::default();
        let mut tokens = self.tokens.iter().peekable();

        while let Some(token) = tokens.next() {
            if token == "--" {
                cmd.passthrough.extend(tokens.by_ref().cloned());
                break;
            }
            if token.len() < 2 || !token.starts_with('-') {
                cmd.args.push(token.clone());
                continue;
            }

            let long = token.starts_with("--");
            let dashes = if long { "--" } else { "-" };
            let body = &token[dashes.len()..];
            if body.is_empty() || body.starts_with('-') || body.starts_with('=') {
                return Err(FlagError::BadFlagSyntax(token.clone()));
            }

            let (mut name, mut value) = match body.find('=') {
                Some(eq) => (body[..eq].to_owned(), Some(body[eq + 1..].to_owned())),
                None => (body.to_owned(), None),
            };
            if value.is_none() {
                if self.bool_hints.contains(&format!("{dashes}{name}")) {
                    value = Some("true".to_owned());
                } else if let Some(next) = tokens.next_if(|next| !next.starts_with('-')) {
                    value = Some(next.clone());
                }
            }

            if long {
                let negated = name
                    .strip_prefix("no-")
                    .filter(|n| self.negatable.contains(*n));
                if let Some(positive) = negated {
                    let parsed = value.as_deref().and_then(parse_bool).unwrap_or(false);
                    value = Some((!parsed).to_string());
                    name = positive.to_owned();
                }
            }

            let value = value.map(|v| strip_quotes(&v).to_owned());
            let key = if long { name.clone() } else { format!("-{name}") };
            cmd.flags.insert(key, Flag { name, value });
        }
        Ok(cmd)
    }
}
