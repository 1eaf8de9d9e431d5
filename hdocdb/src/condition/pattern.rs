use crate::errors::HDocResult;
use regex::Regex;
use std::fmt::{Debug, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    Regex,
    Like { escape: Option<char> },
}

/// A string pattern compiled to an anchored regular expression.
///
/// A pattern always matches the whole string. `LIKE` patterns translate `%` to any run of
/// characters and `_` to a single character; the escape character makes the next one literal.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    kind: PatternKind,
    regex: Regex,
}

impl Pattern {
    pub fn regex(source: &str) -> HDocResult<Pattern> {
        let regex = compile(&format!("^(?:{})$", source))?;
        Ok(Pattern {
            source: source.to_string(),
            kind: PatternKind::Regex,
            regex,
        })
    }

    pub fn like(source: &str, escape: Option<char>) -> HDocResult<Pattern> {
        let mut translated = String::from("(?s)^");
        let mut chars = source.chars();
        while let Some(c) = chars.next() {
            if Some(c) == escape {
                match chars.next() {
                    Some(next) => translated.push_str(&regex::escape(&next.to_string())),
                    // a trailing escape stands for itself
                    None => translated.push_str(&regex::escape(&c.to_string())),
                }
                continue;
            }
            match c {
                '%' => translated.push_str(".*"),
                '_' => translated.push('.'),
                other => translated.push_str(&regex::escape(&other.to_string())),
            }
        }
        translated.push('$');

        Ok(Pattern {
            source: source.to_string(),
            kind: PatternKind::Like { escape },
            regex: compile(&translated)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_like(&self) -> bool {
        matches!(self.kind, PatternKind::Like { .. })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn compile(expression: &str) -> HDocResult<Regex> {
    Regex::new(expression).map_err(|err| {
        log::error!("Invalid pattern {}: {}", expression, err);
        err.into()
    })
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.kind == other.kind
    }
}

impl Debug for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("source", &self.source)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Display for Pattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            PatternKind::Regex => write!(f, "matches {:?}", self.source),
            PatternKind::Like { escape: None } => write!(f, "like {:?}", self.source),
            PatternKind::Like {
                escape: Some(escape),
            } => write!(f, "like {:?} escape {:?}", self.source, escape),
        }
    }
}
