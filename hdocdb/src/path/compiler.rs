use crate::common::DEFAULT_PATH_CACHE_CAPACITY;
use crate::errors::{ErrorKind, HDocError, HDocResult};
use crate::path::{FieldPath, Segment};
use lru::LruCache;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

static DEFAULT_COMPILER: Lazy<PathCompiler> =
    Lazy::new(|| PathCompiler::new(DEFAULT_PATH_CACHE_CAPACITY));

/// Compiles `path` through the process-wide cache.
pub fn compile(path: &str) -> HDocResult<FieldPath> {
    DEFAULT_COMPILER.compile(path)
}

/// Turns path strings into [FieldPath]s, remembering the most recently compiled ones.
///
/// Parsing is pure; the cache only saves re-parsing strings that are seen repeatedly, such
/// as the paths of a condition evaluated against every row of a scan.
pub struct PathCompiler {
    cache: Option<Mutex<LruCache<String, FieldPath>>>,
}

impl PathCompiler {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        PathCompiler {
            cache: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
        }
    }

    pub fn compile(&self, path: &str) -> HDocResult<FieldPath> {
        let Some(cache) = &self.cache else {
            return parse(path);
        };

        if let Some(compiled) = cache.lock().get(path) {
            return Ok(compiled.clone());
        }
        let compiled = parse(path)?;
        cache.lock().put(path.to_string(), compiled.clone());
        Ok(compiled)
    }

    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map(|c| c.lock().len()).unwrap_or(0)
    }
}

fn syntax_error(path: &str, reason: &str) -> HDocError {
    log::error!("Invalid path '{}': {}", path, reason);
    HDocError::new(
        &format!("Invalid path '{}': {}", path, reason),
        ErrorKind::PathSyntaxError,
    )
}

/// Parses a path without consulting any cache.
pub fn parse(path: &str) -> HDocResult<FieldPath> {
    let mut segments = Vec::new();
    if path.is_empty() {
        return Ok(FieldPath::root());
    }

    let chars: Vec<char> = path.chars().collect();
    let mut pos = 0;

    // a path always opens with a field name, and every '.' must be followed by one
    loop {
        let start = pos;
        while pos < chars.len() && !matches!(chars[pos], '.' | '[' | ']') {
            pos += 1;
        }
        if pos == start {
            return Err(syntax_error(path, "empty field name"));
        }
        segments.push(Segment::Field(chars[start..pos].iter().collect()));

        while pos < chars.len() && chars[pos] == '[' {
            let open = pos;
            pos += 1;
            while pos < chars.len() && chars[pos] != ']' {
                pos += 1;
            }
            if pos == chars.len() {
                return Err(syntax_error(path, "unclosed '['"));
            }
            let inner: String = chars[open + 1..pos].iter().collect();
            pos += 1;

            if inner.is_empty() {
                segments.push(Segment::Wildcard);
            } else if inner.chars().all(|c| c.is_ascii_digit()) {
                let index = inner
                    .parse::<usize>()
                    .map_err(|_| syntax_error(path, "array index out of range"))?;
                segments.push(Segment::Index(index));
            } else {
                return Err(syntax_error(
                    path,
                    &format!("'{}' is not an array index", inner),
                ));
            }
        }

        if pos == chars.len() {
            break;
        }
        match chars[pos] {
            '.' => {
                pos += 1;
                if pos == chars.len() {
                    return Err(syntax_error(path, "trailing '.'"));
                }
            }
            ']' => return Err(syntax_error(path, "unexpected ']'")),
            c => return Err(syntax_error(path, &format!("unexpected '{}'", c))),
        }
    }

    Ok(FieldPath::from_segments(segments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(path: &str) -> Vec<Segment> {
        parse(path).unwrap().segments().to_vec()
    }

    #[test]
    fn parses_dotted_fields() {
        assert_eq!(
            segments("a.b.c"),
            vec![
                Segment::Field("a".into()),
                Segment::Field("b".into()),
                Segment::Field("c".into())
            ]
        );
    }

    #[test]
    fn parses_indexes_and_wildcards() {
        assert_eq!(
            segments("a[][].b"),
            vec![
                Segment::Field("a".into()),
                Segment::Wildcard,
                Segment::Wildcard,
                Segment::Field("b".into())
            ]
        );
        assert_eq!(
            segments("Scores[1]"),
            vec![Segment::Field("Scores".into()), Segment::Index(1)]
        );
    }

    #[test]
    fn empty_string_is_root() {
        assert!(parse("").unwrap().is_root());
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in ["a..b", ".a", "a.", "[0]", "a[1", "a[x]", "a[-1]", "a]b", "a[0]b", "a.[0]"] {
            let err = parse(bad).unwrap_err();
            assert_eq!(err.kind(), &ErrorKind::PathSyntaxError, "path {:?}", bad);
        }
    }

    #[test]
    fn field_names_may_hold_spaces_and_symbols() {
        assert_eq!(
            segments("first name.$weird"),
            vec![
                Segment::Field("first name".into()),
                Segment::Field("$weird".into())
            ]
        );
    }

    #[test]
    fn compiler_caches_paths() {
        let compiler = PathCompiler::new(2);
        compiler.compile("a.b").unwrap();
        compiler.compile("a.b").unwrap();
        assert_eq!(compiler.cached_len(), 1);
        compiler.compile("c").unwrap();
        compiler.compile("d").unwrap();
        assert_eq!(compiler.cached_len(), 2);
    }

    #[test]
    fn compiler_does_not_cache_failures() {
        let compiler = PathCompiler::new(4);
        assert!(compiler.compile("a..b").is_err());
        assert_eq!(compiler.cached_len(), 0);
    }

    #[test]
    fn zero_capacity_disables_cache() {
        let compiler = PathCompiler::new(0);
        assert_eq!(compiler.compile("x[3]").unwrap().to_string(), "x[3]");
        assert_eq!(compiler.cached_len(), 0);
    }
}
