//! Matching a breakpoint's (possibly partial) path against the known files.

use std::path::Path;

use tracing::warn;

/// User-supplied resolution hook.
///
/// Returning `None` declines and leaves resolution to the default rules.
pub trait PathResolver {
    fn resolve(&self, requested: &str, known: &[String]) -> Option<Vec<String>>;
}

impl<F> PathResolver for F
where
    F: Fn(&str, &[String]) -> Option<Vec<String>>,
{
    fn resolve(&self, requested: &str, known: &[String]) -> Option<Vec<String>> {
        self(requested, known)
    }
}

/// Outcome of matching one requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unique(String),
    NotFound,
    /// More than one candidate and nothing to prefer among them.
    Ambiguous(Vec<String>),
}

impl Resolution {
    fn from_candidates(mut candidates: Vec<String>) -> Self {
        match candidates.len() {
            0 => Self::NotFound,
            1 => Self::Unique(candidates.remove(0)),
            _ => Self::Ambiguous(candidates),
        }
    }

    /// The flat candidate list: one path, or none.
    #[must_use]
    pub fn into_paths(self) -> Vec<String> {
        match self {
            Self::Unique(path) => vec![path],
            Self::NotFound | Self::Ambiguous(_) => Vec::new(),
        }
    }
}

/// Resolve `requested` against `known`, returning the matching paths.
///
/// Ambiguous and missing paths both yield an empty list.
#[must_use]
pub fn resolve(
    requested: &str,
    known: &[String],
    user_override: Option<&dyn PathResolver>,
) -> Vec<String> {
    resolve_in(requested, known, None, user_override).into_paths()
}

/// Like [`resolve`], additionally treating `base_dir/requested` as an exact
/// match, and keeping the reason when nothing unique was found.
#[must_use]
pub fn resolve_in(
    requested: &str,
    known: &[String],
    base_dir: Option<&Path>,
    user_override: Option<&dyn PathResolver>,
) -> Resolution {
    if let Some(resolver) = user_override {
        if let Some(paths) = resolver.resolve(requested, known) {
            let unknown: Vec<&String> = paths.iter().filter(|path| !known.contains(path)).collect();
            if unknown.is_empty() {
                return Resolution::from_candidates(paths);
            }
            warn!(
                requested,
                ?unknown,
                "path resolver override returned unknown files; using default resolution"
            );
        }
    }
    default_resolution(requested, known, base_dir)
}

fn default_resolution(requested: &str, known: &[String], base_dir: Option<&Path>) -> Resolution {
    let requested = normalize(requested);
    if requested.is_empty() {
        return Resolution::NotFound;
    }
    let mut exact = vec![requested.clone()];
    if let Some(base) = base_dir {
        exact.push(normalize(&base.join(&requested).to_string_lossy()));
    }
    if let Some(found) = known
        .iter()
        .find(|path| exact.iter().any(|candidate| normalize(path) == *candidate))
    {
        return Resolution::Unique(found.clone());
    }

    let suffix = requested.trim_start_matches('/');
    let candidates: Vec<String> = known
        .iter()
        .filter(|path| is_suffix_match(&normalize(path), suffix))
        .cloned()
        .collect();
    let resolution = Resolution::from_candidates(candidates);
    if let Resolution::Ambiguous(candidates) = &resolution {
        warn!(requested = %requested, ?candidates, "ambiguous source path");
    }
    resolution
}

/// `path` ends with `suffix` and the match starts at a separator boundary.
#[must_use]
pub fn is_suffix_match(path: &str, suffix: &str) -> bool {
    if suffix.is_empty() || !path.ends_with(suffix) {
        return false;
    }
    let start = path.len() - suffix.len();
    start == 0 || path.as_bytes()[start - 1] == b'/'
}

/// Normalize separators and collapse `.`/`..` components.
///
/// The result uses `/` separators; a leading `/` is kept.
#[must_use]
pub fn normalize(path: &str) -> String {
    let path = path.replace('\\', "/");
    let path = path.strip_prefix("file://").unwrap_or(&path);
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }
    let joined = parts.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn known(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|path| (*path).to_string()).collect()
    }

    #[test]
    fn suffix_match_respects_separators() {
        let files = known(&["/app/xfoo.js", "/app/lib/foo.js"]);
        assert_eq!(resolve("foo.js", &files, None), vec!["/app/lib/foo.js"]);
        assert!(resolve("oo.js", &files, None).is_empty());
    }

    #[test]
    fn ambiguous_suffix_yields_nothing() {
        let files = known(&["/app/a/foo.js", "/app/b/foo.js"]);
        assert_eq!(
            resolve_in("foo.js", &files, None, None),
            Resolution::Ambiguous(files.clone())
        );
        assert_eq!(
            resolve("a/foo.js", &files, None),
            vec!["/app/a/foo.js".to_string()]
        );
    }

    #[test]
    fn exact_path_beats_longer_suffix_matches() {
        let files = known(&["/app/foo.js", "/app/lib/app/foo.js"]);
        let base = PathBuf::from("/app");
        assert_eq!(
            resolve_in("foo.js", &files, Some(&base), None),
            Resolution::Unique("/app/foo.js".to_string())
        );
        assert_eq!(
            resolve("/app/foo.js", &files, None),
            vec!["/app/foo.js".to_string()]
        );
    }

    #[test]
    fn override_is_validated_against_known_files() {
        let files = known(&["/app/a/foo.js", "/app/b/foo.js"]);
        let picks_b = |_: &str, _: &[String]| Some(vec!["/app/b/foo.js".to_string()]);
        assert_eq!(
            resolve("foo.js", &files, Some(&picks_b)),
            vec!["/app/b/foo.js".to_string()]
        );

        let bogus = |_: &str, _: &[String]| Some(vec!["/elsewhere/foo.js".to_string()]);
        assert_eq!(
            resolve("a/foo.js", &files, Some(&bogus)),
            vec!["/app/a/foo.js".to_string()]
        );

        let declines = |_: &str, _: &[String]| None;
        assert!(resolve("foo.js", &files, Some(&declines)).is_empty());
    }

    #[test]
    fn normalize_collapses_components() {
        assert_eq!(normalize("./a/./b/../c.js"), "a/c.js");
        assert_eq!(normalize("file:///srv/app//x.js"), "/srv/app/x.js");
        assert_eq!(normalize("C:\\app\\x.js"), "C:/app/x.js");
        assert_eq!(normalize("../up.js"), "../up.js");
    }
}
