//! Object class matching.
//!
//! Quota rules name object classes by fragments of their blueprint path
//! (`Bedroll_Fiber`, `DwellingNewWall_.`). The fragments follow SQL `LIKE`
//! semantics because that is how the game database is usually queried by
//! admins: `_` matches any single character, `%` any run, everything else is
//! literal, comparison is ASCII case-insensitive, and a fragment may appear
//! anywhere in the class path.

use regex::Regex;

use crate::error::WorldError;

/// Decides whether an object class belongs to some category.
pub trait ClassMatcher {
    /// Whether `class` matches.
    fn matches(&self, class: &str) -> bool;
}

/// A single `LIKE '%fragment%'` pattern compiled to a regex.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    /// Compile a fragment.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidPattern`] if the translated regex does
    /// not compile.
    pub fn new(fragment: &str) -> Result<Self, WorldError> {
        let translated = like_to_regex(fragment);
        let regex = Regex::new(&translated).map_err(|source| WorldError::InvalidPattern {
                pattern: fragment.to_owned(),
                source,
            })?;
        Ok(Self {
            source: fragment.to_owned(),
            regex,
        })
    }

    /// The fragment as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl ClassMatcher for LikePattern {
    fn matches(&self, class: &str) -> bool {
        self.regex.is_match(class)
    }
}

/// Any-of set of [`LikePattern`]s.
#[derive(Debug, Clone, Default)]
pub struct ClassSet {
    patterns: Vec<LikePattern>,
}

impl ClassSet {
    /// Compile every fragment.
    ///
    /// # Errors
    ///
    /// Returns the first [`WorldError::InvalidPattern`] encountered.
    pub fn new<S: AsRef<str>>(fragments: &[S]) -> Result<Self, WorldError> {
        let patterns = fragments
            .iter()
            .map(|f| LikePattern::new(f.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// The compiled patterns.
    pub fn patterns(&self) -> &[LikePattern] {
        &self.patterns
    }
}

impl ClassMatcher for ClassSet {
    fn matches(&self, class: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(class))
    }
}

/// Translate a `LIKE` fragment into an unanchored regex (the implicit
/// surrounding `%` make anchoring unnecessary). ASCII letters become
/// two-case classes; every other character matches only itself, as in
/// `SQLite`.
fn like_to_regex(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len().saturating_mul(4));
    for c in fragment.chars() {
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            c if c.is_ascii_alphabetic() => {
                out.push('[');
                out.push(c.to_ascii_lowercase());
                out.push(c.to_ascii_uppercase());
                out.push(']');
            }
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0_u8; 4]))),
        }
    }
    out
}
