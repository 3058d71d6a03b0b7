//! Value canonicalization and lexeme key derivation.
//!
//! # Responsibility
//! - Reduce raw thought values to a canonical lookup form.
//! - Derive the fixed-width lexeme key digest from the canonical form.
//!
//! # Invariants
//! - `normalize` is deterministic: equal inputs always produce equal keys.
//! - Values differing only in case, punctuation, or singular/plural form
//!   normalize to the same canonical form.
//! - A leading metaprogramming marker (`=`) survives normalization, so
//!   `=test` and `test` never collide.
//! - Emoji-only values keep their emoji; mixed values drop them.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::cell::RefCell;
use std::collections::HashMap;

/// Fixed-width lexeme lookup key.
///
/// First 8 bytes of `Sha256(canonical form)`, big-endian. The digest is
/// stable across processes and platforms, which rules out
/// `std::hash::DefaultHasher`. Key collisions are treated as equal keys;
/// at 2^-64 per pair they are negligible against any realistic corpus.
pub type LexemeKey = u64;

/// Metaprogramming marker recognized at the start of a value.
pub const META_MARKER: char = '=';

/// Canonical form of one value: normalized text plus its key digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canonical {
    /// Normalized lookup text.
    pub text: String,
    /// Digest of `text`.
    pub key: LexemeKey,
}

static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));
static NONWORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\p{Extended_Pictographic}]").expect("valid non-word regex"));
static EMOJI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Extended_Pictographic}").expect("valid emoji regex"));

/// Memoizing canonicalizer.
///
/// Normalization is pure but runs several regex passes; the interior cache
/// keeps repeated lookups of the same raw value cheap. The cache is owned
/// state, not a module-level global, so no memo outlives its graph.
#[derive(Debug, Default)]
pub struct Canonicalizer {
    cache: RefCell<HashMap<String, Canonical>>,
}

impl Canonicalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical form for `value`, computing and caching it on
    /// first sight.
    pub fn canonicalize(&self, value: &str) -> Canonical {
        if let Some(hit) = self.cache.borrow().get(value) {
            return hit.clone();
        }
        let text = normalize_value(value);
        let canonical = Canonical {
            key: key_of(&text),
            text,
        };
        self.cache
            .borrow_mut()
            .insert(value.to_string(), canonical.clone());
        canonical
    }

    /// Canonical text for `value`.
    pub fn normalize(&self, value: &str) -> String {
        self.canonicalize(value).text
    }

    /// Lexeme key for `value`.
    pub fn key(&self, value: &str) -> LexemeKey {
        self.canonicalize(value).key
    }
}

/// Uncached normalization pipeline.
///
/// Order matters: markup strip, lowercase, non-word removal (with the
/// marker and all-punctuation exceptions), emoji strip, singularize.
pub fn normalize_value(value: &str) -> String {
    let stripped = MARKUP_RE.replace_all(value, "");
    let lowered = stripped.to_lowercase();

    let (marked, body) = match lowered.strip_prefix(META_MARKER) {
        Some(rest) => (true, rest.to_string()),
        None => (false, lowered),
    };

    let mut result = NONWORD_RE.replace_all(&body, "").into_owned();
    if result.is_empty() && !body.is_empty() {
        // All-punctuation values must not collapse to the empty key; trim
        // trailing plural markers only.
        result = body.trim_end_matches('s').to_string();
    }

    if !is_emoji_only(&body) {
        result = EMOJI_RE.replace_all(&result, "").into_owned();
    }

    // `"s"` is a reserved collision guard and never singularizes to empty.
    if result != "s" {
        result = singularize(&result);
    }

    if marked {
        format!("{META_MARKER}{result}")
    } else {
        result
    }
}

/// Digest of an already-normalized value.
pub fn key_of(canonical_text: &str) -> LexemeKey {
    let digest = Sha256::digest(canonical_text.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

fn is_emoji_only(value: &str) -> bool {
    if value.is_empty() || !EMOJI_RE.is_match(value) {
        return false;
    }
    EMOJI_RE
        .replace_all(value, "")
        .chars()
        .all(|c| !c.is_alphanumeric())
}

/// Rule-based English singularization over the canonical (already
/// lowercased, word-characters-only) form.
fn singularize(word: &str) -> String {
    const IRREGULAR: &[(&str, &str)] = &[
        ("children", "child"),
        ("people", "person"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("geese", "goose"),
        ("mice", "mouse"),
    ];
    for (plural, singular) in IRREGULAR {
        if word == *plural {
            return (*singular).to_string();
        }
    }

    if word.len() > 3 && word.ends_with("ies") {
        return format!("{}y", &word[..word.len() - 3]);
    }
    if ["sses", "shes", "ches", "xes", "zes"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    if word.len() > 1 && word.ends_with('s') {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::{key_of, normalize_value, singularize, Canonicalizer};

    #[test]
    fn singularize_covers_common_endings() {
        assert_eq!(singularize("dogs"), "dog");
        assert_eq!(singularize("berries"), "berry");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("classes"), "class");
        assert_eq!(singularize("glass"), "glass");
        assert_eq!(singularize("bus"), "bus");
        assert_eq!(singularize("children"), "child");
    }

    #[test]
    fn normalize_strips_markup_and_case() {
        assert_eq!(normalize_value("<b>Hello</b> World"), "helloworld");
        assert_eq!(normalize_value("HELLO world"), normalize_value("helloworld"));
    }

    #[test]
    fn marker_prefix_is_preserved() {
        assert_eq!(normalize_value("=Flags"), "=flag");
        assert_ne!(normalize_value("=test"), normalize_value("test"));
    }

    #[test]
    fn all_punctuation_value_keeps_a_key() {
        let normalized = normalize_value(":-)");
        assert!(!normalized.is_empty());
    }

    #[test]
    fn emoji_only_values_stay_distinct() {
        assert_ne!(normalize_value("\u{1F34E}"), normalize_value("\u{1F34A}"));
        assert_eq!(normalize_value("apple \u{1F34E}"), normalize_value("Apples"));
    }

    #[test]
    fn reserved_s_never_collapses() {
        assert_eq!(normalize_value("s"), "s");
    }

    #[test]
    fn memoized_and_uncached_paths_agree() {
        let canon = Canonicalizer::new();
        let direct = normalize_value("Dogs!");
        let cached = canon.normalize("Dogs!");
        let cached_again = canon.normalize("Dogs!");
        assert_eq!(direct, cached);
        assert_eq!(cached, cached_again);
        assert_eq!(canon.key("Dogs!"), key_of(&direct));
    }
}
