//! Lexeme record: all thought ids sharing one canonical value.
//!
//! # Invariants
//! - `id ∈ contexts` iff the thought's value canonicalizes to `key`.
//! - A lexeme with an empty context set must not exist; the index
//!   garbage-collects it the moment the last context is removed.

use crate::canon::LexemeKey;
use crate::model::thought::ThoughtId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index record for one canonical value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lexeme {
    /// Canonical key digest.
    pub key: LexemeKey,
    /// Canonical text the key was derived from.
    pub canonical: String,
    /// Every thought id whose value canonicalizes to `key`.
    pub contexts: BTreeSet<ThoughtId>,
}

impl Lexeme {
    pub fn new(key: LexemeKey, canonical: impl Into<String>) -> Self {
        Self {
            key,
            canonical: canonical.into(),
            contexts: BTreeSet::new(),
        }
    }
}
