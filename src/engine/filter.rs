use crate::{Error, Result, engine::TypeTag};
use regex::bytes::Regex;
use std::collections::HashSet;

/// Event admission predicates.
///
/// An event passes iff each non-`None` predicate admits it: database by
/// set membership, type by set membership, key by matching any of the
/// patterns.
#[derive(Debug, Default, Clone)]
pub struct FilterSet {
    pub dbs: Option<HashSet<i64>>,
    pub types: Option<HashSet<TypeTag>>,
    pub key_patterns: Option<Vec<Regex>>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dbs(mut self, dbs: impl IntoIterator<Item = i64>) -> Self {
        self.dbs = Some(dbs.into_iter().collect());
        self
    }

    #[must_use]
    pub fn types(mut self, types: impl IntoIterator<Item = TypeTag>) -> Self {
        self.types = Some(types.into_iter().collect());
        self
    }

    #[must_use]
    pub fn key_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.key_patterns = Some(patterns);
        self
    }

    /// Compiles the given patterns, surfacing invalid ones as a
    /// configuration error.
    pub fn key_pattern_strs<'a>(
        self,
        patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p).map_err(|e| Error::Config(format!("Invalid key pattern: {e}"))))
            .collect::<Result<Vec<_>>>()?;

        Ok(self.key_patterns(patterns))
    }

    /// Admission check for a `KeyValue` event.
    pub fn passes_key(&self, db: i64, key: &[u8], type_tag: TypeTag) -> bool {
        if let Some(dbs) = &self.dbs
            && !dbs.contains(&db)
        {
            return false;
        }

        if let Some(types) = &self.types
            && !types.contains(&type_tag)
        {
            return false;
        }

        self.matches_key(key)
    }

    /// Admission check for a replicated command.
    ///
    /// The type predicate does not apply; the key predicate is evaluated
    /// against the command's primary key. A command whose database or
    /// keys are unknown passes the corresponding predicate.
    pub fn passes_command(&self, db: Option<i64>, primary_key: Option<&[u8]>) -> bool {
        if let Some(dbs) = &self.dbs
            && let Some(db) = db
            && !dbs.contains(&db)
        {
            return false;
        }

        match primary_key {
            Some(key) => self.matches_key(key),
            None => true,
        }
    }

    fn matches_key(&self, key: &[u8]) -> bool {
        match &self.key_patterns {
            Some(patterns) => patterns.iter().any(|p| p.is_match(key)),
            None => true,
        }
    }
}
