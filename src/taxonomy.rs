//! Category taxonomy — the closed set of listing labels.
//!
//! A [`Taxonomy`] is built once at config load and shared (cheap clone) by
//! the classifier, the listing store, and the HTTP layer. The only way to
//! obtain a [`Category`] is through [`Taxonomy::lookup`] or
//! [`Taxonomy::list_categories`], so holding one proves membership.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Labels used when `[taxonomy]` is absent from the config.
pub const DEFAULT_CATEGORIES: &[&str] = &["Books", "Electronics", "Furniture", "Clothing", "Other"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("taxonomy must contain at least one category")]
    Empty,
    #[error("category label at position {0} is blank")]
    Blank(usize),
    #[error("duplicate category label: {0}")]
    Duplicate(String),
}

/// A label that is a member of the taxonomy it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category(Arc<str>);

impl Category {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Ordered, non-empty, duplicate-free set of categories.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    categories: Arc<[Category]>,
}

impl Taxonomy {
    /// Validate `labels` and build the set. Labels are trimmed; duplicates
    /// are detected case-insensitively so `"Books"` and `"books"` cannot
    /// both appear.
    pub fn new<I, S>(labels: I) -> Result<Self, TaxonomyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for (idx, label) in labels.into_iter().enumerate() {
            let label = label.as_ref().trim();
            if label.is_empty() {
                return Err(TaxonomyError::Blank(idx));
            }
            if !seen.insert(label.to_lowercase()) {
                return Err(TaxonomyError::Duplicate(label.to_string()));
            }
            categories.push(Category(Arc::from(label)));
        }

        if categories.is_empty() {
            return Err(TaxonomyError::Empty);
        }

        Ok(Self { categories: categories.into() })
    }

    /// Ordered categories; never empty.
    pub fn list_categories(&self) -> &[Category] {
        &self.categories
    }

    /// Resolve `label` to a member. Matching is exact after trimming
    /// surrounding whitespace.
    pub fn lookup(&self, label: &str) -> Option<Category> {
        let label = label.trim();
        self.categories.iter().find(|c| c.as_str() == label).cloned()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.lookup(label).is_some()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.categories.iter().map(Category::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES
                .iter()
                .map(|l| Category(Arc::from(*l)))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_order() {
        let t = Taxonomy::new(["Books", "Electronics", "Other"]).unwrap();
        assert_eq!(t.labels(), vec!["Books", "Electronics", "Other"]);
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn rejects_empty() {
        let labels: [&str; 0] = [];
        assert_eq!(Taxonomy::new(labels).unwrap_err(), TaxonomyError::Empty);
    }

    #[test]
    fn rejects_blank_label() {
        assert_eq!(
            Taxonomy::new(["Books", "  "]).unwrap_err(),
            TaxonomyError::Blank(1)
        );
    }

    #[test]
    fn rejects_case_insensitive_duplicates() {
        assert_eq!(
            Taxonomy::new(["Books", "books"]).unwrap_err(),
            TaxonomyError::Duplicate("books".into())
        );
    }

    #[test]
    fn lookup_trims_but_is_case_sensitive() {
        let t = Taxonomy::default();
        assert_eq!(t.lookup(" Books\n").unwrap().as_str(), "Books");
        assert!(t.lookup("books").is_none());
        assert!(t.lookup("Gadgets").is_none());
        assert!(!t.contains(""));
    }

    #[test]
    fn default_matches_constant() {
        assert_eq!(Taxonomy::default().labels(), DEFAULT_CATEGORIES.to_vec());
    }

    #[test]
    fn category_serializes_as_plain_string() {
        let c = Taxonomy::default().lookup("Furniture").unwrap();
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"Furniture\"");
    }
}
