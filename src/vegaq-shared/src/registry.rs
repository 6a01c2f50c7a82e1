//! Registry of bound lazy query expressions
//!
//! Charts are bound to `LazyFrame`s before their spec is compiled; the
//! registry hands out a stable fingerprint for each frame so that rewritten
//! specs can refer back to it at interaction time. Entries are inserted once
//! and live for the lifetime of the process - a root expression may be
//! referenced again by any later interaction with the chart.

use std::collections::HashMap;
use std::sync::RwLock;

use polars::prelude::LazyFrame;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Length of the hex fingerprint handed out as a registry key.
const FINGERPRINT_LEN: usize = 16;

/// Process-wide store mapping expression fingerprints to lazy frames.
///
/// Binding is idempotent: the fingerprint is a hash of the frame's logical
/// plan, so rebinding an identical frame returns the same key without
/// replacing the stored expression.
#[derive(Default)]
pub struct ExprRegistry {
    exprs: RwLock<HashMap<String, LazyFrame>>,
}

impl ExprRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a lazy frame, returning its fingerprint key.
    pub fn bind(&self, frame: &LazyFrame) -> Result<String> {
        let key = fingerprint(frame)?;
        let mut exprs = self
            .exprs
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        exprs.entry(key.clone()).or_insert_with(|| frame.clone());
        log::debug!("bound expression under key '{key}'");
        Ok(key)
    }

    /// Look up a bound frame by key.
    pub fn get(&self, key: &str) -> Option<LazyFrame> {
        let exprs = self
            .exprs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        exprs.get(key).cloned()
    }

    /// Whether a key is bound.
    pub fn contains(&self, key: &str) -> bool {
        let exprs = self
            .exprs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        exprs.contains_key(key)
    }

    /// Number of bound expressions.
    pub fn len(&self) -> usize {
        let exprs = self
            .exprs
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        exprs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash the frame's logical plan into a short stable hex key.
fn fingerprint(frame: &LazyFrame) -> Result<String> {
    let plan = frame.describe_plan()?;
    let digest = Sha256::digest(plan.as_bytes());
    let mut key = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        key.push_str(&format!("{byte:02x}"));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample_frame() -> LazyFrame {
        df!("a" => [1i64, 2, 3]).unwrap().lazy()
    }

    #[test]
    fn test_bind_is_idempotent() {
        let registry = ExprRegistry::new();
        let frame = sample_frame();
        let k1 = registry.bind(&frame).unwrap();
        let k2 = registry.bind(&frame).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_plans_get_distinct_keys() {
        let registry = ExprRegistry::new();
        let k1 = registry.bind(&sample_frame()).unwrap();
        let k2 = registry
            .bind(&df!("b" => ["x", "y"]).unwrap().lazy())
            .unwrap();
        assert_ne!(k1, k2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lookup() {
        let registry = ExprRegistry::new();
        let key = registry.bind(&sample_frame()).unwrap();
        assert!(registry.contains(&key));
        assert!(registry.get(&key).is_some());
        assert!(!registry.contains("missing"));
        assert!(registry.get("missing").is_none());
    }
}
