//! Forward-reference placeholder bookkeeping.
//!
//! An LLM may announce "append child X to parent" as soon as it decides on
//! X's key, before it has finished generating X's body. The manager issues a
//! synthetic stand-in element for such keys and tracks when the real
//! definition is still owed. Placeholders are structurally ordinary elements
//! with a reserved type, so the renderer needs no special code path beyond
//! recognizing that type.

use std::{
    collections::{BTreeSet, HashMap},
    time::Duration,
};

use genui_protocol::{UiElement, now_ms};
use tokio::time::Instant;
use tracing::debug;

/// Reserved component type for placeholder elements.
pub const PLACEHOLDER_TYPE: &str = "__placeholder__";

pub const DEFAULT_PLACEHOLDER_TIMEOUT: Duration = Duration::from_millis(5000);

struct PlaceholderInfo {
    parent_key: Option<String>,
    created_at: Instant,
    referenced_by: BTreeSet<String>,
}

/// Outcome of [`PlaceholderManager::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub element: UiElement,
    /// Keys that registered a reference before resolution; the caller
    /// re-renders these. Empty when no placeholder preceded the element.
    pub dependents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderStats {
    pub placeholders: usize,
    pub pending: usize,
    pub oldest_age: Duration,
}

pub struct PlaceholderManager {
    placeholders: HashMap<String, PlaceholderInfo>,
    /// Elements that resolved without a preceding placeholder.
    pending: HashMap<String, UiElement>,
    timeout: Duration,
}

impl PlaceholderManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            placeholders: HashMap::new(),
            pending: HashMap::new(),
            timeout,
        }
    }

    /// Track a forward-referenced key and return a synthetic element
    /// suitable for immediate rendering as a loading stub.
    pub fn create_placeholder(&mut self, key: &str, parent_key: Option<&str>) -> UiElement {
        self.placeholders.insert(
            key.to_owned(),
            PlaceholderInfo {
                parent_key: parent_key.map(str::to_owned),
                created_at: Instant::now(),
                referenced_by: BTreeSet::new(),
            },
        );
        debug!(key, parent = parent_key, "placeholder created");

        let mut element = UiElement::new(key, PLACEHOLDER_TYPE);
        element.props.insert("_isPlaceholder".into(), true.into());
        element.props.insert("_createdAt".into(), now_ms().into());
        element.parent_key = parent_key.map(str::to_owned);
        element
    }

    pub fn is_placeholder(&self, key: &str) -> bool {
        self.placeholders.contains_key(key)
    }

    /// Record that `referencing_key` depends on this placeholder resolving.
    pub fn add_reference(&mut self, placeholder_key: &str, referencing_key: &str) {
        if let Some(info) = self.placeholders.get_mut(placeholder_key) {
            info.referenced_by.insert(referencing_key.to_owned());
        }
    }

    /// The parent recorded when the placeholder was created.
    pub fn parent_of(&self, key: &str) -> Option<&str> {
        self.placeholders
            .get(key)
            .and_then(|info| info.parent_key.as_deref())
    }

    /// Accept the real definition for `key`.
    ///
    /// If a placeholder was tracked it is untracked and its dependents are
    /// returned for re-render. Otherwise the element is recorded as pending
    /// with no dependents — the same call works whether or not a
    /// placeholder preceded it.
    pub fn resolve(&mut self, key: &str, element: UiElement) -> Resolution {
        match self.placeholders.remove(key) {
            Some(info) => {
                debug!(key, dependents = info.referenced_by.len(), "placeholder resolved");
                Resolution {
                    element,
                    dependents: info.referenced_by.into_iter().collect(),
                }
            },
            None => {
                self.pending.insert(key.to_owned(), element.clone());
                Resolution {
                    element,
                    dependents: vec![],
                }
            },
        }
    }

    /// Placeholder keys older than the timeout, still unresolved.
    pub fn check_timeouts(&self) -> Vec<String> {
        let mut timed_out: Vec<String> = self
            .placeholders
            .iter()
            .filter(|(_, info)| info.created_at.elapsed() > self.timeout)
            .map(|(key, _)| key.clone())
            .collect();
        timed_out.sort();
        timed_out
    }

    /// Remove and return timed-out placeholders. The caller decides the
    /// user-visible failure treatment (error stub, silent removal).
    pub fn prune_timed_out(&mut self) -> Vec<String> {
        let timed_out = self.check_timeouts();
        for key in &timed_out {
            self.placeholders.remove(key);
        }
        timed_out
    }

    /// Keys still awaiting a real definition.
    pub fn pending_placeholders(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.placeholders.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn stats(&self) -> PlaceholderStats {
        let oldest_age = self
            .placeholders
            .values()
            .map(|info| info.created_at.elapsed())
            .max()
            .unwrap_or(Duration::ZERO);
        PlaceholderStats {
            placeholders: self.placeholders.len(),
            pending: self.pending.len(),
            oldest_age,
        }
    }

    pub fn reset(&mut self) {
        self.placeholders.clear();
        self.pending.clear();
    }
}

impl Default for PlaceholderManager {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_TIMEOUT)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn element(key: &str) -> UiElement {
        UiElement::new(key, "Card")
    }

    #[test]
    fn placeholder_element_is_renderable_stub() {
        let mut manager = PlaceholderManager::default();
        let stub = manager.create_placeholder("chart", Some("dashboard"));
        assert_eq!(stub.r#type, PLACEHOLDER_TYPE);
        assert_eq!(stub.props.get("_isPlaceholder"), Some(&true.into()));
        assert_eq!(stub.parent_key.as_deref(), Some("dashboard"));
        assert!(manager.is_placeholder("chart"));
        assert_eq!(manager.parent_of("chart"), Some("dashboard"));
    }

    #[test]
    fn resolve_returns_registered_dependents() {
        let mut manager = PlaceholderManager::default();
        manager.create_placeholder("k", None);
        manager.add_reference("k", "a");
        manager.add_reference("k", "b");

        let resolution = manager.resolve("k", element("k"));
        assert_eq!(resolution.dependents, vec!["a".to_string(), "b".to_string()]);
        assert!(!manager.is_placeholder("k"));
    }

    #[test]
    fn second_resolve_is_fresh_pending_entry() {
        let mut manager = PlaceholderManager::default();
        manager.create_placeholder("k", None);
        manager.add_reference("k", "a");
        manager.resolve("k", element("k"));

        let again = manager.resolve("k", element("k"));
        assert!(again.dependents.is_empty());
        assert_eq!(manager.stats().pending, 1);
    }

    #[test]
    fn references_to_unknown_keys_ignored() {
        let mut manager = PlaceholderManager::default();
        manager.add_reference("ghost", "a");
        let resolution = manager.resolve("ghost", element("ghost"));
        assert!(resolution.dependents.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_respect_threshold() {
        let mut manager = PlaceholderManager::default();
        manager.create_placeholder("early", None);
        tokio::time::advance(DEFAULT_PLACEHOLDER_TIMEOUT - Duration::from_millis(1)).await;
        assert!(manager.check_timeouts().is_empty());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert_eq!(manager.check_timeouts(), vec!["early".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn prune_removes_only_timed_out() {
        let mut manager = PlaceholderManager::default();
        manager.create_placeholder("old", None);
        tokio::time::advance(DEFAULT_PLACEHOLDER_TIMEOUT + Duration::from_millis(1)).await;
        manager.create_placeholder("fresh", None);

        let pruned = manager.prune_timed_out();
        assert_eq!(pruned, vec!["old".to_string()]);
        assert!(manager.is_placeholder("fresh"));
        assert_eq!(manager.pending_placeholders(), vec!["fresh".to_string()]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut manager = PlaceholderManager::default();
        manager.create_placeholder("k", None);
        manager.resolve("other", element("other"));
        manager.reset();
        let stats = manager.stats();
        assert_eq!(stats.placeholders, 0);
        assert_eq!(stats.pending, 0);
    }
}
