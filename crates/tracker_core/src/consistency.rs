//! Epoch-guarded "do all selected files share one keep-local value" query.
use std::collections::BTreeMap;

use crate::selection::selection_key;

pub type Epoch = u64;

/// Visible keep-local state: `(loading, available, shared_value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeepLocalView {
    pub loading: bool,
    pub available: bool,
    pub shared_value: Option<bool>,
}

/// A query the caller must issue and later answer with [`ConsistencyGuard::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyQuery {
    pub epoch: Epoch,
    pub selection_key: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Selection is empty; visible state was reset to unavailable.
    Cleared,
    /// Selection matches the last applied one; nothing to do.
    Unchanged,
    Issue(ConsistencyQuery),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A newer query superseded this response; it was discarded.
    Stale,
    Applied(KeepLocalView),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsistencyGuard {
    epoch: Epoch,
    last_key: Option<String>,
    pending: Option<ConsistencyQuery>,
    view: KeepLocalView,
}

impl ConsistencyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> KeepLocalView {
        self.view
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn refresh<'a>(
        &mut self,
        selection: impl IntoIterator<Item = &'a String>,
        force: bool,
    ) -> RefreshDecision {
        let mut paths: Vec<String> = selection.into_iter().cloned().collect();
        paths.sort_unstable();
        paths.dedup();

        if paths.is_empty() {
            self.invalidate();
            self.view = KeepLocalView::default();
            return RefreshDecision::Cleared;
        }

        let key = selection_key(paths.iter());
        if !force && self.last_key.as_deref() == Some(key.as_str()) {
            return RefreshDecision::Unchanged;
        }

        self.epoch += 1;
        self.last_key = Some(key.clone());
        self.view.loading = true;
        let query = ConsistencyQuery {
            epoch: self.epoch,
            selection_key: key,
            paths,
        };
        self.pending = Some(query.clone());
        RefreshDecision::Issue(query)
    }

    /// Applies a query response if its epoch is still the current one.
    pub fn resolve(
        &mut self,
        epoch: Epoch,
        response: Result<BTreeMap<String, bool>, String>,
    ) -> RefreshOutcome {
        let pending = match self.pending.take() {
            Some(pending) if pending.epoch == epoch && epoch == self.epoch => pending,
            other => {
                self.pending = other;
                return RefreshOutcome::Stale;
            }
        };

        match response {
            Ok(values) => {
                self.view = evaluate(&pending.paths, &values);
                RefreshOutcome::Applied(self.view)
            }
            Err(message) => {
                self.last_key = None;
                self.view = KeepLocalView::default();
                RefreshOutcome::Failed(message)
            }
        }
    }

    /// Discards any in-flight query; its response will be treated as stale.
    pub fn invalidate(&mut self) {
        self.epoch += 1;
        self.last_key = None;
        self.pending = None;
        self.view.loading = false;
    }
}

fn evaluate(paths: &[String], values: &BTreeMap<String, bool>) -> KeepLocalView {
    let mut shared = None;
    for path in paths {
        match (values.get(path), shared) {
            (None, _) => return KeepLocalView::default(),
            (Some(&value), None) => shared = Some(value),
            (Some(&value), Some(previous)) if value != previous => {
                return KeepLocalView::default();
            }
            _ => {}
        }
    }
    KeepLocalView {
        loading: false,
        available: shared.is_some(),
        shared_value: shared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    fn answer(items: &[(&str, bool)]) -> BTreeMap<String, bool> {
        items
            .iter()
            .map(|(path, value)| (path.to_string(), *value))
            .collect()
    }

    #[test]
    fn missing_path_in_answer_is_inconsistent() {
        let mut guard = ConsistencyGuard::new();
        let RefreshDecision::Issue(query) = guard.refresh(&paths(&["a", "b"]), false) else {
            panic!("expected a query");
        };
        let outcome = guard.resolve(query.epoch, Ok(answer(&[("a", true)])));
        assert_eq!(
            outcome,
            RefreshOutcome::Applied(KeepLocalView {
                loading: false,
                available: false,
                shared_value: None,
            })
        );
    }

    #[test]
    fn repeated_selection_is_suppressed_unless_forced() {
        let mut guard = ConsistencyGuard::new();
        let RefreshDecision::Issue(query) = guard.refresh(&paths(&["b", "a"]), false) else {
            panic!("expected a query");
        };
        assert_eq!(query.selection_key, "a\nb");
        guard.resolve(query.epoch, Ok(answer(&[("a", false), ("b", false)])));

        assert_eq!(guard.refresh(&paths(&["a", "b"]), false), RefreshDecision::Unchanged);
        assert!(matches!(
            guard.refresh(&paths(&["a", "b"]), true),
            RefreshDecision::Issue(_)
        ));
    }
}
