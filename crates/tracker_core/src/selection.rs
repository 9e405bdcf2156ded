//! Merge and migration selection state machines.
use std::collections::BTreeSet;

use thiserror::Error;

/// Maximum number of clips a merge can take.
pub const MERGE_LIMIT: usize = 3;

/// Minimum number of clips a merge needs.
pub const MERGE_MINIMUM: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("clip is already selected")]
    Duplicate,
    #[error("limit reached: at most {MERGE_LIMIT} clips can be merged")]
    LimitReached,
    #[error("no clip at position {0}")]
    NoSuchPosition(usize),
    #[error("upload name can only be edited with exactly one file selected")]
    UploadNameLocked,
    #[error("no files selected")]
    EmptySelection,
    #[error("another request is still in progress")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeValidationError {
    #[error("select at least {MERGE_MINIMUM} clips to merge")]
    TooFewClips,
    #[error("you can merge up to {MERGE_LIMIT} clips")]
    TooManyClips,
    #[error("duplicate clips cannot be merged")]
    DuplicateClips,
    #[error("merged file name cannot be empty")]
    EmptyName,
}

/// Title shown for a path: the file name without its extension.
pub fn derive_title(path: &str) -> String {
    let name = path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(path);
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

/// Default merge output name for a merge whose first clip is `first_path`.
pub fn default_merge_name(first_path: &str) -> String {
    format!("{} merged", derive_title(first_path))
}

/// A text field that may hold a generated default.
///
/// The field follows its default only while it is blank or still equal to the
/// last default it was given; once the user types something else it is kept.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AutoNamedField {
    value: String,
    last_default: Option<String>,
}

impl AutoNamedField {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_auto(&self) -> bool {
        self.value.trim().is_empty() || self.last_default.as_deref() == Some(self.value.as_str())
    }

    pub fn edit(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    /// Offers a new default; it replaces the value only when the field is still automatic.
    pub fn offer_default(&mut self, default: Option<String>) {
        if self.is_auto() {
            self.value = default.clone().unwrap_or_default();
        }
        self.last_default = default;
    }
}

/// Validated merge request: ordered clips plus the output name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    pub paths: Vec<String>,
    pub new_name: String,
}

/// Ordered merge candidates, at most [`MERGE_LIMIT`] distinct paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeSelection {
    paths: Vec<String>,
    output_name: AutoNamedField,
}

impl MergeSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|existing| existing == path)
    }

    pub fn output_name(&self) -> &str {
        self.output_name.value()
    }

    pub fn set_output_name(&mut self, name: impl Into<String>) {
        self.output_name.edit(name);
    }

    pub fn add(&mut self, path: impl Into<String>) -> Result<(), SelectionError> {
        let path = path.into();
        if self.contains(&path) {
            return Err(SelectionError::Duplicate);
        }
        if self.paths.len() >= MERGE_LIMIT {
            return Err(SelectionError::LimitReached);
        }
        self.mutate(|paths| paths.push(path));
        Ok(())
    }

    pub fn remove_at(&mut self, index: usize) -> Result<String, SelectionError> {
        if index >= self.paths.len() {
            return Err(SelectionError::NoSuchPosition(index));
        }
        let mut removed = String::new();
        self.mutate(|paths| removed = paths.remove(index));
        Ok(removed)
    }

    pub fn move_left(&mut self, index: usize) {
        if index == 0 || index >= self.paths.len() {
            return;
        }
        self.mutate(|paths| paths.swap(index - 1, index));
    }

    pub fn move_right(&mut self, index: usize) {
        if index + 1 >= self.paths.len() {
            return;
        }
        self.mutate(|paths| paths.swap(index, index + 1));
    }

    /// Drops paths that are no longer available, keeping relative order.
    pub fn retain_existing<S: AsRef<str>>(&mut self, available: &[S]) {
        self.mutate(|paths| {
            paths.retain(|path| available.iter().any(|candidate| candidate.as_ref() == path));
            paths.truncate(MERGE_LIMIT);
        });
    }

    pub fn clear(&mut self) {
        self.mutate(Vec::clear);
    }

    pub fn validate_for_submit(&self) -> Result<MergePlan, MergeValidationError> {
        if self.paths.len() < MERGE_MINIMUM {
            return Err(MergeValidationError::TooFewClips);
        }
        if self.paths.len() > MERGE_LIMIT {
            return Err(MergeValidationError::TooManyClips);
        }
        let distinct: BTreeSet<&str> = self.paths.iter().map(String::as_str).collect();
        if distinct.len() != self.paths.len() {
            return Err(MergeValidationError::DuplicateClips);
        }
        let new_name = self.output_name.value().trim();
        if new_name.is_empty() {
            return Err(MergeValidationError::EmptyName);
        }
        Ok(MergePlan {
            paths: self.paths.clone(),
            new_name: new_name.to_string(),
        })
    }

    fn mutate(&mut self, change: impl FnOnce(&mut Vec<String>)) {
        let first_before = self.paths.first().cloned();
        change(&mut self.paths);
        if self.paths.first() != first_before.as_ref() {
            let default = self.paths.first().map(|first| default_merge_name(first));
            self.output_name.offer_default(default);
        }
    }
}

/// Unordered migration candidates with an upload name that is only editable
/// while exactly one path is selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationSelection {
    paths: BTreeSet<String>,
    upload_name: AutoNamedField,
}

impl MigrationSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.paths.iter()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.paths.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    /// Adds the path if absent, removes it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        let selected = if self.paths.remove(&path) {
            false
        } else {
            self.paths.insert(path);
            true
        };
        self.sync_upload_name();
        selected
    }

    pub fn retain_existing<S: AsRef<str>>(&mut self, available: &[S]) {
        self.paths
            .retain(|path| available.iter().any(|candidate| candidate.as_ref() == path));
        self.sync_upload_name();
    }

    pub fn clear(&mut self) {
        self.paths.clear();
        self.sync_upload_name();
    }

    pub fn upload_name_editable(&self) -> bool {
        self.paths.len() == 1
    }

    pub fn upload_name(&self) -> &str {
        self.upload_name.value()
    }

    pub fn set_upload_name(&mut self, name: impl Into<String>) -> Result<(), SelectionError> {
        if !self.upload_name_editable() {
            return Err(SelectionError::UploadNameLocked);
        }
        self.upload_name.edit(name);
        Ok(())
    }

    /// Upload name to send with a submission: only for a single selection, and
    /// only when it is not blank.
    pub fn effective_upload_name(&self) -> Option<String> {
        if !self.upload_name_editable() {
            return None;
        }
        let name = self.upload_name.value().trim();
        (!name.is_empty()).then(|| name.to_string())
    }

    /// Canonical key of the selection: sorted paths joined by newlines.
    pub fn selection_key(&self) -> String {
        selection_key(self.paths.iter())
    }

    fn sync_upload_name(&mut self) {
        let default = match self.paths.len() {
            1 => self.paths.iter().next().map(|path| derive_title(path)),
            _ => None,
        };
        self.upload_name.offer_default(default);
    }
}

/// Sorted, newline-joined key for a set of paths.
pub fn selection_key<'a>(paths: impl IntoIterator<Item = &'a String>) -> String {
    let mut sorted: Vec<&str> = paths.into_iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join("\n")
}
