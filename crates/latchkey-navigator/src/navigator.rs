use std::sync::Arc;

use latchkey_protocol::{BackendResult, DeviceBackend, FileEntry};

use crate::path::{join, normalize, parent_of};

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load directory";
pub const NOT_A_DIRECTORY_MESSAGE: &str = "Path does not exist or is not a directory";

/// Current directory listing plus the load/error flags the presentation
/// layer binds to. After any load completes exactly one of "items
/// replaced" or "error set, items cleared" holds and `loading` is false.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub items: Vec<FileEntry>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Browser-style file-system navigator over the privilege backend.
///
/// Invariant: `0 <= history_index < history.len()` and, outside of a failed
/// listing load, `current_path == history[history_index]`.
pub struct Navigator {
    backend: Arc<dyn DeviceBackend>,
    current_path: String,
    history: Vec<String>,
    history_index: usize,
    listing: Listing,
}

impl Navigator {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self {
            backend,
            current_path: "/".to_owned(),
            history: vec!["/".to_owned()],
            history_index: 0,
            listing: Listing::default(),
        }
    }

    /// Initial load of the seed root entry.
    pub async fn bootstrap(&mut self) {
        self.load(self.current_path.clone()).await;
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn history_index(&self) -> usize {
        self.history_index
    }

    pub fn listing(&self) -> &Listing {
        &self.listing
    }

    pub fn can_go_back(&self) -> bool {
        self.history_index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.history_index + 1 < self.history.len()
    }

    pub fn is_at_root(&self) -> bool {
        self.current_path == "/"
    }

    /// Verifies the target is a directory, then commits it with standard
    /// browser history semantics: forward entries are truncated before the
    /// new path is appended. All-or-nothing; verification failure leaves
    /// path and history untouched.
    pub async fn navigate_to(&mut self, path: &str) {
        let normalized = normalize(path);

        match self.backend.is_directory(&normalized).await {
            Ok(true) => {}
            Ok(false) => {
                self.listing.error = Some(NOT_A_DIRECTORY_MESSAGE.to_owned());
                return;
            }
            Err(error) => {
                tracing::warn!(path = %normalized, error = %error, "navigation target verification failed");
                self.listing.error = Some(error.to_string());
                return;
            }
        }

        self.history.truncate(self.history_index + 1);
        self.history.push(normalized.clone());
        self.history_index = self.history.len() - 1;
        self.load(normalized).await;
    }

    /// Moves the cursor back one entry; no-op at the oldest. Never mutates
    /// the history list.
    pub async fn go_back(&mut self) {
        if self.history_index == 0 {
            return;
        }
        self.history_index -= 1;
        self.load(self.history[self.history_index].clone()).await;
    }

    /// Moves the cursor forward one entry; no-op at the newest.
    pub async fn go_forward(&mut self) {
        if self.history_index + 1 >= self.history.len() {
            return;
        }
        self.history_index += 1;
        self.load(self.history[self.history_index].clone()).await;
    }

    /// Sugar for navigating to the parent; no-op at `/`.
    pub async fn go_up(&mut self) {
        if self.is_at_root() {
            return;
        }
        let parent = parent_of(&self.current_path);
        self.navigate_to(&parent).await;
    }

    /// Re-issues the listing request for the current path without touching
    /// history.
    pub async fn refresh(&mut self) {
        self.load(self.current_path.clone()).await;
    }

    async fn load(&mut self, path: String) {
        self.listing.loading = true;
        self.listing.error = None;

        match self.backend.list_directory(&path).await {
            Ok(items) => {
                self.current_path = path;
                self.listing.items = items;
                self.listing.loading = false;
            }
            Err(error) => {
                tracing::warn!(path = %path, error = %error, "directory listing failed");
                self.listing.error = Some(LOAD_FAILED_MESSAGE.to_owned());
                self.listing.items.clear();
                self.listing.loading = false;
            }
        }
    }

    // File operations. Each delegates to the backend, refreshes the listing
    // on success, and surfaces the error string on failure.

    pub async fn create_file(&mut self, name: &str, contents: &str) -> BackendResult<()> {
        let path = join(&self.current_path, name);
        self.after_mutation(self.backend.write_file(&path, contents).await)
            .await
    }

    pub async fn create_directory(&mut self, name: &str) -> BackendResult<()> {
        let path = join(&self.current_path, name);
        self.after_mutation(self.backend.create_directory(&path).await)
            .await
    }

    pub async fn delete_entry(&mut self, path: &str) -> BackendResult<()> {
        self.after_mutation(self.backend.delete_entry(path).await)
            .await
    }

    pub async fn rename_entry(&mut self, path: &str, new_name: &str) -> BackendResult<()> {
        let target = join(&parent_of(path), new_name);
        self.after_mutation(self.backend.move_entry(path, &target).await)
            .await
    }

    pub async fn move_entry(&mut self, from: &str, to: &str) -> BackendResult<()> {
        self.after_mutation(self.backend.move_entry(from, to).await)
            .await
    }

    pub async fn copy_entry(&mut self, from: &str, to: &str) -> BackendResult<()> {
        self.after_mutation(self.backend.copy_entry(from, to).await)
            .await
    }

    pub async fn read_file(&self, path: &str) -> BackendResult<String> {
        self.backend.read_file(path).await
    }

    pub async fn write_file(&mut self, path: &str, contents: &str) -> BackendResult<()> {
        self.after_mutation(self.backend.write_file(path, contents).await)
            .await
    }

    pub async fn set_permissions(&mut self, path: &str, mode: &str) -> BackendResult<()> {
        self.after_mutation(self.backend.set_permissions(path, mode).await)
            .await
    }

    pub async fn set_owner(
        &mut self,
        path: &str,
        owner: &str,
        group: Option<&str>,
    ) -> BackendResult<()> {
        self.after_mutation(self.backend.set_owner(path, owner, group).await)
            .await
    }

    pub async fn search(&self, pattern: &str) -> BackendResult<Vec<String>> {
        self.backend.search(&self.current_path, pattern).await
    }

    async fn after_mutation(&mut self, result: BackendResult<()>) -> BackendResult<()> {
        match result {
            Ok(()) => {
                self.refresh().await;
                Ok(())
            }
            Err(error) => {
                self.listing.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Breadcrumb components: `["/"]` followed by each path segment.
    pub fn path_components(&self) -> Vec<String> {
        if self.is_at_root() {
            return vec!["/".to_owned()];
        }
        let mut components = vec!["/".to_owned()];
        components.extend(
            self.current_path
                .split('/')
                .filter(|part| !part.is_empty())
                .map(str::to_owned),
        );
        components
    }

    /// Absolute path for one breadcrumb component index.
    pub fn path_for_component(&self, index: usize) -> String {
        if index == 0 {
            return "/".to_owned();
        }
        let components: Vec<&str> = self
            .current_path
            .split('/')
            .filter(|part| !part.is_empty())
            .collect();
        let prefix = &components[..index.min(components.len())];
        format!("/{}", prefix.join("/"))
    }
}
