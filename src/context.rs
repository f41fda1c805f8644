//! Client context: backend location, credentials and saved selections.
//!
//! Everything a session needs to remember between runs lives in one
//! explicitly passed [`ClientContext`], loaded from and saved to a JSON file.
//! Nothing here is read from ambient global state after construction.

use crate::error::EasyReadError;
use crate::selection::ImageSetSelection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the backend base URL.
pub const ENV_BACKEND_URL: &str = "EASYREAD_BACKEND_URL";
/// Environment variable holding the backend bearer token.
pub const ENV_API_TOKEN: &str = "EASYREAD_API_TOKEN";
/// Environment variable overriding the context file location.
pub const ENV_CONTEXT_PATH: &str = "EASYREAD_CONTEXT";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientContext {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    /// Image sets the user last selected. Empty means "all".
    #[serde(default)]
    pub selected_sets: Vec<String>,
    #[serde(default)]
    pub prevent_duplicate_images: bool,
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("backend_url", &self.backend_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("selected_sets", &self.selected_sets)
            .field("prevent_duplicate_images", &self.prevent_duplicate_images)
            .finish()
    }
}

impl ClientContext {
    /// Where the context is stored unless the caller says otherwise:
    /// `$EASYREAD_CONTEXT`, else `$HOME/.config/easyread/context.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var(ENV_CONTEXT_PATH) {
            if !p.is_empty() {
                return Some(PathBuf::from(p));
            }
        }
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(".config/easyread/context.json"))
    }

    /// Read a saved context. A missing file is an error; use
    /// [`ClientContext::load_or_default`] when absence is expected.
    pub async fn load(path: &Path) -> Result<Self, EasyReadError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EasyReadError::ContextLoadFailed {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|e| EasyReadError::ContextLoadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Read a saved context, or start fresh if the file does not exist.
    pub async fn load_or_default(path: &Path) -> Result<Self, EasyReadError> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::load(path).await,
            _ => {
                debug!("No client context at {}, using defaults", path.display());
                Ok(Self::default())
            }
        }
    }

    /// Write the context atomically (temp file + rename).
    pub async fn save(&self, path: &Path) -> Result<(), EasyReadError> {
        let write_err = |source| EasyReadError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
            }
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| EasyReadError::Internal(format!("serialise context: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
        debug!("Saved client context to {}", path.display());
        Ok(())
    }

    /// Fill unset connection fields from `EASYREAD_BACKEND_URL` and
    /// `EASYREAD_API_TOKEN`.
    pub fn with_env_defaults(mut self) -> Self {
        if self.backend_url.is_none() {
            self.backend_url = std::env::var(ENV_BACKEND_URL).ok().filter(|v| !v.is_empty());
        }
        if self.api_token.is_none() {
            self.api_token = std::env::var(ENV_API_TOKEN).ok().filter(|v| !v.is_empty());
        }
        self
    }

    /// Apply the saved selection to the sets that currently exist. Saved
    /// names that no longer exist are dropped; an empty or fully stale
    /// saved selection selects everything.
    pub fn selection_for<I, S>(&self, available: I) -> ImageSetSelection
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selection = ImageSetSelection::from_available(available);
        let saved: Vec<&String> = self
            .selected_sets
            .iter()
            .filter(|n| selection.available().any(|a| a == n.as_str()))
            .collect();
        if !saved.is_empty() {
            selection.select_none();
            for name in saved {
                selection.insert(name.clone());
            }
        }
        selection
    }

    /// Remember `selection` for the next run.
    pub fn remember_selection(&mut self, selection: &ImageSetSelection) {
        self.selected_sets = if selection.all_selected() {
            Vec::new()
        } else {
            selection.ids()
        };
    }
}
