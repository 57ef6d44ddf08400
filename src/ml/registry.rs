//! Process-wide model slot.
//!
//! Constructed once at startup and injected into the components that need
//! inference. A replay cannot start while the slot is empty; that is the
//! one structural precondition a session start can fail on.

use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::info;

use super::model::LogisticWinProbModel;
use super::WinProbModel;
use crate::error::{LivelineError, Result};

pub struct ModelRegistry {
    current: RwLock<Option<Arc<dyn WinProbModel>>>,
}

impl ModelRegistry {
    /// Create an empty registry (no model loaded).
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Create a registry pre-loaded with a model.
    pub fn with_model(model: Arc<dyn WinProbModel>) -> Self {
        let registry = Self::new();
        registry.install(model);
        registry
    }

    /// Load the serialized model from disk and install it.
    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let model = LogisticWinProbModel::from_file(path.as_ref())?;
        info!(
            version = %model.metadata.version,
            path = %path.as_ref().display(),
            "Win-probability model loaded"
        );
        self.install(Arc::new(model));
        Ok(())
    }

    /// Install (or replace) the active model.
    pub fn install(&self, model: Arc<dyn WinProbModel>) {
        *self.current.write().expect("model slot poisoned") = Some(model);
    }

    /// The active model, or a precondition error if none is loaded.
    pub fn current(&self) -> Result<Arc<dyn WinProbModel>> {
        self.current
            .read()
            .expect("model slot poisoned")
            .clone()
            .ok_or_else(|| {
                LivelineError::ModelUnavailable("registry is empty; load a model first".to_string())
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().expect("model slot poisoned").is_some()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
