use crate::error::SimulatorError;
use std::path::Path;
use std::sync::Arc;
use wasim_state::{Database, DatabaseConfig, StateView};

/// Explicit simulator context: the open database and its transactional
/// state view, owned by the command layer and passed to every step.
///
/// Dropping the context closes the state view before the database, so a
/// normal exit leaves both shut down cleanly.
pub struct SimulatorContext {
    pub state: StateView,
    db: Arc<Database>,
}

impl SimulatorContext {
    /// Open (or create) the backing database and build the state view.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SimulatorError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Arc::new(Database::open(path, &DatabaseConfig::default())?);
        let state = StateView::new(db.clone());
        tracing::debug!(path = %path.display(), root = %db.root(), "database opened");
        Ok(Self { state, db })
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}
