use crate::error::SimulatorError;
use wasim_crypto::Keypair;
use wasim_state::{get_public_key, set_named_key, StateView};

/// Create a named key and commit it. Duplicate names fail with
/// `DuplicateKeyName`; callers decide whether that is fatal.
pub fn create_named_key(state: &StateView, name: &str) -> Result<(), SimulatorError> {
    if get_public_key(state, name)?.is_some() {
        return Err(SimulatorError::DuplicateKeyName(name.to_string()));
    }

    let keypair = Keypair::generate();
    set_named_key(state, name, &keypair);
    state.commit()?;

    tracing::debug!(key = name, "named key created");
    Ok(())
}
