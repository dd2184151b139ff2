use crate::error::RuntimeError;
use crate::runtime::StoreData;
use wasmtime::Store;

/// Accessor over the store's fuel meter.
///
/// The engine consumes fuel per instruction; exhaustion traps the guest.
/// `meter_max_units` seeds the meter at `initialize`.
pub struct Meter<'a> {
    store: &'a mut Store<StoreData>,
}

impl<'a> Meter<'a> {
    pub(crate) fn new(store: &'a mut Store<StoreData>) -> Self {
        Self { store }
    }

    /// Remaining fuel units.
    pub fn get_balance(&self) -> Result<u64, RuntimeError> {
        self.store.get_fuel().map_err(RuntimeError::from)
    }

    /// Inject additional fuel, returning the new balance.
    pub fn add(&mut self, units: u64) -> Result<u64, RuntimeError> {
        let balance = self.store.get_fuel().map_err(RuntimeError::from)?;
        let new_balance = balance.saturating_add(units);
        self.store
            .set_fuel(new_balance)
            .map_err(RuntimeError::from)?;
        Ok(new_balance)
    }
}
