use crate::error::RuntimeError;
use crate::runtime::StoreData;
use std::ops::Range;
use wasmtime::{Store, TypedFunc};

/// Accessor over an instance's exported linear memory.
///
/// Borrows the runtime's store for its lifetime, so a view can never
/// outlive the call it belongs to.
pub struct MemoryView<'a> {
    store: &'a mut Store<StoreData>,
    memory: wasmtime::Memory,
    alloc: Option<TypedFunc<i32, i32>>,
    limit_max_memory: u64,
}

impl<'a> MemoryView<'a> {
    pub(crate) fn new(
        store: &'a mut Store<StoreData>,
        memory: wasmtime::Memory,
        alloc: Option<TypedFunc<i32, i32>>,
        limit_max_memory: u64,
    ) -> Self {
        Self {
            store,
            memory,
            alloc,
            limit_max_memory,
        }
    }

    /// Current size in bytes. Always a multiple of the 64 KiB page size.
    pub fn len(&self) -> u64 {
        self.memory.data_size(&*self.store) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured upper bound on memory size, in bytes.
    pub fn limit(&self) -> u64 {
        self.limit_max_memory
    }

    /// Grow the memory by `delta_pages` pages, returning the new page count.
    /// Growth past the configured limit fails without trapping the host.
    pub fn grow(&mut self, delta_pages: u64) -> Result<u64, RuntimeError> {
        let previous = self
            .memory
            .grow(&mut *self.store, delta_pages)
            .map_err(|e| {
                tracing::debug!(delta_pages, error = %e, "memory grow rejected");
                RuntimeError::MemoryGrow(delta_pages)
            })?;
        Ok(previous + delta_pages)
    }

    /// Read `length` bytes at `offset`.
    pub fn read(&self, offset: u64, length: u64) -> Result<Vec<u8>, RuntimeError> {
        let data = self.memory.data(&*self.store);
        let range = checked_range(offset, length, data.len())?;
        Ok(data[range].to_vec())
    }

    /// Write bytes at `offset`.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        let data = self.memory.data_mut(&mut *self.store);
        let range = checked_range(offset, bytes.len() as u64, data.len())?;
        data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Allocate inside the guest via its `alloc` export, copy the payload
    /// in, and return the guest pointer.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<u64, RuntimeError> {
        let alloc = self
            .alloc
            .ok_or_else(|| RuntimeError::ExportNotFound("alloc".to_string()))?;
        let length = i32::try_from(bytes.len()).map_err(|_| RuntimeError::MemoryOutOfRange {
            offset: 0,
            length: bytes.len() as u64,
        })?;

        let ptr = alloc
            .call(&mut *self.store, length)
            .map_err(RuntimeError::from)?;
        let ptr = ptr as u32 as u64;
        self.write(ptr, bytes)?;
        Ok(ptr)
    }
}

/// Bounds-check `offset..offset+length` against the memory size. Overflow
/// and out-of-range both report the attempted access, never panic.
fn checked_range(offset: u64, length: u64, size: usize) -> Result<Range<usize>, RuntimeError> {
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= size as u64)
        .ok_or(RuntimeError::MemoryOutOfRange { offset, length })?;
    Ok(offset as usize..end as usize)
}
