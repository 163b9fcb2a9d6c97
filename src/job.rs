//! Job-scoped ownership of accumulators and snapshots
//!
//! A host hands out integer handles instead of references. Each job owns a
//! [`JobContext`]; dropping it reclaims everything the job still holds.

use std::path::Path;

use crate::codec;
use crate::config::PackConfig;
use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::Transform;
use crate::pack::{Accumulator, CommandSink, Snapshot};
use crate::world::{self, VoxelSource};

/// Integer handle into a [`HandleTable`]. Never 0.
pub type Handle = u32;

/// Slot table with freelist reuse of released handles
#[derive(Debug)]
pub struct HandleTable<T> {
    /// Name used in errors
    kind: &'static str,
    slots: Vec<Option<T>>,
    /// Released slot indices, reused last-in first-out
    free_slots: Vec<u32>,
}

impl<T> HandleTable<T> {
    pub fn new(kind: &'static str) -> Self {
        Self { kind, slots: Vec::new(), free_slots: Vec::new() }
    }

    /// Store a value and return its handle
    pub fn insert(&mut self, value: T) -> Handle {
        match self.free_slots.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(value);
                index + 1
            }
            None => {
                self.slots.push(Some(value));
                self.slots.len() as Handle
            }
        }
    }

    fn unknown(&self, handle: Handle) -> Error {
        Error::UnknownHandle { kind: self.kind, handle }
    }

    pub fn get(&self, handle: Handle) -> Result<&T> {
        handle
            .checked_sub(1)
            .and_then(|i| self.slots.get(i as usize))
            .and_then(Option::as_ref)
            .ok_or_else(|| self.unknown(handle))
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T> {
        let err = self.unknown(handle);
        handle
            .checked_sub(1)
            .and_then(|i| self.slots.get_mut(i as usize))
            .and_then(Option::as_mut)
            .ok_or(err)
    }

    /// Take a value out; its handle becomes invalid and may be reissued
    pub fn remove(&mut self, handle: Handle) -> Result<T> {
        let err = self.unknown(handle);
        let index = handle.checked_sub(1).ok_or_else(|| self.unknown(handle))?;
        let value = self
            .slots
            .get_mut(index as usize)
            .and_then(Option::take)
            .ok_or(err)?;
        self.free_slots.push(index);
        Ok(value)
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.slots.len() - self.free_slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every value and forget all handles
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_slots.clear();
    }
}

/// Accumulators and snapshots owned by one job
#[derive(Debug)]
pub struct JobContext {
    config: PackConfig,
    accumulators: HandleTable<Accumulator>,
    snapshots: HandleTable<Snapshot>,
}

impl JobContext {
    pub fn new(config: PackConfig) -> Self {
        Self {
            config,
            accumulators: HandleTable::new("accumulator"),
            snapshots: HandleTable::new("snapshot"),
        }
    }

    pub fn config(&self) -> &PackConfig {
        &self.config
    }

    pub fn create_accumulator(&mut self) -> Result<Handle> {
        let acc = Accumulator::from_config(&self.config)?;
        Ok(self.accumulators.insert(acc))
    }

    pub fn accumulator(&self, handle: Handle) -> Result<&Accumulator> {
        self.accumulators.get(handle)
    }

    pub fn accumulator_mut(&mut self, handle: Handle) -> Result<&mut Accumulator> {
        self.accumulators.get_mut(handle)
    }

    pub fn snapshot(&self, handle: Handle) -> Result<&Snapshot> {
        self.snapshots.get(handle)
    }

    pub fn snapshot_mut(&mut self, handle: Handle) -> Result<&mut Snapshot> {
        self.snapshots.get_mut(handle)
    }

    pub fn setblock(&mut self, acc: Handle, pos: IVec3, block_type: &str) -> Result<()> {
        self.accumulators.get_mut(acc)?.setblock(pos, block_type)
    }

    pub fn fill(&mut self, acc: Handle, a: IVec3, b: IVec3, block_type: &str) -> Result<()> {
        self.accumulators.get_mut(acc)?.fill(a, b, block_type)
    }

    /// Copy a region of a host world into an accumulator, bounded by the
    /// configured scan limit
    pub fn capture<S: VoxelSource + ?Sized>(
        &mut self,
        acc: Handle,
        source: &S,
        a: IVec3,
        b: IVec3,
    ) -> Result<usize> {
        let limit = self.config.scan_limit;
        world::capture(source, a, b, limit, self.accumulators.get_mut(acc)?)
    }

    /// Pack an accumulator and return the new snapshot's handle
    pub fn pack<I>(&mut self, acc: Handle, metadata: I) -> Result<Handle>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let snapshot = self.accumulators.get(acc)?.pack(metadata)?;
        Ok(self.snapshots.insert(snapshot))
    }

    pub fn absorb(&mut self, acc: Handle, snap: Handle, transform: &Transform) -> Result<()> {
        let snapshot = self.snapshots.get(snap)?;
        self.accumulators.get_mut(acc)?.absorb(snapshot, transform)
    }

    pub fn replay<S: CommandSink + ?Sized>(
        &self,
        snap: Handle,
        transform: &Transform,
        sink: &mut S,
    ) -> Result<()> {
        self.snapshots.get(snap)?.replay(transform, sink)
    }

    pub fn export_string(&self, snap: Handle) -> Result<String> {
        codec::export_string(self.snapshots.get(snap)?)
    }

    pub fn import_string(&mut self, text: &str) -> Result<Handle> {
        let snapshot = codec::import_string(text)?;
        Ok(self.snapshots.insert(snapshot))
    }

    pub fn write_file(&self, snap: Handle, path: impl AsRef<Path>) -> Result<()> {
        codec::write_archive(path, self.snapshots.get(snap)?)
    }

    pub fn read_file(&mut self, path: impl AsRef<Path>) -> Result<Handle> {
        let snapshot = codec::read_archive(path)?;
        Ok(self.snapshots.insert(snapshot))
    }

    pub fn release_accumulator(&mut self, handle: Handle) -> Result<()> {
        self.accumulators.remove(handle).map(drop)
    }

    pub fn release_snapshot(&mut self, handle: Handle) -> Result<()> {
        self.snapshots.remove(handle).map(drop)
    }

    /// Live (accumulator, snapshot) counts
    pub fn live(&self) -> (usize, usize) {
        (self.accumulators.len(), self.snapshots.len())
    }
}

impl Default for JobContext {
    fn default() -> Self {
        Self::new(PackConfig::default())
    }
}

impl Drop for JobContext {
    fn drop(&mut self) {
        let (accumulators, snapshots) = self.live();
        if accumulators + snapshots > 0 {
            log::debug!("job ended holding {accumulators} accumulators and {snapshots} snapshots");
        }
    }
}
