//! Per-structure memory budget: the `memCur` / `memMax` counter pair and the
//! typed allocate / resize / release primitives that keep it honest.
//!
//! Every heap array owned by a mesh structure lives in a [`Block`] and is
//! created, resized and released through the [`MemBudget`] of its owner.
//! A request is refused up front when `cur + bytes > max`; a refused request
//! leaves both the counter and the target block untouched.

use bytemuck::Zeroable;

use crate::debug_invariants::DebugInvariants;
use crate::memory::block::Block;
use crate::memory::error::MemError;
use crate::mesh_error::ParMeshError;

/// Soft per-structure memory ceiling plus the bytes currently charged to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemBudget {
    cur: usize,
    max: usize,
}

#[inline]
fn bytes_for<T>(len: usize, what: &'static str) -> Result<usize, MemError> {
    let elem_size = std::mem::size_of::<T>();
    len.checked_mul(elem_size).ok_or(MemError::Overflow {
        what,
        len,
        elem_size,
    })
}

impl MemBudget {
    /// Empty budget allowing at most `max` bytes.
    pub fn new(max: usize) -> Self {
        Self { cur: 0, max }
    }

    /// Bytes currently charged (`memCur`).
    #[inline]
    pub fn cur(&self) -> usize {
        self.cur
    }

    /// Ceiling (`memMax`).
    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    /// Bytes that can still be charged before hitting the ceiling.
    #[inline]
    pub fn available(&self) -> usize {
        self.max.saturating_sub(self.cur)
    }

    /// Move the ceiling. Lowering it below `cur` is allowed; subsequent growth
    /// requests are then refused until enough memory is released.
    pub fn set_max(&mut self, max: usize) {
        self.max = max;
    }

    /// Hand every byte of unused ceiling over to `other` and pin this budget's
    /// ceiling to its current usage. `self.max + other.max` is unchanged.
    pub fn give_slack_to(&mut self, other: &mut MemBudget) -> usize {
        let slack = self.available();
        self.max -= slack;
        other.max += slack;
        slack
    }

    /// Check that `bytes` more can be charged.
    pub fn check_avail(&self, bytes: usize, what: &'static str) -> Result<(), MemError> {
        let fits = self
            .cur
            .checked_add(bytes)
            .is_some_and(|total| total <= self.max);
        if fits {
            Ok(())
        } else {
            log::error!(
                "{what}: exceeded max memory allowed: {bytes} bytes requested, {}/{} in use",
                self.cur,
                self.max
            );
            Err(MemError::BudgetExceeded {
                what,
                requested: bytes,
                cur: self.cur,
                max: self.max,
            })
        }
    }

    fn alloc_with<T>(
        &mut self,
        block: &mut Block<T>,
        len: usize,
        what: &'static str,
        fill: impl FnMut() -> T,
    ) -> Result<(), MemError> {
        if block.is_set() {
            return Err(MemError::AlreadySet { what });
        }
        if len == 0 {
            return Ok(());
        }
        let bytes = bytes_for::<T>(len, what)?;
        self.check_avail(bytes, what)?;

        let mut storage = Vec::new();
        if storage.try_reserve_exact(len).is_err() {
            log::error!("{what}: allocation of {bytes} bytes failed");
            return Err(MemError::AllocFailed { what, bytes });
        }
        storage.resize_with(len, fill);
        block.0 = Some(storage);
        self.cur += bytes;
        Ok(())
    }

    fn resize_with<T>(
        &mut self,
        block: &mut Block<T>,
        new_len: usize,
        what: &'static str,
        fill: impl FnMut() -> T,
    ) -> Result<(), MemError> {
        let old_len = block.len();
        let Some(storage) = block.0.as_mut() else {
            return self.alloc_with(block, new_len, what, fill);
        };

        if new_len == 0 {
            self.release(block, what);
            return Ok(());
        }

        if new_len < old_len {
            let freed = (old_len - new_len) * std::mem::size_of::<T>();
            storage.truncate(new_len);
            storage.shrink_to_fit();
            self.uncharge(freed, what);
        } else if new_len > old_len {
            let bytes = bytes_for::<T>(new_len - old_len, what)?;
            self.check_avail(bytes, what)?;
            if storage.try_reserve_exact(new_len - old_len).is_err() {
                log::error!("{what}: reallocation to {new_len} elements failed");
                self.release(block, what);
                return Err(MemError::AllocFailed { what, bytes });
            }
            storage.resize_with(new_len, fill);
            self.cur += bytes;
        }
        Ok(())
    }

    /// Allocate `len` default-initialized elements into an unset `block`.
    ///
    /// `len == 0` leaves the block unset.
    pub fn allocate<T: Default>(
        &mut self,
        block: &mut Block<T>,
        len: usize,
        what: &'static str,
    ) -> Result<(), MemError> {
        self.alloc_with(block, len, what, T::default)
    }

    /// Allocate `len` zero-filled elements into an unset `block`.
    pub fn callocate<T: Zeroable>(
        &mut self,
        block: &mut Block<T>,
        len: usize,
        what: &'static str,
    ) -> Result<(), MemError> {
        self.alloc_with(block, len, what, T::zeroed)
    }

    /// Resize `block` to `new_len` elements, default-initializing any growth.
    ///
    /// An unset block degrades to [`allocate`](Self::allocate), `new_len == 0`
    /// degrades to [`release`](Self::release). Shrinking always succeeds.
    /// Growth is checked against the budget for the byte delta only; a refused
    /// growth leaves the block at its previous size and contents. If the system
    /// allocator fails while growing, the original block is released and the
    /// error is returned.
    pub fn reallocate<T: Default>(
        &mut self,
        block: &mut Block<T>,
        new_len: usize,
        what: &'static str,
    ) -> Result<(), MemError> {
        self.resize_with(block, new_len, what, T::default)
    }

    /// [`reallocate`](Self::reallocate) with zero-filled growth.
    pub fn recallocate<T: Zeroable>(
        &mut self,
        block: &mut Block<T>,
        new_len: usize,
        what: &'static str,
    ) -> Result<(), MemError> {
        self.resize_with(block, new_len, what, T::zeroed)
    }

    /// Free `block` and uncharge its bytes. Releasing an unset block is a
    /// no-op; the block is always unset afterwards.
    pub fn release<T>(&mut self, block: &mut Block<T>, what: &'static str) {
        let bytes = block.bytes();
        if block.0.take().is_some() {
            self.uncharge(bytes, what);
        }
    }

    fn uncharge(&mut self, bytes: usize, what: &'static str) {
        if bytes > self.cur {
            log::error!(
                "{what}: tried to free more mem than allocated: {bytes} bytes freed, {} charged",
                self.cur
            );
            self.cur = 0;
        } else {
            self.cur -= bytes;
        }
    }
}

impl DebugInvariants for MemBudget {
    fn debug_assert_invariants(&self) {
        crate::assert_invariants!(self.validate_invariants(), "MemBudget");
    }

    fn validate_invariants(&self) -> Result<(), ParMeshError> {
        if self.cur > self.max {
            return Err(ParMeshError::BudgetOverrun {
                cur: self.cur,
                max: self.max,
            });
        }
        Ok(())
    }
}
