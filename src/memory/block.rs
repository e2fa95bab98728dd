//! `Block<T>`: a heap array whose footprint is charged to a [`MemBudget`].
//!
//! A block is either *unset* (the null sentinel) or holds a `Vec<T>` whose
//! length is exactly the number of elements charged for it. Blocks are only
//! created, resized and cleared through the governor so the owning budget
//! always reflects `len() * size_of::<T>()`.
//!
//! [`MemBudget`]: crate::memory::MemBudget

use core::fmt::{self, Debug};
use std::ops::{Deref, DerefMut};

/// Budget-accounted storage slot.
pub struct Block<T>(pub(crate) Option<Vec<T>>);

impl<T> Block<T> {
    /// An unset block.
    pub const fn unset() -> Self {
        Self(None)
    }

    /// `true` when the block currently holds storage.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Number of elements held (0 when unset).
    #[inline]
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes this block accounts for in its owning budget.
    #[inline]
    pub fn bytes(&self) -> usize {
        self.len() * std::mem::size_of::<T>()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.0.as_deref().unwrap_or(&[])
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.0.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<T> Default for Block<T> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T> Deref for Block<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for Block<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T> Debug for Block<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(v) => f.debug_struct("Block").field("len", &v.len()).finish(),
            None => f.write_str("Block(unset)"),
        }
    }
}
