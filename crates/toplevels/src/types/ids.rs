/*! Branded ID types for window references. */

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use ts_rs::TS;

/// Window identifier. Allocated when a toplevel is first announced and never
/// reused for the lifetime of the allocator that produced it.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display, From, Into,
)]
#[ts(export)]
pub struct WindowId(pub u32);

/// Monotonic `WindowId` source. Starts at 0.
///
/// Owned by a `Toplevels` instance (not a global), so ids keep increasing across
/// `shutdown()` / `bootstrap()` cycles of the same instance.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
  next: AtomicU32,
}

impl IdAllocator {
  pub(crate) const fn new() -> Self {
    Self {
      next: AtomicU32::new(0),
    }
  }

  /// Allocate the next id.
  pub(crate) fn allocate(&self) -> WindowId {
    WindowId(self.next.fetch_add(1, Ordering::Relaxed))
  }

  /// The id the next `allocate` call will return.
  #[cfg(test)]
  pub(crate) fn peek(&self) -> WindowId {
    WindowId(self.next.load(Ordering::Relaxed))
  }
}
