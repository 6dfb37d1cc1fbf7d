/*! Lifecycle state of a `Toplevels` instance. */

use serde::Serialize;
use ts_rs::TS;

/// Where a `Toplevels` instance is in its lifecycle.
///
/// `Uninitialized -> Bootstrapping -> Live -> Uninitialized`. A failed bootstrap
/// returns to `Uninitialized`; so does `shutdown()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionState {
  #[default]
  Uninitialized,
  Bootstrapping,
  Live,
}

impl SessionState {
  /// True once bootstrap succeeded and until shutdown.
  pub const fn is_live(self) -> bool {
    matches!(self, Self::Live)
  }
}
