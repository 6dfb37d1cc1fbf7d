/*!
Platform abstraction traits.

These traits define the contract between core code and the compositor session.
The Wayland implementation lives in `platform/wayland`; tests use `platform/fake`.
Core code only uses these traits, never protocol types directly.
*/

use std::fmt::Debug;
use std::hash::Hash;

use crate::types::ToplevelsResult;

/// Per-handle events from the session, in the order the session received them.
#[derive(Debug)]
pub(crate) enum ToplevelEvent<H> {
  /// A new toplevel was announced. Always the first event for a handle.
  Discovered(H),
  Title(H, String),
  AppId(H, String),
  /// Maximized/minimized/activated/fullscreen flags changed.
  StateChanged(H),
  OutputEntered(H),
  OutputLeft(H),
  Parent(H),
  /// The preceding field updates form one atomic change.
  Done(H),
  /// The toplevel is gone. Always the last event for a handle.
  Closed(H),
}

/// Opaque reference to one compositor-side toplevel. Clone is cheap.
pub(crate) trait PlatformHandle: Clone + Debug + 'static {
  /// Identity of the underlying protocol object.
  type Key: Clone + Eq + Hash + Debug;

  fn key(&self) -> Self::Key;

  /// Tell the compositor we are done with this handle. Called exactly once,
  /// after the handle's `closed` event or at teardown.
  fn release(&self);
}

/// Opens sessions. Moved onto the worker thread, which owns the session.
pub(crate) trait Connector: Send + 'static {
  type Session: Session;

  /// Connect, collect the advertised globals (first sync) and bind the
  /// toplevel manager plus the seat if present.
  ///
  /// Fails with `ConnectionFailed` or `NoCompositorSupport`.
  fn connect(&self) -> ToplevelsResult<Self::Session>;
}

/// A live compositor session.
pub(crate) trait Session {
  type Handle: PlatformHandle;

  /// Blocking barrier: every event generated up to now is delivered.
  fn sync(&mut self) -> ToplevelsResult<Vec<ToplevelEvent<Self::Handle>>>;

  /// Whether a seat was bound during bootstrap.
  fn seat_available(&self) -> bool;

  /// Ask the compositor to activate `handle` on our seat and flush the request.
  fn activate(&mut self, handle: &Self::Handle) -> ToplevelsResult<()>;
}
