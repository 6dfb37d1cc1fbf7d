/*!
Scripted in-memory compositor for tests.

Tests queue events on a `FakeCompositor`; each `sync` on a session hands over
everything queued so far, in order. Activations, releases and connect attempts
are recorded for assertions.
*/

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::traits::{Connector, PlatformHandle, Session, ToplevelEvent};
use crate::types::{ToplevelsError, ToplevelsResult};

/// One scripted compositor event, addressed by raw handle number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FakeEvent {
  Discovered(u32),
  Title(u32, String),
  AppId(u32, String),
  StateChanged(u32),
  Done(u32),
  Closed(u32),
}

#[derive(Debug)]
struct FakeState {
  has_manager: bool,
  has_seat: bool,
  /// Connect attempts that fail with `ConnectionFailed` before one succeeds.
  failing_connects: u32,
  connect_attempts: u32,
  queued: VecDeque<FakeEvent>,
  activated: Vec<u32>,
  released: Vec<u32>,
  sessions_dropped: u32,
  broken: bool,
}

/// Shared handle to the scripted compositor. Clone is cheap.
#[derive(Debug, Clone)]
pub(crate) struct FakeCompositor {
  state: Arc<Mutex<FakeState>>,
}

impl Default for FakeCompositor {
  fn default() -> Self {
    Self::new()
  }
}

impl FakeCompositor {
  /// Compositor with the toplevel manager and a seat.
  pub(crate) fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(FakeState {
        has_manager: true,
        has_seat: true,
        failing_connects: 0,
        connect_attempts: 0,
        queued: VecDeque::new(),
        activated: Vec::new(),
        released: Vec::new(),
        sessions_dropped: 0,
        broken: false,
      })),
    }
  }

  pub(crate) fn without_seat(self) -> Self {
    self.state.lock().has_seat = false;
    self
  }

  pub(crate) fn without_manager(self) -> Self {
    self.state.lock().has_manager = false;
    self
  }

  pub(crate) fn failing_connects(self, count: u32) -> Self {
    self.state.lock().failing_connects = count;
    self
  }

  /// Make every later `sync` and `activate` fail.
  pub(crate) fn break_connection(&self) {
    self.state.lock().broken = true;
  }

  pub(crate) fn restore_connection(&self) {
    self.state.lock().broken = false;
  }

  pub(crate) fn emit(&self, event: FakeEvent) {
    self.state.lock().queued.push_back(event);
  }

  pub(crate) fn emit_all(&self, events: impl IntoIterator<Item = FakeEvent>) {
    self.state.lock().queued.extend(events);
  }

  /// Discovered + title + app id + done for one handle.
  pub(crate) fn open_window(&self, raw: u32, title: &str, app_id: &str) {
    self.emit_all([
      FakeEvent::Discovered(raw),
      FakeEvent::Title(raw, title.to_string()),
      FakeEvent::AppId(raw, app_id.to_string()),
      FakeEvent::Done(raw),
    ]);
  }

  pub(crate) fn handle(&self, raw: u32) -> FakeHandle {
    FakeHandle {
      raw,
      compositor: self.clone(),
    }
  }

  pub(crate) fn activated(&self) -> Vec<u32> {
    self.state.lock().activated.clone()
  }

  pub(crate) fn released(&self) -> Vec<u32> {
    self.state.lock().released.clone()
  }

  pub(crate) fn connect_attempts(&self) -> u32 {
    self.state.lock().connect_attempts
  }

  pub(crate) fn sessions_dropped(&self) -> u32 {
    self.state.lock().sessions_dropped
  }

  fn to_event(&self, event: FakeEvent) -> ToplevelEvent<FakeHandle> {
    match event {
      FakeEvent::Discovered(raw) => ToplevelEvent::Discovered(self.handle(raw)),
      FakeEvent::Title(raw, title) => ToplevelEvent::Title(self.handle(raw), title),
      FakeEvent::AppId(raw, app_id) => ToplevelEvent::AppId(self.handle(raw), app_id),
      FakeEvent::StateChanged(raw) => ToplevelEvent::StateChanged(self.handle(raw)),
      FakeEvent::Done(raw) => ToplevelEvent::Done(self.handle(raw)),
      FakeEvent::Closed(raw) => ToplevelEvent::Closed(self.handle(raw)),
    }
  }
}

/// Handle addressed by its raw number.
#[derive(Clone)]
pub(crate) struct FakeHandle {
  pub(crate) raw: u32,
  compositor: FakeCompositor,
}

impl std::fmt::Debug for FakeHandle {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "FakeHandle({})", self.raw)
  }
}

impl PlatformHandle for FakeHandle {
  type Key = u32;

  fn key(&self) -> u32 {
    self.raw
  }

  fn release(&self) {
    self.compositor.state.lock().released.push(self.raw);
  }
}

impl Connector for FakeCompositor {
  type Session = FakeSession;

  fn connect(&self) -> ToplevelsResult<FakeSession> {
    let mut state = self.state.lock();
    state.connect_attempts += 1;
    if state.failing_connects > 0 {
      state.failing_connects -= 1;
      return Err(ToplevelsError::ConnectionFailed("scripted failure".into()));
    }
    if !state.has_manager {
      return Err(ToplevelsError::NoCompositorSupport);
    }
    Ok(FakeSession {
      compositor: self.clone(),
      seat: state.has_seat,
    })
  }
}

#[derive(Debug)]
pub(crate) struct FakeSession {
  compositor: FakeCompositor,
  seat: bool,
}

impl Session for FakeSession {
  type Handle = FakeHandle;

  fn sync(&mut self) -> ToplevelsResult<Vec<ToplevelEvent<FakeHandle>>> {
    let queued: Vec<FakeEvent> = {
      let mut state = self.compositor.state.lock();
      if state.broken {
        return Err(ToplevelsError::Transport("broken pipe".into()));
      }
      state.queued.drain(..).collect()
    };
    Ok(
      queued
        .into_iter()
        .map(|event| self.compositor.to_event(event))
        .collect(),
    )
  }

  fn seat_available(&self) -> bool {
    self.seat
  }

  fn activate(&mut self, handle: &FakeHandle) -> ToplevelsResult<()> {
    if !self.seat {
      return Err(ToplevelsError::NoSeat);
    }
    let mut state = self.compositor.state.lock();
    if state.broken {
      return Err(ToplevelsError::Transport("broken pipe".into()));
    }
    state.activated.push(handle.raw);
    Ok(())
  }
}

impl Drop for FakeSession {
  fn drop(&mut self) {
    self.compositor.state.lock().sessions_dropped += 1;
  }
}
