/*! Fallback for targets without Wayland. Bootstrap always fails. */

use super::traits::{Connector, PlatformHandle, Session, ToplevelEvent};
use crate::types::{ToplevelsError, ToplevelsResult};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct UnsupportedConnector;

#[derive(Debug, Clone, Copy)]
pub(crate) struct NoHandle;

#[derive(Debug)]
pub(crate) enum NoSession {}

impl PlatformHandle for NoHandle {
  type Key = ();

  fn key(&self) {}

  fn release(&self) {}
}

impl Connector for UnsupportedConnector {
  type Session = NoSession;

  fn connect(&self) -> ToplevelsResult<NoSession> {
    Err(ToplevelsError::NoCompositorSupport)
  }
}

impl Session for NoSession {
  type Handle = NoHandle;

  fn sync(&mut self) -> ToplevelsResult<Vec<ToplevelEvent<NoHandle>>> {
    match *self {}
  }

  fn seat_available(&self) -> bool {
    match *self {}
  }

  fn activate(&mut self, _handle: &NoHandle) -> ToplevelsResult<()> {
    match *self {}
  }
}
