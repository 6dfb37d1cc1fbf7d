/*!
Wayland session over `zwlr_foreign_toplevel_manager_v1`.

Bootstrap:
1. connect to `$WAYLAND_DISPLAY`
2. `registry_queue_init` (first roundtrip, collects the advertised globals)
3. bind the toplevel manager (required) and a seat (optional)

The second roundtrip, which announces toplevels that existed before we
connected, is the first `Session::sync` the worker performs.
*/

mod dispatch;

use wayland_client::backend::ObjectId;
use wayland_client::globals::registry_queue_init;
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::{Connection, EventQueue, Proxy};
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_handle_v1::ZwlrForeignToplevelHandleV1;
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_manager_v1::ZwlrForeignToplevelManagerV1;

use super::traits::{Connector, PlatformHandle, Session, ToplevelEvent};
use crate::types::{ToplevelsError, ToplevelsResult};

/// Highest `zwlr_foreign_toplevel_manager_v1` version we bind.
const MAX_MANAGER_VERSION: u32 = 3;
/// Highest `wl_seat` version we bind.
const MAX_SEAT_VERSION: u32 = 7;
/// First `wl_seat` version with the `release` request.
const SEAT_RELEASE_SINCE: u32 = 5;

/// Reference to a `zwlr_foreign_toplevel_handle_v1`.
#[derive(Debug, Clone)]
pub(crate) struct WaylandHandle(ZwlrForeignToplevelHandleV1);

impl PlatformHandle for WaylandHandle {
  type Key = ObjectId;

  fn key(&self) -> ObjectId {
    self.0.id()
  }

  fn release(&self) {
    self.0.destroy();
  }
}

/// Dispatch state. Protocol callbacks only record events; reconciliation
/// happens after the roundtrip returns.
#[derive(Debug, Default)]
pub(crate) struct WaylandState {
  events: Vec<ToplevelEvent<WaylandHandle>>,
}

impl WaylandState {
  fn push(&mut self, event: ToplevelEvent<WaylandHandle>) {
    self.events.push(event);
  }
}

/// Connects to the compositor named by the environment.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WaylandConnector;

impl Connector for WaylandConnector {
  type Session = WaylandSession;

  fn connect(&self) -> ToplevelsResult<WaylandSession> {
    let conn = Connection::connect_to_env()
      .map_err(|e| ToplevelsError::ConnectionFailed(e.to_string()))?;

    let (globals, queue) = registry_queue_init::<WaylandState>(&conn)
      .map_err(|e| ToplevelsError::ConnectionFailed(e.to_string()))?;
    let qh = queue.handle();

    let manager = globals
      .bind::<ZwlrForeignToplevelManagerV1, _, _>(&qh, 1..=MAX_MANAGER_VERSION, ())
      .map_err(|e| {
        log::error!("zwlr_foreign_toplevel_manager_v1 unavailable: {e}");
        ToplevelsError::NoCompositorSupport
      })?;
    log::debug!("Bound toplevel manager v{}", manager.version());

    let seat = match globals.bind::<WlSeat, _, _>(&qh, 1..=MAX_SEAT_VERSION, ()) {
      Ok(seat) => {
        log::debug!("Bound wl_seat v{}", seat.version());
        Some(seat)
      }
      Err(e) => {
        log::warn!("No usable wl_seat ({e}), focusing windows is disabled");
        None
      }
    };

    Ok(WaylandSession {
      conn,
      queue,
      state: WaylandState::default(),
      manager,
      seat,
    })
  }
}

/// A connected session. Stops the manager and releases the seat on drop.
pub(crate) struct WaylandSession {
  conn: Connection,
  queue: EventQueue<WaylandState>,
  state: WaylandState,
  manager: ZwlrForeignToplevelManagerV1,
  seat: Option<WlSeat>,
}

impl std::fmt::Debug for WaylandSession {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WaylandSession")
      .field("seat", &self.seat.is_some())
      .finish_non_exhaustive()
  }
}

impl Session for WaylandSession {
  type Handle = WaylandHandle;

  fn sync(&mut self) -> ToplevelsResult<Vec<ToplevelEvent<WaylandHandle>>> {
    self
      .queue
      .roundtrip(&mut self.state)
      .map_err(|e| ToplevelsError::Transport(e.to_string()))?;
    Ok(std::mem::take(&mut self.state.events))
  }

  fn seat_available(&self) -> bool {
    self.seat.is_some()
  }

  fn activate(&mut self, handle: &WaylandHandle) -> ToplevelsResult<()> {
    let Some(seat) = &self.seat else {
      return Err(ToplevelsError::NoSeat);
    };
    handle.0.activate(seat);
    self
      .conn
      .flush()
      .map_err(|e| ToplevelsError::Transport(e.to_string()))
  }
}

impl Drop for WaylandSession {
  fn drop(&mut self) {
    self.manager.stop();
    if let Some(seat) = self.seat.take() {
      if seat.version() >= SEAT_RELEASE_SINCE {
        seat.release();
      }
    }
    if let Err(e) = self.conn.flush() {
      log::debug!("Flush on disconnect failed: {e}");
    }
  }
}
