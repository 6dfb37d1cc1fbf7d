/*! Protocol event handlers. Each one turns a wire event into a `ToplevelEvent`. */

use wayland_client::globals::GlobalListContents;
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::{self, WlSeat};
use wayland_client::{event_created_child, Connection, Dispatch, QueueHandle};
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_handle_v1::{
  self, ZwlrForeignToplevelHandleV1,
};
use wayland_protocols_wlr::foreign_toplevel::v1::client::zwlr_foreign_toplevel_manager_v1::{
  self, ZwlrForeignToplevelManagerV1,
};

use super::{WaylandHandle, WaylandState};
use crate::platform::ToplevelEvent;

impl Dispatch<WlRegistry, GlobalListContents> for WaylandState {
  fn event(
    _state: &mut Self,
    _proxy: &WlRegistry,
    event: wl_registry::Event,
    _data: &GlobalListContents,
    _conn: &Connection,
    _qh: &QueueHandle<Self>,
  ) {
    // The manager and seat are bound once at bootstrap; later globals don't matter.
    if let wl_registry::Event::GlobalRemove { name } = event {
      log::debug!("Global {name} removed");
    }
  }
}

impl Dispatch<WlSeat, ()> for WaylandState {
  fn event(
    _state: &mut Self,
    _proxy: &WlSeat,
    event: wl_seat::Event,
    _data: &(),
    _conn: &Connection,
    _qh: &QueueHandle<Self>,
  ) {
    if let wl_seat::Event::Name { name } = event {
      log::debug!("Seat name: {name}");
    }
  }
}

impl Dispatch<ZwlrForeignToplevelManagerV1, ()> for WaylandState {
  fn event(
    state: &mut Self,
    _proxy: &ZwlrForeignToplevelManagerV1,
    event: zwlr_foreign_toplevel_manager_v1::Event,
    _data: &(),
    _conn: &Connection,
    _qh: &QueueHandle<Self>,
  ) {
    match event {
      zwlr_foreign_toplevel_manager_v1::Event::Toplevel { toplevel } => {
        state.push(ToplevelEvent::Discovered(WaylandHandle(toplevel)));
      }
      zwlr_foreign_toplevel_manager_v1::Event::Finished => {
        log::info!("Compositor finished the toplevel manager, no further windows will be announced");
      }
      _ => {}
    }
  }

  event_created_child!(WaylandState, ZwlrForeignToplevelManagerV1, [
    zwlr_foreign_toplevel_manager_v1::EVT_TOPLEVEL_OPCODE => (ZwlrForeignToplevelHandleV1, ()),
  ]);
}

impl Dispatch<ZwlrForeignToplevelHandleV1, ()> for WaylandState {
  fn event(
    state: &mut Self,
    proxy: &ZwlrForeignToplevelHandleV1,
    event: zwlr_foreign_toplevel_handle_v1::Event,
    _data: &(),
    _conn: &Connection,
    _qh: &QueueHandle<Self>,
  ) {
    use zwlr_foreign_toplevel_handle_v1::Event as E;

    let handle = WaylandHandle(proxy.clone());
    let event = match event {
      E::Title { title } => ToplevelEvent::Title(handle, title),
      E::AppId { app_id } => ToplevelEvent::AppId(handle, app_id),
      E::State { .. } => ToplevelEvent::StateChanged(handle),
      E::OutputEnter { .. } => ToplevelEvent::OutputEntered(handle),
      E::OutputLeave { .. } => ToplevelEvent::OutputLeft(handle),
      E::Parent { .. } => ToplevelEvent::Parent(handle),
      E::Done => ToplevelEvent::Done(handle),
      E::Closed => ToplevelEvent::Closed(handle),
      _ => {
        log::trace!("Unhandled toplevel handle event");
        return;
      }
    };
    state.push(event);
  }
}
