/*!
Registry - the committed, queryable window list.

All fields are private. Mutations go through methods that maintain invariants
and emit events. This guarantees:
- At most one entry per `WindowId`
- Entries stay in order of first publication
- Every visible change emits exactly one event

## Module Structure

- `mod.rs` - Registry struct, entry type, reads, teardown
- `windows.rs` - publish / field updates / removal
*/

mod windows;

pub(crate) use windows::Publish;

use async_broadcast::Sender;

use crate::types::{Event, Window, WindowId};

/// A published window. `handle` is a reference for issuing commands; the
/// reconciler owns its protocol lifecycle.
#[derive(Debug, Clone)]
pub(crate) struct WindowEntry<H> {
  pub(crate) id: WindowId,
  pub(crate) title: Option<String>,
  pub(crate) app_id: Option<String>,
  pub(crate) handle: H,
}

impl<H> WindowEntry<H> {
  pub(crate) fn to_window(&self) -> Window {
    Window {
      id: self.id,
      title: self.title.clone(),
      app_id: self.app_id.clone(),
    }
  }
}

/// Window list with automatic event emission.
pub(crate) struct Registry<H> {
  events_tx: Sender<Event>,
  entries: Vec<WindowEntry<H>>,
}

impl<H> std::fmt::Debug for Registry<H> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Registry")
      .field("entries", &self.entries.len())
      .finish_non_exhaustive()
  }
}

impl<H> Registry<H> {
  pub(crate) const fn new(events_tx: Sender<Event>) -> Self {
    Self {
      events_tx,
      entries: Vec::new(),
    }
  }

  /// Emit an event.
  pub(super) fn emit(&self, event: Event) {
    if let Err(e) = self.events_tx.try_broadcast(event) {
      if e.is_full() {
        log::error!(
          "Event channel overflow - events are being dropped. \
           Consider increasing EVENT_CHANNEL_CAPACITY or processing events faster."
        );
      }
    }
  }

  /// Copies of all entries in order of first publication.
  pub(crate) fn snapshot(&self) -> Vec<Window> {
    self.entries.iter().map(WindowEntry::to_window).collect()
  }

  /// The unique entry with this id.
  pub(crate) fn lookup(&self, id: WindowId) -> Option<&WindowEntry<H>> {
    self.entries.iter().find(|entry| entry.id == id)
  }

  pub(super) fn position(&self, id: WindowId) -> Option<usize> {
    self.entries.iter().position(|entry| entry.id == id)
  }

  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  #[cfg(test)]
  pub(crate) fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Drop every entry. Emits `WindowRemoved` for each, in order.
  ///
  /// The registry is immediately reusable; a later bootstrap repopulates it.
  pub(crate) fn teardown(&mut self) -> usize {
    let removed: Vec<WindowEntry<H>> = self.entries.drain(..).collect();
    for entry in &removed {
      self.emit(Event::WindowRemoved {
        window_id: entry.id,
      });
    }
    removed.len()
  }
}
