/*!
Toplevel event reconciler.

Owns the transient state of every toplevel between its `discovered` and
`closed` events, and turns per-handle events into registry mutations:

- `discovered` allocates a `WindowId` before any field is known
- `title` / `app_id` overwrite the transient value, and the published entry if any
- `done` publishes the transient values (insert, or overwrite by id)
- `closed` removes the entry, releases the handle and retires the id

Events for handles we aren't tracking are protocol violations. They are
logged and dropped; the registry never sees them.
*/

use std::collections::HashMap;
use std::sync::Arc;

use super::registry::{Publish, Registry};
use crate::platform::{PlatformHandle, ToplevelEvent};
use crate::types::{IdAllocator, WindowId};

/// Per-handle state while a window's identity is being assembled.
#[derive(Debug)]
struct TransientToplevel<H> {
  handle: H,
  id: WindowId,
  title: Option<String>,
  app_id: Option<String>,
}

pub(crate) struct Reconciler<H: PlatformHandle> {
  ids: Arc<IdAllocator>,
  pending: HashMap<H::Key, TransientToplevel<H>>,
}

impl<H: PlatformHandle> std::fmt::Debug for Reconciler<H> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Reconciler")
      .field("tracked", &self.pending.len())
      .finish_non_exhaustive()
  }
}

impl<H: PlatformHandle> Reconciler<H> {
  pub(crate) fn new(ids: Arc<IdAllocator>) -> Self {
    Self {
      ids,
      pending: HashMap::new(),
    }
  }

  /// Route one session event.
  pub(crate) fn handle_event(&mut self, registry: &mut Registry<H>, event: ToplevelEvent<H>) {
    match event {
      ToplevelEvent::Discovered(handle) => {
        self.on_discovered(handle);
      }
      ToplevelEvent::Title(handle, title) => self.on_title(registry, &handle, title),
      ToplevelEvent::AppId(handle, app_id) => self.on_app_id(registry, &handle, app_id),
      ToplevelEvent::Done(handle) => self.on_done(registry, &handle),
      ToplevelEvent::Closed(handle) => self.on_closed(registry, &handle),
      ignored @ (ToplevelEvent::StateChanged(_)
      | ToplevelEvent::OutputEntered(_)
      | ToplevelEvent::OutputLeft(_)
      | ToplevelEvent::Parent(_)) => {
        log::trace!("Ignoring {ignored:?}");
      }
    }
  }

  /// Start tracking a handle. Returns its id.
  ///
  /// A handle that is already tracked keeps its record and id.
  pub(crate) fn on_discovered(&mut self, handle: H) -> WindowId {
    let key = handle.key();
    if let Some(existing) = self.pending.get(&key) {
      log::warn!(
        "Protocol violation: {key:?} discovered twice, keeping window {}",
        existing.id
      );
      return existing.id;
    }

    let id = self.ids.allocate();
    log::debug!("Discovered {key:?} as window {id}");
    self.pending.insert(
      key,
      TransientToplevel {
        handle,
        id,
        title: None,
        app_id: None,
      },
    );
    id
  }

  pub(crate) fn on_title(&mut self, registry: &mut Registry<H>, handle: &H, title: String) {
    let Some(toplevel) = self.tracked_mut(handle, "title") else {
      return;
    };
    registry.set_title(toplevel.id, &title);
    toplevel.title = Some(title);
  }

  pub(crate) fn on_app_id(&mut self, registry: &mut Registry<H>, handle: &H, app_id: String) {
    let Some(toplevel) = self.tracked_mut(handle, "app_id") else {
      return;
    };
    registry.set_app_id(toplevel.id, &app_id);
    toplevel.app_id = Some(app_id);
  }

  /// Publish the transient values. Repeated `done`s overwrite the same entry.
  pub(crate) fn on_done(&mut self, registry: &mut Registry<H>, handle: &H) {
    let Some(toplevel) = self.tracked_mut(handle, "done") else {
      return;
    };
    let result = registry.publish(
      toplevel.id,
      toplevel.title.clone(),
      toplevel.app_id.clone(),
      &toplevel.handle,
    );
    if result == Publish::Added {
      log::debug!("Published window {}", toplevel.id);
    }
  }

  /// Forget a handle. Its id is never handed out again.
  pub(crate) fn on_closed(&mut self, registry: &mut Registry<H>, handle: &H) {
    let key = handle.key();
    let Some(toplevel) = self.pending.remove(&key) else {
      log::warn!("Protocol violation: closed for unknown {key:?}");
      return;
    };
    // A window may close before it ever completed a `done`.
    if registry.remove(toplevel.id).is_some() {
      log::debug!("Window {} closed", toplevel.id);
    }
    toplevel.handle.release();
  }

  /// Release every tracked handle and empty the registry.
  pub(crate) fn teardown(&mut self, registry: &mut Registry<H>) {
    for (_, toplevel) in self.pending.drain() {
      toplevel.handle.release();
    }
    let removed = registry.teardown();
    if removed > 0 {
      log::debug!("Teardown removed {removed} windows");
    }
  }

  /// Number of handles between `discovered` and `closed`.
  pub(crate) fn tracked(&self) -> usize {
    self.pending.len()
  }

  fn tracked_mut(&mut self, handle: &H, event: &str) -> Option<&mut TransientToplevel<H>> {
    let key = handle.key();
    let toplevel = self.pending.get_mut(&key);
    if toplevel.is_none() {
      log::warn!("Protocol violation: {event} for unknown {key:?}, ignored");
    }
    toplevel
  }
}


#[cfg(test)]
mod proptests {
  use super::*;
  use crate::platform::fake::{FakeCompositor, FakeHandle};
  use proptest::prelude::*;
  use std::collections::HashSet;

  #[derive(Debug, Clone)]
  enum Op {
    Discovered(u32),
    Title(u32, String),
    AppId(u32, String),
    Done(u32),
    Closed(u32),
  }

  /// Strategy over a handful of handles so events collide often.
  fn op() -> impl Strategy<Value = Op> {
    let raw = 0..4u32;
    prop_oneof![
      raw.clone().prop_map(Op::Discovered),
      (raw.clone(), "[a-c]{0,2}").prop_map(|(h, s)| Op::Title(h, s)),
      (raw.clone(), "[x-z]{0,2}").prop_map(|(h, s)| Op::AppId(h, s)),
      raw.clone().prop_map(Op::Done),
      raw.prop_map(Op::Closed),
    ]
  }

  /// Reference model for one live handle.
  #[derive(Debug, Clone, Default)]
  struct Model {
    id: Option<WindowId>,
    title: Option<String>,
    app_id: Option<String>,
    published: bool,
  }

  proptest! {
    /// Registry ids stay unique, entries exist iff done-after-discovered and
    /// not closed, published values track the latest field events, and no id
    /// is ever handed out twice.
    #[test]
    fn registry_converges_to_model(ops in prop::collection::vec(op(), 0..80)) {
      let compositor = FakeCompositor::new();
      let (mut tx, _rx) = async_broadcast::broadcast(16);
      tx.set_overflow(true);
      let mut registry: Registry<FakeHandle> = Registry::new(tx);
      let mut reconciler = Reconciler::new(Arc::new(IdAllocator::new()));

      let mut live: std::collections::HashMap<u32, Model> = std::collections::HashMap::new();
      let mut issued: HashSet<WindowId> = HashSet::new();

      for op in ops {
        match op {
          Op::Discovered(raw) => {
            let id = reconciler.on_discovered(compositor.handle(raw));
            if let Some(model) = live.get(&raw) {
              prop_assert_eq!(model.id, Some(id), "rediscovery must keep the id");
            } else {
              prop_assert!(issued.insert(id), "id {} reused", id);
              live.insert(raw, Model { id: Some(id), ..Model::default() });
            }
          }
          Op::Title(raw, title) => {
            reconciler.on_title(&mut registry, &compositor.handle(raw), title.clone());
            if let Some(model) = live.get_mut(&raw) {
              model.title = Some(title);
            }
          }
          Op::AppId(raw, app_id) => {
            reconciler.on_app_id(&mut registry, &compositor.handle(raw), app_id.clone());
            if let Some(model) = live.get_mut(&raw) {
              model.app_id = Some(app_id);
            }
          }
          Op::Done(raw) => {
            reconciler.on_done(&mut registry, &compositor.handle(raw));
            if let Some(model) = live.get_mut(&raw) {
              model.published = true;
            }
          }
          Op::Closed(raw) => {
            reconciler.on_closed(&mut registry, &compositor.handle(raw));
            live.remove(&raw);
          }
        }

        let windows = registry.snapshot();
        let ids: HashSet<WindowId> = windows.iter().map(|w| w.id).collect();
        prop_assert_eq!(ids.len(), windows.len(), "duplicate ids in {:?}", windows);

        let expected: HashSet<WindowId> = live
          .values()
          .filter(|m| m.published)
          .filter_map(|m| m.id)
          .collect();
        prop_assert_eq!(&ids, &expected);

        for model in live.values().filter(|m| m.published) {
          let entry = windows.iter().find(|w| Some(w.id) == model.id);
          prop_assert!(entry.is_some());
          if let Some(entry) = entry {
            prop_assert_eq!(&entry.title, &model.title);
            prop_assert_eq!(&entry.app_id, &model.app_id);
          }
        }
        prop_assert_eq!(reconciler.tracked(), live.len());
      }
    }
  }
}
