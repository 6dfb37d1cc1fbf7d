/*!
Window mutations for the Registry.

Publish: `publish` (insert-or-overwrite, keyed by `WindowId`)
Fields: `set_title`, `set_app_id` (in place, only for published windows)
Removal: `remove`
*/

use super::{Registry, WindowEntry};
use crate::types::{Event, WindowId};

/// What `publish` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Publish {
  /// New entry appended.
  Added,
  /// Existing entry overwritten with different values.
  Updated,
  /// Existing entry already had these values.
  Unchanged,
}

impl<H: Clone> Registry<H> {
  /// Insert a window, or overwrite the fields of the entry with the same id.
  ///
  /// Compositors send `done` again whenever fields change, so a repeated
  /// publish for one id is the normal update path, not a duplicate.
  pub(crate) fn publish(
    &mut self,
    id: WindowId,
    title: Option<String>,
    app_id: Option<String>,
    handle: &H,
  ) -> Publish {
    if let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) {
      if entry.title == title && entry.app_id == app_id {
        return Publish::Unchanged;
      }
      entry.title = title;
      entry.app_id = app_id;
      let window = entry.to_window();
      self.emit(Event::WindowChanged { window });
      return Publish::Updated;
    }

    let entry = WindowEntry {
      id,
      title,
      app_id,
      handle: handle.clone(),
    };
    let window = entry.to_window();
    self.entries.push(entry);
    self.emit(Event::WindowAdded { window });
    Publish::Added
  }
}

impl<H> Registry<H> {
  /// Update the title of a published window. Returns false if `id` isn't published.
  pub(crate) fn set_title(&mut self, id: WindowId, title: &str) -> bool {
    self.update(id, |entry| {
      if entry.title.as_deref() == Some(title) {
        return false;
      }
      entry.title = Some(title.to_owned());
      true
    })
  }

  /// Update the app id of a published window. Returns false if `id` isn't published.
  pub(crate) fn set_app_id(&mut self, id: WindowId, app_id: &str) -> bool {
    self.update(id, |entry| {
      if entry.app_id.as_deref() == Some(app_id) {
        return false;
      }
      entry.app_id = Some(app_id.to_owned());
      true
    })
  }

  /// Apply `change` to the entry; emit `WindowChanged` if it reports a change.
  fn update(&mut self, id: WindowId, change: impl FnOnce(&mut WindowEntry<H>) -> bool) -> bool {
    let Some(entry) = self.entries.iter_mut().find(|entry| entry.id == id) else {
      return false;
    };
    if change(entry) {
      let window = entry.to_window();
      self.emit(Event::WindowChanged { window });
    }
    true
  }

  /// Remove a window. Remaining entries keep their relative order.
  pub(crate) fn remove(&mut self, id: WindowId) -> Option<WindowEntry<H>> {
    let index = self.position(id)?;
    let entry = self.entries.remove(index);
    self.emit(Event::WindowRemoved { window_id: id });
    Some(entry)
  }
}
