/*! Event types for registry changes and synchronization. */

use super::{Window, WindowId};
use serde::Serialize;
use ts_rs::TS;

/// Registry contents at one drain point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Snapshot {
  /// Windows in order of first publication.
  pub windows: Vec<Window>,
  /// False when the compositor advertised no seat; `focus` then always fails
  /// with `NoSeat`.
  pub seat_available: bool,
}

/// Events emitted when the registry changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "event", content = "data")]
#[ts(export)]
pub enum Event {
  // Initial sync (on connection)
  #[serde(rename = "sync:init")]
  SyncInit(Snapshot),

  // Window lifecycle (from reconciliation)
  #[serde(rename = "window:added")]
  WindowAdded { window: Window },
  #[serde(rename = "window:changed")]
  WindowChanged { window: Window },
  #[serde(rename = "window:removed")]
  WindowRemoved { window_id: WindowId },
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn events_serialize_with_tag_and_content() {
    let event = Event::WindowAdded {
      window: Window {
        id: WindowId(3),
        title: Some("Editor".into()),
        app_id: None,
      },
    };
    assert_eq!(
      serde_json::to_value(&event).ok(),
      Some(json!({
        "event": "window:added",
        "data": { "window": { "id": 3, "title": "Editor", "app_id": null } }
      }))
    );
  }

  #[test]
  fn removal_carries_only_the_id() {
    let event = Event::WindowRemoved {
      window_id: WindowId(7),
    };
    assert_eq!(
      serde_json::to_value(&event).ok(),
      Some(json!({ "event": "window:removed", "data": { "window_id": 7 } }))
    );
  }
}
