/*! Window type representing one published toplevel. */

use super::WindowId;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A toplevel window as seen by callers. A copy of the registry entry,
/// without the compositor handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Window {
  pub id: WindowId,
  /// Latest title. The compositor may never send one.
  pub title: Option<String>,
  /// Latest app id.
  pub app_id: Option<String>,
}
