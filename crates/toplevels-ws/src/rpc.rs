/*!
RPC request/response types and dispatch.
*/

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use toplevels::{QueryMatch, Snapshot, Toplevels, Window, WindowId};
use ts_rs::TS;

/// RPC request.
#[derive(Debug, Deserialize, TS)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
#[ts(export)]
pub enum RpcRequest {
  /// Registry contents plus seat availability.
  Snapshot,
  /// Just the window list.
  Windows,
  /// Give a window input focus.
  Focus { window_id: WindowId },
  /// Fuzzy-search windows by title and app id.
  Query {
    text: String,
    #[serde(default)]
    exact: bool,
  },
}

/// RPC response.
#[derive(Debug, Serialize, TS)]
#[serde(untagged)]
#[ts(export)]
pub enum RpcResponse {
  Snapshot(Snapshot),
  Windows(Vec<Window>),
  Matches(Vec<QueryMatch>),
  /// No data.
  Null,
}

/// Parse `{method, args}` and dispatch. Blocks; call from `spawn_blocking`.
pub fn dispatch_json(toplevels: &Toplevels, method: &str, args: &JsonValue) -> JsonValue {
  let request_value = json!({ "method": method, "args": args });

  match serde_json::from_value::<RpcRequest>(request_value) {
    Ok(request) => match dispatch(toplevels, request) {
      Ok(response) => json!({ "result": response }),
      Err(e) => {
        log::warn!("[rpc] {method} failed: {e}");
        json!({ "error": e })
      }
    },
    Err(e) => {
      log::warn!("[rpc] Invalid request for {method}: {e}");
      json!({ "error": format!("Invalid request: {e}") })
    }
  }
}

/// Run one typed request against `toplevels`. Blocks.
pub fn dispatch(toplevels: &Toplevels, request: RpcRequest) -> Result<RpcResponse, String> {
  match request {
    RpcRequest::Snapshot => {
      let snapshot = toplevels.snapshot().map_err(|e| e.to_string())?;
      Ok(RpcResponse::Snapshot(snapshot))
    }

    RpcRequest::Windows => {
      let windows = toplevels.list_windows().map_err(|e| e.to_string())?;
      Ok(RpcResponse::Windows(windows))
    }

    RpcRequest::Focus { window_id } => {
      toplevels.focus(window_id).map_err(|e| e.to_string())?;
      Ok(RpcResponse::Null)
    }

    RpcRequest::Query { text, exact } => {
      let matches = toplevels.query(&text, exact).map_err(|e| e.to_string())?;
      Ok(RpcResponse::Matches(matches))
    }
  }
}
