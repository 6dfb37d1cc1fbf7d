/*! Toplevels JSON-RPC over WebSocket. */

mod config;
mod rpc;
mod server;

pub use config::Config;
pub use rpc::{dispatch, dispatch_json, RpcRequest, RpcResponse};
pub use server::{start_server, WebSocketState, DEFAULT_WS_PORT};
