/*!
`toplevels-ws` - serve the compositor's window list over WebSocket.

Configured through `TOPLEVELS_WS_*` environment variables (see `Config`),
logging through `RUST_LOG`.
*/

use toplevels_ws::{start_server, Config, WebSocketState};

#[tokio::main]
async fn main() {
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

  let config = Config::from_env();
  log::debug!("{config:?}");

  let toplevels = config.builder().build();
  let bootstrapping = toplevels.clone();
  match tokio::task::spawn_blocking(move || bootstrapping.bootstrap()).await {
    Ok(Ok(())) => {}
    Ok(Err(e)) => {
      log::error!("Could not start a toplevel session: {e}");
      std::process::exit(1);
    }
    Err(e) => {
      log::error!("Bootstrap task failed: {e}");
      std::process::exit(1);
    }
  }

  if let Err(e) = start_server(WebSocketState::with_port(toplevels, config.port)).await {
    log::error!("WebSocket server on port {} failed: {e}", config.port);
    std::process::exit(1);
  }
}
