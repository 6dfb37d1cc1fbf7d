/*!
Platform layer: the compositor session behind the reconciler.

`traits.rs` is the boundary. `CurrentConnector` is the connector used by
`Toplevels::new()` on this target.
*/

mod traits;

#[cfg(unix)]
mod wayland;

#[cfg(not(unix))]
mod unsupported;

#[cfg(test)]
pub(crate) mod fake;

pub(crate) use traits::{Connector, PlatformHandle, Session, ToplevelEvent};

#[cfg(unix)]
pub(crate) use wayland::WaylandConnector as CurrentConnector;

#[cfg(not(unix))]
pub(crate) use unsupported::UnsupportedConnector as CurrentConnector;
