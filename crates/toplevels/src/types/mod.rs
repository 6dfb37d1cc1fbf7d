/*! Core types for toplevels.

Regenerate TypeScript types: `cargo test -p toplevels export_bindings`
*/

#![allow(missing_docs)]

mod error;
mod event;
mod ids;
mod state;
mod window;

pub use error::{ToplevelsError, ToplevelsResult};
pub use event::{Event, Snapshot};
pub(crate) use ids::IdAllocator;
pub use ids::WindowId;
pub use state::SessionState;
pub use window::Window;
