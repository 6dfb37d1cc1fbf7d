/*!
Toplevels - live registry of Wayland toplevel windows

Tracks the application windows a wlroots-style compositor announces through
`zwlr_foreign_toplevel_manager_v1`, converges their partial per-handle updates
into one consistent window list, and can ask the compositor to focus one of
them.

```ignore
use toplevels::{Toplevels, WindowId};

// Create instance and connect
let toplevels = Toplevels::builder().focus_delay_ms(100).build();
toplevels.bootstrap()?;

// Query state (each call drains pending compositor events first)
let windows = toplevels.list_windows()?;
let matches = toplevels.query("term", false)?;
toplevels.focus(WindowId(0))?;

// Subscribe to events
let mut events = toplevels.subscribe();
while let Ok(event) = events.recv().await {
    // handle event
}

// Session stops on shutdown() or when the last clone is dropped
toplevels.shutdown();
```
*/

mod core;
mod platform;
mod polling;
mod query;

mod types;
pub use types::*;

pub use crate::core::{Toplevels, ToplevelsBuilder};
pub use crate::query::{MatchField, QueryMatch};
