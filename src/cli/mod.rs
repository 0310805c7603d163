//! Subprocess spawning, stdout line reading and event classification.

mod events;
mod process;
mod stream;

pub use events::*;
pub use process::*;
pub use stream::*;
