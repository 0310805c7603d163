//! Run supervision: per-run state, rendering, outcome resolution and the
//! event loop that ties them together.

mod outcome;
mod render;
mod runner;
mod state;

pub use outcome::*;
pub use render::*;
pub use runner::*;
pub use state::*;
