//! Run artifacts: transcript and stderr capture files and the result sink.

mod error;
mod sink;
mod transcript;

pub use error::*;
pub use sink::*;
pub use transcript::*;
