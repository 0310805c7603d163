//! qoder-runner - supervise a qodercli stream-json run for CI.

pub mod capture;
pub mod cli;
pub mod config;
pub mod display;
pub mod redact;
pub mod supervisor;
