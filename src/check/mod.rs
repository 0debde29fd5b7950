//! Check passes and their orchestration.

pub mod auto;
pub mod consensus;
pub mod decode;
pub mod orchestrator;
pub mod profile;
pub mod resolve;
pub mod structural;

pub use orchestrator::{CheckRequest, CheckRunner};
