//! Shared types for the rivet binding state cache. Everything here is plain data or a trait
//! seam, the actual caching logic lives in `rivet-framework`.

pub use encoder::*;
pub use error::*;
pub use hooks::*;
pub use types::*;

mod types;

mod encoder;
mod error;
mod hooks;
