//! Request handlers.

pub mod callbacks;
pub mod health;
pub mod jobs;

pub use callbacks::*;
pub use health::*;
pub use jobs::*;
