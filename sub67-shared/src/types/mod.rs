pub mod api;
pub mod event;
pub mod job;

pub use api::*;
pub use event::*;
pub use job::*;
