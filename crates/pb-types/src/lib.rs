pub mod job;
pub mod errors;

pub use job::*;
pub use errors::*;
