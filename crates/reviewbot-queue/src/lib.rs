pub mod limiter;
pub mod queue;

pub use limiter::*;
pub use queue::*;
