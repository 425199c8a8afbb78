pub mod hash;
pub mod memory;
pub mod traits;

pub use hash::*;
pub use memory::*;
pub use traits::*;
