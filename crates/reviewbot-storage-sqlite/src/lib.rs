mod db;

pub mod cache;
pub mod claims;

pub use cache::*;
pub use claims::*;
