pub mod error;
pub mod ids;
pub mod jobs;
pub mod model;

pub use error::*;
pub use ids::*;
pub use jobs::*;
pub use model::*;
