pub mod app;
pub mod collaborators;
pub mod comment;
pub mod config;
pub mod events;
pub mod orchestrator;
pub mod prompt;
pub mod review;
pub mod selector;
pub mod suggestion;

pub use app::*;
pub use collaborators::*;
pub use config::*;
pub use events::*;
pub use orchestrator::*;
pub use review::*;
pub use suggestion::*;
