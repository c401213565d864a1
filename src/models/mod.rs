// Core models
pub mod game;
pub mod period;
pub mod reward;

// Re-export commonly used types
pub use game::*;
pub use period::*;
pub use reward::*;
