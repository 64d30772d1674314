pub mod config;
pub mod frames;
pub mod models;
pub mod utils;

pub use config::*;
pub use frames::*;
pub use models::*;
pub use utils::*;
