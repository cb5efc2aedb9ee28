pub mod cli;
pub mod pack;

pub use cli::*;
pub use pack::*;
