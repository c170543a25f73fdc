mod base;
mod connection;
mod import;

pub use base::*;
pub use connection::*;
pub use import::*;
