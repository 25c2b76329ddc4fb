pub mod error;
pub mod sim;
pub mod sink;

pub use error::*;
pub use sim::*;
pub use sink::*;
