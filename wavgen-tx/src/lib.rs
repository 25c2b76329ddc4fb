pub mod account;
pub mod cancel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod report;
pub mod source;
pub mod streamer;
pub mod timeline;

pub use account::*;
pub use cancel::*;
pub use config::*;
pub use error::*;
pub use metrics::*;
pub use report::*;
pub use source::*;
pub use streamer::*;
pub use timeline::*;
