pub mod capture;
pub mod config;
pub mod liveness;
pub mod pipeline;
pub mod presence;

pub use capture::*;
pub use config::*;
pub use liveness::*;
pub use pipeline::*;
pub use presence::*;
