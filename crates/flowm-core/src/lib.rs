pub mod change;
pub mod config;
pub mod constitution;
pub mod delta;
pub mod diff;
pub mod error;
pub mod identity;
pub mod io;
pub mod merge;
pub mod paths;
pub mod project;
pub mod quality;
pub mod session;
pub mod specs;
pub mod timeline;

pub use error::{FlowError, Result};
