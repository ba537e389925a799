pub mod change;
pub mod config;
pub mod init;
pub mod project;
pub mod quality;
pub mod specs;
pub mod timeline;
