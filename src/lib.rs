pub mod cache;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod github;
pub mod host;
pub mod http;
pub mod model;
pub mod overlay;
pub mod page;
pub mod render;
