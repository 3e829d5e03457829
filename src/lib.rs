// Webmerge library
// Composite resource resolution, conditional caching and the directive pipeline

pub mod cache;
pub mod compression;
pub mod config;
pub mod constants;
pub mod error;
pub mod freshness;
pub mod logging;
pub mod modules;
pub mod pipeline;
pub mod reload; // SIGHUP rule reload
pub mod resource;
pub mod rules;
pub mod server;
