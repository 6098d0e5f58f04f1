pub mod cli;
pub mod component;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod live;
pub mod metrics;
pub mod models;
pub mod output;
pub mod routing;
