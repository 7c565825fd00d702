pub mod app;
pub mod command;
pub mod config;
pub mod registry;
pub mod runtime;
pub mod shared;
pub mod tail;
