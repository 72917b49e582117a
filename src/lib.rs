pub mod actions;
pub mod app;
pub mod backend;
pub mod config;
pub mod metrics;
pub mod pages;
pub mod session;
