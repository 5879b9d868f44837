pub mod classroom;
pub mod config;
pub mod domain;
pub mod error;
pub mod exam;
pub mod filters;
pub mod gateway;
pub mod handlers;
pub mod profiling;
pub mod scheduler;
pub mod services;
pub mod shell;
pub mod state;
