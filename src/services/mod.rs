//! Application services.
//!
//! Async orchestration between the shell and the teacher gateway. Each
//! service takes what it needs from the shell, releases the lock, awaits
//! the gateway, and hands the outcome back to the shell.

pub mod classroom;
pub mod exam;
