//! Thin HTTP surface over the task, file and user services

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use server::{App, router, run};
