pub mod api;
pub mod config;
pub mod files;
pub mod handlers;
pub mod humanize;
pub mod ledger;
pub mod messaging;
pub mod models;
pub mod observability;
pub mod tasks;
pub mod users;
