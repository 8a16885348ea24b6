pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod scope;
pub mod services;
mod shutdown;
pub mod state;
mod tracing;
