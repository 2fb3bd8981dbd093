//! Retailnet API Library
//!
//! Inventory ledger and cascading replenishment engine for a multi-tier
//! retail network (stores, regional warehouses, central warehouse).
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod ids;
pub mod migrator;
pub mod services;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// Full v1 API surface, nested under `/api/v1` by the binary.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/inventory", handlers::inventory::inventory_router())
        .nest(
            "/replenishment",
            handlers::replenishment::replenishment_router(),
        )
        .nest("/transfers", handlers::transfers::transfer_router())
}
