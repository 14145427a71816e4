use axum::Router;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod cursor;
pub mod driver;
pub mod dto;
pub mod error;
pub mod handler;
pub mod lease;
pub mod model;
pub mod normalizer;
pub mod repository;
pub mod service;
pub mod synthesizer;

#[cfg(test)]
pub mod fakes;
#[cfg(test)]
pub mod memory;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(handler::get_job_status))
        .route("/{id}/advance", post(handler::advance_job))
}
