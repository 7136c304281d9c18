use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod error;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod token;

#[cfg(test)]
pub(crate) mod test_utils;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
