pub mod handlers;
pub mod mail;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::setting_routes()
}
