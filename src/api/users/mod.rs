//! Users API
//!
//! CRUD over user records plus bulk CSV import:
//! - `POST /users`, `GET /users`
//! - `PATCH /users/{id}`, `DELETE /users/{id}` (soft delete)
//! - `POST /users/upload`

mod handlers;
mod requests;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};

use crate::api::state::AppState;

pub use handlers::UPLOAD_FIELD;
pub use requests::{
    CreateUserRequest, ListUsersQuery, PaginatedResponse, UpdateUserRequest, DEFAULT_LIMIT,
    DEFAULT_PAGE, MAX_LIMIT,
};

/// Routes mounted under `/users`
pub fn create_users_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/upload",
            post(handlers::upload_users).layer(DefaultBodyLimit::max(state.upload.max_bytes)),
        )
        .route(
            "/{id}",
            patch(handlers::update_user).delete(handlers::delete_user),
        )
}
