//! HTTP API handlers

pub mod auth;
pub mod health;
pub mod iris;
pub mod review;
pub mod users;
pub mod vocabulary;

pub use auth::{require_admin, require_user, CurrentUser};
pub use health::health_routes;
pub use iris::{create_iris, list_my_iris, search_iris};
pub use review::{list_pending, review_iri};
pub use users::{issue_token, me, register};
pub use vocabulary::{
    add_term, add_term_type, create_vocabulary, download_template, get_vocabulary_path,
    upload_vocabulary,
};
