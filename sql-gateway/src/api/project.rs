//! Project descriptor endpoint

use axum::{extract::State, response::Json};
use std::sync::Arc;

use crate::schema::ProjectDescriptor;

/// Handler for GET /meta/project
pub async fn project_handler(
    State(descriptor): State<Arc<ProjectDescriptor>>,
) -> Json<ProjectDescriptor> {
    Json(descriptor.as_ref().clone())
}
