//! Integration connectivity handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use genjobs_core::{ConnectionState, ConnectionTestResult, ConnectivityError};

use super::{api_error, api_error_kind, internal_error, ApiError};
use crate::api::middleware::Caller;
use crate::state::AppState;

fn connectivity_error(e: ConnectivityError) -> ApiError {
    match e {
        ConnectivityError::NotUserManaged(_) => {
            api_error_kind(StatusCode::UNPROCESSABLE_ENTITY, "not_user_managed", e.to_string())
        }
        ConnectivityError::UnknownProvider(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        ConnectivityError::Store(_) => internal_error(e),
    }
}

/// Run a connectivity test for one project's integration.
///
/// A failed probe is still a 200; the body carries `ok: false`.
pub async fn test_integration(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Path((project_id, provider_type)): Path<(String, String)>,
) -> Result<Json<ConnectionTestResult>, ApiError> {
    if !identity.can_access(&project_id) {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            format!("Not allowed to access project {}", project_id),
        ));
    }

    state
        .connectivity()
        .test_connection(&project_id, &provider_type)
        .await
        .map(Json)
        .map_err(connectivity_error)
}

/// Current connection state of one project's integration.
pub async fn get_integration(
    State(state): State<Arc<AppState>>,
    Caller(identity): Caller,
    Path((project_id, provider_type)): Path<(String, String)>,
) -> Result<Json<ConnectionState>, ApiError> {
    if !identity.can_access(&project_id) {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            format!("Not allowed to access project {}", project_id),
        ));
    }

    if state.registry().catalog().get(&provider_type).is_none() {
        return Err(connectivity_error(ConnectivityError::UnknownProvider(
            provider_type,
        )));
    }

    state
        .connectivity()
        .get_status(&project_id, &provider_type)
        .map(Json)
        .map_err(connectivity_error)
}
