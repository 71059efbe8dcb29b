use axum::extract::State;
use axum::Json;

use crate::models::DataResponse;
use crate::state::AppState;

/// Currently present nicknames, sorted.
pub async fn list_users(State(state): State<AppState>) -> Json<DataResponse<Vec<String>>> {
    let nicknames = state.broker.nicknames();
    Json(DataResponse::new(nicknames.as_ref().clone()))
}
