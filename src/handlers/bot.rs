//! 机器人键盘按钮

use crate::{error::AppError, middleware::AppState};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ButtonsQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ButtonsResponse {
    pub buttons: Vec<String>,
}

/// 当前聊天用户可见的按钮文本；未知用户返回默认按钮
pub async fn get_buttons(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ButtonsQuery>,
) -> Result<Json<ButtonsResponse>, AppError> {
    let user_id = query.user_id.as_deref().filter(|id| !id.is_empty());
    let buttons = state.access.ui_button_texts(user_id).await?;

    Ok(Json(ButtonsResponse { buttons }))
}
