use super::{AppError, AppQuery, AppState};
use crate::digikey::AuthorizationStatus;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Query parameters DigiKey appends to the redirect URL
#[derive(Debug, Deserialize)]
pub struct AuthorizationCallback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn callback_page(title: &str, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Binner - {title}</title></head>
<body style="font-family: sans-serif; margin: 3em;">
  <h2>{title}</h2>
  <p>{message}</p>
</body>
</html>"#,
        title = html_escape(title),
        message = html_escape(message),
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// OAuth redirect target for the DigiKey consent page
pub async fn authorization_callback(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<AuthorizationCallback>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(error) = params.error {
        let reason = match params.error_description {
            Some(description) => format!("{}: {}", error, description),
            None => error,
        };
        state
            .digikey
            .fail_authorization(&reason, params.state.as_deref())?;
        warn!("❌ DigiKey authorization denied: {}", reason);
        return Ok((
            StatusCode::BAD_REQUEST,
            Html(callback_page("Authorization failed", &reason)),
        ));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    state
        .digikey
        .complete_authorization(&code, params.state.as_deref())
        .await?;
    info!("✅ DigiKey authorization callback handled");

    Ok((
        StatusCode::OK,
        Html(callback_page(
            "Authorization complete",
            "DigiKey access was granted. You can close this window.",
        )),
    ))
}

pub async fn oauth_status(State(state): State<Arc<AppState>>) -> Json<AuthorizationStatus> {
    Json(state.digikey.authorization_status())
}

/// Forget DigiKey credentials (memory and disk)
pub async fn oauth_logout(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.digikey.forget_authentication_tokens()?;
    info!("🔓 DigiKey credentials removed");
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "DigiKey credentials removed"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_page_escapes_reason() {
        let page = callback_page("Authorization failed", "<script>alert(1)</script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));
    }
}
