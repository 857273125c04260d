use axum::{
    extract::{Path, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::{
    mail::{SmtpSettings, SMTP_PASSWORD},
    repo::{self, Setting},
};
use crate::{
    auth::{extractors::MANAGERS, AuthUser},
    error::ApiError,
    extract::ApiJson,
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::{check_email, normalize_email, required_str},
};

pub const MASK: &str = "********";
pub const SITE_NAME: &str = "site_name";

const MAX_KEY_LEN: usize = 100;

#[derive(Debug, Deserialize)]
pub struct TestEmailRequest {
    pub to: Option<String>,
}

pub fn setting_routes() -> Router<AppState> {
    Router::new()
        .route("/settings", get(list_settings).put(update_settings))
        .route("/settings/test-email", post(send_test_email))
        .route("/settings/:key", get(get_setting))
}

fn is_secret(key: &str) -> bool {
    key == SMTP_PASSWORD
}

fn masked(mut setting: Setting) -> Setting {
    if is_secret(&setting.key) && !setting.value.is_empty() {
        setting.value = MASK.to_string();
    }
    setting
}

fn check_key(key: &str) -> Result<(), ApiError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("Invalid setting key: {key}")))
    }
}

/// Turns the request object into key/value pairs. Scalars are stored as text,
/// `null` as an empty string. A masked secret echoed back by the client is
/// dropped so the stored value survives.
fn settings_from_body(body: serde_json::Map<String, Value>) -> Result<Vec<(String, String)>, ApiError> {
    let mut pairs = Vec::with_capacity(body.len());
    for (key, value) in body {
        let key = key.trim().to_string();
        check_key(&key)?;
        let value = match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ApiError::bad_request(format!(
                    "Setting {key} must be a string, number or boolean"
                )))
            }
        };
        if is_secret(&key) && value == MASK {
            continue;
        }
        pairs.push((key, value));
    }
    Ok(pairs)
}

#[instrument(skip(state))]
pub async fn list_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Vec<Setting>> {
    auth.require_role(MANAGERS)?;
    let settings = repo::list(&state.db).await?;
    Ok(ApiResponse::ok(settings.into_iter().map(masked).collect()))
}

#[instrument(skip(state))]
pub async fn get_setting(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(key): Path<String>,
) -> ApiResult<Setting> {
    auth.require_role(MANAGERS)?;
    let setting = repo::find(&state.db, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Setting not found"))?;
    Ok(ApiResponse::ok(masked(setting)))
}

#[instrument(skip(state, body))]
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<serde_json::Map<String, Value>>,
) -> ApiResult<Vec<Setting>> {
    auth.require_role(MANAGERS)?;
    let pairs = settings_from_body(body)?;
    if pairs.is_empty() {
        return Err(ApiError::bad_request("No settings to update"));
    }
    repo::upsert_many(&state.db, &pairs).await?;
    info!(count = pairs.len(), by = %auth.id, "settings updated");

    let settings = repo::list(&state.db).await?;
    Ok(ApiResponse::ok(settings.into_iter().map(masked).collect()))
}

#[instrument(skip(state))]
pub async fn send_test_email(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<TestEmailRequest>,
) -> ApiResult<Value> {
    auth.require_role(MANAGERS)?;
    let to = normalize_email(&required_str(body.to, "to")?);
    check_email(&to)?;

    let values = repo::load_prefixed(&state.db, "smtp_").await?;
    let smtp = SmtpSettings::from_map(&values)?;
    let site_name = repo::find(&state.db, SITE_NAME)
        .await?
        .map(|s| s.value)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "Sunshare".to_string());

    let message = smtp.test_message(&to, &site_name)?;
    smtp.send(message).await?;
    info!(%to, by = %auth.id, "test email sent");
    Ok(ApiResponse::message("Test email sent"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::OffsetDateTime;

    fn object(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn password_is_masked() {
        let setting = Setting {
            key: SMTP_PASSWORD.into(),
            value: "hunter22".into(),
            updated_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(masked(setting).value, MASK);

        let setting = Setting {
            key: "smtp_host".into(),
            value: "smtp.example.com".into(),
            updated_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(masked(setting).value, "smtp.example.com");
    }

    #[test]
    fn body_becomes_text_pairs() {
        let mut pairs = settings_from_body(object(json!({
            "smtp_port": 587,
            "smtp_host": "smtp.example.com",
            "maintenance": false,
            "smtp_user": null,
        })))
        .expect("valid");
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("maintenance".to_string(), "false".to_string()),
                ("smtp_host".to_string(), "smtp.example.com".to_string()),
                ("smtp_port".to_string(), "587".to_string()),
                ("smtp_user".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn echoed_mask_keeps_stored_password() {
        let pairs = settings_from_body(object(json!({ "smtp_password": MASK }))).expect("valid");
        assert!(pairs.is_empty());
    }

    #[test]
    fn rejects_bad_keys_and_nested_values() {
        assert!(settings_from_body(object(json!({ "Bad Key": "x" }))).is_err());
        assert!(settings_from_body(object(json!({ "smtp_host": ["a"] }))).is_err());
    }
}
