use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, City, Country};
use crate::{
    auth::{extractors::MANAGERS, AuthUser},
    error::{or_not_found, ApiError},
    extract::{ApiJson, ApiQuery},
    pagination::{PageQuery, Paginated},
    response::{ApiResponse, ApiResult},
    state::AppState,
    validation::{check_status, required, required_str},
};

#[derive(Debug, Default, Deserialize)]
pub struct CountryRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StateRequest {
    pub country_id: Option<Uuid>,
    pub name: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CityRequest {
    pub state_id: Option<Uuid>,
    pub name: Option<String>,
    pub status: Option<i16>,
}

#[derive(Debug, Deserialize)]
pub struct CountryFilter {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StateFilter {
    pub country_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CityFilter {
    pub state_id: Option<Uuid>,
}

pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/countries", get(list_countries).post(create_country))
        .route(
            "/countries/:id",
            get(get_country).put(update_country).delete(delete_country),
        )
        .route("/states", get(list_states).post(create_state))
        .route(
            "/states/:id",
            get(get_state).put(update_state).delete(delete_state),
        )
        .route("/cities", get(list_cities).post(create_city))
        .route(
            "/cities/:id",
            get(get_city).put(update_city).delete(delete_city),
        )
}

/// ISO-style codes are stored upper case.
fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Countries

#[instrument(skip(state))]
pub async fn list_countries(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<CountryFilter>,
) -> ApiResult<Paginated<Country>> {
    let (items, total) = repo::list_countries(&state.db, filter.search.as_deref(), &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_country(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Country> {
    let country = repo::find_country(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Country not found"))?;
    Ok(ApiResponse::ok(country))
}

#[instrument(skip(state))]
pub async fn create_country(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CountryRequest>,
) -> ApiResult<Country> {
    auth.require_role(MANAGERS)?;
    let name = required_str(body.name, "name")?;
    let code = normalize_code(&required_str(body.code, "code")?);
    let status = check_status(body.status.unwrap_or(1), 1)?;
    let country = repo::create_country(&state.db, &name, &code, status).await?;
    info!(country_id = %country.id, code = %country.code, by = %auth.id, "country created");
    Ok(ApiResponse::created(country))
}

#[instrument(skip(state))]
pub async fn update_country(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<CountryRequest>,
) -> ApiResult<Country> {
    auth.require_role(MANAGERS)?;
    let name = trimmed(body.name);
    let code = trimmed(body.code).map(|c| normalize_code(&c));
    let status = body.status.map(|s| check_status(s, 1)).transpose()?;
    let country = repo::update_country(&state.db, id, name.as_deref(), code.as_deref(), status)
        .await
        .map_err(or_not_found("Country"))?;
    info!(country_id = %id, by = %auth.id, "country updated");
    Ok(ApiResponse::ok(country))
}

#[instrument(skip(state))]
pub async fn delete_country(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete_country(&state.db, id).await? {
        return Err(ApiError::not_found("Country not found"));
    }
    info!(country_id = %id, by = %auth.id, "country deleted");
    Ok(ApiResponse::message("Country deleted"))
}

// States

#[instrument(skip(state))]
pub async fn list_states(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<StateFilter>,
) -> ApiResult<Paginated<repo::State>> {
    let (items, total) = repo::list_states(&state.db, filter.country_id, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_state(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<repo::State> {
    let region = repo::find_state(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("State not found"))?;
    Ok(ApiResponse::ok(region))
}

#[instrument(skip(state))]
pub async fn create_state(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<StateRequest>,
) -> ApiResult<repo::State> {
    auth.require_role(MANAGERS)?;
    let country_id = required(body.country_id, "country_id")?;
    let name = required_str(body.name, "name")?;
    let status = check_status(body.status.unwrap_or(1), 1)?;
    let region = repo::create_state(&state.db, country_id, &name, status).await?;
    info!(state_id = %region.id, name = %region.name, by = %auth.id, "state created");
    Ok(ApiResponse::created(region))
}

#[instrument(skip(state))]
pub async fn update_state(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<StateRequest>,
) -> ApiResult<repo::State> {
    auth.require_role(MANAGERS)?;
    let name = trimmed(body.name);
    let status = body.status.map(|s| check_status(s, 1)).transpose()?;
    let region = repo::update_state(&state.db, id, body.country_id, name.as_deref(), status)
        .await
        .map_err(or_not_found("State"))?;
    info!(state_id = %id, by = %auth.id, "state updated");
    Ok(ApiResponse::ok(region))
}

#[instrument(skip(state))]
pub async fn delete_state(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete_state(&state.db, id).await? {
        return Err(ApiError::not_found("State not found"));
    }
    info!(state_id = %id, by = %auth.id, "state deleted");
    Ok(ApiResponse::message("State deleted"))
}

// Cities

#[instrument(skip(state))]
pub async fn list_cities(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(page): ApiQuery<PageQuery>,
    ApiQuery(filter): ApiQuery<CityFilter>,
) -> ApiResult<Paginated<City>> {
    let (items, total) = repo::list_cities(&state.db, filter.state_id, &page).await?;
    Ok(ApiResponse::ok(Paginated::new(items, total, &page)))
}

#[instrument(skip(state))]
pub async fn get_city(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<City> {
    let city = repo::find_city(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("City not found"))?;
    Ok(ApiResponse::ok(city))
}

#[instrument(skip(state))]
pub async fn create_city(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CityRequest>,
) -> ApiResult<City> {
    auth.require_role(MANAGERS)?;
    let state_id = required(body.state_id, "state_id")?;
    let name = required_str(body.name, "name")?;
    let status = check_status(body.status.unwrap_or(1), 1)?;
    let city = repo::create_city(&state.db, state_id, &name, status).await?;
    info!(city_id = %city.id, name = %city.name, by = %auth.id, "city created");
    Ok(ApiResponse::created(city))
}

#[instrument(skip(state))]
pub async fn update_city(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<CityRequest>,
) -> ApiResult<City> {
    auth.require_role(MANAGERS)?;
    let name = trimmed(body.name);
    let status = body.status.map(|s| check_status(s, 1)).transpose()?;
    let city = repo::update_city(&state.db, id, body.state_id, name.as_deref(), status)
        .await
        .map_err(or_not_found("City"))?;
    info!(city_id = %id, by = %auth.id, "city updated");
    Ok(ApiResponse::ok(city))
}

#[instrument(skip(state))]
pub async fn delete_city(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    auth.require_role(MANAGERS)?;
    if !repo::delete_city(&state.db, id).await? {
        return Err(ApiError::not_found("City not found"));
    }
    info!(city_id = %id, by = %auth.id, "city deleted");
    Ok(ApiResponse::message("City deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_upper_cased() {
        assert_eq!(normalize_code(" in "), "IN");
        assert_eq!(trimmed(Some("  ".into())), None);
        assert_eq!(trimmed(Some(" Pune ".into())).as_deref(), Some("Pune"));
    }
}
