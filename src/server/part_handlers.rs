use super::{blocking, AppError, AppJson, AppQuery, AppState};
use crate::models::{NewPart, Part, PartListQuery, PartMetadata, PartOrderBy, PartType, SortDirection};
use axum::{extract::State, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartNumberQuery {
    pub part_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartIdQuery {
    pub part_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct KeywordsQuery {
    #[serde(default)]
    pub keywords: String,
}

/// Raw `/part/list` parameters; parsed leniently on case
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQueryParams {
    pub order_by: Option<String>,
    pub direction: Option<String>,
    pub results: Option<u32>,
    pub page: Option<u32>,
}

impl TryFrom<ListQueryParams> for PartListQuery {
    type Error = AppError;

    fn try_from(params: ListQueryParams) -> Result<Self, Self::Error> {
        let defaults = PartListQuery::default();
        let order_by = match params.order_by.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw.parse::<PartOrderBy>().map_err(AppError::BadRequest)?,
            None => defaults.order_by,
        };
        let direction = match params.direction.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw.parse::<SortDirection>().map_err(AppError::BadRequest)?,
            None => defaults.direction,
        };
        let page = params.page.unwrap_or(defaults.page);
        if page == 0 {
            return Err(AppError::BadRequest("page must be 1 or greater".to_string()));
        }

        Ok(PartListQuery {
            order_by,
            direction,
            results: params.results.unwrap_or(defaults.results),
            page,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NewPartType {
    pub name: String,
}

pub async fn create_part(
    State(state): State<Arc<AppState>>,
    AppJson(part): AppJson<NewPart>,
) -> Result<Json<Part>, AppError> {
    let parts = state.parts.clone();
    let created = blocking(move || parts.create(part)).await?;
    info!(part_id = created.part_id, part_number = %created.fields.part_number, "📦 Part added");
    Ok(Json(created))
}

pub async fn update_part(
    State(state): State<Arc<AppState>>,
    AppJson(part): AppJson<Part>,
) -> Result<Json<Part>, AppError> {
    let parts = state.parts.clone();
    let updated = blocking(move || parts.update(part)).await?;
    Ok(Json(updated))
}

pub async fn get_part(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<PartNumberQuery>,
) -> Result<Json<Part>, AppError> {
    let parts = state.parts.clone();
    let part_number = query.part_number.clone();
    blocking(move || parts.get_by_part_number(&part_number))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Part '{}' not found", query.part_number)))
}

pub async fn delete_part(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<PartIdQuery>,
) -> Result<Json<bool>, AppError> {
    let parts = state.parts.clone();
    let part_id = query.part_id;
    if blocking(move || parts.delete(part_id)).await? {
        info!(part_id, "🗑️  Part deleted");
        Ok(Json(true))
    } else {
        Err(AppError::NotFound(format!("Part {} not found", part_id)))
    }
}

pub async fn list_parts(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListQueryParams>,
) -> Result<Json<Vec<Part>>, AppError> {
    let query = PartListQuery::try_from(params)?;
    let parts = state.parts.clone();
    Ok(Json(blocking(move || parts.list(&query)).await?))
}

pub async fn search_parts(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<KeywordsQuery>,
) -> Result<Json<Vec<Part>>, AppError> {
    let parts = state.parts.clone();
    Ok(Json(blocking(move || parts.search(&query.keywords)).await?))
}

pub async fn low_stock_parts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Part>>, AppError> {
    let parts = state.parts.clone();
    Ok(Json(blocking(move || parts.low_stock()).await?))
}

/// Supplier lookup used to pre-fill the add-inventory form
pub async fn part_metadata(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<PartNumberQuery>,
) -> Result<Json<PartMetadata>, AppError> {
    let part_types = state.part_types.clone();
    let type_names: Vec<String> = blocking(move || part_types.list())
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();

    let metadata = state
        .metadata
        .lookup_part_metadata(&query.part_number, &type_names)
        .await?;
    Ok(Json(metadata))
}

pub async fn list_part_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PartType>>, AppError> {
    let part_types = state.part_types.clone();
    Ok(Json(blocking(move || part_types.list()).await?))
}

pub async fn create_part_type(
    State(state): State<Arc<AppState>>,
    AppJson(body): AppJson<NewPartType>,
) -> Result<Json<PartType>, AppError> {
    let part_types = state.part_types.clone();
    Ok(Json(blocking(move || part_types.create(&body.name)).await?))
}
