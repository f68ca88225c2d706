// handlers/crud.rs - Generic CRUD handlers, instantiated per resource in routes.rs

use axum::extract::State;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::database::models::Resource;
use crate::database::repository::not_found;
use crate::error::AppError;
use crate::filter::query_params;
use crate::middleware::{ApiResponse, ApiResult, AppJson, AppPath, AppQuery};
use crate::state::AppState;

/// Parse a path id; malformed ids are cast failures
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::cast("id", raw))
}

/// POST - validate, persist, 201 with the created record
pub async fn create_one<T: Resource>(
    State(state): State<AppState>,
    AppJson(input): AppJson<T::Create>,
) -> ApiResult {
    let record = T::build(input, &state.config.security).await?;
    let record = state.repository::<T>().insert(&record).await?;

    tracing::info!(resource = T::NAME, id = %record.id(), "Created");
    Ok(ApiResponse::created().with_data(T::NAME, record.to_public(None)?))
}

/// GET /:id - supports `fields` for projection and opt-in fields
pub async fn get_one<T: Resource>(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let select = query_params::select_from_query(&params)?;
    let record = state.repository::<T>().select_404(id).await?;

    Ok(ApiResponse::success().with_data(T::NAME, record.to_public(select.as_deref())?))
}

/**
 * GET / - list records
 *
 * Query parameters:
 * - `field=value`, `field[gt|gte|lt|lte|ne]=value`, `field[in]=a,b`
 * - `sort=-field,other`
 * - `fields=a,b` or `fields=+hidden`
 * - `page`, `limit`
 *
 * Output: `{status, results, data: {<plural>: [...]}}`
 */
pub async fn get_many<T: Resource>(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<HashMap<String, String>>,
) -> ApiResult {
    let filter = query_params::from_query(&params, &state.config.filter, &T::protected_fields())?;
    let select = filter.select.clone();

    let records = state.repository::<T>().select_any(filter).await?;
    let docs = records
        .iter()
        .map(|record| record.to_public(select.as_deref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ApiResponse::success()
        .with_results(docs.len())
        .with_data(T::PLURAL, Value::Array(docs)))
}

/// PATCH /:id - partial update, validation re-runs on the patched fields
pub async fn update_one<T: Resource>(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
    AppJson(patch): AppJson<T::Patch>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let repo = state.repository::<T>();

    let mut record = repo.select_404(id).await?;
    record.apply(patch, &state.config.security).await?;
    let record = repo.save(&record).await?.ok_or_else(not_found::<T>)?;

    Ok(ApiResponse::success().with_data(T::NAME, record.to_public(None)?))
}

/// DELETE /:id - 204 with no body
pub async fn delete_one<T: Resource>(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> ApiResult {
    let id = parse_id(&id)?;
    let repo = state.repository::<T>();

    // Existence check goes through the default filter
    repo.select_404(id).await?;
    if !repo.delete(id).await? {
        return Err(not_found::<T>());
    }

    tracing::info!(resource = T::NAME, %id, "Deleted");
    Ok(ApiResponse::no_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn malformed_id_is_cast_error() {
        let err = parse_id("not-a-uuid").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Cast { .. }));
        assert_eq!(err.message(), "Invalid id: not-a-uuid");
    }

    #[test]
    fn fields_parameter_is_split_and_checked() {
        let params: HashMap<String, String> = [("fields".to_string(), "email, +flag".to_string())].into();
        assert_eq!(
            query_params::select_from_query(&params).unwrap(),
            Some(vec!["email".to_string(), "+flag".to_string()])
        );

        let params: HashMap<String, String> = [("fields".to_string(), "email;drop".to_string())].into();
        let err = AppError::from(query_params::select_from_query(&params).unwrap_err());
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
