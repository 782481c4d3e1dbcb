use axum::{extract::State, response::IntoResponse, routing::get, Json};
use http::StatusCode;
use mcat_dal::{
    movie::{CreateMovie, MoviePatch, MovieRepository, VALID_ORDER_FIELDS},
    FilterParams,
};
use tracing::debug;

use crate::{
    error::ApiResult,
    repository_from_request,
    rest_api::{ApiJson, ApiPath, ApiQuery},
    state::AppState,
};

repository_from_request!(MovieRepository);

pub async fn list(
    repository: MovieRepository,
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<FilterParams>,
) -> ApiResult<impl IntoResponse> {
    let search = params.normalize(VALID_ORDER_FIELDS, state.config().default_page_size)?;
    let list = repository.list(&search).await?;
    Ok((StatusCode::OK, Json(list)))
}

pub async fn count(repository: MovieRepository) -> ApiResult<impl IntoResponse> {
    let count = repository.count().await?;
    Ok((StatusCode::OK, Json(count)))
}

pub async fn get_movie(
    ApiPath(id): ApiPath<i64>,
    repository: MovieRepository,
) -> ApiResult<impl IntoResponse> {
    let record = repository.get(id).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn create(
    repository: MovieRepository,
    ApiJson(payload): ApiJson<CreateMovie>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.create(payload).await?;
    debug!("Created movie {}", record.id);
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn patch(
    ApiPath(id): ApiPath<i64>,
    repository: MovieRepository,
    ApiJson(payload): ApiJson<MoviePatch>,
) -> ApiResult<impl IntoResponse> {
    let record = repository.patch(id, payload).await?;
    Ok((StatusCode::OK, Json(record)))
}

pub async fn delete(
    ApiPath(id): ApiPath<i64>,
    repository: MovieRepository,
) -> ApiResult<impl IntoResponse> {
    repository.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(list).post(create))
        .route("/count", get(count))
        .route("/{id}", get(get_movie).patch(patch).delete(delete))
}
