use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::debug;

use crate::orders::Order;
use crate::pets::{Pet, PetForm};
use crate::users::User;

use super::auth::ensure_authorized;
use super::error::{parse_id, ApiError};
use super::responses::{
    CreatedResponse, Credentials, HealthResponse, LogoutRequest, NameQuery, StatusQuery,
    UserPayload, UsernameQuery,
};
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .expect("default governor config is valid"),
    );

    Router::new()
        .route("/health", get(health))
        .route("/pets", get(pets_by_status).post(create_pet))
        .route(
            "/pets/{id}",
            get(get_pet)
                .put(replace_pet)
                .delete(delete_pet)
                .post(update_pet_form),
        )
        .route("/pets/{id}/uploadImage", post(upload_pet_image))
        .route("/pets/{id}/image", get(pet_image))
        .route("/store/inventory", get(inventory))
        .route("/store/order", post(place_order))
        .route("/store/order/{id}", get(get_order).delete(delete_order))
        .route(
            "/users",
            get(get_user)
                .put(put_users)
                .post(post_users)
                .delete(delete_user),
        )
        .route("/login", get(login))
        .route("/logout", get(logout))
        .layer(GovernorLayer::new(governor_conf))
        .layer(
            tower_http::request_id::SetRequestIdLayer::new(
                axum::http::header::HeaderName::from_static("x-request-id"),
                tower_http::request_id::MakeRequestUuid::default(),
            ),
        )
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        pets: state.pets.len(),
        orders: state.orders.len(),
        users: state.users.len(),
        sessions: state.users.active_sessions(),
    })
}

async fn get_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Pet>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    Ok(Json(state.pets.get(id)?))
}

async fn pets_by_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<Pet>>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Query(query) = query?;
    let pets = if query.status.is_empty() {
        state.pets.all()
    } else {
        state.pets.by_status(&query.status)
    };
    debug!(status = %query.status, results = pets.len(), "pets by status requested");
    Ok(Json(pets))
}

async fn create_pet(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Pet>, JsonRejection>,
) -> Result<Json<CreatedResponse>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Json(pet) = body?;
    let id = state.pets.create(pet)?;
    Ok(Json(CreatedResponse { id }))
}

async fn replace_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Pet>, JsonRejection>,
) -> Result<Json<Pet>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    let Json(pet) = body?;
    Ok(Json(state.pets.update_full(id, pet)?))
}

async fn update_pet_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    form: Result<Form<PetForm>, FormRejection>,
) -> Result<Json<Pet>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    let Form(form) = form?;
    Ok(Json(state.pets.update_by_form(id, form)?))
}

async fn upload_pet_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    image: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    state.pets.attach_image(id, image?)?;
    Ok(StatusCode::OK)
}

async fn pet_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    let image = state.pets.image(id)?.ok_or(ApiError::NotFound)?;
    Ok(([(CONTENT_TYPE, "application/octet-stream")], image).into_response())
}

async fn delete_pet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    state.pets.delete(id)?;
    Ok(StatusCode::OK)
}

async fn inventory(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<BTreeMap<String, usize>>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Query(query) = query?;
    let counts = state.orders.inventory(&query.status);
    debug!(status = %query.status, statuses = counts.len(), "inventory requested");
    Ok(Json(counts))
}

async fn place_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Order>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    ensure_authorized(&state, &headers)?;
    let Json(order) = body?;
    let id = state.orders.place_order(order)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Order>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    Ok(Json(state.orders.get_order(id)?))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    let id = parse_id(&id)?;
    state.orders.delete_order(id)?;
    Ok(StatusCode::OK)
}

async fn get_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<NameQuery>, QueryRejection>,
) -> Result<Json<User>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Query(query) = query?;
    Ok(Json(state.users.get(&query.name)?))
}

async fn post_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UserPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    match body? {
        Json(UserPayload::One(user)) => state.users.create(user)?,
        Json(UserPayload::Many(users)) => {
            state.users.create_many(users)?;
        }
    }
    Ok(StatusCode::CREATED)
}

/// A single user is a full replace; an array is the same batch create as POST.
async fn put_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<UserPayload>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    match body? {
        Json(UserPayload::One(user)) => {
            state.users.put(user)?;
            Ok(StatusCode::OK)
        }
        Json(UserPayload::Many(users)) => {
            state.users.create_many(users)?;
            Ok(StatusCode::CREATED)
        }
    }
}

async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<UsernameQuery>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Query(query) = query?;
    state.users.delete(&query.username)?;
    Ok(StatusCode::OK)
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Json(credentials) = body?;
    let user = state
        .users
        .login(&credentials.username, &credentials.password)?;
    debug!(username = %user.username, "login succeeded");
    Ok(Json(user))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LogoutRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    ensure_authorized(&state, &headers)?;
    let Json(request) = body?;
    state.users.logout(&request.username)?;
    Ok(StatusCode::OK)
}
