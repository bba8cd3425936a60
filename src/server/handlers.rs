use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::compositor::Compositor;
use crate::gallery::{LocalGallery, MemePage, StoredMeme};
use crate::settings;
use crate::templates::{Template, TemplateCatalog};

use super::models::{ErrorResponse, GalleryQuery, ReactRequest, RenderRequest, RenderResponse};
use super::render::{ServerError, render_request, with_gallery};
use super::state::ServerState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let compositor = Compositor::from_settings(&settings.font)?;
    let catalog = TemplateCatalog::builtin().with_extra(settings.templates.clone());
    let gallery = Arc::new(LocalGallery::from_settings(&settings.gallery));
    let state = Arc::new(ServerState {
        settings,
        catalog,
        compositor,
        gallery,
    });
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/templates", get(templates))
        .route("/render", post(render))
        .route("/gallery", get(gallery))
        .route("/gallery/:id/react", post(react))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

fn error_response(err: ServerError) -> (StatusCode, Json<ErrorResponse>) {
    (err.status, Json(ErrorResponse { error: err.message }))
}

async fn templates(State(state): State<Arc<ServerState>>) -> Json<Vec<Template>> {
    Json(state.catalog.list().to_vec())
}

async fn render(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RenderRequest>,
) -> ApiResult<RenderResponse> {
    render_request(state.as_ref(), payload)
        .await
        .map(Json)
        .map_err(error_response)
}

async fn gallery(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<GalleryQuery>,
) -> ApiResult<MemePage> {
    let page = query.page;
    with_gallery(&state.gallery, move |gallery| gallery.page(page))
        .await
        .map(Json)
        .map_err(error_response)
}

async fn react(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Json(payload): Json<ReactRequest>,
) -> ApiResult<StoredMeme> {
    let key = id.clone();
    let delta = payload.delta;
    match with_gallery(&state.gallery, move |gallery| gallery.react(&key, delta)).await {
        Ok(Some(meme)) => Ok(Json(meme)),
        Ok(None) => Err(error_response(ServerError::not_found(format!(
            "unknown meme: {}",
            id
        )))),
        Err(err) => Err(error_response(err)),
    }
}
