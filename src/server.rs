use crate::pipeline::{MapController, RenderContext};
use crate::processing;
use crate::types::DatasetSelection;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Deserialize)]
pub struct SelectParams {
    value: String,
}

#[derive(Deserialize)]
pub struct QueryParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct QueryResponse {
    name: String,
    value: Option<f64>,
    tooltip: String,
}

pub fn router(controller: Arc<MapController>) -> Router {
    Router::new()
        .route("/", get(page_handler))
        .route("/map.svg", get(svg_handler))
        .route("/api/select", get(select_handler))
        .route("/api/query", get(query_handler))
        .layer(CorsLayer::permissive())
        .with_state(controller)
}

pub async fn start_server(ctx: RenderContext) -> Result<()> {
    let port = ctx.config.server.port;
    let controller = Arc::new(MapController::new(Arc::new(ctx)));

    // Initial load; a failure here leaves the page blank until the slider moves.
    let _ = controller.select(DatasetSelection::First).wait().await;

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(controller)).await?;
    Ok(())
}

fn svg_response(svg: Option<String>) -> Response {
    match svg {
        Some(svg) => ([(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "map not rendered yet").into_response(),
    }
}

async fn page_handler(State(controller): State<Arc<MapController>>) -> Html<String> {
    let ctx = controller.context();
    let selection = ctx.current_selection().await;
    let svg = ctx.current_svg().await.unwrap_or_default();
    Html(ctx.renderer.render_page(selection, &svg))
}

async fn svg_handler(State(controller): State<Arc<MapController>>) -> Response {
    svg_response(controller.context().current_svg().await)
}

async fn select_handler(
    State(controller): State<Arc<MapController>>,
    Query(params): Query<SelectParams>,
) -> Response {
    let Some(selection) = DatasetSelection::from_slider(&params.value) else {
        return (StatusCode::BAD_REQUEST, "slider value must be 0 or 1").into_response();
    };

    // Errors are already logged; whatever is on the surface is returned.
    let _ = controller.select(selection).wait().await;
    svg_response(controller.context().current_svg().await)
}

async fn query_handler(
    State(controller): State<Arc<MapController>>,
    Query(params): Query<QueryParams>,
) -> Json<Option<QueryResponse>> {
    let surface = controller.context().surface.read().await;

    let found = surface.as_ref().and_then(|s| {
        processing::locate(&s.features, &s.tree, params.lon, params.lat).map(|feature| QueryResponse {
            name: feature.name.clone(),
            value: feature.value,
            tooltip: feature.tooltip(),
        })
    });

    Json(found)
}
