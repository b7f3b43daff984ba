//! api.rs — Rutas HTTP: /health, /kpis, /map/lts, /map/style, /map/legend y sesiones de interacción

use axum::{
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, services::ServeDir};
use tracing::info;

use crate::models::events::{MapEvent, UiEffect};
use crate::models::types::{AppCfg, DataState};
use crate::server::session::Session;
use crate::style::{self, LodFilter};

#[derive(Clone)]
pub struct ApiState {
    pub data: Arc<RwLock<DataState>>,
    pub cfg: Arc<AppCfg>,
}

pub fn router(state: ApiState) -> Router {
    let web_dir = state.cfg.web_dir.clone();
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/kpis", get(get_kpis))
        .route("/map/lts", get(get_lts_geojson))
        .route("/map/style", get(get_style))
        .route("/map/legend", get(get_legend))
        .route("/session", post(create_session))
        .route("/session/:id", delete(drop_session))
        .route("/session/:id/events", post(post_event))
        .fallback_service(ServeDir::new(web_dir))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
}

async fn get_kpis(State(st): State<ApiState>) -> impl IntoResponse {
    let d = st.data.read().await;
    Json(d.kpis())
}

/// Devuelve el GeoJSON actual con content-type correcto; 204 hasta la primera carga.
async fn get_lts_geojson(State(st): State<ApiState>) -> Response {
    let d = st.data.read().await;
    if d.lts_geojson.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }
    ([(CONTENT_TYPE, "application/geo+json; charset=utf-8")], d.lts_geojson.clone()).into_response()
}

#[derive(Debug, Deserialize)]
pub struct StyleQuery {
    /// Zoom para el filtro LOD; por defecto el zoom inicial
    pub zoom: Option<f64>,
}

async fn get_style(State(st): State<ApiState>, Query(q): Query<StyleQuery>) -> Json<Value> {
    let m = &st.cfg.map;
    let filter = LodFilter::at(q.zoom.unwrap_or(m.base_zoom), m.lod_offset);
    let layers: Vec<Value> = [style::visible_layer(m), style::buffer_layer(m)]
        .into_iter()
        .map(|mut l| {
            l.filter = Some(filter);
            l.to_style_json(m)
        })
        .collect();
    Json(json!({
        "sources": { (style::LTS_SOURCE): style::source_json("/map/lts") },
        "layers": layers,
        "center": m.center,
        "zoom": m.base_zoom,
    }))
}

async fn get_legend() -> impl IntoResponse {
    Json(style::legend())
}

#[derive(Serialize)]
struct SessionOut {
    session: u64,
    center: [f64; 2],
    zoom: f64,
    effects: Vec<UiEffect>,
}

async fn create_session(State(st): State<ApiState>) -> Result<Json<SessionOut>, (StatusCode, &'static str)> {
    let mut guard = st.data.write().await;
    let d: &mut DataState = &mut guard;
    let Some(source) = d.source.clone() else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "datos LTS aún no cargados"));
    };

    let mut s = Session::new(source, &st.cfg.map);
    let effects = s.dispatch(&d.templates, &st.cfg.map, MapEvent::Load);
    let id = d.sessions.insert(s);
    info!("sesión {id} abierta ({} vivas)", d.sessions.len());

    Ok(Json(SessionOut { session: id, center: st.cfg.map.center, zoom: st.cfg.map.base_zoom, effects }))
}

async fn post_event(
    State(st): State<ApiState>,
    Path(id): Path<u64>,
    Json(ev): Json<MapEvent>,
) -> Result<Json<Vec<UiEffect>>, StatusCode> {
    let mut guard = st.data.write().await;
    let DataState { sessions, templates, .. } = &mut *guard;
    let s = sessions.get_mut(id).ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(s.dispatch(templates, &st.cfg.map, ev)))
}

async fn drop_session(State(st): State<ApiState>, Path(id): Path<u64>) -> StatusCode {
    if st.data.write().await.sessions.remove(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
