//! main.rs — Servicio de mapa LTS: carga GeoJSON + plantillas, API de estilo y sesiones de interacción

mod controller;
mod data;
mod mapview;
mod models;
mod server;
mod source;
mod style;
mod template;

use anyhow::Result;
use reqwest::Client;
use std::{env, sync::Arc, time::Duration};
use tokio::{signal, sync::RwLock, time::sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use models::types::{AppCfg, DataState};
use source::FeatureSource;

/// Espera entre reintentos mientras la primera carga no haya salido bien
const RETRY_S: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = app_cfg_from_env();
    info!("Datos: {} | plantillas: {}, {}", cfg.data_src, cfg.tpl_detail, cfg.tpl_hover);

    // Estado compartido para la API
    let data = Arc::new(RwLock::new(DataState::new(cfg.max_sessions)));

    // HTTP client con compresion
    let client = Client::builder().brotli(true).gzip(true).deflate(true).build()?;

    // Plantillas: dos descargas independientes; hasta que lleguen se usa el fallback
    {
        let data_c = data.clone(); let client_c = client.clone(); let cfg_c = cfg.clone();
        tokio::spawn(async move { load_templates(client_c, data_c, cfg_c).await; });
    }
    {
        let data_c = data.clone(); let client_c = client.clone(); let cfg_c = cfg.clone();
        tokio::spawn(async move { fetch_loop_lts(client_c, data_c, cfg_c).await; });
    }

    // API
    let app = server::api::router(server::api::ApiState { data: data.clone(), cfg: Arc::new(cfg.clone()) });
    info!("Escuchando en http://{}", cfg.bind);
    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    let serve = axum::serve(listener, app);
    tokio::select! {
        r = serve => { r?; },
        _ = signal::ctrl_c() => { info!("Señal de salida recibida"); }
    }

    Ok(())
}

fn app_cfg_from_env() -> AppCfg {
    let mut c = AppCfg::default();
    if let Ok(v) = env::var("BIND") { c.bind = v; }
    if let Ok(v) = env::var("LTS_DATA") { c.data_src = v; }
    if let Ok(v) = env::var("TPL_DETAIL") { c.tpl_detail = v; }
    if let Ok(v) = env::var("TPL_HOVER") { c.tpl_hover = v; }
    if let Ok(v) = env::var("WEB_DIR") { c.web_dir = v; }
    if let Ok(v) = env::var("T_DATA_S") { c.t_data_s = v.parse().unwrap_or(c.t_data_s); }
    if let Ok(v) = env::var("MAX_SESSIONS") { c.max_sessions = v.parse().unwrap_or(c.max_sessions); }
    if let Ok(v) = env::var("BASE_ZOOM") { c.map.base_zoom = v.parse().unwrap_or(c.map.base_zoom); }
    if let Ok(v) = env::var("BASE_WIDTH") { c.map.base_width = v.parse().unwrap_or(c.map.base_width); }
    if let Ok(v) = env::var("BUFFER_PX") { c.map.buffer_px = v.parse().unwrap_or(c.map.buffer_px); }
    c
}

async fn load_templates(client: Client, data: Arc<RwLock<DataState>>, cfg: AppCfg) {
    let (detail, hover) = tokio::join!(
        server::fetch::fetch_text(&client, &cfg.tpl_detail),
        server::fetch::fetch_text(&client, &cfg.tpl_hover),
    );
    let mut d = data.write().await;
    match detail {
        Ok(t) => d.templates.detail.set_text(t),
        Err(e) => warn!("plantilla detalle ({}): {e:?}; se queda el fallback", cfg.tpl_detail),
    }
    match hover {
        Ok(t) => d.templates.hover.set_text(t),
        Err(e) => warn!("plantilla hover ({}): {e:?}; se queda el fallback", cfg.tpl_hover),
    }
    info!("plantillas listas: {}", d.templates.ready());
}

// --------------------------------------
// Loop LTS: descarga -> parse -> índice -> estado
// --------------------------------------
async fn fetch_loop_lts(client: Client, data: Arc<RwLock<DataState>>, cfg: AppCfg) {
    let mut cache = server::fetch::CacheCtl::default();
    loop {
        if let Err(e) = async {
            if let Some(bytes) = server::fetch::load_source(&client, &cfg.data_src, &mut cache).await? {
                let txt = String::from_utf8_lossy(&bytes).into_owned();
                let mut rep = crate::data::lts::parse_lts_geojson(&txt)?;
                let n = rep.features.len();
                let served = std::mem::take(&mut rep.geojson);
                let src = Arc::new(FeatureSource::new(style::LTS_SOURCE, rep.features));
                {
                    let mut d = data.write().await;
                    d.source = Some(src);
                    d.lts_geojson = served;
                    d.snapshot_ts_utc = chrono::Utc::now().to_rfc3339();
                }
                info!("LTS cargado: {n} tramos ({} descartados, {} sin id)", rep.dropped, rep.without_id);
            }
            Ok::<_, anyhow::Error>(())
        }
        .await
        {
            warn!("lts: {e:?}");
        }

        let loaded = data.read().await.source.is_some();
        let wait = match (cfg.t_data_s, loaded) {
            (0, true) => break,
            (0, false) => RETRY_S,
            (t, _) => t,
        };
        sleep(Duration::from_secs(wait)).await;
    }
}
