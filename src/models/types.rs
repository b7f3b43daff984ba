//! types.rs
//! Modelos de datos compartidos por el servicio: tramos LTS, vistas tipadas
//! para las plantillas, configuración y estado compartido de la API

use geo::{HaversineLength, LineString};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};

use crate::server::session::SessionRegistry;
use crate::source::FeatureSource;
use crate::style;
use crate::template::TemplateSet;

/// Identificador estable por geometría (el `id` que usa el feature-state)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

/// Tramo de vía tal como sale del GeoJSON, ya validado.
#[derive(Clone, Debug)]
pub struct RoadFeature {
    /// Posición dentro de la fuente (estable mientras viva la fuente)
    pub idx: usize,
    pub id: Option<FeatureId>,
    /// Categoría LTS cruda; `None` o fuera de 0..=4 es "sin datos"
    pub lts: Option<i64>,
    pub name: Option<String>,
    /// Zoom mínimo al que se pinta
    pub zoom: f64,
    pub lines: Vec<LineString<f64>>,
}

impl RoadFeature {
    pub fn length_m(&self) -> f64 {
        self.lines.iter().map(|l| l.haversine_length()).sum()
    }
}

/// Campos que consume la plantilla de detalle. Nada más entra en el HTML.
#[derive(Clone, Debug, Serialize)]
pub struct DetailView {
    pub id: Option<u64>,
    pub name: String,
    pub lts: Option<i64>,
    pub lts_label: &'static str,
    pub zoom: f64,
    pub length_m: f64,
}

impl From<&RoadFeature> for DetailView {
    fn from(f: &RoadFeature) -> Self {
        Self {
            id: f.id.map(|i| i.0),
            name: f.name.clone().unwrap_or_default(),
            lts: f.lts,
            lts_label: style::lts_name(f.lts),
            zoom: f.zoom,
            length_m: (f.length_m() * 10.0).round() / 10.0,
        }
    }
}

/// Campos del tooltip de hover
#[derive(Clone, Debug, Serialize)]
pub struct HoverView {
    pub emoji: &'static str,
    pub label: &'static str,
    pub name: String,
    pub lts: Option<i64>,
}

impl From<&RoadFeature> for HoverView {
    fn from(f: &RoadFeature) -> Self {
        let (emoji, label) = style::tooltip_label(f.lts);
        Self { emoji, label, name: f.name.clone().unwrap_or_default(), lts: f.lts }
    }
}

/// Parámetros de pintado y de la vista inicial del mapa
#[derive(Clone, Debug, Serialize)]
pub struct MapCfg {
    /// Centro inicial [lng, lat] (Northampton)
    pub center: [f64; 2],
    pub base_zoom: f64,
    /// Ancho de línea normal (px)
    pub base_width: f64,
    /// Margen extra de la capa buffer, repartido a ambos lados de la línea (px)
    pub buffer_px: f64,
    pub highlight_width: f64,
    pub highlight_opacity: f64,
    /// Un tramo se pinta si `zoom <= zoom_actual + lod_offset`
    pub lod_offset: f64,
}

impl Default for MapCfg {
    fn default() -> Self {
        Self {
            center: [-72.667638, 42.3164662],
            base_zoom: 12.0,
            base_width: 4.0,
            buffer_px: 10.0,
            highlight_width: 8.0,
            highlight_opacity: 0.8,
            lod_offset: 1.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppCfg {
    /// Dirección/puerto del servidor HTTP (Axum)
    pub bind: String,

    /// GeoJSON de tramos LTS: ruta local o URL http(s)
    pub data_src: String,

    /// Plantillas HTML con `{{token}}` (ruta o URL)
    pub tpl_detail: String,
    pub tpl_hover: String,

    /// Directorio estático servido como fallback
    pub web_dir: String,

    /// Periodicidad de recarga del GeoJSON (segundos). 0 = cargar una sola vez
    pub t_data_s: u64,

    /// Sesiones de interacción vivas como máximo; se expulsa la más antigua
    pub max_sessions: usize,

    pub map: MapCfg,
}

impl Default for AppCfg {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".into(),
            data_src: "plots/LTS.json".into(),
            tpl_detail: "tpl/detail-popup.html".into(),
            tpl_hover: "tpl/hover-popup.html".into(),
            web_dir: "web".into(),
            t_data_s: 0,
            max_sessions: 256,
            map: MapCfg::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Kpis {
    pub snapshot_ts_utc: String,
    pub features: usize,
    pub features_sin_id: usize,
    pub templates_ready: bool,
    pub sessions: usize,
}

/// Estado compartido entre los loops de carga y la API
#[derive(Default)]
pub struct DataState {
    /// Fuente indexada; `None` hasta la primera carga correcta
    pub source: Option<Arc<FeatureSource>>,

    /// GeoJSON tal cual se descargó, para `/map/lts`
    pub lts_geojson: String,

    pub templates: TemplateSet,

    pub sessions: SessionRegistry,

    pub snapshot_ts_utc: String,
}

impl DataState {
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: SessionRegistry::new(max_sessions), ..Default::default() }
    }

    pub fn kpis(&self) -> Kpis {
        Kpis {
            snapshot_ts_utc: self.snapshot_ts_utc.clone(),
            features: self.source.as_ref().map(|s| s.len()).unwrap_or(0),
            features_sin_id: self.source.as_ref().map(|s| s.without_id()).unwrap_or(0),
            templates_ready: self.templates.ready(),
            sessions: self.sessions.len(),
        }
    }
}
