//! style.rs
//!
//! Reglas de pintado de la capa LTS.
//!
//! - Paleta discreta por categoría LTS (5 colores de 'turbo' + extremos negro/blanco
//!   para "sin datos"), la leyenda y la etiqueta emoji del tooltip.
//! - Capa visible y capa buffer (invisible, más ancha) sobre la misma fuente.
//! - Filtro de nivel de detalle `zoom <= zoom_actual + offset`.
//! - Export de las capas como JSON de estilo Mapbox/MapLibre para el front.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::types::{MapCfg, RoadFeature};

pub const LTS_SOURCE: &str = "LTS_source";
pub const LTS_LAYER: &str = "lts-layer";
pub const BUFFER_LAYER: &str = "lts-buffer";

pub const NO_DATA: &str = "no data";
pub const HIGHLIGHT_COLOR: &str = "#FF00FF";

// índice = valor LTS; el último es el centinela para cualquier otro valor
const LTS_COLORS: [&str; 6] = ["black", "#28BCEB", "#A4FC3C", "#FB7E21", "#7A0403", "white"];
const LTS_NAMES: [&str; 6] = [
    NO_DATA, // negro
    "Level of Traffic Stress 1",
    "Level of Traffic Stress 2",
    "Level of Traffic Stress 3",
    "Level of Traffic Stress 4",
    NO_DATA, // blanco
];

const TOOLTIP_LABELS: [(i64, &str, &str); 4] = [
    (1, "😀", "LTS 1: low stress"),
    (2, "🙂", "LTS 2: moderate stress"),
    (3, "😬", "LTS 3: high stress"),
    (4, "😱", "LTS 4: very high stress"),
];
const TOOLTIP_DEFAULT: (&str, &str) = ("❔", "No data");

#[inline]
fn lts_slot(lts: Option<i64>) -> usize {
    match lts {
        Some(v @ 0..=4) => v as usize,
        _ => LTS_COLORS.len() - 1,
    }
}

/// Color de línea para un valor LTS (equivale al `match` del estilo)
pub fn line_color(lts: Option<i64>) -> &'static str {
    LTS_COLORS[lts_slot(lts)]
}

pub fn lts_name(lts: Option<i64>) -> &'static str {
    LTS_NAMES[lts_slot(lts)]
}

/// Par (emoji, etiqueta) del tooltip; valores desconocidos caen al de por defecto
pub fn tooltip_label(lts: Option<i64>) -> (&'static str, &'static str) {
    lts.and_then(|v| TOOLTIP_LABELS.iter().find(|(k, _, _)| *k == v))
        .map(|&(_, e, l)| (e, l))
        .unwrap_or(TOOLTIP_DEFAULT)
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LegendEntry {
    pub color: &'static str,
    pub label: &'static str,
}

/// Leyenda: una entrada por categoría, sin los extremos negro/blanco
pub fn legend() -> Vec<LegendEntry> {
    LTS_NAMES
        .iter()
        .zip(LTS_COLORS.iter())
        .filter(|(name, _)| **name != NO_DATA)
        .map(|(&label, &color)| LegendEntry { color, label })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LinePaint {
    pub color: &'static str,
    pub width: f64,
    pub opacity: f64,
}

/// Regla de pintado de la capa visible según el flag `highlight` del feature-state
pub fn paint(lts: Option<i64>, highlighted: bool, cfg: &MapCfg) -> LinePaint {
    if highlighted {
        LinePaint { color: HIGHLIGHT_COLOR, width: cfg.highlight_width, opacity: cfg.highlight_opacity }
    } else {
        LinePaint { color: line_color(lts), width: cfg.base_width, opacity: 1.0 }
    }
}

// -------------------------------
// Filtro de nivel de detalle
// -------------------------------
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodFilter {
    pub max_zoom: f64,
}

impl LodFilter {
    pub fn at(map_zoom: f64, offset: f64) -> Self {
        Self { max_zoom: map_zoom + offset }
    }

    pub fn admits(&self, f: &RoadFeature) -> bool {
        f.zoom <= self.max_zoom
    }

    pub fn to_expr(&self) -> Value {
        json!(["<=", ["get", "zoom"], self.max_zoom])
    }
}

// -------------------------------
// Capas
// -------------------------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Visible,
    Buffer,
}

#[derive(Clone, Debug)]
pub struct LineLayer {
    pub id: &'static str,
    pub source: &'static str,
    pub kind: LayerKind,
    /// Ancho efectivo para el hit-test (px)
    pub width_px: f64,
    pub filter: Option<LodFilter>,
}

pub fn visible_layer(cfg: &MapCfg) -> LineLayer {
    LineLayer { id: LTS_LAYER, source: LTS_SOURCE, kind: LayerKind::Visible, width_px: cfg.base_width, filter: None }
}

pub fn buffer_layer(cfg: &MapCfg) -> LineLayer {
    LineLayer {
        id: BUFFER_LAYER,
        source: LTS_SOURCE,
        kind: LayerKind::Buffer,
        width_px: cfg.base_width + cfg.buffer_px,
        filter: None,
    }
}

fn highlighted_expr() -> Value {
    json!(["boolean", ["feature-state", "highlight"], false])
}

/// `LTS` puede llegar como texto; lo no numérico cae en -1 (sin datos)
fn color_match_expr() -> Value {
    let mut e = vec![json!("match"), json!(["to-number", ["get", "LTS"], -1])];
    for (v, c) in LTS_COLORS.iter().take(5).enumerate() {
        e.push(json!(v));
        e.push(json!(c));
    }
    e.push(json!(LTS_COLORS[5]));
    Value::Array(e)
}

impl LineLayer {
    pub fn paint_json(&self, cfg: &MapCfg) -> Value {
        match self.kind {
            LayerKind::Visible => {
                let hl = paint(None, true, cfg);
                let normal = paint(None, false, cfg);
                json!({
                    "line-color": ["case", highlighted_expr(), hl.color, color_match_expr()],
                    "line-width": ["case", highlighted_expr(), hl.width, normal.width],
                    "line-opacity": ["case", highlighted_expr(), hl.opacity, normal.opacity],
                })
            }
            LayerKind::Buffer => json!({
                "line-color": "#000000",
                "line-width": self.width_px,
                "line-opacity": 0.0,
            }),
        }
    }

    pub fn to_style_json(&self, cfg: &MapCfg) -> Value {
        let mut v = json!({
            "id": self.id,
            "type": "line",
            "source": self.source,
            "slot": "middle",
            "layout": { "line-cap": "round", "line-join": "round" },
            "paint": self.paint_json(cfg),
        });
        if let Some(f) = &self.filter {
            v["filter"] = f.to_expr();
        }
        v
    }
}

/// Fuente GeoJSON; `/map/lts` ya sirve el `id` normalizado en cada Feature
pub fn source_json(data_url: &str) -> Value {
    json!({ "type": "geojson", "data": data_url })
}
