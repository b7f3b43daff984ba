//! events.rs
//! Eventos que el front manda al controlador y efectos que devuelve.

use serde::{Deserialize, Serialize};

use crate::style::LegendEntry;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapEvent {
    Load,
    Click { lng: f64, lat: f64 },
    PointerMove { lng: f64, lat: f64 },
    /// El puntero sale del canvas
    PointerOut,
    Zoom { zoom: f64 },
    ClosePanel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    Pointer,
    Default,
}

/// Lo que el front tiene que aplicar tras un evento, en orden.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEffect {
    Legend { entries: Vec<LegendEntry> },
    SetFilter { layer: String, filter: serde_json::Value },
    /// Réplica del feature-state para que el front pinte el resaltado
    FeatureState { source: String, id: u64, highlight: bool },
    ZoomReadout { text: String },
    ShowPanel { html: String },
    HidePanel,
    ShowTooltip { html: String, lng: f64, lat: f64 },
    MoveTooltip { lng: f64, lat: f64 },
    HideTooltip,
    Cursor { cursor: Cursor },
}
