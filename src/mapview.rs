//! mapview.rs
//! Contrato del motor de mapa (fuentes, capas, filtros, feature-state, consultas)
//! y su implementación en memoria por sesión.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::types::{FeatureId, LngLat, MapCfg, RoadFeature};
use crate::source::FeatureSource;
use crate::style::{LineLayer, LodFilter};

/// Circunferencia ecuatorial en Web Mercator (m)
const EARTH_CIRC_M: f64 = 40_075_016.686;
/// Tamaño de tesela de los motores vectoriales (Mapbox/MapLibre)
const TILE_PX: f64 = 512.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureState {
    pub highlight: bool,
}

/// Lo que el controlador necesita del motor de mapa
pub trait MapSurface {
    fn zoom(&self) -> f64;
    fn set_zoom(&mut self, zoom: f64);

    fn add_source(&mut self, source: Arc<FeatureSource>);
    /// Se apila encima de las anteriores; si el id existe, la reemplaza
    fn add_layer(&mut self, layer: LineLayer);
    fn set_filter(&mut self, layer: &str, filter: LodFilter);
    fn filter(&self, layer: &str) -> Option<LodFilter>;

    fn set_feature_state(&mut self, source: &str, id: FeatureId, state: FeatureState);
    fn feature_state(&self, source: &str, id: FeatureId) -> FeatureState;

    /// Tramos pintados por `layer` bajo el punto, más cercano primero
    fn query_rendered_features(&self, layer: &str, at: LngLat) -> Vec<RoadFeature>;
    /// Todos los tramos cargados en `source` con ese nombre exacto
    fn query_source_features(&self, source: &str, name: &str) -> Vec<RoadFeature>;
}

#[inline]
pub fn meters_per_px(zoom: f64, lat: f64) -> f64 {
    EARTH_CIRC_M * lat.to_radians().cos() / (TILE_PX * 2f64.powf(zoom))
}

pub struct RenderedMap {
    zoom: f64,
    sources: HashMap<String, Arc<FeatureSource>>,
    layers: Vec<LineLayer>,
    states: HashMap<(String, FeatureId), FeatureState>,
}

impl RenderedMap {
    pub fn new(cfg: &MapCfg) -> Self {
        Self { zoom: cfg.base_zoom, sources: HashMap::new(), layers: Vec::new(), states: HashMap::new() }
    }

    pub fn layer(&self, id: &str) -> Option<&LineLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    #[cfg(test)]
    pub fn layer_ids(&self) -> Vec<&'static str> {
        self.layers.iter().map(|l| l.id).collect()
    }

    /// Evalúa la regla de pintado de la capa visible para un tramo
    #[cfg(test)]
    pub fn paint_for(&self, source: &str, f: &RoadFeature, cfg: &MapCfg) -> crate::style::LinePaint {
        let hl = f.id.map(|id| self.feature_state(source, id).highlight).unwrap_or(false);
        crate::style::paint(f.lts, hl, cfg)
    }
}

impl MapSurface for RenderedMap {
    fn zoom(&self) -> f64 { self.zoom }

    fn set_zoom(&mut self, zoom: f64) { self.zoom = zoom; }

    fn add_source(&mut self, source: Arc<FeatureSource>) {
        self.sources.insert(source.id.clone(), source);
    }

    fn add_layer(&mut self, layer: LineLayer) {
        match self.layers.iter_mut().find(|l| l.id == layer.id) {
            Some(slot) => *slot = layer,
            None => self.layers.push(layer),
        }
    }

    fn set_filter(&mut self, layer: &str, filter: LodFilter) {
        if let Some(l) = self.layers.iter_mut().find(|l| l.id == layer) {
            l.filter = Some(filter);
        }
    }

    fn filter(&self, layer: &str) -> Option<LodFilter> {
        self.layer(layer).and_then(|l| l.filter)
    }

    fn set_feature_state(&mut self, source: &str, id: FeatureId, state: FeatureState) {
        self.states.insert((source.to_string(), id), state);
    }

    fn feature_state(&self, source: &str, id: FeatureId) -> FeatureState {
        self.states.get(&(source.to_string(), id)).copied().unwrap_or_default()
    }

    fn query_rendered_features(&self, layer: &str, at: LngLat) -> Vec<RoadFeature> {
        let Some(l) = self.layer(layer) else { return Vec::new() };
        let Some(src) = self.sources.get(l.source) else { return Vec::new() };
        let tol_m = l.width_px / 2.0 * meters_per_px(self.zoom, at.lat);
        let filter = l.filter;
        src.features_at(at, tol_m, |f| filter.map_or(true, |flt| flt.admits(f)))
            .into_iter()
            .cloned()
            .collect()
    }

    fn query_source_features(&self, source: &str, name: &str) -> Vec<RoadFeature> {
        self.sources
            .get(source)
            .map(|s| s.by_name(name).cloned().collect())
            .unwrap_or_default()
    }
}
