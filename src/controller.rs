//! controller.rs
//!
//! Controlador de interacción de una sesión de mapa.
//!
//! Estado propio: el conjunto de ids resaltados y el tramo bajo el puntero.
//! Cada evento entra por `dispatch()` junto al mapa de la sesión y devuelve
//! los efectos de UI que el front debe aplicar, en orden.
//!
//! Transiciones del resaltado: siempre pasan por `clear_highlights()`, tanto
//! al hacer click en otro tramo como al cancelar (click fuera o cerrar panel).

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::mapview::{FeatureState, MapSurface};
use crate::models::events::{Cursor, MapEvent, UiEffect};
use crate::models::types::{DetailView, FeatureId, HoverView, LngLat, MapCfg, RoadFeature};
use crate::source::FeatureSource;
use crate::style::{self, LodFilter, BUFFER_LAYER, LTS_LAYER, LTS_SOURCE};
use crate::template::TemplateSet;

/// Lo que el controlador lee pero no posee
pub struct Ctx<'a> {
    pub source: &'a Arc<FeatureSource>,
    pub templates: &'a TemplateSet,
    pub cfg: &'a MapCfg,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    highlighted: BTreeSet<FeatureId>,
    /// `idx` del tramo bajo el puntero
    hover: Option<usize>,
    panel_open: bool,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn highlighted(&self) -> &BTreeSet<FeatureId> {
        &self.highlighted
    }

    pub fn panel_open(&self) -> bool {
        self.panel_open
    }

    #[cfg(test)]
    pub fn hovering(&self) -> Option<usize> {
        self.hover
    }

    pub fn dispatch<M: MapSurface>(&mut self, map: &mut M, ctx: &Ctx<'_>, ev: MapEvent) -> Vec<UiEffect> {
        debug!(?ev, "evento de mapa");
        match ev {
            MapEvent::Load => self.on_load(map, ctx),
            MapEvent::Click { lng, lat } => self.on_click(map, ctx, LngLat { lng, lat }),
            MapEvent::PointerMove { lng, lat } => self.on_pointer_move(map, ctx, LngLat { lng, lat }),
            MapEvent::PointerOut => self.on_pointer_leave(),
            MapEvent::Zoom { zoom } => self.on_zoom(map, ctx, zoom),
            MapEvent::ClosePanel => self.cancel(map),
        }
    }

    fn on_load<M: MapSurface>(&mut self, map: &mut M, ctx: &Ctx<'_>) -> Vec<UiEffect> {
        map.add_source(ctx.source.clone());
        map.add_layer(style::visible_layer(ctx.cfg));
        map.add_layer(style::buffer_layer(ctx.cfg));

        let mut fx = self.clear_highlights(map);
        self.hover = None;
        self.panel_open = false;

        fx.push(UiEffect::Legend { entries: style::legend() });
        fx.extend(self.apply_lod(map, ctx));
        fx.push(zoom_readout(map.zoom()));
        fx
    }

    fn on_click<M: MapSurface>(&mut self, map: &mut M, ctx: &Ctx<'_>, at: LngLat) -> Vec<UiEffect> {
        match map.query_rendered_features(BUFFER_LAYER, at).into_iter().next() {
            Some(f) => self.on_feature_click(map, ctx, &f),
            None => self.cancel(map),
        }
    }

    fn on_feature_click<M: MapSurface>(&mut self, map: &mut M, ctx: &Ctx<'_>, f: &RoadFeature) -> Vec<UiEffect> {
        let mut fx = self.clear_highlights(map);

        if let Some(name) = f.name.as_deref() {
            let mut sin_id = 0usize;
            for g in map.query_source_features(LTS_SOURCE, name) {
                match g.id {
                    Some(id) => {
                        if self.highlighted.insert(id) {
                            fx.push(set_highlight(map, id, true));
                        }
                    }
                    None => sin_id += 1,
                }
            }
            if sin_id > 0 {
                warn!("'{name}': {sin_id} tramos sin id quedan sin resaltar");
            }
        }

        self.panel_open = true;
        let html = ctx.templates.detail.render(&DetailView::from(f));
        fx.push(UiEffect::ShowPanel { html });
        fx
    }

    fn on_pointer_move<M: MapSurface>(&mut self, map: &mut M, ctx: &Ctx<'_>, at: LngLat) -> Vec<UiEffect> {
        let hit = map.query_rendered_features(BUFFER_LAYER, at).into_iter().next();
        match (self.hover, hit) {
            (Some(cur), Some(f)) if cur == f.idx => vec![UiEffect::MoveTooltip { lng: at.lng, lat: at.lat }],
            (prev, Some(f)) => {
                self.hover = Some(f.idx);
                let html = ctx.templates.hover.render(&HoverView::from(&f));
                let mut fx = Vec::with_capacity(2);
                if prev.is_none() {
                    fx.push(UiEffect::Cursor { cursor: Cursor::Pointer });
                }
                fx.push(UiEffect::ShowTooltip { html, lng: at.lng, lat: at.lat });
                fx
            }
            (Some(_), None) => self.on_pointer_leave(),
            (None, None) => Vec::new(),
        }
    }

    fn on_pointer_leave(&mut self) -> Vec<UiEffect> {
        if self.hover.take().is_none() {
            return Vec::new();
        }
        vec![UiEffect::HideTooltip, UiEffect::Cursor { cursor: Cursor::Default }]
    }

    /// El resaltado va ligado a la identidad del tramo, no al filtro: aquí no se toca.
    fn on_zoom<M: MapSurface>(&mut self, map: &mut M, ctx: &Ctx<'_>, zoom: f64) -> Vec<UiEffect> {
        map.set_zoom(zoom);
        let mut fx = self.apply_lod(map, ctx);
        fx.push(zoom_readout(zoom));
        fx
    }

    fn apply_lod<M: MapSurface>(&self, map: &mut M, ctx: &Ctx<'_>) -> Vec<UiEffect> {
        let filter = LodFilter::at(map.zoom(), ctx.cfg.lod_offset);
        [LTS_LAYER, BUFFER_LAYER]
            .into_iter()
            .map(|layer| {
                map.set_filter(layer, filter);
                UiEffect::SetFilter { layer: layer.to_string(), filter: filter.to_expr() }
            })
            .collect()
    }

    /// Click fuera de la capa y cierre del panel acaban aquí
    fn cancel<M: MapSurface>(&mut self, map: &mut M) -> Vec<UiEffect> {
        let mut fx = self.clear_highlights(map);
        self.panel_open = false;
        fx.push(UiEffect::HidePanel);
        fx
    }

    pub fn clear_highlights<M: MapSurface>(&mut self, map: &mut M) -> Vec<UiEffect> {
        std::mem::take(&mut self.highlighted)
            .into_iter()
            .map(|id| set_highlight(map, id, false))
            .collect()
    }
}

fn set_highlight<M: MapSurface>(map: &mut M, id: FeatureId, highlight: bool) -> UiEffect {
    map.set_feature_state(LTS_SOURCE, id, FeatureState { highlight });
    UiEffect::FeatureState { source: LTS_SOURCE.to_string(), id: id.0, highlight }
}

fn zoom_readout(zoom: f64) -> UiEffect {
    UiEffect::ZoomReadout { text: format!("{zoom:.2}") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapview::RenderedMap;

    const ON_MAIN: (f64, f64) = (-72.665, 42.316);
    const ON_ELM: (f64, f64) = (-72.665, 42.330);
    const NOWHERE: (f64, f64) = (-72.400, 42.100);

    fn road(id: Option<u64>, name: Option<&str>, zoom: f64, from: (f64, f64), to: (f64, f64)) -> RoadFeature {
        RoadFeature {
            idx: 0,
            id: id.map(FeatureId),
            lts: Some(3),
            name: name.map(str::to_string),
            zoom,
            lines: vec![vec![from, to].into()],
        }
    }

    struct Fixture {
        map: RenderedMap,
        ctl: InteractionController,
        source: Arc<FeatureSource>,
        templates: TemplateSet,
        cfg: MapCfg,
    }

    impl Fixture {
        fn new() -> Self {
            let features = vec![
                road(Some(1), Some("Main St"), 12.0, (-72.670, 42.316), (-72.660, 42.316)),
                road(Some(2), Some("Main St"), 12.0, (-72.650, 42.316), (-72.640, 42.316)),
                // fuera del LOD a zoom 12, pero cargado
                road(Some(3), Some("Main St"), 15.0, (-72.630, 42.316), (-72.620, 42.316)),
                road(None, Some("Main St"), 12.0, (-72.610, 42.316), (-72.600, 42.316)),
                road(Some(4), Some("main st"), 12.0, (-72.590, 42.316), (-72.580, 42.316)),
                road(Some(5), Some("Elm St"), 12.0, (-72.670, 42.330), (-72.660, 42.330)),
                road(Some(6), None, 12.0, (-72.670, 42.340), (-72.660, 42.340)),
            ];
            let cfg = MapCfg::default();
            let mut templates = TemplateSet::default();
            templates.detail.set_text("<h3>{{name}}</h3><p>{{lts_label}}</p>".into());
            templates.hover.set_text("{{emoji}} {{label}}".into());
            let mut fx = Self {
                map: RenderedMap::new(&cfg),
                ctl: InteractionController::new(),
                source: Arc::new(FeatureSource::new(LTS_SOURCE, features)),
                templates,
                cfg,
            };
            fx.send(MapEvent::Load);
            fx
        }

        fn send(&mut self, ev: MapEvent) -> Vec<UiEffect> {
            let ctx = Ctx { source: &self.source, templates: &self.templates, cfg: &self.cfg };
            self.ctl.dispatch(&mut self.map, &ctx, ev)
        }

        fn click(&mut self, (lng, lat): (f64, f64)) -> Vec<UiEffect> {
            self.send(MapEvent::Click { lng, lat })
        }

        fn hover(&mut self, (lng, lat): (f64, f64)) -> Vec<UiEffect> {
            self.send(MapEvent::PointerMove { lng, lat })
        }

        fn ids(&self) -> Vec<u64> {
            self.ctl.highlighted().iter().map(|i| i.0).collect()
        }

        fn flagged(&self) -> Vec<u64> {
            (1..=6).filter(|i| self.map.feature_state(LTS_SOURCE, FeatureId(*i)).highlight).collect()
        }
    }

    #[test]
    fn load_registers_layers_and_filters() {
        let mut fx = Fixture::new();
        assert_eq!(fx.map.layer_ids(), vec![LTS_LAYER, BUFFER_LAYER]);
        assert_eq!(fx.map.filter(LTS_LAYER), Some(LodFilter { max_zoom: 13.0 }));
        assert_eq!(fx.map.filter(BUFFER_LAYER), Some(LodFilter { max_zoom: 13.0 }));

        let out = fx.send(MapEvent::Load);
        assert!(matches!(&out[0], UiEffect::Legend { entries } if entries.len() == 4));
        assert_eq!(out.last(), Some(&UiEffect::ZoomReadout { text: "12.00".into() }));
    }

    #[test]
    fn click_highlights_all_segments_with_same_name() {
        let mut fx = Fixture::new();
        let out = fx.click(ON_MAIN);

        // el de zoom 15 también está cargado; el sin id y "main st" no
        assert_eq!(fx.ids(), vec![1, 2, 3]);
        assert_eq!(fx.flagged(), vec![1, 2, 3]);
        assert!(fx.ctl.panel_open());
        assert_eq!(
            out.last(),
            Some(&UiEffect::ShowPanel { html: "<h3>Main St</h3><p>Level of Traffic Stress 3</p>".into() })
        );
        let synced: Vec<u64> = out
            .iter()
            .filter_map(|e| match e {
                UiEffect::FeatureState { id, highlight: true, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(synced, vec![1, 2, 3]);
    }

    #[test]
    fn new_click_replaces_previous_episode() {
        let mut fx = Fixture::new();
        fx.click(ON_MAIN);
        fx.click(ON_ELM);
        assert_eq!(fx.ids(), vec![5]);
        assert_eq!(fx.flagged(), vec![5]);
    }

    #[test]
    fn unnamed_feature_opens_panel_without_highlight() {
        let mut fx = Fixture::new();
        fx.click(ON_MAIN);
        let out = fx.click((-72.665, 42.340));
        assert!(fx.ids().is_empty());
        assert!(fx.flagged().is_empty());
        // solo se apagan los tres de Main St
        assert_eq!(out.len(), 4);
        assert!(matches!(out.last(), Some(UiEffect::ShowPanel { .. })));
    }

    #[test]
    fn click_elsewhere_clears_and_hides() {
        let mut fx = Fixture::new();
        fx.click(ON_MAIN);
        let out = fx.click(NOWHERE);
        assert!(fx.ids().is_empty());
        assert!(fx.flagged().is_empty());
        assert!(!fx.ctl.panel_open());
        let off = |id| UiEffect::FeatureState { source: LTS_SOURCE.into(), id, highlight: false };
        assert_eq!(out, vec![off(1), off(2), off(3), UiEffect::HidePanel]);
    }

    #[test]
    fn close_panel_matches_click_elsewhere() {
        let mut a = Fixture::new();
        let mut b = Fixture::new();
        a.click(ON_MAIN);
        b.click(ON_MAIN);

        let out_a = a.click(NOWHERE);
        let out_b = b.send(MapEvent::ClosePanel);
        assert_eq!(out_a, out_b);
        assert_eq!(a.ids(), b.ids());
        assert_eq!(a.flagged(), b.flagged());
        assert_eq!(a.ctl.panel_open(), b.ctl.panel_open());
    }

    #[test]
    fn zoom_keeps_highlights() {
        let mut fx = Fixture::new();
        fx.click(ON_MAIN);
        let before = fx.ids();

        let out = fx.send(MapEvent::Zoom { zoom: 9.5 });
        assert_eq!(fx.ids(), before);
        assert_eq!(fx.flagged(), before);
        assert_eq!(fx.map.filter(LTS_LAYER), Some(LodFilter { max_zoom: 10.5 }));
        assert_eq!(out.last(), Some(&UiEffect::ZoomReadout { text: "9.50".into() }));

        // a zoom 9.5 Main St (zoom 12) ya no se pinta: el click cae en vacío
        fx.click(ON_MAIN);
        assert!(fx.ids().is_empty());
    }

    #[test]
    fn lod_hides_segments_until_zoomed_in() {
        let mut fx = Fixture::new();
        let far_main = (-72.625, 42.316);
        assert_eq!(fx.click(far_main), vec![UiEffect::HidePanel]);

        fx.send(MapEvent::Zoom { zoom: 14.0 });
        fx.click(far_main);
        assert_eq!(fx.ids(), vec![1, 2, 3]);
    }

    #[test]
    fn hover_enter_move_leave() {
        let mut fx = Fixture::new();
        let out = fx.hover(ON_MAIN);
        assert_eq!(
            out,
            vec![
                UiEffect::Cursor { cursor: Cursor::Pointer },
                UiEffect::ShowTooltip { html: "😬 LTS 3: high stress".into(), lng: ON_MAIN.0, lat: ON_MAIN.1 },
            ]
        );

        let nudge = (ON_MAIN.0 + 0.0001, ON_MAIN.1);
        assert_eq!(fx.hover(nudge), vec![UiEffect::MoveTooltip { lng: nudge.0, lat: nudge.1 }]);

        // cambio de tramo sin salir de la capa: solo tooltip nuevo
        let out = fx.hover(ON_ELM);
        assert!(matches!(&out[..], [UiEffect::ShowTooltip { .. }]));

        assert_eq!(fx.hover(NOWHERE), vec![UiEffect::HideTooltip, UiEffect::Cursor { cursor: Cursor::Default }]);
        assert!(fx.hover(NOWHERE).is_empty());
        assert_eq!(fx.ctl.hovering(), None);
    }

    #[test]
    fn pointer_out_only_leaves_when_hovering() {
        let mut fx = Fixture::new();
        assert!(fx.send(MapEvent::PointerOut).is_empty());
        fx.hover(ON_MAIN);
        assert_eq!(fx.send(MapEvent::PointerOut).len(), 2);
    }

    #[test]
    fn reload_empties_highlight_set() {
        let mut fx = Fixture::new();
        fx.click(ON_MAIN);
        fx.send(MapEvent::Load);
        assert!(fx.ids().is_empty());
        assert!(fx.flagged().is_empty());
    }
}
