//! session.rs — Una sesión por pestaña del front: su mapa, su controlador y la fuente que vio al abrir

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::controller::{Ctx, InteractionController};
use crate::mapview::RenderedMap;
use crate::models::events::{MapEvent, UiEffect};
use crate::models::types::MapCfg;
use crate::source::FeatureSource;
use crate::template::TemplateSet;

pub struct Session {
    pub map: RenderedMap,
    pub ctl: InteractionController,
    pub source: Arc<FeatureSource>,
}

impl Session {
    pub fn new(source: Arc<FeatureSource>, cfg: &MapCfg) -> Self {
        Self { map: RenderedMap::new(cfg), ctl: InteractionController::new(), source }
    }

    pub fn dispatch(&mut self, templates: &TemplateSet, cfg: &MapCfg, ev: MapEvent) -> Vec<UiEffect> {
        let ctx = Ctx { source: &self.source, templates, cfg };
        self.ctl.dispatch(&mut self.map, &ctx, ev)
    }
}

pub struct SessionRegistry {
    next_id: u64,
    max: usize,
    items: BTreeMap<u64, Session>,
}

impl SessionRegistry {
    pub fn new(max: usize) -> Self {
        Self { next_id: 1, max: max.max(1), items: BTreeMap::new() }
    }

    /// Inserta y devuelve el id; si se llega al máximo expulsa la más antigua
    pub fn insert(&mut self, s: Session) -> u64 {
        while self.items.len() >= self.max {
            if let Some((old, _)) = self.items.pop_first() {
                info!("sesión {old} expulsada (máximo {})", self.max);
            }
        }
        let id = self.next_id;
        self.next_id += 1;
        self.items.insert(id, s);
        id
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Session> {
        self.items.get_mut(&id)
    }

    pub fn remove(&mut self, id: u64) -> bool {
        self.items.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::LTS_SOURCE;

    fn session() -> Session {
        Session::new(Arc::new(FeatureSource::new(LTS_SOURCE, vec![])), &MapCfg::default())
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut r = SessionRegistry::new(2);
        let a = r.insert(session());
        let b = r.insert(session());
        let c = r.insert(session());
        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(r.len(), 2);
        assert!(r.get_mut(a).is_none());
        assert!(r.get_mut(c).is_some());
        assert!(r.remove(b));
        assert!(!r.remove(b));
    }

    #[test]
    fn default_registry_still_accepts() {
        let mut r = SessionRegistry::default();
        assert_eq!(r.insert(session()), 1);
        assert_eq!(r.insert(session()), 2);
        assert_eq!(r.len(), 1);
        assert!(r.get_mut(1).is_none());
    }
}
