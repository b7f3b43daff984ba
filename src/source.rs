//! source.rs
//!
//! Fuente de tramos cargada en memoria.
//!
//! - Guarda los `RoadFeature` validados.
//! - Construye un índice espacial (`RTree`) con el bbox de cada línea.
//! - `features_at()` localiza los tramos a menos de `tol_m` metros de un punto,
//!   que es lo que necesita el hit-test de las capas (visible y buffer).
//! - `by_name()` para el resaltado de todos los tramos de la misma calle.

use geo::{EuclideanDistance, LineString, Point};
use rstar::{RTree, RTreeObject, AABB};

use crate::models::types::{LngLat, RoadFeature};

/// Metros por grado de latitud (aprox. esfera)
const M_PER_DEG: f64 = 111_320.0;

#[derive(Clone, Copy)]
pub struct LineItem {
    pub idx: usize,
    pub aabb: AABB<[f64; 2]>,
}

impl RTreeObject for LineItem {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope { self.aabb }
}

pub struct FeatureSource {
    pub id: String,
    features: Vec<RoadFeature>,
    tree: RTree<LineItem>,
    without_id: usize,
}

impl FeatureSource {
    pub fn new(id: impl Into<String>, mut features: Vec<RoadFeature>) -> Self {
        let mut items = Vec::new();
        for (idx, f) in features.iter_mut().enumerate() {
            f.idx = idx;
            for line in &f.lines {
                if let Some((min, max)) = line_bounds(line) {
                    items.push(LineItem { idx, aabb: AABB::from_corners(min, max) });
                }
            }
        }
        let without_id = features.iter().filter(|f| f.id.is_none()).count();
        Self { id: id.into(), features, tree: RTree::bulk_load(items), without_id }
    }

    pub fn len(&self) -> usize { self.features.len() }

    pub fn without_id(&self) -> usize { self.without_id }

    /// Igualdad exacta (distingue mayúsculas)
    pub fn by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a RoadFeature> + 'a {
        self.features.iter().filter(move |f| f.name.as_deref() == Some(name))
    }

    /// Tramos a `tol_m` metros o menos de `p`, del más cercano al más lejano.
    /// `admit` aplica el filtro de la capa.
    pub fn features_at<F>(&self, p: LngLat, tol_m: f64, admit: F) -> Vec<&RoadFeature>
    where
        F: Fn(&RoadFeature) -> bool,
    {
        let m_per_deg_lon = M_PER_DEG * p.lat.to_radians().cos().max(1e-6);
        let dlat = tol_m / M_PER_DEG;
        let dlon = tol_m / m_per_deg_lon;
        let env = AABB::from_corners([p.lng - dlon, p.lat - dlat], [p.lng + dlon, p.lat + dlat]);

        let mut hits: Vec<(f64, usize)> = Vec::new();
        for it in self.tree.locate_in_envelope_intersecting(&env) {
            let f = &self.features[it.idx];
            if !admit(f) || hits.iter().any(|(_, i)| *i == it.idx) {
                continue;
            }
            // proyección equirectangular local centrada en el punto (metros)
            let origin = Point::new(0.0, 0.0);
            let d = f
                .lines
                .iter()
                .map(|l| {
                    let local: LineString<f64> = l
                        .coords()
                        .map(|c| ((c.x - p.lng) * m_per_deg_lon, (c.y - p.lat) * M_PER_DEG))
                        .collect::<Vec<_>>()
                        .into();
                    origin.euclidean_distance(&local)
                })
                .fold(f64::INFINITY, f64::min);
            if d <= tol_m {
                hits.push((d, it.idx));
            }
        }
        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits.into_iter().map(|(_, i)| &self.features[i]).collect()
    }
}

fn line_bounds(l: &LineString<f64>) -> Option<([f64; 2], [f64; 2])> {
    let mut it = l.coords();
    let first = it.next()?;
    let (mut min, mut max) = ([first.x, first.y], [first.x, first.y]);
    for c in it {
        min = [min[0].min(c.x), min[1].min(c.y)];
        max = [max[0].max(c.x), max[1].max(c.y)];
    }
    Some((min, max))
}
