//! gen_lts.rs
//! Genera un "plots/LTS.json" sintético alrededor del centro de Northampton para
//! probar el mapa sin el pipeline de datos real.
//! Propiedades por tramo: LTS, name, zoom (+ id del Feature)
//! Uso: cargo run --bin gen_lts

use anyhow::{Context, Result};
use geojson::{feature::Id, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;
use std::fs;

const OUT: &str = "plots/LTS.json";
const CENTER: (f64, f64) = (-72.667638, 42.3164662);
/// Paso entre vértices (~80 m)
const STEP: f64 = 0.001;

struct Street {
    name: &'static str,
    /// Dirección (dlon, dlat) en pasos
    dir: (f64, f64),
    /// Desplazamiento del origen respecto al centro, en pasos
    offset: (f64, f64),
    segments: usize,
    lts: &'static [i64],
    zoom: f64,
}

fn streets() -> Vec<Street> {
    vec![
        Street { name: "Main St", dir: (1.0, 0.0), offset: (-8.0, 0.0), segments: 8, lts: &[3, 3, 4, 3], zoom: 10.0 },
        Street { name: "King St", dir: (0.0, 1.0), offset: (0.0, 0.0), segments: 6, lts: &[4, 3], zoom: 11.0 },
        Street { name: "Elm St", dir: (-1.0, 0.4), offset: (0.0, 2.0), segments: 5, lts: &[2, 1], zoom: 12.0 },
        Street { name: "Bridge St", dir: (1.0, -0.3), offset: (0.0, 0.0), segments: 5, lts: &[3, 2], zoom: 12.0 },
        Street { name: "Green St", dir: (0.2, -1.0), offset: (-3.0, -1.0), segments: 4, lts: &[1], zoom: 13.0 },
        Street { name: "Crescent St", dir: (0.7, 0.7), offset: (-6.0, 3.0), segments: 3, lts: &[1, 2], zoom: 14.0 },
        // tramos sin datos (negro/blanco en el mapa)
        Street { name: "Service Rd", dir: (0.0, -1.0), offset: (5.0, -1.0), segments: 2, lts: &[0, 9], zoom: 13.0 },
    ]
}

fn main() -> Result<()> {
    let mut features = Vec::new();
    let mut next_id = 1u64;

    for st in streets() {
        let (mut x, mut y) = (CENTER.0 + st.offset.0 * STEP, CENTER.1 + st.offset.1 * STEP);
        for i in 0..st.segments {
            let (nx, ny) = (x + st.dir.0 * STEP, y + st.dir.1 * STEP);
            let coords = vec![vec![x, y], vec![(x + nx) / 2.0, (y + ny) / 2.0 + STEP * 0.05], vec![nx, ny]];

            let mut props = JsonObject::new();
            props.insert("LTS".into(), json!(st.lts[i % st.lts.len()]));
            props.insert("name".into(), json!(st.name));
            props.insert("zoom".into(), json!(st.zoom));

            features.push(Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::LineString(coords))),
                id: Some(Id::Number(next_id.into())),
                properties: Some(props),
                foreign_members: None,
            });
            next_id += 1;
            (x, y) = (nx, ny);
        }
    }

    let n = features.len();
    let gj = GeoJson::FeatureCollection(FeatureCollection { bbox: None, features, foreign_members: None });

    fs::create_dir_all("plots").context("No se pudo crear plots/")?;
    fs::write(OUT, gj.to_string()).with_context(|| format!("No se pudo escribir {OUT}"))?;
    println!("💾 {n} tramos guardados en {OUT}");
    Ok(())
}
