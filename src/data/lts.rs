//! lts.rs
//!
//! Parser del GeoJSON de tramos LTS (`plots/LTS.json`)
//!
//! - Convierte cada Feature en un `RoadFeature` con id, LTS, nombre, zoom y líneas
//! - El `id` sale del miembro `id` del Feature o, si falta, de `properties.id`
//! - Sin `zoom` el tramo nunca pasaría el filtro LOD: se descarta
//! - Sin `id` se conserva para pintar, pero no se puede resaltar (se avisa)
//! - Devuelve también el GeoJSON normalizado que se sirve al front: solo los
//!   tramos aceptados, con el `id` en el miembro del Feature y `LTS` numérico
//!
//! Es la frontera de validación: fuera de aquí solo circulan tipos cerrados.

use anyhow::{Context, Result};
use geo::LineString;
use geojson::{feature::Id, FeatureCollection, GeoJson, Geometry, Value as GjValue};
use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::{debug, warn};

use crate::models::types::{FeatureId, RoadFeature};

#[serde_as]
#[derive(Debug, Default, Deserialize)]
struct LtsProps {
    /// Puede venir como 3, 3.0 o "3"
    #[serde(rename = "LTS", default)]
    lts: Option<Value>,
    /// Si no es texto se trata como sin nombre
    #[serde(default)]
    name: Option<Value>,
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    zoom: Option<f64>,
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub features: Vec<RoadFeature>,
    pub without_id: usize,
    /// Sin geometría lineal o sin `zoom` legible
    pub dropped: usize,
    /// FeatureCollection normalizada para `/map/lts`
    pub geojson: String,
}

fn int_from_value(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64),
        _ => None,
    }
}

fn feature_id(id: Option<&Id>, props_id: Option<&Value>) -> Option<FeatureId> {
    let from_member = match id {
        Some(Id::Number(n)) => int_from_value(&Value::Number(n.clone())),
        Some(Id::String(s)) => int_from_value(&Value::String(s.clone())),
        None => None,
    };
    from_member
        .or_else(|| props_id.and_then(int_from_value))
        .filter(|v| *v >= 0)
        .map(|v| FeatureId(v as u64))
}

fn lines_from_geometry(g: &Geometry) -> Vec<LineString<f64>> {
    fn line(coords: &[Vec<f64>]) -> Option<LineString<f64>> {
        let pts: Vec<(f64, f64)> = coords.iter().filter(|c| c.len() >= 2).map(|c| (c[0], c[1])).collect();
        if pts.len() < 2 { None } else { Some(pts.into()) }
    }
    match &g.value {
        GjValue::LineString(coords) => line(coords).into_iter().collect(),
        GjValue::MultiLineString(multi) => multi.iter().filter_map(|c| line(c)).collect(),
        _ => Vec::new(),
    }
}

pub fn parse_lts_geojson(raw: &str) -> Result<LoadReport> {
    let gj: GeoJson = raw.parse().context("GeoJSON LTS inválido")?;
    let fc = match gj {
        GeoJson::FeatureCollection(fc) => fc,
        _ => anyhow::bail!("GeoJSON debe ser FeatureCollection"),
    };

    let mut rep = LoadReport::default();
    let mut kept = Vec::with_capacity(fc.features.len());
    for (n, mut feat) in fc.features.into_iter().enumerate() {
        let lines = feat.geometry.as_ref().map(lines_from_geometry).unwrap_or_default();
        if lines.is_empty() {
            debug!("feature #{n}: sin geometría lineal, se ignora");
            rep.dropped += 1;
            continue;
        }

        let props: LtsProps = match feat.properties.clone() {
            Some(p) => match serde_json::from_value(Value::Object(p)) {
                Ok(p) => p,
                Err(e) => {
                    warn!("feature #{n}: `zoom` ilegible ({e}); se descarta");
                    rep.dropped += 1;
                    continue;
                }
            },
            None => LtsProps::default(),
        };

        let Some(zoom) = props.zoom.filter(|z| z.is_finite()) else {
            warn!("feature #{n}: sin `zoom`, nunca sería visible; se descarta");
            rep.dropped += 1;
            continue;
        };

        let id = feature_id(feat.id.as_ref(), props.id.as_ref());
        let lts = props.lts.as_ref().and_then(int_from_value);
        let name = match props.name {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(other) => {
                debug!("feature #{n}: `name` no es texto ({other}), se trata como sin nombre");
                None
            }
        };

        // el front resuelve feature-state y color sobre estos mismos valores
        feat.id = match id {
            Some(FeatureId(v)) => Some(Id::Number(v.into())),
            None => {
                rep.without_id += 1;
                None
            }
        };
        if let Some(v) = lts {
            feat.properties.get_or_insert_with(Default::default).insert("LTS".into(), Value::from(v));
        }
        kept.push(feat);

        rep.features.push(RoadFeature { idx: rep.features.len(), id, lts, name, zoom, lines });
    }

    if rep.without_id > 0 {
        warn!("{} tramos sin id: se pintan pero no se pueden resaltar", rep.without_id);
    }
    let out = FeatureCollection { bbox: None, features: kept, foreign_members: None };
    rep.geojson = serde_json::to_string(&out).context("serializando GeoJSON LTS")?;
    Ok(rep)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "type": "FeatureCollection",
      "features": [
        { "type": "Feature", "id": 7,
          "geometry": { "type": "LineString", "coordinates": [[-72.67, 42.31], [-72.66, 42.31]] },
          "properties": { "LTS": 3, "name": "Main St", "zoom": 12 } },
        { "type": "Feature",
          "geometry": { "type": "MultiLineString", "coordinates": [[[-72.6, 42.3], [-72.5, 42.3]], [[-72.5, 42.3]]] },
          "properties": { "LTS": "2", "name": "Elm St", "zoom": "13.5", "id": "42" } },
        { "type": "Feature",
          "geometry": { "type": "LineString", "coordinates": [[-72.6, 42.3], [-72.5, 42.4]] },
          "properties": { "LTS": 4.0, "name": "", "zoom": 10 } },
        { "type": "Feature", "id": 9,
          "geometry": { "type": "Point", "coordinates": [-72.6, 42.3] },
          "properties": { "LTS": 1, "zoom": 10 } },
        { "type": "Feature", "id": 10,
          "geometry": { "type": "LineString", "coordinates": [[-72.6, 42.3], [-72.5, 42.4]] },
          "properties": { "LTS": 1, "name": "No Zoom Rd" } }
      ]
    }"#;

    #[test]
    fn parses_and_validates_features() {
        let rep = parse_lts_geojson(SAMPLE).unwrap();
        assert_eq!(rep.features.len(), 3);
        assert_eq!(rep.dropped, 2);
        assert_eq!(rep.without_id, 1);

        let main = &rep.features[0];
        assert_eq!(main.id, Some(FeatureId(7)));
        assert_eq!(main.lts, Some(3));
        assert_eq!(main.name.as_deref(), Some("Main St"));
        assert_eq!(main.zoom, 12.0);

        let elm = &rep.features[1];
        assert_eq!(elm.id, Some(FeatureId(42)));
        assert_eq!(elm.lts, Some(2));
        assert_eq!(elm.zoom, 13.5);
        // la segunda línea tiene un solo punto
        assert_eq!(elm.lines.len(), 1);

        let anon = &rep.features[2];
        assert_eq!(anon.idx, 2);
        assert_eq!(anon.id, None);
        assert_eq!(anon.lts, Some(4));
        assert_eq!(anon.name, None);
    }

    #[test]
    fn non_integer_lts_is_no_data() {
        let raw = r#"{ "type": "FeatureCollection", "features": [
          { "type": "Feature", "id": 1,
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
            "properties": { "LTS": 2.5, "zoom": 1 } } ] }"#;
        let rep = parse_lts_geojson(raw).unwrap();
        assert_eq!(rep.features[0].lts, None);
    }

    #[test]
    fn served_geojson_carries_normalized_id_and_lts() {
        let rep = parse_lts_geojson(SAMPLE).unwrap();
        let out: Value = serde_json::from_str(&rep.geojson).unwrap();
        let feats = out["features"].as_array().unwrap();
        // el Point y el tramo sin zoom no llegan al front
        assert_eq!(feats.len(), rep.features.len());

        assert_eq!(feats[0]["id"], serde_json::json!(7));
        // id solo en properties: se sube al miembro `id` para el feature-state
        assert_eq!(feats[1]["id"], serde_json::json!(42));
        assert_eq!(feats[1]["properties"]["LTS"], serde_json::json!(2));
        assert!(feats[2].get("id").map_or(true, Value::is_null));
        assert_eq!(feats[2]["properties"]["LTS"], serde_json::json!(4));

        for (f, served) in rep.features.iter().zip(feats) {
            assert_eq!(f.id.map(|i| i.0), served["id"].as_u64());
            assert_eq!(f.lts, served["properties"]["LTS"].as_i64());
        }
    }

    #[test]
    fn non_text_name_keeps_feature() {
        let raw = r#"{ "type": "FeatureCollection", "features": [
          { "type": "Feature", "id": 3,
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
            "properties": { "LTS": 1, "name": 9, "zoom": 12 } } ] }"#;
        let rep = parse_lts_geojson(raw).unwrap();
        assert_eq!(rep.dropped, 0);
        assert_eq!(rep.features.len(), 1);
        assert_eq!(rep.features[0].name, None);
        assert_eq!(rep.features[0].lts, Some(1));
    }

    #[test]
    fn rejects_non_collection() {
        let raw = r#"{ "type": "Feature", "geometry": null, "properties": {} }"#;
        assert!(parse_lts_geojson(raw).is_err());
        assert!(parse_lts_geojson("no es json").is_err());
    }
}
