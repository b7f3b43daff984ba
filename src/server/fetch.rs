//! fetch.rs — Descarga con caché condicional (ETag / Last-Modified) o lectura local por mtime

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::{Client, StatusCode};

#[derive(Default, Clone)]
pub struct CacheCtl { pub etag: Option<String>, pub last_mod: Option<String> }

#[inline]
fn is_url(src: &str) -> bool {
    src.starts_with("http://") || src.starts_with("https://")
}

pub async fn get_with_cache(client: &Client, url: &str, cache: &mut CacheCtl) -> Result<Option<Bytes>> {
    let mut req = client.get(url);
    if let Some(et) = &cache.etag { req = req.header("If-None-Match", et); }
    if let Some(lm) = &cache.last_mod { req = req.header("If-Modified-Since", lm); }
    let resp = req.send().await?;
    match resp.status() {
        StatusCode::NOT_MODIFIED => Ok(None),
        StatusCode::OK => {
            cache.etag = resp.headers().get("etag").and_then(|v| v.to_str().ok()).map(str::to_string);
            cache.last_mod = resp.headers().get("last-modified").and_then(|v| v.to_str().ok()).map(str::to_string);
            Ok(Some(resp.bytes().await?))
        }
        s => anyhow::bail!("HTTP {} en {}", s, url),
    }
}

/// Igual que `get_with_cache` pero acepta rutas locales: `None` si no cambió
pub async fn load_source(client: &Client, src: &str, cache: &mut CacheCtl) -> Result<Option<Bytes>> {
    if is_url(src) {
        return get_with_cache(client, src, cache).await;
    }
    let meta = tokio::fs::metadata(src).await.with_context(|| format!("no existe {src}"))?;
    let stamp = meta.modified().ok().map(|t| format!("{t:?}"));
    if stamp.is_some() && stamp == cache.last_mod {
        return Ok(None);
    }
    let raw = tokio::fs::read(src).await.with_context(|| format!("leyendo {src}"))?;
    cache.last_mod = stamp;
    Ok(Some(Bytes::from(raw)))
}

/// Texto completo, sin caché (plantillas)
pub async fn fetch_text(client: &Client, src: &str) -> Result<String> {
    let bytes = load_source(client, src, &mut CacheCtl::default())
        .await?
        .context("respuesta vacía")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
