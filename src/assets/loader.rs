use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use kurbo::Size;

use crate::{
    assets::{
        cache::SurfaceCache,
        decode::{DecodedSurface, decode_image},
    },
    effects::descriptor::{CacheMode, DpiMode},
    foundation::error::{BrushworkError, BrushworkResult},
    sink::ImageRequest,
};

const BASE_DPI: f64 = 96.0;

/// Surface loader configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoaderConfig {
    /// Directory relative URIs are resolved against.
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// DPI of the display surfaces are shown on.
    #[serde(default = "default_display_dpi")]
    pub display_dpi: f64,
    /// Byte budget for a private cache. `None` shares the unbounded global cache.
    #[serde(default)]
    pub cache_budget_bytes: Option<usize>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_display_dpi() -> f64 {
    BASE_DPI
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            display_dpi: default_display_dpi(),
            cache_budget_bytes: None,
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON configuration object. Missing fields take their defaults.
    pub fn from_json(json: &str) -> BrushworkResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(BrushworkError::serde("loader config must be a JSON object"));
        }
        let config: Self = serde_json::from_value(value)?;
        Ok(config)
    }
}

/// Surface produced by [`SurfaceLoader::load`].
#[derive(Clone, Debug)]
pub struct LoadedSurface {
    /// Decoded pixels.
    pub surface: Arc<DecodedSurface>,
    /// Size in logical units after DPI scaling.
    pub logical_size: Size,
    /// Whether the pixels came from the cache instead of a fresh decode.
    pub from_cache: bool,
}

/// Turns [`ImageRequest`]s into decoded surfaces.
///
/// Bytes are read on the calling thread; `OnLoad` requests go through the shared
/// [`SurfaceCache`], `OnDemand` requests always decode and never touch it.
#[derive(Debug)]
pub struct SurfaceLoader {
    root: PathBuf,
    display_dpi: f64,
    cache: Arc<SurfaceCache>,
    decodes: parking_lot::Mutex<HashMap<String, u64>>,
}

impl SurfaceLoader {
    /// Loader rooted at `root`, using the global cache and a 96 DPI display.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            display_dpi: BASE_DPI,
            cache: SurfaceCache::global(),
            decodes: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Build a loader from configuration.
    pub fn from_config(config: &LoaderConfig) -> BrushworkResult<Self> {
        let loader = Self::new(config.root.clone()).with_display_dpi(config.display_dpi)?;
        Ok(match config.cache_budget_bytes {
            Some(budget) => loader.with_cache(Arc::new(SurfaceCache::with_budget(budget))),
            None => loader,
        })
    }

    /// Use `cache` for `OnLoad` requests.
    pub fn with_cache(mut self, cache: Arc<SurfaceCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Set the display DPI used by the display-relative [`DpiMode`]s.
    pub fn with_display_dpi(mut self, dpi: f64) -> BrushworkResult<Self> {
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(BrushworkError::validation(
                "display_dpi must be finite and > 0",
            ));
        }
        self.display_dpi = dpi;
        Ok(self)
    }

    /// Cache used for `OnLoad` requests.
    pub fn cache(&self) -> &Arc<SurfaceCache> {
        &self.cache
    }

    /// Number of times the surface behind `uri` was decoded by this loader.
    pub fn decode_count(&self, uri: &str) -> u64 {
        let Ok(key) = normalize_uri(uri) else {
            return 0;
        };
        self.decodes.lock().get(&key).copied().unwrap_or(0)
    }

    /// Filesystem path `uri` refers to.
    pub fn resolve_path(&self, uri: &str) -> BrushworkResult<PathBuf> {
        if let Some(abs) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(abs));
        }
        Ok(self.root.join(Path::new(&normalize_rel_path(uri)?)))
    }

    /// Load the surface described by `request`.
    #[tracing::instrument(skip(self, request), fields(uri = %request.uri, cache = ?request.cache_mode))]
    pub async fn load(&self, request: &ImageRequest) -> BrushworkResult<LoadedSurface> {
        let key = normalize_uri(&request.uri)?;

        let cached = match request.cache_mode {
            CacheMode::OnLoad => self.cache.get(&key),
            CacheMode::OnDemand => None,
        };
        let from_cache = cached.is_some();
        let surface = match cached {
            Some(surface) => surface,
            None => {
                let surface = Arc::new(self.decode(&request.uri, &key)?);
                if request.cache_mode == CacheMode::OnLoad {
                    self.cache.insert(key, surface.clone());
                }
                surface
            }
        };

        let logical_size = logical_size(
            surface.width,
            surface.height,
            request.dpi_mode,
            surface.source_dpi,
            self.display_dpi,
        );
        Ok(LoadedSurface {
            surface,
            logical_size,
            from_cache,
        })
    }

    fn decode(&self, uri: &str, key: &str) -> BrushworkResult<DecodedSurface> {
        let path = self.resolve_path(uri)?;
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read image bytes from '{}'", path.display()))?;
        let surface = decode_image(&bytes)?;
        *self.decodes.lock().entry(key.to_string()).or_insert(0) += 1;
        tracing::debug!(
            width = surface.width,
            height = surface.height,
            "decoded surface"
        );
        Ok(surface)
    }
}

/// Size in logical units of a `width`×`height` pixel surface under `mode`.
///
/// Surfaces without a recorded DPI are treated as 96 DPI.
pub fn logical_size(
    width: u32,
    height: u32,
    mode: DpiMode,
    source_dpi: Option<f64>,
    display_dpi: f64,
) -> Size {
    let dpi = match mode {
        DpiMode::UseSourceDpi => source_dpi.unwrap_or(BASE_DPI),
        DpiMode::Default96Dpi => BASE_DPI,
        DpiMode::DisplayDpi => display_dpi,
        DpiMode::DisplayDpiWith96AsLowerBound => display_dpi.max(BASE_DPI),
    };
    let scale = BASE_DPI / dpi;
    Size::new(f64::from(width) * scale, f64::from(height) * scale)
}

/// Cache key for `uri`: absolute `file://` paths are kept as-is, everything else is
/// normalized with [`normalize_rel_path`].
pub fn normalize_uri(uri: &str) -> BrushworkResult<String> {
    if let Some(abs) = uri.strip_prefix("file://") {
        if abs.is_empty() {
            return Err(BrushworkError::validation("file uri must name a file"));
        }
        return Ok(format!("file://{}", abs.replace('\\', "/")));
    }
    normalize_rel_path(uri)
}

/// Normalize and validate root-relative image paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub fn normalize_rel_path(source: &str) -> BrushworkResult<String> {
    let s = source.trim().replace('\\', "/");
    if s.is_empty() {
        return Err(BrushworkError::validation("image uri must be non-empty"));
    }
    if s.starts_with('/') || s.contains("://") {
        return Err(BrushworkError::validation(format!(
            "image uri '{source}' must be root-relative or a file:// uri"
        )));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(BrushworkError::validation(
                    "image paths must not contain '..'",
                ));
            }
            part => out.push(part),
        }
    }

    if out.is_empty() {
        return Err(BrushworkError::validation(
            "image path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/loader.rs"]
mod tests;
