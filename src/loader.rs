//! Layout loading and caching
//!
//! Resolves a layout name to template source text, read from
//! `<layouts dir>/<name>.hbs`, with an optional time-bounded cache in
//! front of the filesystem. Caching is opt-in outside production and
//! defaults to one day inside it; an explicit duration (builder override
//! or the `HBS_INHERIT_CACHE` environment variable, in seconds) takes
//! precedence either way, and a duration of zero disables the cache.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::LayoutError;

/// Environment variable selecting the execution mode (`production` enables
/// the default cache window)
pub const MODE_ENV: &str = "HBS_INHERIT_ENV";

/// Environment variable overriding the cache duration, in seconds
pub const CACHE_ENV: &str = "HBS_INHERIT_CACHE";

/// Default cache duration in production mode: one day
const PRODUCTION_CACHE_SECS: f64 = 86_400.0;

/// File extension expected for layout files
const LAYOUT_EXTENSION: &str = "hbs";

#[derive(Debug)]
struct CacheEntry {
    expires_at: Instant,
    content: String,
}

/// Maps layout names to their source text, with time-bounded caching
///
/// Entries are never proactively evicted; an expired entry is simply
/// recomputed (and overwritten) on the next lookup, so memory grows with
/// the number of distinct layout names ever requested.
#[derive(Debug)]
pub struct LayoutLoader {
    dir: PathBuf,
    duration_override: Option<f64>,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl LayoutLoader {
    /// Create a loader resolving layout names relative to `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            duration_override: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Set an explicit cache duration in seconds, taking precedence over
    /// the environment. Zero disables caching.
    pub fn with_cache_duration(mut self, secs: f64) -> Self {
        self.duration_override = Some(secs);
        self
    }

    /// The directory layout names resolve against
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// The filename a layout name resolves to, relative to the layouts dir
    pub fn filename(name: &str) -> String {
        format!("{name}.{LAYOUT_EXTENSION}")
    }

    /// Resolve a layout name to its source text.
    ///
    /// Returns the cached content while a cache entry is still within its
    /// validity window; otherwise rereads from disk and, if the resolved
    /// cache duration is positive, stores a fresh entry.
    pub fn resolve(&self, name: &str) -> Result<String, LayoutError> {
        let now = Instant::now();
        if let Some(entry) = self.cache_lock().get(name) {
            if now < entry.expires_at {
                log::debug!("layout '{name}' served from cache");
                return Ok(entry.content.clone());
            }
            log::debug!("layout '{name}' cache entry expired");
        }

        let content = self.read_layout(name)?;
        let duration = self.cache_duration();
        if duration > 0.0 {
            self.cache_lock().insert(
                name.to_string(),
                CacheEntry {
                    expires_at: now + Duration::from_secs_f64(duration),
                    content: content.clone(),
                },
            );
            log::debug!("layout '{name}' cached for {duration}s");
        }
        Ok(content)
    }

    /// Read a layout from disk, distinguishing access from read failures:
    /// opening the file covers existence and readability, reading it is a
    /// separate failure mode.
    fn read_layout(&self, name: &str) -> Result<String, LayoutError> {
        let path = self.dir.join(Self::filename(name));
        let mut file = fs::File::open(&path).map_err(|source| LayoutError::FileAccess {
            name: name.to_string(),
            path: path.clone(),
            source,
        })?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|source| LayoutError::FileRead {
                name: name.to_string(),
                path,
                source,
            })?;
        Ok(content)
    }

    /// The cache duration in effect for this lookup, in seconds
    fn cache_duration(&self) -> f64 {
        match self.duration_override {
            Some(secs) => secs,
            None => duration_from(
                env::var(CACHE_ENV).ok().as_deref(),
                env::var(MODE_ENV).map_or(false, |mode| mode == "production"),
            ),
        }
    }

    fn cache_lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolve the cache duration from an override value and the execution
/// mode: a parseable override wins (including `0`, which disables the
/// cache), anything else falls back to the mode default.
fn duration_from(override_secs: Option<&str>, production: bool) -> f64 {
    let fallback = if production { PRODUCTION_CACHE_SECS } else { 0.0 };
    override_secs
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(fallback)
}
