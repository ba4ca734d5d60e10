//! Bounded, version-keyed artifact cache.
//!
//! Entries are handed out as `Arc`s, so evicting a version never invalidates
//! a request that already holds it. The lock is only held for map lookups.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::{debug, info};

use crate::artifact::bundle::ArtifactBundle;
use crate::error::ForecastError;

pub const DEFAULT_CAPACITY: usize = 4;

struct CacheState {
    entries: LruCache<String, Arc<ArtifactBundle>>,
    default_version: Option<String>,
}

pub struct ModelCache {
    state: Mutex<CacheState>,
}

impl ModelCache {
    pub fn new(capacity: usize) -> Result<Self, ForecastError> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| ForecastError::unsupported("cache capacity", capacity, "must be >= 1"))?;
        Ok(Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                default_version: None,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are immutable once inserted, so a poisoned lock is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cache a bundle. The first bundle inserted becomes the default version.
    ///
    /// Re-inserting a cached version returns the existing entry unchanged.
    pub fn insert(&self, bundle: ArtifactBundle) -> Arc<ArtifactBundle> {
        let version = bundle.version().to_string();
        let mut state = self.lock();
        if let Some(existing) = state.entries.get(&version) {
            debug!(%version, "artifact already cached");
            return Arc::clone(existing);
        }

        let entry = Arc::new(bundle);
        if let Some((evicted, _)) = state.entries.push(version.clone(), Arc::clone(&entry)) {
            info!(%evicted, "evicted least recently used artifact");
        }
        if state.default_version.is_none() {
            state.default_version = Some(version.clone());
        }
        info!(%version, cached = state.entries.len(), "artifact cached");
        entry
    }

    /// Fetch a version, or the default version when `version` is `None`.
    pub fn get(&self, version: Option<&str>) -> Result<Arc<ArtifactBundle>, ForecastError> {
        let mut state = self.lock();
        let key = match version {
            Some(v) => v.to_string(),
            None => state.default_version.clone().ok_or_else(|| ForecastError::ModelUnavailable {
                version: "<default>".into(),
                reason: "no artifact has been loaded".into(),
            })?,
        };
        let entry = state.entries.get(&key).map(Arc::clone);
        entry.ok_or_else(|| ForecastError::ModelUnavailable {
            version: key,
            reason: "version is not cached (never loaded or evicted)".into(),
        })
    }

    pub fn set_default(&self, version: &str) -> Result<(), ForecastError> {
        let mut state = self.lock();
        if !state.entries.contains(version) {
            return Err(ForecastError::ModelUnavailable {
                version: version.to_string(),
                reason: "cannot make an uncached version the default".into(),
            });
        }
        state.default_version = Some(version.to_string());
        Ok(())
    }

    pub fn default_version(&self) -> Option<String> {
        self.lock().default_version.clone()
    }

    pub fn contains(&self, version: &str) -> bool {
        self.lock().entries.contains(version)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached versions, most recently used first.
    pub fn versions(&self) -> Vec<String> {
        self.lock().entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN)),
                default_version: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::bundle::ArtifactMetadata;
    use crate::bvar::{BvarDiagnostics, BvarModel};
    use crate::lp::{BootstrapScheme, HorizonEstimate, LpModel, PenaltyChoice};
    use chrono::{NaiveDate, TimeZone, Utc};
    use nalgebra::DMatrix;

    fn bundle(version: &str) -> ArtifactBundle {
        let bvar = BvarModel::from_parts(
            vec!["f".into(), "d".into()],
            1,
            DMatrix::from_row_slice(2, 3, &[0.0, 0.5, 0.0, 0.0, 0.3, 0.4]),
            DMatrix::identity(2, 2),
            DMatrix::zeros(1, 2),
            vec![0, 1],
            BvarDiagnostics::default(),
        )
        .unwrap();
        let lp = LpModel {
            foreign: "f".into(),
            domestic: "d".into(),
            lags: 1,
            penalty: PenaltyChoice::Fixed { lambda: 0.0 },
            bootstrap: BootstrapScheme::Pairs,
            horizons: vec![HorizonEstimate::Unavailable { horizon: 1, reason: "test".into() }],
        };
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let metadata = ArtifactMetadata {
            version: version.into(),
            training_fingerprint: "abc".into(),
            trained_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            n_obs: 10,
            foreign: "f".into(),
            domestic: "d".into(),
            sample_start: date,
            sample_end: date,
        };
        ArtifactBundle::new(metadata, bvar, lp).unwrap()
    }

    #[test]
    fn first_insert_is_default() {
        let cache = ModelCache::new(2).unwrap();
        cache.insert(bundle("v1"));
        cache.insert(bundle("v2"));
        assert_eq!(cache.get(None).unwrap().version(), "v1");
        cache.set_default("v2").unwrap();
        assert_eq!(cache.get(None).unwrap().version(), "v2");
        assert_eq!(cache.versions(), vec!["v2".to_string(), "v1".to_string()]);
    }

    #[test]
    fn eviction_keeps_held_references_alive() {
        let cache = ModelCache::new(1).unwrap();
        let held = cache.insert(bundle("v1"));
        cache.insert(bundle("v2"));
        assert!(!cache.contains("v1"));
        assert_eq!(held.version(), "v1");
        assert!(matches!(
            cache.get(Some("v1")),
            Err(ForecastError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn reinsert_returns_existing_entry() {
        let cache = ModelCache::new(2).unwrap();
        let a = cache.insert(bundle("v1"));
        let b = cache.insert(bundle("v1"));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_version_and_zero_capacity() {
        assert!(ModelCache::new(0).is_err());
        let cache = ModelCache::default();
        assert!(matches!(cache.get(None), Err(ForecastError::ModelUnavailable { .. })));
        assert!(matches!(
            cache.get(Some("nope")),
            Err(ForecastError::ModelUnavailable { .. })
        ));
    }
}
