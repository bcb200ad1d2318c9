//! Detection source loading.
//!
//! Detectors are not linked at build time. A pattern pack is fetched from a
//! configured source, parsed, compiled, and turned into a [`DetectorFactory`]
//! that instantiates a [`Detector`] for a given option set. Nothing is
//! evaluated: packs are data only.
//!
//! The fetched source text is cached by the loader, so changing detector
//! options only re-instantiates. [`DetectorLoader::reload`] drops the cache.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::detector::{
    builtin_pack, CompiledPattern, Detector, DetectorOptions, PatternDetector, PatternPack,
};

/// Errors raised while loading a pattern pack.
///
/// The loader never retries; every variant is final for the call that raised it.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source could not be fetched or read.
    #[error("failed to fetch detection patterns from {location}: {message}")]
    Fetch {
        /// Where the pack was fetched from.
        location: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The source was fetched but is not a valid pack.
    #[error("malformed detection patterns from {location}: {message}")]
    Malformed {
        /// Where the pack was fetched from.
        location: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The pack does not export any patterns.
    #[error("detection patterns from {location} export no patterns")]
    MissingExport {
        /// Where the pack was fetched from.
        location: String,
    },
}

/// Where a pattern pack comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DetectorSource {
    /// The pack compiled into this crate.
    #[default]
    Builtin,
    /// A pack fetched over HTTP(S).
    Url(String),
    /// A pack read from the local file system.
    File(PathBuf),
}

impl FromStr for DetectorSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(if s.is_empty() || s.eq_ignore_ascii_case("builtin") {
            Self::Builtin
        } else if s.starts_with("http://") || s.starts_with("https://") {
            Self::Url(s.to_string())
        } else {
            Self::File(PathBuf::from(s.strip_prefix("file://").unwrap_or(s)))
        })
    }
}

impl std::fmt::Display for DetectorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin => write!(f, "builtin"),
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl Serialize for DetectorSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DetectorSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// Instantiates detectors from a loaded pack.
#[derive(Debug, Clone)]
pub struct DetectorFactory {
    pack_name: String,
    version: Option<String>,
    fingerprint: String,
    patterns: Arc<[CompiledPattern]>,
}

impl DetectorFactory {
    /// Parse and compile a pack from its source text.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Malformed`] if the text is not a valid pack or a
    /// pattern fails to compile, and [`LoadError::MissingExport`] if the pack
    /// has no patterns.
    pub fn from_source_text(location: &str, text: &str) -> Result<Self, LoadError> {
        let malformed = |message: String| LoadError::Malformed {
            location: location.to_string(),
            message,
        };

        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| malformed(e.to_string()))?;
        let has_patterns = value
            .get("patterns")
            .and_then(serde_json::Value::as_array)
            .is_some_and(|patterns| !patterns.is_empty());
        if !has_patterns {
            return Err(LoadError::MissingExport {
                location: location.to_string(),
            });
        }

        let pack: PatternPack =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        let patterns = pack
            .patterns
            .iter()
            .map(|spec| {
                spec.compile()
                    .map_err(|e| malformed(format!("pattern '{}': {e}", spec.name)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pack_name: pack.name,
            version: pack.version,
            fingerprint: blake3::hash(text.as_bytes()).to_string(),
            patterns: patterns.into(),
        })
    }

    /// Instantiate a detector for `options`.
    #[must_use]
    pub fn configure(&self, options: DetectorOptions) -> Arc<dyn Detector> {
        Arc::new(PatternDetector::new(
            self.pack_name.clone(),
            Arc::clone(&self.patterns),
            options,
        ))
    }

    /// Name of the loaded pack.
    #[must_use]
    pub fn pack_name(&self) -> &str {
        &self.pack_name
    }

    /// Version of the loaded pack, if published.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// BLAKE3 hash of the pack source text.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// All compiled patterns in the pack.
    #[must_use]
    pub fn patterns(&self) -> &[CompiledPattern] {
        &self.patterns
    }
}

/// Fetches pattern packs and caches their source text.
#[derive(Debug)]
pub struct DetectorLoader {
    source: DetectorSource,
    http: reqwest::Client,
    cached: Mutex<Option<Arc<str>>>,
}

impl DetectorLoader {
    /// Create a loader for `source`.
    #[must_use]
    pub fn new(source: DetectorSource) -> Self {
        Self::with_client(source, reqwest::Client::new())
    }

    /// Create a loader that fetches URLs with a preconfigured client.
    #[must_use]
    pub fn with_client(source: DetectorSource, http: reqwest::Client) -> Self {
        Self {
            source,
            http,
            cached: Mutex::new(None),
        }
    }

    /// The configured source.
    #[must_use]
    pub fn source(&self) -> &DetectorSource {
        &self.source
    }

    /// Load the pack, fetching it only if no source text is cached.
    ///
    /// Source text is cached only after it parses successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if the pack cannot be fetched, parsed, or compiled.
    pub async fn load(&self) -> Result<DetectorFactory, LoadError> {
        let location = self.source.to_string();
        let mut cached = self.cached.lock().await;

        if let Some(text) = cached.as_ref() {
            debug!(source = %location, "Instantiating from cached detection patterns");
            return DetectorFactory::from_source_text(&location, text);
        }

        let text: Arc<str> = self.fetch().await?.into();
        let factory = DetectorFactory::from_source_text(&location, &text)
            .inspect_err(|e| warn!(source = %location, error = %e, "Pattern pack rejected"))?;
        *cached = Some(text);

        info!(
            source = %location,
            pack = %factory.pack_name(),
            patterns = factory.patterns().len(),
            fingerprint = %factory.fingerprint(),
            "Loaded detection patterns"
        );
        Ok(factory)
    }

    /// Drop the cached source text and load again.
    ///
    /// # Errors
    ///
    /// Returns an error if the pack cannot be fetched, parsed, or compiled.
    pub async fn reload(&self) -> Result<DetectorFactory, LoadError> {
        self.cached.lock().await.take();
        self.load().await
    }

    /// Check if source text is cached.
    pub async fn is_cached(&self) -> bool {
        self.cached.lock().await.is_some()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        let location = self.source.to_string();
        let fetch_error = |message: String| LoadError::Fetch {
            location: location.clone(),
            message,
        };

        match &self.source {
            DetectorSource::Builtin => serde_json::to_string(&builtin_pack())
                .map_err(|e| fetch_error(e.to_string())),
            DetectorSource::Url(url) => {
                let response = self
                    .http
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(fetch_error(format!("HTTP {status}")));
                }
                response
                    .text()
                    .await
                    .map_err(|e| fetch_error(e.to_string()))
            }
            DetectorSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| fetch_error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CUSTOM_PACK: &str = r#"{
        "name": "custom",
        "version": "2.0.0",
        "patterns": [
            {"name": "ticket", "kind": "TICKET", "category": "secrets", "pattern": "TCK-\\d{4}"}
        ]
    }"#;

    fn write_pack(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_source_from_str() {
        assert_eq!(
            "builtin".parse::<DetectorSource>().unwrap(),
            DetectorSource::Builtin
        );
        assert_eq!(
            "".parse::<DetectorSource>().unwrap(),
            DetectorSource::Builtin
        );
        assert_eq!(
            "https://example.com/lib/patterns.json"
                .parse::<DetectorSource>()
                .unwrap(),
            DetectorSource::Url("https://example.com/lib/patterns.json".to_string())
        );
        assert_eq!(
            "file:///etc/patterns.json"
                .parse::<DetectorSource>()
                .unwrap(),
            DetectorSource::File(PathBuf::from("/etc/patterns.json"))
        );
        assert_eq!(
            "./patterns.json".parse::<DetectorSource>().unwrap(),
            DetectorSource::File(PathBuf::from("./patterns.json"))
        );
    }

    #[test]
    fn test_source_serde_as_string() {
        let json = serde_json::to_string(&DetectorSource::Builtin).unwrap();
        assert_eq!(json, "\"builtin\"");
        let source: DetectorSource = serde_json::from_str("\"http://localhost/p.json\"").unwrap();
        assert!(matches!(source, DetectorSource::Url(_)));
    }

    #[test]
    fn test_factory_from_custom_pack() {
        let factory = DetectorFactory::from_source_text("test", CUSTOM_PACK).unwrap();
        assert_eq!(factory.pack_name(), "custom");
        assert_eq!(factory.version(), Some("2.0.0"));
        assert_eq!(factory.patterns().len(), 1);
        assert_eq!(factory.fingerprint().len(), 64);
    }

    #[test]
    fn test_factory_rejects_invalid_json() {
        let err = DetectorFactory::from_source_text("test", "function() {").unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn test_factory_rejects_invalid_regex() {
        let pack = r#"{
            "name": "bad",
            "patterns": [
                {"name": "broken", "kind": "X", "category": "secrets", "pattern": "[unclosed"}
            ]
        }"#;
        let err = DetectorFactory::from_source_text("test", pack).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_factory_requires_patterns_export() {
        let err = DetectorFactory::from_source_text("test", r#"{"name":"empty"}"#).unwrap_err();
        assert!(matches!(err, LoadError::MissingExport { .. }));

        let err = DetectorFactory::from_source_text("test", r#"{"name":"empty","patterns":[]}"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingExport { .. }));
    }

    #[test]
    fn test_fingerprint_changes_with_source() {
        let a = DetectorFactory::from_source_text("a", CUSTOM_PACK).unwrap();
        let b = DetectorFactory::from_source_text("b", &CUSTOM_PACK.replace("2.0.0", "2.0.1"))
            .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[tokio::test]
    async fn test_load_builtin() {
        let loader = DetectorLoader::new(DetectorSource::Builtin);
        let factory = loader.load().await.unwrap();
        assert_eq!(factory.pack_name(), crate::detector::BUILTIN_PACK_NAME);
        assert!(loader.is_cached().await);
    }

    #[tokio::test]
    async fn test_load_file_and_configure() {
        let file = write_pack(CUSTOM_PACK);
        let loader = DetectorLoader::new(DetectorSource::File(file.path().to_path_buf()));

        let factory = loader.load().await.unwrap();
        let detector = factory.configure(DetectorOptions::default());
        let output = detector.detect("see TCK-1234").await.unwrap();
        assert_eq!(output.detections.len(), 1);
        assert_eq!(output.detections[0].kind.as_deref(), Some("TICKET"));
    }

    #[tokio::test]
    async fn test_load_reuses_cached_source() {
        let file = write_pack(CUSTOM_PACK);
        let path = file.path().to_path_buf();
        let loader = DetectorLoader::new(DetectorSource::File(path.clone()));

        let first = loader.load().await.unwrap();
        std::fs::write(&path, "not json").unwrap();

        // cached text is reused; the file is not read again
        let second = loader.load().await.unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());

        // reload refetches and surfaces the broken file
        let err = loader.reload().await.unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
        assert!(!loader.is_cached().await);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let loader = DetectorLoader::new(DetectorSource::File(PathBuf::from(
            "/nonexistent/patterns.json",
        )));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
        assert!(!loader.is_cached().await);
    }

    #[tokio::test]
    async fn test_load_unreachable_url() {
        let loader = DetectorLoader::new(DetectorSource::Url(
            "http://127.0.0.1:1/lib/patterns.json".to_string(),
        ));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
    }
}
