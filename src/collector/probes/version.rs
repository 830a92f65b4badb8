//! Server version with a two-tier fallback.
//!
//! Newer servers expose id code, build type and inner version on
//! `V$INSTANCE`. Older ones only offer a version string, whose query shape
//! depends on whether `V$INSTANCE` has a `BUILD_VERSION` column. Whichever
//! form succeeded is cached as a tagged [`VersionSnapshot`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::sql;
use crate::collector::coerce::string_or_empty;
use crate::collector::executor::QueryError;
use crate::collector::sample::{MetricDescriptor, SampleSink};
use crate::collector::traits::{Probe, ProbeContext, ProbeError, ProbeGroup};

pub const DMDBMS_VERSION: &str = "dmdbms_version";

const BANNER_PREFIX: &str = "DM Database Server";

/// Cached version detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum VersionSnapshot {
    /// Full detail from the newer schema.
    Detailed {
        id_code: String,
        build_type: String,
        inner_ver: String,
    },
    /// Only a normalized version string is available.
    Coarse { version: String },
}

impl VersionSnapshot {
    fn label_values(&self) -> [&str; 3] {
        match self {
            Self::Detailed {
                id_code,
                build_type,
                inner_ver,
            } => [id_code.as_str(), build_type.as_str(), inner_ver.as_str()],
            Self::Coarse { version } => [version.as_str(), "", ""],
        }
    }
}

/// Strip line breaks and the server banner from a version string.
pub fn normalize_version(raw: &str) -> String {
    raw.replace(['\n', '\r'], "")
        .replace(BANNER_PREFIX, "")
        .trim()
        .to_string()
}

pub struct VersionProbe {
    desc: Arc<MetricDescriptor>,
}

impl VersionProbe {
    pub fn new() -> Self {
        Self {
            desc: MetricDescriptor::gauge(DMDBMS_VERSION, "Information about DM database version",
                &["host_name", "db_version_str", "build_type", "inner_ver"]),
        }
    }

    async fn detailed(&self, ctx: &ProbeContext) -> Result<Option<VersionSnapshot>, QueryError> {
        let rows = ctx
            .executor()
            .execute(ctx.deadline(), sql::VERSION_DETAILED, |row| {
                Ok(VersionSnapshot::Detailed {
                    id_code: string_or_empty(row.text(0)?),
                    build_type: string_or_empty(row.text(1)?),
                    inner_ver: string_or_empty(row.text(2)?),
                })
            })
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn coarse(&self, ctx: &ProbeContext) -> Result<VersionSnapshot, ProbeError> {
        let executor = ctx.executor();
        let deadline = ctx.deadline();

        let position = executor.fetch_int(deadline, sql::VERSION_HAS_BUILD_COLUMN).await?;
        let query = if position.unwrap_or(0) > 0 {
            sql::VERSION_WITH_BUILD
        } else {
            sql::VERSION_BANNER
        };

        let raw = executor
            .fetch_text(deadline, query)
            .await?
            .ok_or_else(|| ProbeError::NoRows { sql: query.to_string() })?;
        let version = normalize_version(&raw);
        tracing::info!(version = %version, "Resolved database version from legacy query");
        Ok(VersionSnapshot::Coarse { version })
    }
}

#[async_trait]
impl Probe for VersionProbe {
    fn name(&self) -> &'static str {
        "version"
    }

    fn group(&self) -> ProbeGroup {
        ProbeGroup::Database
    }

    fn descriptors(&self) -> Vec<Arc<MetricDescriptor>> {
        vec![Arc::clone(&self.desc)]
    }

    async fn collect(&self, ctx: &ProbeContext, sink: &mut SampleSink) -> Result<(), ProbeError> {
        let key = ctx.cache_key(DMDBMS_VERSION);
        let snapshot = match ctx.results().get_json::<VersionSnapshot>(&key) {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = match self.detailed(ctx).await {
                    Ok(Some(snapshot)) => snapshot,
                    Ok(None) | Err(_) => {
                        tracing::warn!("Detailed version query unavailable, falling back to legacy query");
                        self.coarse(ctx).await?
                    }
                };
                ctx.results().set_json(&key, &snapshot, ctx.cache_ttl());
                snapshot
            }
        };

        let [version, build_type, inner_ver] = snapshot.label_values();
        sink.emit(&self.desc, [ctx.host_name(), version, build_type, inner_ver], 1.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::cache::ResultCache;
    use crate::collector::capability::CapabilityCache;
    use crate::collector::executor::QueryExecutor;
    use crate::collector::testing::ScriptedSource;
    use crate::collector::traits::EngineConfig;
    use crate::row;
    use crate::storage::SourceError;
    use std::time::Duration;

    fn context(source: Arc<ScriptedSource>) -> ProbeContext {
        ProbeContext::new(
            QueryExecutor::new(source, Duration::from_secs(1)),
            Arc::new(CapabilityCache::default()),
            Arc::new(ResultCache::new()),
            &EngineConfig {
                host_name: Some("db-01".into()),
                ..EngineConfig::default()
            },
        )
    }

    #[test]
    fn test_normalize_version() {
        assert_eq!(normalize_version("DM Database Server 08.1.2.100"), "08.1.2.100");
        assert_eq!(normalize_version("DM Database Server 64 V8\n 1-2-18"), "64 V8 1-2-18");
        assert_eq!(normalize_version("  V8.1.3.62  "), "V8.1.3.62");
    }

    #[test]
    fn test_snapshot_encoding_is_tagged() {
        let json = serde_json::to_string(&VersionSnapshot::Coarse { version: "8".into() }).unwrap();
        assert_eq!(json, r#"{"form":"coarse","version":"8"}"#);
    }

    #[tokio::test]
    async fn test_detailed_version() {
        let source = Arc::new(
            ScriptedSource::new("db1").with_rows("ID_CODE, BUILD_TYPE", vec![row!["1-3-62", "Release", "V8"]]),
        );
        let ctx = context(source.clone());

        let mut sink = SampleSink::new("version");
        VersionProbe::new().collect(&ctx, &mut sink).await.unwrap();
        assert_eq!(sink.samples()[0].labels, vec!["db-01", "1-3-62", "Release", "V8"]);

        // Served from cache on the next cycle.
        let mut sink = SampleSink::new("version");
        VersionProbe::new().collect(&ctx, &mut sink).await.unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(source.calls("ID_CODE, BUILD_TYPE"), 1);
    }

    #[tokio::test]
    async fn test_fallback_uses_build_column_when_present() {
        let source = Arc::new(
            ScriptedSource::new("db1")
                .with_error("ID_CODE, BUILD_TYPE", SourceError::Query("invalid column".into()))
                .with_rows("TABLEDEF", vec![row![12_i64]])
                .with_rows("SVR_VERSION", vec![row!["V8-2023.05"]]),
        );
        let ctx = context(source.clone());

        let mut sink = SampleSink::new("version");
        VersionProbe::new().collect(&ctx, &mut sink).await.unwrap();
        assert_eq!(sink.samples()[0].labels, vec!["db-01", "V8-2023.05", "", ""]);

        let cached: VersionSnapshot = ctx.results().get_json("db1:dmdbms_version").unwrap();
        assert_eq!(cached, VersionSnapshot::Coarse { version: "V8-2023.05".into() });
    }

    #[tokio::test]
    async fn test_every_tier_failing_is_error() {
        let source = Arc::new(
            ScriptedSource::new("db1")
                .with_error("ID_CODE, BUILD_TYPE", SourceError::Query("invalid column".into()))
                .with_rows("TABLEDEF", vec![row![0_i64]])
                .with_rows("V$VERSION", vec![]),
        );
        let ctx = context(source);

        let mut sink = SampleSink::new("version");
        let err = VersionProbe::new().collect(&ctx, &mut sink).await.unwrap_err();
        assert!(matches!(err, ProbeError::NoRows { .. }));
        assert!(sink.is_empty());
        assert!(ctx.results().get("db1:dmdbms_version").is_none());
    }
}
