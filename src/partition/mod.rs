//! Namespace and id-prefix derivation
//!
//! Every ingestion or query call resolves a [`PartitionKey`] from its intent
//! (mode, tenant, subject) so tenants and knowledge domains never collide.
//! Identity- and tenant-scoped data share one namespace per mode, segmented
//! by metadata and id-prefix, so the index scales with document count rather
//! than tenant count. Shared knowledge domains get a genuine namespace per
//! subject so unrelated subjects never cross-contaminate retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{Result, VellumError};

/// Ingestion/query intent parsed from an opaque mode string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestMode {
    /// Identity-scoped: content belongs to exactly one tenant and is fully
    /// replaced on re-upload.
    Resume,
    /// Shared knowledge domain, intentionally visible to every tenant
    /// querying that subject.
    Custom,
    /// Any other mode: tenant-scoped content in a per-mode namespace.
    Scoped(String),
}

impl IngestMode {
    pub fn parse(mode: &str) -> Result<Self> {
        let mode = mode.trim();
        if mode.is_empty() {
            return Err(VellumError::Validation("mode must not be empty".into()));
        }
        Ok(match mode {
            "resume" => IngestMode::Resume,
            "custom" => IngestMode::Custom,
            other => IngestMode::Scoped(other.to_string()),
        })
    }

    /// Identity-scoped modes are fully replaced on re-upload and always
    /// queried with a tenant security filter.
    pub fn is_identity_scoped(&self) -> bool {
        matches!(self, IngestMode::Resume)
    }

    /// Shared domains are the only modes queried without a tenant filter.
    pub fn is_shared(&self) -> bool {
        matches!(self, IngestMode::Custom)
    }

    pub fn as_str(&self) -> &str {
        match self {
            IngestMode::Resume => "resume",
            IngestMode::Custom => "custom",
            IngestMode::Scoped(m) => m,
        }
    }
}

/// How re-ingestion derives record ids. Deployment policy, not a guess:
/// `Overwrite` keeps ordinal-based ids so identical text lands on identical
/// ids; `TimestampSuffix` makes every upload unique so a new write can never
/// collide with a pending delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReingestPolicy {
    #[default]
    Overwrite,
    #[serde(rename = "timestamp")]
    TimestampSuffix,
}

/// The derived `(namespace, id_prefix)` pair encoding multi-tenancy and
/// knowledge-domain isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionKey {
    pub namespace: String,
    pub id_prefix: String,
}

impl PartitionKey {
    /// Record id for the chunk at `ordinal`.
    pub fn record_id(&self, ordinal: usize) -> String {
        format!("{}_chunk_{}", self.id_prefix, ordinal)
    }

    /// Well-known id of the document-identity anchor chunk.
    pub fn anchor_id(&self) -> String {
        self.record_id(0)
    }
}

/// Derive the partition for one ingestion or query call.
///
/// | mode | namespace | id_prefix |
/// |---|---|---|
/// | resume | `global-resumes` | `resume_{tenant}` (+ millisecond suffix under [`ReingestPolicy::TimestampSuffix`]) |
/// | custom | `global-{subject or "general"}` | `{subject or "general"}` |
/// | other | `global-{mode}` | `{mode}_{tenant}` |
pub fn resolve_partition(
    mode: &IngestMode,
    tenant_id: &str,
    subject_id: Option<&str>,
    policy: ReingestPolicy,
) -> Result<PartitionKey> {
    let tenant_id = tenant_id.trim();
    if !mode.is_shared() && tenant_id.is_empty() {
        return Err(VellumError::Validation(format!(
            "tenant id is required for mode '{}'",
            mode.as_str()
        )));
    }

    let key = match mode {
        IngestMode::Resume => {
            let id_prefix = match policy {
                ReingestPolicy::Overwrite => format!("resume_{tenant_id}"),
                ReingestPolicy::TimestampSuffix => format!(
                    "resume_{tenant_id}_{}",
                    chrono::Utc::now().timestamp_millis()
                ),
            };
            PartitionKey {
                namespace: "global-resumes".to_string(),
                id_prefix,
            }
        }
        IngestMode::Custom => {
            let subject = subject_id
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("general");
            let id_prefix = match policy {
                ReingestPolicy::Overwrite => subject.to_string(),
                ReingestPolicy::TimestampSuffix => {
                    format!("{subject}_{}", chrono::Utc::now().timestamp_millis())
                }
            };
            PartitionKey {
                namespace: format!("global-{subject}"),
                id_prefix,
            }
        }
        IngestMode::Scoped(m) => PartitionKey {
            namespace: format!("global-{m}"),
            id_prefix: format!("{m}_{tenant_id}"),
        },
    };

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_modes() {
        assert_eq!(IngestMode::parse("resume").unwrap(), IngestMode::Resume);
        assert_eq!(IngestMode::parse("custom").unwrap(), IngestMode::Custom);
        assert_eq!(
            IngestMode::parse("qa").unwrap(),
            IngestMode::Scoped("qa".to_string())
        );
        assert!(IngestMode::parse("  ").is_err());
    }

    #[test]
    fn resume_policy_table() {
        let key = resolve_partition(&IngestMode::Resume, "u1", None, ReingestPolicy::Overwrite)
            .unwrap();
        assert_eq!(key.namespace, "global-resumes");
        assert_eq!(key.id_prefix, "resume_u1");
        assert_eq!(key.record_id(3), "resume_u1_chunk_3");
    }

    #[test]
    fn resume_prefix_differs_per_tenant() {
        let a = resolve_partition(&IngestMode::Resume, "u1", None, ReingestPolicy::Overwrite)
            .unwrap();
        let b = resolve_partition(&IngestMode::Resume, "u2", None, ReingestPolicy::Overwrite)
            .unwrap();
        assert_eq!(a.namespace, b.namespace);
        assert_ne!(a.id_prefix, b.id_prefix);
    }

    #[test]
    fn timestamp_policy_makes_unique_prefixes() {
        let key =
            resolve_partition(&IngestMode::Resume, "u1", None, ReingestPolicy::TimestampSuffix)
                .unwrap();
        assert!(key.id_prefix.starts_with("resume_u1_"));
        assert!(key.id_prefix.len() > "resume_u1_".len());
    }

    #[test]
    fn custom_namespace_ignores_tenant() {
        let a = resolve_partition(
            &IngestMode::Custom,
            "u1",
            Some("geo"),
            ReingestPolicy::Overwrite,
        )
        .unwrap();
        let b = resolve_partition(
            &IngestMode::Custom,
            "u2",
            Some("geo"),
            ReingestPolicy::Overwrite,
        )
        .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.namespace, "global-geo");
        assert_eq!(a.id_prefix, "geo");
    }

    #[test]
    fn custom_timestamp_policy_appends_instead_of_overwriting() {
        let key = resolve_partition(
            &IngestMode::Custom,
            "",
            Some("geo"),
            ReingestPolicy::TimestampSuffix,
        )
        .unwrap();
        assert_eq!(key.namespace, "global-geo");
        assert!(key.id_prefix.starts_with("geo_"));
    }

    #[test]
    fn custom_without_subject_falls_back_to_general() {
        let key =
            resolve_partition(&IngestMode::Custom, "", None, ReingestPolicy::Overwrite).unwrap();
        assert_eq!(key.namespace, "global-general");
        assert_eq!(key.id_prefix, "general");
    }

    #[test]
    fn other_modes_are_tenant_scoped() {
        let mode = IngestMode::parse("qa").unwrap();
        let key = resolve_partition(&mode, "u7", None, ReingestPolicy::Overwrite).unwrap();
        assert_eq!(key.namespace, "global-qa");
        assert_eq!(key.id_prefix, "qa_u7");
    }

    #[test]
    fn tenant_required_for_non_shared_modes() {
        assert!(resolve_partition(&IngestMode::Resume, "", None, ReingestPolicy::Overwrite)
            .is_err());
        let mode = IngestMode::parse("qa").unwrap();
        assert!(resolve_partition(&mode, "  ", None, ReingestPolicy::Overwrite).is_err());
    }

    #[test]
    fn anchor_id_is_first_chunk() {
        let key = resolve_partition(
            &IngestMode::Custom,
            "",
            Some("geo"),
            ReingestPolicy::Overwrite,
        )
        .unwrap();
        assert_eq!(key.anchor_id(), "geo_chunk_0");
    }
}
