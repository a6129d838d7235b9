use crate::domain::model::{AdapterKind, PackageRecord};
use crate::domain::ports::RecordAdapter;
use crate::utils::error::{Result, TallyError};
use semver::Version;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

pub fn build_adapter(kind: AdapterKind) -> Arc<dyn RecordAdapter> {
    match kind {
        AdapterKind::Flat => Arc::new(FlatAdapter::default()),
        AdapterKind::Registry => Arc::new(RegistryRowAdapter),
    }
}

fn shape_error(message: impl Into<String>) -> TallyError {
    TallyError::DecodeError {
        message: message.into(),
    }
}

/// Records shaped `{"name": ..., "dependencies": ...}` where dependencies are
/// either an array of names or an object keyed by name (the package.json
/// encoding). A missing or wrongly-typed dependencies field decodes as the
/// empty set; a missing name does not decode at all.
#[derive(Debug, Clone)]
pub struct FlatAdapter {
    pub name_key: String,
    pub dependencies_key: String,
}

impl Default for FlatAdapter {
    fn default() -> Self {
        Self {
            name_key: "name".to_string(),
            dependencies_key: "dependencies".to_string(),
        }
    }
}

impl RecordAdapter for FlatAdapter {
    fn decode(&self, raw: &[u8]) -> Result<PackageRecord> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| shape_error(e.to_string()))?;
        let name = value
            .get(&self.name_key)
            .and_then(Value::as_str)
            .ok_or_else(|| shape_error(format!("missing string field `{}`", self.name_key)))?
            .to_string();

        let dependencies = match value.get(&self.dependencies_key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            // Anything else is treated as "declares no dependencies".
            _ => BTreeSet::new(),
        };

        Ok(PackageRecord { name, dependencies })
    }
}

#[derive(Debug, Deserialize)]
struct RegistryRow {
    id: String,
    #[serde(default)]
    doc: RegistryDoc,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryDoc {
    #[serde(rename = "dist-tags", default)]
    dist_tags: DistTags,
    #[serde(default)]
    versions: serde_json::Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
struct DistTags {
    #[serde(default)]
    latest: Option<String>,
}

/// Raw registry export rows: `{"id": ..., "doc": {"dist-tags": ...,
/// "versions": {...}}}`. Takes the dependency object of the latest version.
pub struct RegistryRowAdapter;

impl RegistryRowAdapter {
    /// Latest-version policy, in order: the `dist-tags.latest` pointer when
    /// it names a real version; the maximum non-prerelease semver among the
    /// version keys (maximum overall when everything is a prerelease); and
    /// when the keys do not all parse as semver, the last key in document
    /// order.
    fn latest_version<'a>(doc: &'a RegistryDoc) -> Result<&'a str> {
        if doc.versions.is_empty() {
            return Err(shape_error("package has no versions"));
        }

        if let Some(latest) = &doc.dist_tags.latest {
            if doc.versions.contains_key(latest) {
                return Ok(latest);
            }
        }

        let mut parsed: Vec<(&str, Version)> = Vec::with_capacity(doc.versions.len());
        for key in doc.versions.keys() {
            match Version::parse(key) {
                Ok(v) => parsed.push((key, v)),
                // Registry does not enforce semver; fall back to document order.
                Err(_) => return Ok(doc.versions.keys().next_back().expect("non-empty")),
            }
        }

        let best = parsed
            .iter()
            .filter(|(_, v)| v.pre.is_empty())
            .max_by(|a, b| a.1.cmp(&b.1))
            .or_else(|| parsed.iter().max_by(|a, b| a.1.cmp(&b.1)))
            .expect("non-empty");
        Ok(best.0)
    }
}

impl RecordAdapter for RegistryRowAdapter {
    fn decode(&self, raw: &[u8]) -> Result<PackageRecord> {
        let row: RegistryRow =
            serde_json::from_slice(raw).map_err(|e| shape_error(e.to_string()))?;
        let latest = Self::latest_version(&row.doc)?;

        let dependencies = match row.doc.versions.get(latest) {
            Some(Value::Object(version)) => match version.get("dependencies") {
                Some(Value::Object(deps)) => deps.keys().cloned().collect(),
                _ => BTreeSet::new(),
            },
            _ => BTreeSet::new(),
        };

        Ok(PackageRecord {
            name: row.id,
            dependencies,
        })
    }
}
