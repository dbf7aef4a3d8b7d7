//! Kind to resource descriptor table
//!
//! Rendered manifests name their type by `kind` and `apiVersion`, while the
//! cluster API addresses collections by resource name (`deployments`). The
//! table is filled once from the cluster's advertised resource list by the
//! caller and is never invalidated afterwards.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::resource::{GroupVersion, ResourceSpec};

/// One advertised API resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Plural resource name, e.g. `deployments`
    pub name: String,
    pub kind: String,
    /// Empty for the core group
    #[serde(default)]
    pub group: String,
    pub version: String,
    #[serde(default)]
    pub namespaced: bool,
}

/// Fully qualified address of a resource collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupVersionResource {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub namespaced: bool,
}

/// Descriptors indexed by kind
#[derive(Debug, Clone, Default)]
pub struct ApiResources {
    by_kind: HashMap<String, Vec<ResourceDescriptor>>,
}

impl ApiResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ResourceDescriptor>) -> Self {
        let mut table = Self::new();
        for descriptor in descriptors {
            table.insert(descriptor);
        }
        table
    }

    /// Register a descriptor. A descriptor equal to an existing one is ignored.
    pub fn insert(&mut self, descriptor: ResourceDescriptor) {
        let entries = self.by_kind.entry(descriptor.kind.clone()).or_default();
        if !entries.contains(&descriptor) {
            entries.push(descriptor);
        }
    }

    pub fn get(&self, kind: &str) -> &[ResourceDescriptor] {
        self.by_kind.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    /// Resolve a manifest to exactly one resource collection
    ///
    /// Candidates are narrowed by the manifest's API group when it has an
    /// `apiVersion`; the version in the result is the manifest's own.
    pub fn resolve(&self, spec: &ResourceSpec) -> Result<GroupVersionResource> {
        let kind = spec.kind().ok_or_else(|| CoreError::Discovery {
            kind: String::new(),
            message: "manifest has no kind".to_string(),
        })?;

        let requested = spec.group_version().transpose()?;

        let candidates: Vec<&ResourceDescriptor> = self
            .get(kind)
            .iter()
            .filter(|d| requested.as_ref().is_none_or(|gv| gv.group == d.group))
            .collect();

        match candidates.as_slice() {
            [descriptor] => {
                let GroupVersion { group, version } = requested.unwrap_or_else(|| GroupVersion {
                    group: descriptor.group.clone(),
                    version: descriptor.version.clone(),
                });
                Ok(GroupVersionResource {
                    group,
                    version,
                    resource: descriptor.name.clone(),
                    namespaced: descriptor.namespaced,
                })
            }
            [] => Err(CoreError::Discovery {
                kind: kind.to_string(),
                message: match spec.api_version() {
                    Some(api_version) => format!("no resource registered for {}", api_version),
                    None => "no resource registered".to_string(),
                },
            }),
            many => Err(CoreError::Discovery {
                kind: kind.to_string(),
                message: format!("ambiguous, {} resources match", many.len()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, kind: &str, group: &str, version: &str) -> ResourceDescriptor {
        ResourceDescriptor {
            name: name.to_string(),
            kind: kind.to_string(),
            group: group.to_string(),
            version: version.to_string(),
            namespaced: true,
        }
    }

    fn table() -> ApiResources {
        ApiResources::from_descriptors([
            descriptor("deployments", "Deployment", "apps", "v1"),
            descriptor("pods", "Pod", "", "v1"),
            descriptor("events", "Event", "", "v1"),
            descriptor("events", "Event", "events.k8s.io", "v1"),
        ])
    }

    #[test]
    fn test_resolve_by_kind() {
        let spec = ResourceSpec::from_yaml("apiVersion: apps/v1\nkind: Deployment").unwrap();
        let gvr = table().resolve(&spec).unwrap();

        assert_eq!(gvr.group, "apps");
        assert_eq!(gvr.version, "v1");
        assert_eq!(gvr.resource, "deployments");
    }

    #[test]
    fn test_resolve_keeps_manifest_version() {
        let spec = ResourceSpec::from_yaml("apiVersion: apps/v1beta2\nkind: Deployment").unwrap();
        assert_eq!(table().resolve(&spec).unwrap().version, "v1beta2");
    }

    #[test]
    fn test_resolve_without_api_version() {
        let spec = ResourceSpec::from_yaml("kind: Pod").unwrap();
        let gvr = table().resolve(&spec).unwrap();
        assert_eq!(gvr.resource, "pods");
        assert_eq!(gvr.version, "v1");
    }

    #[test]
    fn test_resolve_disambiguates_by_group() {
        let spec = ResourceSpec::from_yaml("apiVersion: events.k8s.io/v1\nkind: Event").unwrap();
        assert_eq!(table().resolve(&spec).unwrap().group, "events.k8s.io");
    }

    #[test]
    fn test_resolve_ambiguous() {
        let spec = ResourceSpec::from_yaml("kind: Event").unwrap();
        let err = table().resolve(&spec).unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_resolve_unknown_kind() {
        let spec = ResourceSpec::from_yaml("apiVersion: v1\nkind: Widget").unwrap();
        assert!(table().resolve(&spec).is_err());
    }

    #[test]
    fn test_resolve_missing_kind() {
        let spec = ResourceSpec::from_yaml("metadata:\n  name: x").unwrap();
        let err = table().resolve(&spec).unwrap_err();
        assert!(err.to_string().contains("no kind"));
    }

    #[test]
    fn test_duplicate_descriptor_ignored() {
        let mut table = table();
        let before = table.len();
        table.insert(descriptor("pods", "Pod", "", "v1"));
        assert_eq!(table.len(), before);
    }
}
