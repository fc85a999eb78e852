//! Migration targets and import destinations.

use serde::{Deserialize, Serialize};

use crate::domain::error::{MigrateError, Result};

/// What kind of resource a migration moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// A single repository project.
    Project,
    /// A group of projects (collection resource).
    Group,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::Project => write!(f, "project"),
            TargetKind::Group => write!(f, "group"),
        }
    }
}

/// A resolved source resource.
///
/// `resolved_path` and `resolved_name` are populated exactly once per run by
/// querying the source instance; the struct is immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationTarget {
    /// Numeric id or slash-delimited path as given on the command line.
    pub identifier: String,
    /// Canonical full path on the source instance.
    pub resolved_path: String,
    /// Display name on the source instance.
    pub resolved_name: String,
    /// Resource kind, selects export endpoints and completion strategy.
    pub kind: TargetKind,
}

/// A parsed destination for an import upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDestination {
    /// Path of the enclosing namespace. Empty for a top-level group.
    pub namespace_path: String,
    /// Final path component the resource is created under.
    pub leaf_path: String,
    /// Human-readable name sent to the destination instance.
    pub display_name: String,
    /// Numeric id of the parent group, resolved lazily for subgroup imports.
    pub parent_group_id: Option<u64>,
}

impl ImportDestination {
    /// Parse a project destination of the form `namespace/project`.
    ///
    /// A path without a separator is rejected here, before any network call
    /// to the destination instance is made.
    pub fn for_project(path: &str) -> Result<Self> {
        let (namespace, leaf) = path
            .rsplit_once('/')
            .ok_or_else(|| MigrateError::InvalidDestination {
                path: path.to_string(),
                reason: "expected namespace/project, found no '/' separator".to_string(),
            })?;
        if namespace.is_empty() || leaf.is_empty() {
            return Err(MigrateError::InvalidDestination {
                path: path.to_string(),
                reason: "namespace and project must both be non-empty".to_string(),
            });
        }
        Ok(ImportDestination {
            namespace_path: namespace.to_string(),
            leaf_path: leaf.to_string(),
            display_name: leaf.to_string(),
            parent_group_id: None,
        })
    }

    /// Parse a group destination.
    ///
    /// `parent/child` becomes a subgroup destination whose parent still needs
    /// id resolution; a bare `child` is a top-level group with no parent.
    pub fn for_group(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(MigrateError::InvalidDestination {
                path: path.to_string(),
                reason: "destination path must not be empty".to_string(),
            });
        }
        let (namespace, leaf) = match path.rsplit_once('/') {
            Some((ns, leaf)) => (ns, leaf),
            None => ("", path),
        };
        if leaf.is_empty() {
            return Err(MigrateError::InvalidDestination {
                path: path.to_string(),
                reason: "group path must not end with '/'".to_string(),
            });
        }
        Ok(ImportDestination {
            namespace_path: namespace.to_string(),
            leaf_path: leaf.to_string(),
            display_name: leaf.to_string(),
            parent_group_id: None,
        })
    }

    /// Override the display name sent to the destination instance.
    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = name.to_string();
        self
    }

    /// Whether this destination sits below another group.
    pub fn is_subgroup(&self) -> bool {
        !self.namespace_path.is_empty()
    }
}
