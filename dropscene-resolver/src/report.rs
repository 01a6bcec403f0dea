//! Per-item failures of a resolution. None of these abort a resolution, they are aggregated into a
//! [`ResolutionReport`] so that a UI can show everything that went wrong with a drop at once.

use std::fmt;

use itertools::Itertools;
use serde::Serialize;

use crate::manifest::ReferenceKind;
use crate::role::ResourceRole;

/// A directory whose listing could not be (fully) read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumerationFailure {
    pub path: String,
    pub reason: String,
}

/// A file that could not be read or decoded. It is absent from the resource index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializationFailure {
    pub name: String,
    pub path: String,
    pub role: ResourceRole,
    pub reason: String,
}

/// A manifest reference for which the drop had no (loadable) file. The manifest keeps the original URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReference {
    pub kind: ReferenceKind,
    /// Position in the manifest's `buffers` or `images` table.
    pub index: usize,
    pub uri: String,
    /// The file name the URI was matched against.
    pub lookup_key: String,
}

/// Two dropped files with the same name. The later one in drop order wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCollision {
    pub name: String,
    pub kept: String,
    pub discarded: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub enumeration_failures: Vec<EnumerationFailure>,
    pub materialization_failures: Vec<MaterializationFailure>,
    pub unresolved_references: Vec<UnresolvedReference>,
    pub collisions: Vec<NameCollision>,
    /// Files that play no role in a scene (e.g. `readme.txt`).
    pub ignored: Vec<String>,
    /// Manifests and packages that were loaded, but not chosen as the scene root.
    pub skipped_roots: Vec<String>,
}

impl ResolutionReport {
    /// True if nothing failed. Ignored files, skipped roots and collisions are notices, not failures.
    pub fn is_clean(&self) -> bool {
        self.enumeration_failures.is_empty()
            && self.materialization_failures.is_empty()
            && self.unresolved_references.is_empty()
    }

    pub fn failed_files(&self) -> impl Iterator<Item = &str> {
        self.materialization_failures
            .iter()
            .map(|failure| failure.name.as_str())
    }

    pub fn unresolved_uris(&self) -> impl Iterator<Item = &str> {
        self.unresolved_references
            .iter()
            .map(|reference| reference.uri.as_str())
    }
}

impl fmt::Display for ResolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_clean() && self.collisions.is_empty() && self.skipped_roots.is_empty() {
            return writeln!(f, "All dropped files were resolved.");
        }

        for failure in &self.enumeration_failures {
            writeln!(f, "Could not list {}: {}", failure.path, failure.reason)?;
        }
        for failure in &self.materialization_failures {
            writeln!(f, "Could not load {} {}: {}", failure.role, failure.path, failure.reason)?;
        }
        for reference in &self.unresolved_references {
            writeln!(
                f,
                "Missing {} #{}: {} (looked for {})",
                reference.kind, reference.index, reference.uri, reference.lookup_key
            )?;
        }
        for collision in &self.collisions {
            writeln!(
                f,
                "Duplicate name {}: using {}, ignoring {}",
                collision.name, collision.kept, collision.discarded
            )?;
        }
        if !self.skipped_roots.is_empty() {
            writeln!(f, "Not loaded (only one scene per drop): {}", self.skipped_roots.iter().join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_report() {
        let report = ResolutionReport {
            ignored: vec!["readme.txt".into()],
            ..Default::default()
        };
        assert!(report.is_clean());
        assert_eq!(report.to_string(), "All dropped files were resolved.\n");
    }

    #[test]
    fn lists_every_failure() {
        let report = ResolutionReport {
            materialization_failures: vec![MaterializationFailure {
                name: "scene.bin".into(),
                path: "assets/scene.bin".into(),
                role: ResourceRole::ExternalBuffer,
                reason: "permission denied".into(),
            }],
            unresolved_references: vec![UnresolvedReference {
                kind: ReferenceKind::Image,
                index: 0,
                uri: "img/tex.png".into(),
                lookup_key: "tex.png".into(),
            }],
            ..Default::default()
        };

        assert!(!report.is_clean());
        assert_eq!(report.failed_files().collect::<Vec<_>>(), ["scene.bin"]);
        assert_eq!(report.unresolved_uris().collect::<Vec<_>>(), ["img/tex.png"]);

        let text = report.to_string();
        assert!(text.contains("Could not load buffer assets/scene.bin: permission denied"));
        assert!(text.contains("Missing image #0: img/tex.png (looked for tex.png)"));
    }
}
