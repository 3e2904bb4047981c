//! Directory-backed content source.
//!
//! Layout of a pack directory:
//!
//! ```text
//! my_pack/
//! ├── pack.json               pack-level metadata sections
//! ├── assets/                 PackKind::ClientResources
//! │   └── ui/                 namespace
//! │       └── textures/button.png
//! └── data/                   PackKind::ServerData
//!     └── core/
//!         └── recipes/stone.json
//! ```

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::warn;

use super::{ContentSource, PackKind, ResourceVisitor, StreamOpener};
use crate::resource::{is_valid_namespace, ResourceError, ResourceId};

/// File holding pack-level metadata sections.
pub const PACK_METADATA_FILE: &str = "pack.json";

/// A pack stored as a directory tree.
#[derive(Debug, Clone)]
pub struct PathSource {
    id: String,
    root: PathBuf,
}

impl PathSource {
    /// Create a source rooted at `root`, identified by the directory name.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let id = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Self { id, root }
    }

    /// Create a source with an explicit identifier.
    pub fn with_id(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
        }
    }

    /// The pack root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_root(&self, kind: PackKind, namespace: &str) -> PathBuf {
        self.root.join(kind.directory()).join(namespace)
    }

    /// Resolve an identifier to a file path, refusing `.`/`..`/empty segments.
    fn file_path(&self, kind: PackKind, id: &ResourceId) -> Option<PathBuf> {
        let mut path = self.namespace_root(kind, id.namespace());
        for segment in id.path().split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                warn!(source = %self.id, id = %id, "Refusing unsafe resource path");
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }

    fn file_opener(path: PathBuf) -> StreamOpener {
        std::sync::Arc::new(move || {
            let file = File::open(&path)?;
            Ok(Box::new(BufReader::new(file)) as Box<dyn Read + Send>)
        })
    }

    /// Recursively visit files below `real_dir`, whose namespace-relative
    /// path is `relative`.
    fn visit_directory(
        &self,
        namespace: &str,
        real_dir: &Path,
        relative: &str,
        visitor: &mut ResourceVisitor<'_>,
    ) {
        let entries = match std::fs::read_dir(real_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(source = %self.id, path = ?entry.path(), "Skipping non UTF-8 file name");
                continue;
            };
            let child = if relative.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", relative, name)
            };
            let real_path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            // Symlinked directories are not followed, so link cycles cannot recurse.
            if file_type.is_dir() {
                self.visit_directory(namespace, &real_path, &child, visitor);
                continue;
            }
            if file_type.is_symlink() && !real_path.is_file() {
                warn!(source = %self.id, path = ?real_path, "Skipping symlink that is not a file");
                continue;
            }

            match ResourceId::new(namespace, child) {
                Ok(id) => visitor(id, Self::file_opener(real_path)),
                Err(e) => warn!(source = %self.id, error = %e, "Skipping file with invalid resource path"),
            }
        }
    }
}

impl ContentSource for PathSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn resource(&self, kind: PackKind, id: &ResourceId) -> Option<StreamOpener> {
        let path = self.file_path(kind, id)?;
        path.is_file().then(|| Self::file_opener(path))
    }

    fn list_resources(
        &self,
        kind: PackKind,
        namespace: &str,
        directory: &str,
        visitor: &mut ResourceVisitor<'_>,
    ) {
        let mut start = self.namespace_root(kind, namespace);
        if !directory.is_empty() {
            for segment in directory.split('/') {
                if segment.is_empty() || segment == "." || segment == ".." {
                    return;
                }
                start.push(segment);
            }
        }
        self.visit_directory(namespace, &start, directory, visitor);
    }

    fn namespaces(&self, kind: PackKind) -> BTreeSet<String> {
        let mut namespaces = BTreeSet::new();
        let Ok(entries) = std::fs::read_dir(self.root.join(kind.directory())) else {
            return namespaces;
        };

        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_valid_namespace(&name) {
                namespaces.insert(name);
            } else {
                warn!(
                    source = %self.id,
                    namespace = %name,
                    "Ignoring directory with invalid namespace name"
                );
            }
        }
        namespaces
    }

    fn metadata_section(&self, section: &str) -> Result<Option<Value>, ResourceError> {
        let path = self.root.join(PACK_METADATA_FILE);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ResourceError::Section {
                    source_id: self.id.clone(),
                    section: section.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let sections: Map<String, Value> =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| ResourceError::Section {
                source_id: self.id.clone(),
                section: section.to_string(),
                reason: e.to_string(),
            })?;
        Ok(sections.get(section).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const KIND: PackKind = PackKind::ClientResources;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn create_pack(temp: &TempDir) -> PathSource {
        let root = temp.path().join("base_pack");
        write(&root, "assets/ui/textures/button.png", "button");
        write(&root, "assets/ui/textures/icons/close.png", "close");
        write(&root, "assets/ui/lang/en.json", "{}");
        write(&root, "assets/core/x", "1");
        write(&root, "data/core/recipes/stone.json", "{}");
        write(
            &root,
            PACK_METADATA_FILE,
            r#"{"filter": {"block": [{"namespace": "legacy"}]}}"#,
        );
        PathSource::new(root)
    }

    #[test]
    fn test_id_defaults_to_directory_name() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);
        assert_eq!(source.id(), "base_pack");
    }

    #[test]
    fn test_resource_reads_file() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);

        let id = ResourceId::parse("ui:textures/button.png").unwrap();
        let opener = source.resource(KIND, &id).expect("button should exist");
        let mut text = String::new();
        opener().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "button");

        let missing = ResourceId::parse("ui:textures/missing.png").unwrap();
        assert!(source.resource(KIND, &missing).is_none());
    }

    #[test]
    fn test_resource_refuses_parent_segments() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);

        let escape = ResourceId::parse("ui:../core/x").unwrap();
        assert!(source.resource(KIND, &escape).is_none());
    }

    #[test]
    fn test_namespaces_per_kind() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);

        let assets: Vec<_> = source.namespaces(KIND).into_iter().collect();
        assert_eq!(assets, vec!["core", "ui"]);

        let data: Vec<_> = source.namespaces(PackKind::ServerData).into_iter().collect();
        assert_eq!(data, vec!["core"]);
    }

    #[test]
    fn test_namespaces_skip_invalid_names() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);
        write(source.root(), "assets/Bad Name/x", "1");

        assert!(!source.namespaces(KIND).contains("Bad Name"));
    }

    #[test]
    fn test_list_resources_recurses() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);

        let mut seen = Vec::new();
        source.list_resources(KIND, "ui", "textures", &mut |id, _| seen.push(id.to_string()));
        seen.sort();
        assert_eq!(
            seen,
            vec!["ui:textures/button.png", "ui:textures/icons/close.png"]
        );
    }

    #[test]
    fn test_list_whole_namespace() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);

        let mut count = 0;
        source.list_resources(KIND, "ui", "", &mut |_, _| count += 1);
        assert_eq!(count, 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_list_skips_symlinked_directories() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);
        let textures = source.root().join("assets/ui/textures");
        std::os::unix::fs::symlink(&textures, textures.join("icons/loop")).unwrap();
        std::os::unix::fs::symlink(
            textures.join("button.png"),
            textures.join("alias.png"),
        )
        .unwrap();

        let mut seen = Vec::new();
        source.list_resources(KIND, "ui", "textures", &mut |id, _| seen.push(id.to_string()));
        seen.sort();
        assert_eq!(
            seen,
            vec![
                "ui:textures/alias.png",
                "ui:textures/button.png",
                "ui:textures/icons/close.png"
            ]
        );
    }

    #[test]
    fn test_metadata_section() {
        let temp = TempDir::new().unwrap();
        let source = create_pack(&temp);

        assert!(source.metadata_section("filter").unwrap().is_some());
        assert!(source.metadata_section("overlays").unwrap().is_none());
    }

    #[test]
    fn test_missing_pack_json_has_no_sections() {
        let temp = TempDir::new().unwrap();
        let source = PathSource::new(temp.path());
        assert!(source.metadata_section("filter").unwrap().is_none());
    }

    #[test]
    fn test_malformed_pack_json_is_section_error() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), PACK_METADATA_FILE, "{ not json");
        let source = PathSource::new(temp.path());

        let err = source.metadata_section("filter").unwrap_err();
        assert!(matches!(err, ResourceError::Section { .. }));
    }
}
