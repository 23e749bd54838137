//! ---
//! autumn_section: "01-configuration"
//! autumn_subsection: "module"
//! autumn_type: "source"
//! autumn_scope: "code"
//! autumn_description: "Resource search path used to locate configuration bundles."
//! autumn_version: "v0.0.0-prealpha"
//! autumn_owner: "tbd"
//! ---
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::properties::decode_bundle;

/// Environment variable holding the resource search path.
pub const RESOURCE_PATH_ENV: &str = "AUTUMN_RESOURCE_PATH";
const DEFAULT_RESOURCE_DIR: &str = "resources";

/// Strip one leading separator so `/app.properties` and `app.properties` address the same entry.
pub fn entry_name(name: &str) -> &str {
    name.strip_prefix('/').unwrap_or(name)
}

/// Ordered set of directory roots searched for bundled resources.
///
/// The first root containing the requested entry wins, so an operator can
/// shadow a packaged default by placing a file earlier in the path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLoader {
    roots: Vec<PathBuf>,
}

impl ResourceLoader {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the loader from `AUTUMN_RESOURCE_PATH`, defaulting to `./resources`
    /// followed by the `resources` directory beside the executable.
    pub fn from_env() -> Self {
        if let Some(raw) = std::env::var_os(RESOURCE_PATH_ENV).filter(|raw| !raw.is_empty()) {
            return Self::new(std::env::split_paths(&raw));
        }
        let mut roots = vec![PathBuf::from(DEFAULT_RESOURCE_DIR)];
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            roots.push(exe_dir.join(DEFAULT_RESOURCE_DIR));
        }
        Self { roots }
    }

    /// Append a root with the lowest priority.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Return the first existing file for `name` across the roots.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let entry = entry_name(name);
        if entry.is_empty() {
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(entry))
            .find(|candidate| candidate.is_file())
    }

    /// Read the resource as text, UTF-8 or Latin-1. `Ok(None)` means no root holds it.
    pub fn read(&self, name: &str) -> io::Result<Option<String>> {
        match self.locate(name) {
            Some(path) => {
                debug!(resource = name, path = %path.display(), "reading bundled resource");
                fs::read(&path).map(|bytes| Some(decode_bundle(bytes)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn earlier_roots_shadow_later_ones() {
        let first = tempdir().expect("tempdir");
        let second = tempdir().expect("tempdir");
        fs::write(first.path().join("app.properties"), "k=first").expect("write");
        fs::write(second.path().join("app.properties"), "k=second").expect("write");
        fs::write(second.path().join("only.properties"), "k=only").expect("write");

        let loader = ResourceLoader::new([first.path(), second.path()]);
        assert_eq!(
            loader.read("/app.properties").expect("read").as_deref(),
            Some("k=first")
        );
        assert_eq!(
            loader.read("only.properties").expect("read").as_deref(),
            Some("k=only")
        );
        assert_eq!(loader.read("missing.properties").expect("read"), None);
    }

    #[test]
    fn entry_name_strips_a_single_separator() {
        assert_eq!(entry_name("/web.properties"), "web.properties");
        assert_eq!(entry_name("web.properties"), "web.properties");
        assert_eq!(entry_name("//nested"), "/nested");
    }
}
