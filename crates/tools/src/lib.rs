//! Filesystem tools for grokcli.
//!
//! The agent can act on its working directory through exactly three tools:
//! `list_files`, `read_file` and `edit_file`. Relative paths resolve against
//! the tool set's root, which defaults to the process working directory.

pub mod edit_file;
pub mod list_files;
pub mod read_file;

use std::path::{Path, PathBuf};

use grokcli_core::tool::ToolRegistry;

pub use edit_file::EditFileTool;
pub use list_files::ListFilesTool;
pub use read_file::ReadFileTool;

/// Default cap on before/after snippets returned by `edit_file`.
pub const DEFAULT_SNIPPET_CHARS: usize = 200;

/// Create the tool registry rooted at the current working directory.
pub fn default_registry() -> ToolRegistry {
    let root = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    registry_for(root, DEFAULT_SNIPPET_CHARS)
}

/// Create the tool registry rooted at `root`.
pub fn registry_for(root: impl Into<PathBuf>, snippet_chars: usize) -> ToolRegistry {
    let root = root.into();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ListFilesTool::new(root.clone())));
    registry.register(Box::new(ReadFileTool::new(root.clone())));
    registry.register(Box::new(EditFileTool::new(root).with_snippet_chars(snippet_chars)));
    registry
}

/// Resolve a tool path argument against the root. Absolute paths pass through.
pub(crate) fn resolve(root: &Path, path: &str) -> PathBuf {
    root.join(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_exactly_three_tools() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_for(dir.path(), 200);
        assert_eq!(registry.names(), vec!["edit_file", "list_files", "read_file"]);
        assert_eq!(registry.definitions().len(), 3);
    }

    #[test]
    fn resolve_relative_and_absolute() {
        let root = Path::new("/work");
        assert_eq!(resolve(root, "a.txt"), PathBuf::from("/work/a.txt"));
        assert_eq!(resolve(root, "/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
