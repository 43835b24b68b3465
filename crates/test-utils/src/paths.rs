//! Path utilities for locating workspace files and scratch directories.

use std::path::{Path, PathBuf};

/// Returns the workspace root directory.
///
/// This is determined by walking up from the current crate's manifest directory
/// until we find the workspace Cargo.toml.
pub fn workspace_root() -> PathBuf {
    // Start from the test-utils crate manifest dir
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Path to a file under the workspace `config/` directory.
pub fn config_file(name: &str) -> PathBuf {
    workspace_root().join("config").join(name)
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Writes `contents` to `dir/name`, creating parent directories, and
/// returns the full path.
pub fn write_input_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create input directory");
    }
    std::fs::write(&path, contents).expect("Failed to write input file");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        // Should contain Cargo.toml at workspace level
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_write_input_file_creates_parents() {
        let dir = temp_test_dir();
        let path = write_input_file(dir.path(), "buoy/2020/46050.txt", b"#YY MM DD hh\n");
        assert!(path.exists());
    }
}
