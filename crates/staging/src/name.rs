use std::fmt;
use std::path::{Component, Path, PathBuf};

use resend_protocol::{MAX_NAME_LEN, TransferError};

/// Extension appended to a final path to form its staging path.
pub const STAGING_SUFFIX: &str = "part";

/// A validated transfer name: a relative path that stays inside the
/// destination root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferName {
    raw: String,
    relative: PathBuf,
}

impl TransferName {
    /// Validates an untrusted name received from a sender.
    ///
    /// Rejects:
    /// - Empty names, names longer than [`MAX_NAME_LEN`], NUL bytes
    /// - Absolute paths (Unix `/` or Windows `C:\`)
    /// - Parent directory traversal (`..`)
    /// - Windows prefix components (`C:`, `\\server`)
    /// - Names whose last component ends in `.part`
    pub fn parse(name: &str) -> Result<Self, TransferError> {
        if name.is_empty() {
            return Err(TransferError::InvalidName("empty name".into()));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(TransferError::InvalidName(format!(
                "name too long: {} bytes (max {MAX_NAME_LEN})",
                name.len()
            )));
        }
        if name.contains('\0') {
            return Err(TransferError::InvalidName("NUL byte in name".into()));
        }

        let path = Path::new(name);
        if path.is_absolute() || has_windows_root(name) {
            return Err(TransferError::InvalidName(format!(
                "absolute path not allowed: {name}"
            )));
        }

        let mut relative = PathBuf::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(TransferError::InvalidName(format!(
                        "parent directory traversal not allowed: {name}"
                    )));
                }
                Component::Prefix(_) | Component::RootDir => {
                    return Err(TransferError::InvalidName(format!(
                        "absolute path not allowed: {name}"
                    )));
                }
            }
        }

        let Some(file_name) = relative.file_name() else {
            return Err(TransferError::InvalidName(format!(
                "name has no file component: {name}"
            )));
        };
        if Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == STAGING_SUFFIX)
        {
            return Err(TransferError::InvalidName(format!(
                "name must not end in .{STAGING_SUFFIX}: {name}"
            )));
        }

        Ok(Self {
            raw: name.to_owned(),
            relative,
        })
    }

    /// Normalized relative path (no `.` components, no trailing slash).
    pub fn relative_path(&self) -> &Path {
        &self.relative
    }
}

/// Drive (`C:`) and UNC/rooted (`\\server`, `\dir`) forms, which Unix
/// would otherwise accept as literal file names.
fn has_windows_root(name: &str) -> bool {
    let bytes = name.as_bytes();
    let drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    drive || bytes.first() == Some(&b'\\')
}

impl fmt::Display for TransferName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Staging and final locations derived from a transfer name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingPaths {
    /// `<root>/<name>.part`
    pub staging: PathBuf,
    /// `<root>/<name>`
    pub final_path: PathBuf,
}

impl StagingPaths {
    /// Derives both paths lexically, without touching the filesystem.
    pub fn derive(root: &Path, name: &TransferName) -> Self {
        Self::for_final(root.join(name.relative_path()))
    }

    fn for_final(final_path: PathBuf) -> Self {
        let mut staging = final_path.clone().into_os_string();
        staging.push(".");
        staging.push(STAGING_SUFFIX);
        Self {
            staging: PathBuf::from(staging),
            final_path,
        }
    }

    /// Creates the parent directory under `root` and verifies that the
    /// resolved location has not escaped it (e.g. through a symlinked
    /// directory).
    ///
    /// The returned paths are built on the canonical parent, so two names
    /// that resolve to the same file produce equal paths.
    pub async fn prepare(root: &Path, name: &TransferName) -> Result<Self, TransferError> {
        let lexical = Self::derive(root, name);
        let (Some(parent), Some(file_name)) =
            (lexical.final_path.parent(), lexical.final_path.file_name())
        else {
            return Err(TransferError::InvalidName(name.to_string()));
        };

        tokio::fs::create_dir_all(parent).await?;
        let canonical_root = tokio::fs::canonicalize(root).await?;
        let canonical_parent = tokio::fs::canonicalize(parent).await?;
        if !canonical_parent.starts_with(&canonical_root) {
            return Err(TransferError::InvalidName(format!(
                "resolves outside destination root: {name}"
            )));
        }

        let paths = Self::for_final(canonical_parent.join(file_name));
        for path in [&paths.staging, &paths.final_path] {
            if let Ok(meta) = tokio::fs::symlink_metadata(path).await {
                if meta.file_type().is_symlink() {
                    return Err(TransferError::InvalidName(format!(
                        "refusing to follow symlink: {}",
                        path.display()
                    )));
                }
            }
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(name: &str) -> bool {
        matches!(TransferName::parse(name), Err(TransferError::InvalidName(_)))
    }

    #[test]
    fn rejects_empty_name() {
        assert!(invalid(""));
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(invalid("../../../etc/passwd"));
        assert!(invalid("sub/../../escape"));
        assert!(invalid(".."));
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(invalid("/etc/passwd"));
    }

    #[test]
    fn rejects_windows_roots_on_every_platform() {
        assert!(invalid("C:\\Windows\\evil"));
        assert!(invalid("c:evil.txt"));
        assert!(invalid("\\\\server\\share\\x"));
        assert!(invalid("\\rooted"));
        assert!(TransferName::parse("notes:v2.txt").is_ok());
    }

    #[test]
    fn rejects_nul_byte() {
        assert!(invalid("file\0.txt"));
    }

    #[test]
    fn rejects_only_dots() {
        assert!(invalid("."));
        assert!(invalid("./"));
    }

    #[test]
    fn rejects_staging_suffix() {
        assert!(invalid("movie.mkv.part"));
        assert!(invalid("dir/x.part"));
    }

    #[test]
    fn rejects_overlong_name() {
        assert!(invalid(&"a".repeat(MAX_NAME_LEN + 1)));
        assert!(TransferName::parse(&"a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn accepts_nested_and_dotted_names() {
        assert!(TransferName::parse("report.pdf").is_ok());
        assert!(TransferName::parse("sub/dir/file.txt").is_ok());
        assert!(TransferName::parse(".config").is_ok());
        assert!(TransferName::parse("part").is_ok());
    }

    #[test]
    fn normalizes_current_dir_components() {
        let name = TransferName::parse("./a/./b.bin").unwrap();
        assert_eq!(name.relative_path(), Path::new("a/b.bin"));
        assert_eq!(name.to_string(), "./a/./b.bin");
    }

    #[test]
    fn derive_appends_part_suffix() {
        let name = TransferName::parse("hello.txt").unwrap();
        let paths = StagingPaths::derive(Path::new("/srv/in"), &name);
        assert_eq!(paths.final_path, Path::new("/srv/in/hello.txt"));
        assert_eq!(paths.staging, Path::new("/srv/in/hello.txt.part"));
    }

    #[tokio::test]
    async fn prepare_creates_parent_directories() {
        let root = tempfile::tempdir().unwrap();
        let name = TransferName::parse("a/b/c.bin").unwrap();
        let paths = StagingPaths::prepare(root.path(), &name).await.unwrap();

        let canonical_root = std::fs::canonicalize(root.path()).unwrap();
        assert!(canonical_root.join("a/b").is_dir());
        assert_eq!(paths.final_path, canonical_root.join("a/b/c.bin"));
        assert_eq!(paths.staging, canonical_root.join("a/b/c.bin.part"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prepare_rejects_symlinked_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();

        let name = TransferName::parse("link/evil.bin").unwrap();
        let err = StagingPaths::prepare(root.path(), &name).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidName(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn prepare_rejects_symlinked_staging_file() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let target = outside.path().join("victim");
        std::fs::write(&target, b"keep").unwrap();
        std::os::unix::fs::symlink(&target, root.path().join("x.bin.part")).unwrap();

        let name = TransferName::parse("x.bin").unwrap();
        let err = StagingPaths::prepare(root.path(), &name).await.unwrap_err();
        assert!(matches!(err, TransferError::InvalidName(_)));
        assert_eq!(std::fs::read(&target).unwrap(), b"keep");
    }
}
