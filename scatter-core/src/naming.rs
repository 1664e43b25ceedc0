use crate::error::{Result, ScatterError};
use std::path::{Component, Path};

/// Object name of chunk `index` of `filename` on its node.
pub fn chunk_name(filename: &str, index: usize) -> String {
    format!("{}.chunk{}", filename, index)
}

/// Ensure `name` is usable both as a metadata key and as an object name
/// inside a node: a single normal path component, no separators.
pub fn validate_object_name(name: &str) -> Result<()> {
    let bad = |reason| {
        Err(ScatterError::InvalidName {
            name: name.to_string(),
            reason,
        })
    };
    if name.is_empty() {
        return bad("empty name");
    }
    if name.contains('/') || name.contains('\\') {
        return bad("path separators are not allowed");
    }
    let mut comps = Path::new(name).components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::CurDir), _) | (Some(Component::ParentDir), _) => {
            bad("relative directory names are not allowed")
        }
        _ => bad("not a plain file name"),
    }
}

/// Base name of `path`, the default metadata key for a stored file.
pub fn base_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ScatterError::InvalidName {
            name: path.display().to_string(),
            reason: "path has no file name",
        })?;
    validate_object_name(&name)?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_names_are_unpadded() {
        assert_eq!(chunk_name("example.txt", 0), "example.txt.chunk0");
        assert_eq!(chunk_name("example.txt", 12), "example.txt.chunk12");
    }

    #[test]
    fn base_name_drops_directories() {
        assert_eq!(base_name(Path::new("/tmp/data/a.bin")).unwrap(), "a.bin");
        assert_eq!(base_name(Path::new("a.bin")).unwrap(), "a.bin");
        assert!(base_name(Path::new("/")).is_err());
        assert!(base_name(Path::new("dir/..")).is_err());
    }

    #[test]
    fn rejects_traversal_and_separators() {
        for name in ["", ".", "..", "a/b", "..\\x", "/abs"] {
            assert!(validate_object_name(name).is_err(), "{name:?} should be rejected");
        }
        assert!(validate_object_name("report.final.pdf").is_ok());
    }
}
