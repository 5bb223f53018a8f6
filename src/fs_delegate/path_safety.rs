//! Confinement of agent-supplied paths to a root directory.
//!
//! Only consulted when the delegate is scoped. Rejects `..` traversal out of
//! the root and symlinks (on the file itself or any existing ancestor) whose
//! target lies outside it.

use std::path::{Component, Path, PathBuf};

use crate::{AppError, Result};

/// Validate that absolute `candidate` resides within `root`.
///
/// Returns the path with symlinks resolved as far as it exists.
///
/// # Errors
///
/// Returns `AppError::PathViolation` if:
/// - `root` cannot be canonicalized.
/// - `..` segments climb above the filesystem root.
/// - The lexically normalized path is outside `root`.
/// - The deepest existing ancestor resolves (through symlinks) outside `root`.
pub fn validate_path(root: &Path, candidate: &Path) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("workspace root invalid: {err}")))?;

    let normalized = normalize(candidate)?;
    if !normalized.starts_with(&root) {
        return Err(AppError::PathViolation(format!(
            "{} is outside {}",
            normalized.display(),
            root.display()
        )));
    }

    // Resolve the deepest existing prefix; anything below it cannot be a
    // symlink yet.
    let mut existing = normalized.as_path();
    let mut suffix = Vec::new();
    while !existing.exists() {
        let Some(parent) = existing.parent() else {
            break;
        };
        if let Some(name) = existing.file_name() {
            suffix.push(name.to_owned());
        }
        existing = parent;
    }

    let mut resolved = existing
        .canonicalize()
        .map_err(|err| AppError::PathViolation(format!("cannot resolve path: {err}")))?;
    if !resolved.starts_with(&root) {
        return Err(AppError::PathViolation(
            "symlink target escapes workspace".into(),
        ));
    }
    for part in suffix.into_iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

/// Lexically apply `.` and `..` components.
fn normalize(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return Err(AppError::PathViolation(
                        "path attempts to escape the filesystem root".into(),
                    ));
                }
            }
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) | Component::Normal(_) => {
                out.push(component.as_os_str());
            }
        }
    }
    Ok(out)
}
