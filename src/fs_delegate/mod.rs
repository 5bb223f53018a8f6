//! Agent-directed text file reads and writes.
//!
//! Paths must be absolute. With no scope configured the delegate can touch
//! anything the host user can; [`FsDelegate::scoped`] confines it to one
//! directory tree (see [`path_safety`]).

pub mod path_safety;

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::models::protocol::{
    ReadTextFileRequest, ReadTextFileResponse, WriteTextFileRequest, WriteTextFileResponse,
};
use crate::{AppError, Result};

/// A line window of a file plus the file's total line count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSlice {
    /// Selected lines, terminators included.
    pub content: String,
    /// Lines in the whole file.
    pub total_lines: usize,
}

/// Select lines `[line, line + limit)` (1-based) from `content`.
///
/// - No bounds: the whole content.
/// - Only `line`: from `line` to the end.
/// - Only `limit`: the first `limit` lines.
/// - `line` past the end: empty.
///
/// `line = 0` is treated as `1`. Line terminators are kept, so the slices of
/// a file concatenate back to it.
#[must_use]
pub fn slice_lines(content: &str, line: Option<u32>, limit: Option<u32>) -> TextSlice {
    let total_lines = content.lines().count();
    if line.is_none() && limit.is_none() {
        return TextSlice {
            content: content.to_owned(),
            total_lines,
        };
    }

    let skip = line.map_or(0, |l| l.saturating_sub(1)) as usize;
    let take = limit.map_or(usize::MAX, |l| l as usize);
    let content = content
        .split_inclusive('\n')
        .skip(skip)
        .take(take)
        .collect();

    TextSlice {
        content,
        total_lines,
    }
}

/// Executes file operations on behalf of agent sessions.
#[derive(Debug, Clone, Default)]
pub struct FsDelegate {
    scope: Option<PathBuf>,
}

impl FsDelegate {
    /// Delegate limited only by OS permissions.
    #[must_use]
    pub fn unrestricted() -> Self {
        Self { scope: None }
    }

    /// Delegate confined to `root`.
    #[must_use]
    pub fn scoped(root: impl Into<PathBuf>) -> Self {
        Self {
            scope: Some(root.into()),
        }
    }

    /// Serve `fs/read_text_file`.
    ///
    /// # Errors
    ///
    /// - [`AppError::FileNotFound`] if the file does not exist.
    /// - [`AppError::FileRead`] if the path is relative, unreadable, or not
    ///   UTF-8.
    /// - [`AppError::PathViolation`] if a scope is set and the path escapes it.
    pub fn read_text_file(&self, req: &ReadTextFileRequest) -> Result<ReadTextFileResponse> {
        let path = self.resolve(&req.path, AppError::FileRead)?;
        let raw = std::fs::read_to_string(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => AppError::FileNotFound(path.display().to_string()),
            _ => AppError::FileRead(format!("cannot read {}: {err}", path.display())),
        })?;

        let slice = slice_lines(&raw, req.line, req.limit);
        debug!(
            session_id = %req.session_id,
            path = %path.display(),
            line = ?req.line,
            limit = ?req.limit,
            total_lines = slice.total_lines,
            "fs delegate: read"
        );

        Ok(ReadTextFileResponse {
            content: slice.content,
            total_lines: Some(u32::try_from(slice.total_lines).unwrap_or(u32::MAX)),
            extra_metadata: None,
        })
    }

    /// Serve `fs/write_text_file`.
    ///
    /// Parent directories are created as needed. Content goes to a temporary
    /// file in the target directory which is then renamed over the target,
    /// so readers never observe a partial file. A symlinked target is written
    /// through to the file it points at. An existing file keeps its
    /// permissions; a new one gets `0o666` less the umask.
    ///
    /// # Errors
    ///
    /// - [`AppError::FileWrite`] on a relative path, a dangling symlink, or
    ///   any I/O failure.
    /// - [`AppError::PathViolation`] if a scope is set and the path escapes it.
    pub fn write_text_file(&self, req: &WriteTextFileRequest) -> Result<WriteTextFileResponse> {
        let path = self.resolve(&req.path, AppError::FileWrite)?;
        let parent = path
            .parent()
            .ok_or_else(|| AppError::FileWrite(format!("{} has no parent", path.display())))?;

        std::fs::create_dir_all(parent).map_err(|err| {
            AppError::FileWrite(format!(
                "failed to create parent directories for {}: {err}",
                path.display()
            ))
        })?;

        let target = follow_symlink(&path)?;
        let target_dir = target
            .parent()
            .ok_or_else(|| AppError::FileWrite(format!("{} has no parent", target.display())))?;
        let existing = std::fs::metadata(&target).ok().map(|meta| meta.permissions());

        let mut builder = tempfile::Builder::new();
        builder.prefix(".acp-write-");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let mut tmp = builder
            .tempfile_in(target_dir)
            .map_err(|err| AppError::FileWrite(format!("failed to create temporary file: {err}")))?;
        tmp.write_all(req.content.as_bytes())
            .map_err(|err| AppError::FileWrite(format!("failed to write temporary file: {err}")))?;
        if let Some(perms) = existing {
            tmp.as_file().set_permissions(perms).map_err(|err| {
                AppError::FileWrite(format!(
                    "failed to carry permissions over to {}: {err}",
                    target.display()
                ))
            })?;
        }
        tmp.persist(&target).map_err(|err| {
            AppError::FileWrite(format!("failed to persist {}: {err}", target.display()))
        })?;

        debug!(
            session_id = %req.session_id,
            path = %path.display(),
            target = %target.display(),
            bytes = req.content.len(),
            "fs delegate: wrote"
        );
        Ok(WriteTextFileResponse::default())
    }

    fn resolve(&self, path: &Path, on_relative: fn(String) -> AppError) -> Result<PathBuf> {
        if !path.is_absolute() {
            return Err(on_relative(format!(
                "path must be absolute: {}",
                path.display()
            )));
        }
        match &self.scope {
            Some(root) => path_safety::validate_path(root, path),
            None => Ok(path.to_path_buf()),
        }
    }
}

/// Resolve `path` to the file a symlink points at; other paths pass through.
fn follow_symlink(path: &Path) -> Result<PathBuf> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => std::fs::canonicalize(path).map_err(|err| {
            AppError::FileWrite(format!("cannot resolve symlink {}: {err}", path.display()))
        }),
        _ => Ok(path.to_path_buf()),
    }
}
