//! Collision-free output names
//!
//! [`next_available_name`] turns `post.html` into `post-1.html`, `post-2.html`
//! and so on until it finds a path nothing occupies. The result is only free
//! at the moment of the check; there is no lock against concurrent creators.

use crate::error::{NamingError, Result};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Answers whether something already exists at a path
pub trait ExistenceCheck {
    /// Check a single path
    fn exists(&self, path: &Path) -> io::Result<bool>;
}

/// Checks the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FsCheck;

impl ExistenceCheck for FsCheck {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        path.try_exists()
    }
}

impl<F> ExistenceCheck for F
where
    F: Fn(&Path) -> io::Result<bool>,
{
    fn exists(&self, path: &Path) -> io::Result<bool> {
        self(path)
    }
}

/// Next free path on the local filesystem
pub fn next_available_name(candidate: &Path) -> Result<PathBuf> {
    next_available_name_with(candidate, &FsCheck)
}

/// Next free path according to `check`
///
/// Returns `candidate` unchanged when it is free. Otherwise the file stem gets
/// a `-{n}` suffix (n = 1, 2, ...) and the extension is kept. The loop has no
/// upper bound on `n`; it ends at the first free path or the first check error.
#[instrument(skip(check), fields(candidate = %candidate.display()))]
pub fn next_available_name_with<P>(candidate: &Path, check: &P) -> Result<PathBuf>
where
    P: ExistenceCheck + ?Sized,
{
    let stem = candidate
        .file_stem()
        .ok_or_else(|| NamingError::NoFileName(candidate.to_path_buf()))?
        .to_os_string();
    let extension = candidate.extension().map(|e| e.to_os_string());

    let mut current = candidate.to_path_buf();
    let mut index: u64 = 1;

    while check_exists(check, &current)? {
        current = candidate.with_file_name(suffixed_name(&stem, extension.as_ref(), index));
        index += 1;
    }

    if index > 1 {
        debug!("Resolved {} after {} collisions", current.display(), index - 1);
    }

    Ok(current)
}

fn check_exists<P>(check: &P, path: &Path) -> Result<bool>
where
    P: ExistenceCheck + ?Sized,
{
    check.exists(path).map_err(|source| {
        NamingError::ExistenceCheckFailed {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn suffixed_name(stem: &OsString, extension: Option<&OsString>, index: u64) -> OsString {
    let mut name = stem.clone();
    name.push(format!("-{index}"));
    if let Some(ext) = extension {
        name.push(".");
        name.push(ext);
    }
    name
}
