use std::path::{Component, Path, PathBuf};

use crate::error::{AppErr, AppResult};

/// Resolves a client-supplied relative path against the storage root.
///
/// Containment is checked component-wise while normalizing, never by string
/// prefix, so a sibling like `files-secret` can never pass a check rooted at
/// `files`. Any `..` that would climb above the root is rejected, as is an
/// absolute request path.
pub fn resolve(root: &Path, requested: &str) -> AppResult<PathBuf> {
    let mut kept: Vec<&std::ffi::OsStr> = Vec::new();
    for comp in Path::new(requested).components() {
        match comp {
            Component::Normal(seg) => kept.push(seg),
            Component::CurDir => {}
            Component::ParentDir => {
                if kept.pop().is_none() {
                    tracing::warn!(%requested, "path escape rejected");
                    return Err(AppErr::Forbidden);
                }
            }
            // absolute paths and drive prefixes are never relative to root
            Component::RootDir | Component::Prefix(_) => {
                tracing::warn!(%requested, "absolute path rejected");
                return Err(AppErr::Forbidden);
            }
        }
    }

    let mut out = root.to_path_buf();
    for seg in kept {
        out.push(seg);
    }
    Ok(out)
}
