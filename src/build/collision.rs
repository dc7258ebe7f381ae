//! Output collision detection.
//!
//! Every pipeline writes into the same output directory. Before anything is
//! written, each declaration lists the paths it will produce and any overlap
//! between two claims fails the build.

use super::error::BuildError;
use std::path::{Component, Path, PathBuf};

/// A path a pipeline will write, relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputClaim {
    /// A single file
    File(PathBuf),
    /// A directory the pipeline owns entirely
    Dir(PathBuf),
}

impl OutputClaim {
    pub fn path(&self) -> &Path {
        match self {
            OutputClaim::File(p) | OutputClaim::Dir(p) => p,
        }
    }

    /// The claimed path without `.` segments, or `None` when it is empty or
    /// leaves the output directory.
    pub fn normalized(&self) -> Option<PathBuf> {
        let mut path = PathBuf::new();
        for component in self.path().components() {
            match component {
                Component::CurDir => {}
                Component::Normal(part) => path.push(part),
                _ => return None,
            }
        }
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    /// Whether writing both claims would touch the same file.
    ///
    /// A claim that does not name a path strictly inside the output
    /// directory overlaps everything.
    pub fn overlaps(&self, other: &OutputClaim) -> bool {
        let (Some(a), Some(b)) = (self.normalized(), other.normalized()) else {
            return true;
        };
        match (self, other) {
            (OutputClaim::File(_), OutputClaim::File(_)) => a == b,
            (OutputClaim::File(_), OutputClaim::Dir(_)) => a.starts_with(&b),
            (OutputClaim::Dir(_), OutputClaim::File(_)) => b.starts_with(&a),
            (OutputClaim::Dir(_), OutputClaim::Dir(_)) => a.starts_with(&b) || b.starts_with(&a),
        }
    }
}

/// An output claim tagged with the pipeline that made it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedOutput {
    pub pipeline: String,
    pub claim: OutputClaim,
}

impl ClaimedOutput {
    pub fn new(pipeline: &str, claim: OutputClaim) -> Self {
        Self { pipeline: pipeline.to_string(), claim }
    }
}

/// Fail on the first pair of overlapping claims.
///
/// Claims from the same pipeline are checked too; one pipeline writing the
/// same file twice is as much a defect as two pipelines doing it.
pub fn check_collisions(claims: &[ClaimedOutput]) -> Result<(), BuildError> {
    if let Some(stray) = claims.iter().find(|c| c.claim.normalized().is_none()) {
        return Err(BuildError::InvalidDeclaration(format!(
            "'{}' claims '{}', which is not inside the output directory",
            stray.pipeline,
            stray.claim.path().display()
        )));
    }

    for (i, first) in claims.iter().enumerate() {
        for second in &claims[i + 1..] {
            if first.claim.overlaps(&second.claim) {
                let path = deeper(&first.claim, &second.claim).to_path_buf();
                tracing::debug!(path = %path.display(), first = %first.pipeline, second = %second.pipeline, "output collision");
                return Err(BuildError::OutputCollision {
                    path,
                    first: first.pipeline.clone(),
                    second: second.pipeline.clone(),
                });
            }
        }
    }
    Ok(())
}

fn deeper<'a>(a: &'a OutputClaim, b: &'a OutputClaim) -> &'a Path {
    if a.path().components().count() >= b.path().components().count() {
        a.path()
    } else {
        b.path()
    }
}
