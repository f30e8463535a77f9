//! Path policy for image input and export output
//!
//! The grid engine does not decide which paths are acceptable. Callers run a
//! [`PathValidator`] before handing a path to the load or export flow;
//! [`ExtensionValidator`] is the default policy.

use std::path::{Path, PathBuf};

use crate::config::SUPPORTED_IMAGE_FORMATS;
use crate::error::{CollageError, Result};

pub trait PathValidator: Send + Sync {
    /// Validate a user-supplied image path; returns the resolved path
    fn validate_input(&self, path: &Path) -> Result<PathBuf>;

    /// Validate an export destination; returns the resolved path
    fn validate_output(&self, path: &Path) -> Result<PathBuf>;
}

/// Accepts local files whose extension is in an allow-list
#[derive(Debug, Clone)]
pub struct ExtensionValidator {
    extensions: Vec<String>,
}

impl Default for ExtensionValidator {
    fn default() -> Self {
        Self::new(SUPPORTED_IMAGE_FORMATS)
    }
}

impl ExtensionValidator {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// True when the path's extension is allowed (case-insensitive)
    pub fn accepts_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }

    fn check_extension(&self, path: &Path) -> Result<()> {
        if self.accepts_extension(path) {
            Ok(())
        } else {
            Err(rejected(format!(
                "unsupported file extension: {}",
                path.extension().map(|e| e.to_string_lossy().to_string()).unwrap_or_default()
            )))
        }
    }
}

impl PathValidator for ExtensionValidator {
    fn validate_input(&self, path: &Path) -> Result<PathBuf> {
        reject_url(path)?;

        let resolved = path
            .canonicalize()
            .map_err(|_| rejected(format!("file does not exist: {}", path.display())))?;

        if !resolved.is_file() {
            return Err(rejected(format!("not a file: {}", path.display())));
        }

        self.check_extension(&resolved)?;
        Ok(resolved)
    }

    fn validate_output(&self, path: &Path) -> Result<PathBuf> {
        reject_url(path)?;

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let parent = parent
            .canonicalize()
            .map_err(|_| rejected(format!("directory does not exist: {}", parent.display())))?;

        let file_name = path
            .file_name()
            .ok_or_else(|| rejected(format!("missing file name: {}", path.display())))?;
        let resolved = parent.join(file_name);

        self.check_extension(&resolved)?;
        Ok(resolved)
    }
}

fn rejected(reason: String) -> CollageError {
    CollageError::PathRejected(reason)
}

/// Reject `scheme://...` paths; single-letter schemes are Windows drive letters
fn reject_url(path: &Path) -> Result<()> {
    let text = path.to_string_lossy();
    if let Some((scheme, _)) = text.split_once(':') {
        let is_scheme = scheme.len() > 1
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if is_scheme {
            return Err(rejected("URLs are not allowed".to_string()));
        }
    }
    Ok(())
}
