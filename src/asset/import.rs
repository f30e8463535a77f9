//! Bulk import of a folder of images

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::PathValidator;

/// Result of scanning a folder for importable images
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportScan {
    /// Validated image paths, sorted for a stable reading order
    pub accepted: Vec<PathBuf>,
    /// Files the validator refused
    pub skipped_count: usize,
}

/// Walk `folder` recursively and collect every file the validator accepts
pub fn collect_images(folder: &Path, validator: &dyn PathValidator) -> ImportScan {
    let mut scan = ImportScan::default();

    info!(folder = %folder.display(), "scanning folder for images");

    for entry in WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Only process files (not directories)
        if !path.is_file() {
            continue;
        }

        match validator.validate_input(path) {
            Ok(resolved) => scan.accepted.push(resolved),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping file");
                scan.skipped_count += 1;
            }
        }
    }

    scan.accepted.sort();
    scan.accepted.dedup();

    info!(
        accepted = scan.accepted.len(),
        skipped = scan.skipped_count,
        "folder scan complete"
    );

    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::ExtensionValidator;

    #[test]
    fn test_collects_nested_images_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("trip");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(nested.join("c.webp"), b"x").unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"x").unwrap();

        let scan = collect_images(dir.path(), &ExtensionValidator::default());

        let names: Vec<_> = scan
            .accepted
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp"]);
        assert_eq!(scan.skipped_count, 1);
    }

    #[test]
    fn test_empty_folder() {
        let dir = tempfile::tempdir().unwrap();
        let scan = collect_images(dir.path(), &ExtensionValidator::default());
        assert!(scan.accepted.is_empty());
        assert_eq!(scan.skipped_count, 0);
    }
}
