use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::commons::basic_functions::path_with_extension;
use crate::error::{GeosysError, Result};

/// Expands every member of `archive` into `<destination_base>.<ext>`.
///
/// Output names only keep the member's extension. When two members share
/// an extension the later one overwrites the earlier file. Directories
/// and members without extension are skipped. Returns the written paths in
/// first-write order, without duplicates.
pub fn extract_zip<R: Read + Seek>(archive: R, destination_base: &Path) -> Result<Vec<PathBuf>> {
    let mut archive = ZipArchive::new(archive)
        .map_err(|e| GeosysError::Download(format!("invalid archive: {}", e)))?;

    if let Some(parent) = destination_base.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut written: Vec<PathBuf> = Vec::new();
    for i in 0..archive.len() {
        let mut member = archive
            .by_index(i)
            .map_err(|e| GeosysError::Download(format!("invalid archive member: {}", e)))?;
        if member.is_dir() {
            continue;
        }

        let extension = Path::new(member.name())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_string);
        let Some(extension) = extension else {
            debug!(member = member.name(), "Skipping archive member without extension");
            continue;
        };

        let output = path_with_extension(destination_base, &extension);
        if written.contains(&output) {
            warn!(path = %output.display(), "Archive member overwrites a previous one");
        }
        let mut file = fs::File::create(&output)?;
        std::io::copy(&mut member, &mut file)?;
        debug!(path = %output.display(), "Extracted archive member");

        if !written.contains(&output) {
            written.push(output);
        }
    }
    Ok(written)
}
