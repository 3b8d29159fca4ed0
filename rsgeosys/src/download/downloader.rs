//! Artifact download: one primary file (or archive) plus PNG side-files.

use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::collect::http::HttpClient;
use crate::collect::session::SessionContext;
use crate::commons::basic_functions::{append_query, path_with_extension, zoning_query};
use crate::download::archive::extract_zip;
use crate::error::{GeosysError, Result};
use crate::products::catalog::{self, REFLECTANCE};
use crate::products::types::{FieldMapResult, OutputFormat, ZoningParams};

/// Result of [`download_artifact`].
///
/// `success` is true only when every attempted fetch succeeded; `message`
/// joins the per-artifact failures.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DownloadOutcome {
    pub success: bool,
    pub message: String,
    pub files: Vec<PathBuf>,
}

impl DownloadOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            files: Vec::new(),
        }
    }
}

/// Appends the zoning query when zoning was requested.
pub fn augment_url(url: &str, zoning: Option<&ZoningParams>) -> String {
    match zoning {
        Some(params) if params.zoning => append_query(url, &zoning_query(params.zone_count)),
        _ => url.to_string(),
    }
}

fn as_download_error(error: GeosysError) -> GeosysError {
    match error {
        GeosysError::Http(message) => GeosysError::Download(message),
        GeosysError::Io(e) => GeosysError::Download(e.to_string()),
        other => other,
    }
}

/// Reflectance bands are not linked from the map response.
fn reflectance_url(session: &SessionContext, result: &FieldMapResult) -> Result<String> {
    let season_field_id = result.season_field_id.as_deref().unwrap_or_default();
    let image_id = result
        .image_id
        .as_deref()
        .ok_or_else(|| GeosysError::MissingParameter {
            product: REFLECTANCE.to_string(),
            param: "image_id",
        })?;
    let definition = catalog::lookup(REFLECTANCE)?;
    Ok(session.full_url(&[
        "season-fields",
        season_field_id,
        "coverage",
        image_id,
        definition.path_segment(),
        definition.key,
        "image.tiff.zip",
    ]))
}

fn link_url(result: &FieldMapResult, format: OutputFormat) -> Result<String> {
    result
        .links
        .get(format.api_key())
        .cloned()
        .ok_or_else(|| GeosysError::MissingOutputFormat(format.api_key().to_string()))
}

struct Fetcher<'a, C: HttpClient + ?Sized> {
    client: &'a C,
    authorization: String,
    zoning: Option<&'a ZoningParams>,
}

impl<C: HttpClient + ?Sized> Fetcher<'_, C> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let url = augment_url(url, self.zoning);
        debug!(url = %url, "Downloading artifact");
        self.client
            .fetch_bytes(&url, &[("Authorization", self.authorization.as_str())])
            .map_err(as_download_error)
    }

    fn fetch_to_file(&self, url: &str, path: &Path) -> Result<PathBuf> {
        let bytes = self.fetch(url)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| as_download_error(e.into()))?;
            }
        }
        fs::write(path, bytes).map_err(|e| as_download_error(e.into()))?;
        info!(path = %path.display(), "Saved artifact");
        Ok(path.to_path_buf())
    }

    fn fetch_archive(&self, url: &str, destination_base: &Path) -> Result<Vec<PathBuf>> {
        let bytes = self.fetch(url)?;
        let mut archive = tempfile::tempfile().map_err(|e| as_download_error(e.into()))?;
        archive
            .write_all(&bytes)
            .map_err(|e| as_download_error(e.into()))?;
        archive
            .seek(SeekFrom::Start(0))
            .map_err(|e| as_download_error(e.into()))?;
        let files = extract_zip(archive, destination_base).map_err(as_download_error)?;
        info!(count = files.len(), base = %destination_base.display(), "Extracted archive");
        Ok(files)
    }
}

/// Writes the artifact of `result` in `format` next to `destination_base`.
///
/// A failed map request is rejected before any fetch. Zipped formats are
/// expanded to `<destination_base>.<member extension>`; plain formats go
/// to `<destination_base>.<extension>`, and a PNG also pulls its world file
/// and legend. Each fetch is independent: a missing side-file link does
/// not undo the primary file.
pub fn download_artifact<C: HttpClient + ?Sized>(
    client: &C,
    session: &SessionContext,
    result: &FieldMapResult,
    format: OutputFormat,
    destination_base: &Path,
    zoning: Option<&ZoningParams>,
) -> DownloadOutcome {
    if !result.is_success() {
        return DownloadOutcome::failed(
            GeosysError::field_map_failed(result.error_message.as_deref()).to_string(),
        );
    }

    let definition = catalog::lookup(&result.product_key).ok();
    let fetcher = Fetcher {
        client,
        authorization: session.authorization(),
        zoning,
    };
    let mut outcome = DownloadOutcome {
        success: true,
        ..Default::default()
    };
    let mut failures: Vec<String> = Vec::new();

    let is_reflectance = definition.map(|d| d.key) == Some(REFLECTANCE);
    let primary = if is_reflectance {
        reflectance_url(session, result)
            .and_then(|url| fetcher.fetch_archive(&url, destination_base))
    } else {
        link_url(result, format).and_then(|url| {
            if format.is_zipped() {
                fetcher.fetch_archive(&url, destination_base)
            } else {
                let path = path_with_extension(destination_base, format.extension());
                fetcher.fetch_to_file(&url, &path).map(|p| vec![p])
            }
        })
    };
    match primary {
        Ok(files) => outcome.files.extend(files),
        Err(e) => {
            warn!(error = %e, format = %format, "Primary artifact download failed");
            failures.push(e.to_string());
        }
    }

    if format == OutputFormat::Png && !is_reflectance {
        let has_legend = definition.map_or(true, |d| d.has_legend);
        let mut side_files = vec![OutputFormat::WorldFile];
        if has_legend {
            side_files.push(OutputFormat::Legend);
        }
        for side in side_files {
            let path = path_with_extension(destination_base, side.extension());
            match link_url(result, side).and_then(|url| fetcher.fetch_to_file(&url, &path)) {
                Ok(path) => outcome.files.push(path),
                Err(e) => {
                    warn!(error = %e, format = %side, "Side-file download failed");
                    failures.push(e.to_string());
                }
            }
        }
    }

    if failures.is_empty() {
        outcome.message = format!("{} file(s) downloaded", outcome.files.len());
    } else {
        outcome.success = false;
        outcome.message = failures.join("\n");
    }
    outcome
}
