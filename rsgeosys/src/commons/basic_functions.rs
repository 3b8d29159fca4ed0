use std::path::{Path, PathBuf};

use chrono::NaiveDate;

/// Appends `query` to `url`, using `&` when the URL already carries a
/// query string and `?` otherwise.
pub fn append_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

/// Zoning query appended to every artifact URL when zoning was requested.
pub fn zoning_query(zone_count: u32) -> String {
    format!("zoning=true&zoneCount={}", zone_count)
}

/// Returns `file_name`, or `file_name_1`, `file_name_2`, ... if
/// `<output_dir>/<file_name>.<extension>` already exists.
pub fn unique_file_name(output_dir: &Path, file_name: &str, extension: &str) -> String {
    let exists = |name: &str| output_dir.join(format!("{}.{}", name, extension)).exists();

    let mut candidate = file_name.to_string();
    let mut counter = 1;
    while exists(&candidate) {
        candidate = format!("{}_{}", file_name, counter);
        counter += 1;
    }
    candidate
}

/// `<base>.<extension>`, keeping any dots already present in `base`.
pub fn path_with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Orders two image dates as (earliest, latest).
pub fn ordered_dates(earliest: NaiveDate, latest: NaiveDate) -> (NaiveDate, NaiveDate) {
    if earliest > latest {
        (latest, earliest)
    } else {
        (earliest, latest)
    }
}

/// Formats a float for a positional path segment. Integral values keep
/// their trailing `.0` (`1.0`, not `1`) and large values never switch to
/// exponent form. Callers reject non-finite values first.
pub fn format_path_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}
