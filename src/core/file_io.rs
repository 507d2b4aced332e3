use serde::Serialize;
use std::path::{Path, PathBuf};

pub fn extract_base_name(path: &str) -> &str {
    Path::new(path)
        .file_stem() // Get the base name component of the path
        .and_then(|name| name.to_str())
        .unwrap_or("params")
}

/// Builds (and creates) `out/<params base name>[/<datetime>]`.
pub fn build_output_path_with_date_time(
    params_path: &str,
    datetime: &Option<String>,
) -> std::io::Result<PathBuf> {
    let mut dirs = vec!["out", extract_base_name(params_path)];
    if let Some(inner_datetime_str) = datetime {
        dirs.push(inner_datetime_str);
    }

    let directory_path: PathBuf = dirs.iter().collect();
    std::fs::create_dir_all(&directory_path)?;
    Ok(directory_path)
}

pub fn date_time_string() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

pub fn maybe_date_time_string(enable: bool) -> Option<String> {
    if enable {
        Some(date_time_string())
    } else {
        None
    }
}

/**
 * Store a path and prefix together, making it easily to quickly generate
 * a collection of files with the same prefix, but separate suffixes.
 */
pub struct FilePrefix {
    pub directory_path: PathBuf,
    pub file_base: String,
}

impl FilePrefix {
    pub fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.directory_path.join(self.file_base.clone() + suffix)
    }

    pub fn create_file_with_suffix(
        &self,
        suffix: &str,
    ) -> std::io::Result<std::io::BufWriter<std::fs::File>> {
        let file = std::fs::File::create(self.with_suffix(suffix))?;
        Ok(std::io::BufWriter::new(file))
    }
}

pub fn serialize_to_json<T: Serialize>(
    path: &Path,
    data: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), data)?;
    log::debug!("Wrote parameters to: {}", path.display());
    Ok(())
}
