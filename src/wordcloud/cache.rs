//! On-disk cache of rendered word clouds.
//!
//! One PNG per room and local day; a second render on the same day
//! overwrites the first.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use chrono::NaiveDate;
use tracing::debug;

#[derive(Debug)]
pub enum PersistError {
    /// The renderer's image was not valid base64.
    Decode(base64::DecodeError),
    /// Writing the file failed.
    Write { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(e) => write!(f, "failed to decode image: {}", e),
            Self::Write { path, source } => {
                write!(f, "failed to write '{}': {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(e) => Some(e),
            Self::Write { source, .. } => Some(source),
        }
    }
}

/// `<room_id>_<YYYYMMDD>.png`, with anything but `[A-Za-z0-9_-]` in the room
/// id replaced by `_`.
pub fn cache_file_name(room_id: &str, date: NaiveDate) -> String {
    let room: String = room_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{}_{}.png", room, date.format("%Y%m%d"))
}

pub fn cache_path(cache_dir: &Path, room_id: &str, date: NaiveDate) -> PathBuf {
    cache_dir.join(cache_file_name(room_id, date))
}

/// Decode `image_b64` and write it to the room's cache file for `date`.
pub async fn persist_image(
    cache_dir: &Path,
    room_id: &str,
    date: NaiveDate,
    image_b64: &str,
) -> Result<PathBuf, PersistError> {
    // MIME-style encoders wrap lines at 76 chars.
    let unwrapped: String = image_b64.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    let data = base64::engine::general_purpose::STANDARD
        .decode(unwrapped.trim())
        .map_err(PersistError::Decode)?;

    let path = cache_path(cache_dir, room_id, date);
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| PersistError::Write { path: path.clone(), source: e })?;

    debug!("Cached word cloud at {:?} ({} bytes)", path, data.len());
    Ok(path)
}
