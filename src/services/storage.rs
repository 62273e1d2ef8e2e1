use std::fs;
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::warn;

use crate::config::GlueConfig;
use crate::error::GlueError;
use crate::utils::encode_wav::{WavHeader, HEADER_LEN};

/// Runs are not per-user; everything lands under this owner directory.
pub const RUN_OWNER: &str = "public";
const DIR_FORMAT: &str = "%Y-%m-%d-%H:%M:%S";
const DIR_FORMAT_LEN: usize = "YYYY-MM-DD-HH:MM:SS".len();

/// Where one run's artifacts were written.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedRun {
    pub dir_name: String,
    pub wav_path: PathBuf,
    pub timestamps_path: PathBuf,
}

/// One entry of the run listing.
#[derive(Debug, Clone, Serialize)]
pub struct RunListing {
    pub timestamp: String,
    pub dir_name: String,
    pub wav_url: String,
    pub timestamps_url: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
}

fn owner_dir(config: &GlueConfig) -> PathBuf {
    config.output_root.join(RUN_OWNER)
}

/// Public URL of a file inside a run directory (served by `actix-files`).
pub fn public_url(dir_name: &str, file_name: &str) -> String {
    format!("/user_files/{RUN_OWNER}/{dir_name}/{file_name}")
}

/// Writes the WAV and the timestamp text into a fresh
/// `<output_root>/public/<timestamp>[-N]` directory.
pub fn save_run(
    config: &GlueConfig,
    now: NaiveDateTime,
    wav: &[u8],
    timestamps: &str,
) -> io::Result<SavedRun> {
    let parent = owner_dir(config);
    fs::create_dir_all(&parent)?;

    let base = now.format(DIR_FORMAT).to_string();
    let mut attempt = 1;
    let (dir_name, dir_path) = loop {
        let name = if attempt == 1 {
            base.clone()
        } else {
            format!("{base}-{attempt}")
        };
        let path = parent.join(&name);
        match fs::create_dir(&path) {
            Ok(()) => break (name, path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    };

    let wav_path = dir_path.join(&config.wav_file_name);
    let timestamps_path = dir_path.join(&config.timestamps_file_name);
    // WAV last: listing only picks up directories that have it
    let written = fs::write(&timestamps_path, timestamps.as_bytes())
        .and_then(|()| fs::write(&wav_path, wav));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_dir_all(&dir_path) {
            warn!("Failed to remove partial run {}: {}", dir_path.display(), cleanup);
        }
        return Err(e);
    }

    Ok(SavedRun {
        dir_name,
        wav_path,
        timestamps_path,
    })
}

/// Every stored run that still has its WAV, oldest first.
pub fn list_runs(config: &GlueConfig) -> io::Result<Vec<RunListing>> {
    let read_dir = match fs::read_dir(owner_dir(config)) {
        Ok(d) => d,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut runs: Vec<(NaiveDateTime, RunListing)> = Vec::new();
    for entry in read_dir.flatten() {
        let is_dir = entry.metadata().map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            continue;
        }
        let Ok(dir_name) = entry.file_name().into_string() else {
            continue; // skip non-UTF8
        };
        let Some(timestamp) = dir_name
            .get(..DIR_FORMAT_LEN)
            .and_then(|prefix| NaiveDateTime::parse_from_str(prefix, DIR_FORMAT).ok())
        else {
            continue;
        };
        let Some(header) = read_header(&entry.path().join(&config.wav_file_name)) else {
            continue;
        };

        runs.push((
            timestamp,
            RunListing {
                timestamp: timestamp.format(DIR_FORMAT).to_string(),
                wav_url: public_url(&dir_name, &config.wav_file_name),
                timestamps_url: public_url(&dir_name, &config.timestamps_file_name),
                duration_secs: header.duration_secs(),
                sample_rate: header.sample_rate,
                dir_name,
            },
        ));
    }

    runs.sort_by(|(a, la), (b, lb)| a.cmp(b).then_with(|| la.dir_name.cmp(&lb.dir_name)));
    Ok(runs.into_iter().map(|(_, listing)| listing).collect())
}

fn read_header(path: &Path) -> Option<WavHeader> {
    let mut file = fs::File::open(path).ok()?;
    let mut buf = [0u8; HEADER_LEN];
    file.read_exact(&mut buf).ok()?;
    WavHeader::parse(&buf)
}

/// Maps a client-supplied run name to its directory, refusing anything
/// that could escape the owner directory.
pub fn resolve_run_dir(config: &GlueConfig, dir_name: &str) -> Result<PathBuf, GlueError> {
    if dir_name.is_empty()
        || dir_name.starts_with('.')
        || dir_name.contains(['/', '\\'])
        || dir_name.contains("..")
    {
        return Err(GlueError::Payload(format!("invalid run name {dir_name:?}")));
    }
    Ok(owner_dir(config).join(dir_name))
}
