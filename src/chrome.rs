//! Chrome/Chromium resolution and automatic installation.
//!
//! The engine needs a real browser binary. Resolution order: the configured
//! path, the `CHROME` environment variable, well-known command names on
//! `PATH`, well-known install locations, a previously cached download, and
//! finally a fresh Chrome for Testing download from Google's CDN.
//!
//! Downloads are cached in `~/.serp-driver/chrome/<version>/`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SearchError};

/// JSON API endpoint for Chrome for Testing stable versions.
const CHROME_VERSIONS_URL: &str =
    "https://googlechromelabs.github.io/chrome-for-testing/last-known-good-versions-with-downloads.json";

/// Well-known Chrome/Chromium executable paths per platform.
#[cfg(target_os = "macos")]
const KNOWN_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(all(unix, not(target_os = "macos")))]
const KNOWN_PATHS: &[&str] = &[
    "/opt/google/chrome/chrome",
    "/opt/chromium.org/chromium/chrome",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

/// Well-known command names to search in PATH.
const KNOWN_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Chrome for Testing version manifest, stable channel only.
#[derive(Debug, Deserialize)]
struct VersionsManifest {
    channels: Channels,
}

#[derive(Debug, Deserialize)]
struct Channels {
    #[serde(rename = "Stable")]
    stable: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    version: String,
    downloads: Downloads,
}

#[derive(Debug, Deserialize)]
struct Downloads {
    chrome: Vec<DownloadEntry>,
}

#[derive(Debug, Deserialize)]
struct DownloadEntry {
    platform: String,
    url: String,
}

/// Returns the platform identifier for Chrome for Testing downloads.
fn platform_id() -> Result<&'static str> {
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    {
        Ok("mac-arm64")
    }
    #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
    {
        Ok("mac-x64")
    }
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    {
        Ok("linux64")
    }
    #[cfg(not(any(
        all(target_os = "macos", target_arch = "aarch64"),
        all(target_os = "macos", target_arch = "x86_64"),
        all(target_os = "linux", target_arch = "x86_64"),
    )))]
    {
        Err(SearchError::SessionLaunch(
            "unsupported platform for automatic Chrome download".to_string(),
        ))
    }
}

/// Returns the relative path to the Chrome executable inside the extracted
/// archive.
#[cfg(target_os = "macos")]
fn executable_in_archive(platform: &str) -> String {
    format!(
        "chrome-{}/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing",
        platform
    )
}

#[cfg(all(unix, not(target_os = "macos")))]
fn executable_in_archive(platform: &str) -> String {
    format!("chrome-{}/chrome", platform)
}

/// Base directory for cached Chrome downloads.
fn cache_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").map_err(|_| {
        SearchError::SessionLaunch("cannot determine home directory".to_string())
    })?;
    Ok(PathBuf::from(home).join(".serp-driver").join("chrome"))
}

/// Resolves the Chrome binary to launch.
///
/// An explicitly configured path wins and must exist; otherwise detection
/// falls through to the system, the download cache, and a fresh download.
pub async fn ensure_chrome(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            debug!(path = %path.display(), "using configured Chrome binary");
            return Ok(path.to_path_buf());
        }
        return Err(SearchError::SessionLaunch(format!(
            "configured Chrome binary not found at {}",
            path.display()
        )));
    }

    if let Some(path) = detect_chrome() {
        info!(path = %path.display(), "using system Chrome");
        return Ok(path);
    }

    if let Some(path) = find_cached_chrome() {
        info!(path = %path.display(), "using cached Chrome");
        return Ok(path);
    }

    info!("no Chrome installation found, downloading Chrome for Testing");
    download_chrome().await
}

/// Detects an existing Chrome/Chromium installation on the system.
///
/// Checks the `CHROME` environment variable, well-known command names in
/// PATH, and well-known filesystem paths, in that order.
pub fn detect_chrome() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CHROME") {
        let p = PathBuf::from(&path);
        if p.exists() {
            debug!(%path, "Chrome found via CHROME env var");
            return Some(p);
        }
    }

    for cmd in KNOWN_COMMANDS {
        if let Ok(path) = which::which(cmd) {
            debug!(path = %path.display(), "Chrome found in PATH");
            return Some(path);
        }
    }

    for path_str in KNOWN_PATHS {
        let p = Path::new(path_str);
        if p.exists() {
            debug!("Chrome found at known path: {path_str}");
            return Some(p.to_path_buf());
        }
    }

    None
}

/// Looks for a previously downloaded Chrome, newest version first.
fn find_cached_chrome() -> Option<PathBuf> {
    let base = cache_dir().ok()?;
    let platform = platform_id().ok()?;

    let mut versions: Vec<_> = std::fs::read_dir(&base)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .collect();
    versions.sort_by_key(|e| std::cmp::Reverse(e.file_name()));

    versions
        .into_iter()
        .map(|dir| dir.path().join(executable_in_archive(platform)))
        .find(|exe| exe.exists())
}

/// Downloads the stable Chrome for Testing build for this platform and
/// extracts it into the version cache.
async fn download_chrome() -> Result<PathBuf> {
    let platform = platform_id()?;

    let client = reqwest::Client::new();
    let manifest: VersionsManifest = client
        .get(CHROME_VERSIONS_URL)
        .send()
        .await
        .map_err(|e| SearchError::SessionLaunch(format!("failed to fetch Chrome versions: {e}")))?
        .json()
        .await
        .map_err(|e| {
            SearchError::SessionLaunch(format!("failed to parse Chrome versions JSON: {e}"))
        })?;

    let channel = manifest.channels.stable;
    let download_url = channel
        .downloads
        .chrome
        .iter()
        .find(|d| d.platform == platform)
        .map(|d| d.url.clone())
        .ok_or_else(|| {
            SearchError::SessionLaunch(format!(
                "no Chrome download available for platform '{platform}'"
            ))
        })?;

    let version_dir = cache_dir()?.join(&channel.version);
    std::fs::create_dir_all(&version_dir).map_err(|e| {
        SearchError::SessionLaunch(format!(
            "failed to create cache directory {}: {e}",
            version_dir.display()
        ))
    })?;

    info!(
        version = %channel.version,
        platform, "downloading Chrome for Testing"
    );
    let archive_bytes = client
        .get(&download_url)
        .send()
        .await
        .map_err(|e| SearchError::SessionLaunch(format!("failed to download Chrome: {e}")))?
        .bytes()
        .await
        .map_err(|e| SearchError::SessionLaunch(format!("failed to read Chrome download: {e}")))?;

    debug!(
        "extracting Chrome archive ({:.1} MiB)",
        archive_bytes.len() as f64 / 1_048_576.0
    );
    extract_archive(&archive_bytes, &version_dir)?;

    let exe_path = version_dir.join(executable_in_archive(platform));

    #[cfg(unix)]
    if exe_path.exists() {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&exe_path)
            .map_err(|e| {
                SearchError::SessionLaunch(format!("failed to read Chrome permissions: {e}"))
            })?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&exe_path, perms).map_err(|e| {
            SearchError::SessionLaunch(format!("failed to set Chrome permissions: {e}"))
        })?;
    }

    if !exe_path.exists() {
        warn!(
            expected = %exe_path.display(),
            "Chrome executable missing after extraction"
        );
        return Err(SearchError::SessionLaunch(format!(
            "Chrome executable not found after extraction at {}",
            exe_path.display()
        )));
    }

    info!(version = %channel.version, path = %exe_path.display(), "Chrome installed");
    Ok(exe_path)
}

/// Extracts a zip archive into the target directory, preserving Unix modes.
fn extract_archive(archive_bytes: &[u8], target_dir: &Path) -> Result<()> {
    use std::io::{Cursor, Read};

    let reader = Cursor::new(archive_bytes);
    let mut archive = zip::ZipArchive::new(reader)
        .map_err(|e| SearchError::SessionLaunch(format!("failed to open zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| SearchError::SessionLaunch(format!("failed to read zip entry {i}: {e}")))?;

        let out_path = target_dir.join(file.mangled_name());

        if file.is_dir() {
            std::fs::create_dir_all(&out_path).map_err(|e| {
                SearchError::SessionLaunch(format!(
                    "failed to create directory {}: {e}",
                    out_path.display()
                ))
            })?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SearchError::SessionLaunch(format!(
                    "failed to create parent directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .map_err(|e| SearchError::SessionLaunch(format!("failed to read zip entry: {e}")))?;
        std::fs::write(&out_path, &buf).map_err(|e| {
            SearchError::SessionLaunch(format!("failed to write file {}: {e}", out_path.display()))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode)).ok();
            }
        }
    }

    Ok(())
}
