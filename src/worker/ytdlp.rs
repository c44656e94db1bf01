//! yt-dlp based video fetcher

use crate::config::WorkerConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

/// Format selection: best mp4 video with m4a audio, falling back to any mp4
pub const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Tool output fragments meaning the source can never be downloaded
pub const PERMANENT_MARKERS: &[&str] = &[
    "Unsupported URL",
    "No video could be found",
    "Tweet unavailable",
    "This post is unavailable",
    "Private",
];

/// Cookie domains written for every pair; x.com posts are also served from twitter.com
pub const COOKIE_DOMAINS: &[&str] = &[".x.com", ".twitter.com"];

/// File name of the cookie jar inside a job's scratch directory
pub const COOKIES_FILE_NAME: &str = "cookies.txt";

/// A video downloaded to local disk
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedVideo {
    /// Downloaded file
    pub path: PathBuf,
    /// Title reported by the tool
    pub title: Option<String>,
    /// Duration in seconds reported by the tool
    pub duration: Option<f64>,
}

/// Downloads a video from a source URL into a directory
///
/// Permanent source problems (deleted, private, unsupported) are reported as
/// [`Error::PermanentSource`]; anything else is an ordinary failure.
#[async_trait]
pub trait VideoFetcher: Send + Sync {
    /// Download `source_url` into `output_dir`, authenticating with the
    /// Netscape cookie jar at `cookies_file` when given
    async fn fetch(
        &self,
        source_url: &str,
        cookies_file: Option<&Path>,
        output_dir: &Path,
    ) -> Result<FetchedVideo>;

    /// Name of this fetcher, for logs
    fn name(&self) -> &'static str;
}

/// Fetcher driving the external `yt-dlp` binary
///
/// # Examples
///
/// ```no_run
/// use tidyfeed_archive::worker::{VideoFetcher, YtDlpFetcher};
/// use std::path::Path;
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = YtDlpFetcher::from_path(Duration::from_secs(300))
///     .ok_or("yt-dlp not found in PATH")?;
///
/// let video = fetcher
///     .fetch("https://x.com/alice/status/123", None, Path::new("/tmp/job-1"))
///     .await?;
/// println!("downloaded {}", video.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct YtDlpFetcher {
    binary_path: PathBuf,
    timeout: Duration,
}

impl YtDlpFetcher {
    /// Create a fetcher with an explicit binary path
    pub fn new(binary_path: PathBuf, timeout: Duration) -> Self {
        Self {
            binary_path,
            timeout,
        }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path(timeout: Duration) -> Option<Self> {
        which::which("yt-dlp")
            .ok()
            .map(|path| Self::new(path, timeout))
    }

    /// Build from worker configuration, falling back to a PATH search
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        match &config.ytdlp_path {
            Some(path) => Ok(Self::new(path.clone(), config.download_timeout)),
            None => Self::from_path(config.download_timeout).ok_or_else(|| {
                Error::ExternalTool("yt-dlp not found in PATH and no ytdlp_path configured".into())
            }),
        }
    }

    /// Binary that will be executed
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl VideoFetcher for YtDlpFetcher {
    async fn fetch(
        &self,
        source_url: &str,
        cookies_file: Option<&Path>,
        output_dir: &Path,
    ) -> Result<FetchedVideo> {
        tracing::info!(
            source_url,
            binary = %self.binary_path.display(),
            with_cookies = cookies_file.is_some(),
            "Running yt-dlp"
        );

        let child = Command::new(&self.binary_path)
            .args(ytdlp_args(source_url, cookies_file, output_dir))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                Error::ExternalTool(format!(
                    "download timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            tracing::warn!(
                source_url,
                code = ?output.status.code(),
                stderr = %tail(&stderr),
                "yt-dlp failed"
            );
            return Err(classify_failure(source_url, &stderr, output.status.code()));
        }

        if let Some(video) = parse_output(&stdout) {
            return Ok(video);
        }

        // Printed path missing; look for whatever landed in the directory
        match find_downloaded_file(output_dir).await? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Found download via directory scan");
                Ok(FetchedVideo {
                    path,
                    title: None,
                    duration: None,
                })
            }
            None => Err(Error::ExternalTool(format!(
                "No file downloaded. stdout: {}",
                stdout.chars().take(200).collect::<String>()
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Command-line arguments for one download
pub fn ytdlp_args(
    source_url: &str,
    cookies_file: Option<&Path>,
    output_dir: &Path,
) -> Vec<OsString> {
    let template = output_dir.join("%(id)s.%(ext)s");
    let mut args: Vec<OsString> = Vec::new();
    if let Some(cookies_file) = cookies_file {
        args.push("--cookies".into());
        args.push(cookies_file.as_os_str().to_owned());
    }
    args.extend([
        "-f".into(),
        FORMAT_SELECTOR.into(),
        "--merge-output-format".into(),
        "mp4".into(),
        "--no-playlist".into(),
        "-o".into(),
        template.into_os_string(),
        "--print".into(),
        "after_move:filepath".into(),
        "--print".into(),
        "title".into(),
        "--print".into(),
        "duration".into(),
        source_url.into(),
    ]);
    args
}

/// Render a `Cookie` header value (`name=value; name2=value2`) as a Netscape
/// cookie jar, one line per pair and domain in [`COOKIE_DOMAINS`]
///
/// Pairs without `=`, with an empty name, or containing tabs or line breaks
/// are skipped.
pub fn netscape_cookies(cookie_header: &str) -> String {
    let mut jar = String::from("# Netscape HTTP Cookie File\n\n");
    let pairs = cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, value)| {
            let clean = |s: &str| !s.contains(['\t', '\r', '\n']);
            !name.is_empty() && clean(*name) && clean(*value)
        });

    for (name, value) in pairs {
        for domain in COOKIE_DOMAINS {
            jar.push_str(&format!("{domain}\tTRUE\t/\tTRUE\t0\t{name}\t{value}\n"));
        }
    }
    jar
}

/// Write the cookie jar for `cookie_header` into `dir`, readable by the owner only
pub async fn write_cookies_file(dir: &Path, cookie_header: &str) -> Result<PathBuf> {
    let path = dir.join(COOKIES_FILE_NAME);
    tokio::fs::write(&path, netscape_cookies(cookie_header)).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
    }

    Ok(path)
}

/// Pull the file path, title and duration out of the tool's printed lines
///
/// The line naming an existing file is the path; the remaining lines are the
/// title and then the duration, in that order. Returns `None` when no line
/// names an existing file.
pub fn parse_output(stdout: &str) -> Option<FetchedVideo> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let path_index = lines.iter().rposition(|line| Path::new(line).is_file())?;
    let mut rest = lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != path_index)
        .map(|(_, line)| *line);

    let title = rest.next().map(str::to_string);
    let duration = rest.next().and_then(|d| d.parse::<f64>().ok());

    Some(FetchedVideo {
        path: PathBuf::from(lines[path_index]),
        title,
        duration,
    })
}

/// Turn a failed run into a permanent or ordinary error
pub fn classify_failure(source_url: &str, stderr: &str, code: Option<i32>) -> Error {
    let reason = tail(stderr);

    if PERMANENT_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        return Error::PermanentSource {
            target: source_url.to_string(),
            reason,
        };
    }

    let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    if reason.is_empty() {
        Error::ExternalTool(format!("yt-dlp exited with {}", code))
    } else {
        Error::ExternalTool(format!("yt-dlp exited with {}: {}", code, reason))
    }
}

/// Last non-empty line of tool output
fn tail(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

async fn find_downloaded_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut fallback = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if path.extension().is_some_and(|ext| ext == "mp4") {
            return Ok(Some(path));
        }
        // Skip partial downloads
        if fallback.is_none() && !path.extension().is_some_and(|ext| ext == "part") {
            fallback = Some(path);
        }
    }

    Ok(fallback)
}
