//! Progress parsing for yt-dlp output

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

// [download]  42.5% of ~ 150.00MiB at  5.20MiB/s ETA 00:15
static PROGRESS_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\[download\]\s+(\d+(?:\.\d+)?)%(?:\s+of\s+~?\s*(\d+(?:\.\d+)?)\s*([KMGT]i?B|B))?(?:\s+at\s+(\d+(?:\.\d+)?)\s*([KMGT]i?B|B)/s)?(?:\s+ETA\s+(\d+(?::\d+){0,2}))?",
    )
    .expect("static progress pattern must compile")
});

/// One parsed progress line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Percent complete, clamped to 0..=100
    pub percent: f64,
    pub total_bytes: u64,
    pub speed_bps: f64,
    pub eta: Option<Duration>,
}

impl ProgressUpdate {
    pub fn downloaded_bytes(&self) -> u64 {
        (self.percent / 100.0 * self.total_bytes as f64) as u64
    }
}

fn unit_multiplier(unit: &str) -> f64 {
    match unit {
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "KB" => 1_000.0,
        "MB" => 1_000_000.0,
        "GB" => 1_000_000_000.0,
        "TB" => 1_000_000_000_000.0,
        _ => 1.0,
    }
}

fn parse_eta(value: &str) -> Option<Duration> {
    let secs = value
        .split(':')
        .try_fold(0u64, |acc, part| part.parse::<u64>().ok().map(|n| acc * 60 + n))?;
    Some(Duration::from_secs(secs))
}

/// Parse a `[download]` progress line. Anything else yields `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressUpdate> {
    let caps = PROGRESS_LINE.captures(line)?;
    let percent = caps.get(1)?.as_str().parse::<f64>().ok()?.clamp(0.0, 100.0);

    let total_bytes = match (caps.get(2), caps.get(3)) {
        (Some(num), Some(unit)) => num
            .as_str()
            .parse::<f64>()
            .map(|n| (n * unit_multiplier(unit.as_str())) as u64)
            .unwrap_or(0),
        _ => 0,
    };

    let speed_bps = match (caps.get(4), caps.get(5)) {
        (Some(num), Some(unit)) => num
            .as_str()
            .parse::<f64>()
            .map(|n| n * unit_multiplier(unit.as_str()))
            .unwrap_or(0.0),
        _ => 0.0,
    };

    Some(ProgressUpdate {
        percent,
        total_bytes,
        speed_bps,
        eta: caps.get(6).and_then(|m| parse_eta(m.as_str())),
    })
}
