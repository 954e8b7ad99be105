//! Fake external tools for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Writes the body to `dir/name` and marks it executable
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// yt-dlp stand-in: reports progress, writes the `-o` template as mp4 and
/// prints the final path like `--print after_move:filepath`
pub const YTDLP_OK: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  fi
  shift
done
file=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
echo "[youtube] dQw4w9WgXcQ: Downloading webpage"
echo "[download]  25.0% of    1.00MiB at  512.00KiB/s ETA 00:02"
echo "[download]  75.0% of    1.00MiB at  512.00KiB/s ETA 00:01"
printf 'fake video bytes' > "$file"
echo "[download] 100% of    1.00MiB at  512.00KiB/s ETA 00:00"
echo "$file"
"#;

/// Like `YTDLP_OK`, but stamps the artifact with an old upload date the way
/// yt-dlp does when mtime stamping is left on
pub const YTDLP_OLD_MTIME: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  fi
  shift
done
file=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
printf 'fake video bytes' > "$file"
touch -t 202001010000 "$file"
echo "$file"
"#;

/// yt-dlp stand-in that fails the way a removed video does
pub const YTDLP_FAIL: &str = r#"
echo "[youtube] dQw4w9WgXcQ: Downloading webpage"
echo "ERROR: [youtube] dQw4w9WgXcQ: Video unavailable" >&2
exit 1
"#;

/// yt-dlp stand-in that leaves a partial file and hangs
pub const YTDLP_HANG: &str = r#"
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then
    shift
    out="$1"
  fi
  shift
done
file=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
printf 'partial' > "$file.part"
echo "[download]  10.0% of    1.00MiB at  100.00KiB/s ETA 00:09"
sleep 30
"#;

/// ffmpeg stand-in: the last argument is always the output path
pub const FFMPEG_OK: &str = r#"
for last; do :; done
printf 'transformed' > "$last"
"#;

pub const FFMPEG_FAIL: &str = r#"
for last; do :; done
printf 'half' > "$last"
echo "Invalid data found when processing input" >&2
exit 1
"#;

pub const FFPROBE_OK: &str = r#"
cat <<'EOF'
{
  "streams": [
    {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080, "r_frame_rate": "30000/1001", "bit_rate": "4500000"},
    {"codec_type": "audio", "codec_name": "aac", "sample_rate": "44100", "channels": 2, "bit_rate": "128000"}
  ],
  "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "12.500000", "size": "7031250", "bit_rate": "4500000"}
}
EOF
"#;

pub const YOUTUBE_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
