use regex::Regex;
use std::io::BufRead;
use std::sync::LazyLock;

/// Matches a decimal or integer percentage token in transcoder output,
/// e.g. "Encoding: task 1 of 1, 42.50 %"
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("valid percent regex"));

/// Extract the percent-complete token from one line of transcoder output
pub fn parse_percent(line: &str) -> Option<f32> {
    PERCENT_RE
        .captures(line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f32>().ok())
}

/// Read one line of transcoder console output into `buf`, treating both
/// `\r` and `\n` as terminators. HandBrake redraws its progress line with
/// bare carriage returns, so splitting on `\n` alone would hold every
/// percent update back until the stream closes.
///
/// Returns the number of bytes consumed; 0 means end of stream.
pub fn read_console_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<usize> {
    buf.clear();
    let mut consumed = 0usize;
    loop {
        let available = match reader.fill_buf() {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(consumed);
        }
        match available.iter().position(|&b| b == b'\r' || b == b'\n') {
            Some(i) => {
                buf.extend_from_slice(&available[..i]);
                reader.consume(i + 1);
                return Ok(consumed + i + 1);
            }
            None => {
                let len = available.len();
                buf.extend_from_slice(available);
                reader.consume(len);
                consumed += len;
            }
        }
    }
}

/// Batch-overall progress: completed files plus the in-flight fraction,
/// scaled to 0..=100
pub fn overall_progress(files_completed: usize, current_file_fraction: f32, total_files: usize) -> f32 {
    if total_files == 0 {
        return 100.0;
    }
    ((files_completed as f32 + current_file_fraction) / total_files as f32 * 100.0).min(100.0)
}
