//! Mirror-tool output parsing.
//!
//! Two line shapes drive progress:
//! - new-file lines: a locale-specific marker followed by a size token
//!   (`1234`, `1.4 g`, `1.4GB`, `12,345`);
//! - percent lines: a short token ending in `%` (`  18%`).
//!
//! The parser owns the counters shared between the stdout reader and the
//! polling loop; callers keep it behind a single mutex.

/// Locale-dependent words recognised in the tool's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTokens {
    pub new_file: Vec<String>,
    pub errors: Vec<String>,
    /// Legacy code-page spellings of tokens, as raw bytes, with the text they stand for.
    /// Robocopy writes in the console's OEM code page, not UTF-8.
    pub legacy: Vec<(Vec<u8>, String)>,
}

impl Default for OutputTokens {
    fn default() -> Self {
        Self {
            new_file: vec!["New File".into(), "新文件".into()],
            errors: vec!["ERROR".into(), "错误".into(), "失败".into()],
            // GBK (code page 936).
            legacy: vec![
                (vec![0xD0, 0xC2, 0xCE, 0xC4, 0xBC, 0xFE], "新文件".into()),
                (vec![0xB4, 0xED, 0xCE, 0xF3], "错误".into()),
                (vec![0xCA, 0xA7, 0xB0, 0xDC], "失败".into()),
            ],
        }
    }
}

/// Decode one raw output line.
///
/// Valid UTF-8 passes through. Otherwise known legacy token spellings are
/// translated first and any remaining invalid bytes become U+FFFD, so a
/// non-UTF-8 file name never hides the tokens on the same line.
pub fn decode_line(raw: &[u8], tokens: &OutputTokens) -> String {
    if let Ok(text) = std::str::from_utf8(raw) {
        return text.to_string();
    }
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut i = 0;
    'scan: while i < raw.len() {
        for (bytes, text) in &tokens.legacy {
            if !bytes.is_empty() && raw[i..].starts_with(bytes) {
                out.extend_from_slice(text.as_bytes());
                i += bytes.len();
                continue 'scan;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ASCII case-insensitive search that keeps byte offsets intact.
fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

impl OutputTokens {
    /// Text following the first new-file marker in `line`, if any.
    pub fn after_new_file_marker<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.new_file.iter().find_map(|marker| {
            find_ignore_ascii_case(line, marker).map(|idx| &line[idx + marker.len()..])
        })
    }

    pub fn is_error_line(&self, line: &str) -> bool {
        self.errors
            .iter()
            .any(|t| find_ignore_ascii_case(line, t).is_some())
    }
}

fn size_multiplier(unit: &str) -> Option<u64> {
    match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => Some(1),
        "K" | "KB" => Some(1 << 10),
        "M" | "MB" => Some(1 << 20),
        "G" | "GB" => Some(1 << 30),
        "T" | "TB" => Some(1 << 40),
        "P" | "PB" => Some(1 << 50),
        _ => None,
    }
}

fn is_size_unit_token(token: &str) -> bool {
    !token.contains([':', '\\', '/']) && !token.is_empty() && size_multiplier(token).is_some()
}

/// Parse the size token that follows a new-file marker.
///
/// The number may carry a unit suffix (`1.4g`, `1.4GB`) or be followed by a
/// separate unit token (`1.4 g`). Unknown suffixes count as bytes.
pub fn parse_new_file_size(after_marker: &str) -> Option<u64> {
    let mut tokens = after_marker.split([' ', '\t']).filter(|t| !t.is_empty());
    let first = tokens.next()?;

    let split_at = first
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic())
        .last()
        .map(|(i, _)| i)
        .unwrap_or(first.len());
    let (number, mut unit) = first.split_at(split_at);

    if unit.is_empty()
        && let Some(next) = tokens.next()
        && is_size_unit_token(next)
    {
        unit = next;
    }

    let value: f64 = number.replace(',', "").trim().parse().ok()?;
    let bytes = value * size_multiplier(unit).unwrap_or(1) as f64;
    if !bytes.is_finite() {
        return None;
    }
    Some(bytes.round().max(0.0) as u64)
}

/// Parse a bare percent line such as `  18%` or `100%`.
pub fn parse_percent(line: &str) -> Option<f64> {
    let trimmed = line.trim();
    if !trimmed.ends_with('%') || trimmed.len() > 5 {
        return None;
    }
    trimmed.trim_end_matches('%').trim().parse().ok()
}

/// What a single output line turned out to be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineKind {
    NewFile(u64),
    Percent(f64),
    Error,
    Other,
}

/// Consistent copy of the shared counters, taken once per poll tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParserSnapshot {
    pub current_file_size: u64,
    pub percent: f64,
    pub cumulative_bytes: u64,
    pub has_file_context: bool,
}

impl ParserSnapshot {
    /// Whether the parser has enough context to be preferred over on-disk size.
    pub fn has_estimate(&self) -> bool {
        self.has_file_context
            && (self.cumulative_bytes > 0 || self.current_file_size > 0 || self.percent > 0.0)
    }

    /// Cumulative bytes plus the current file's partial share.
    pub fn estimated_bytes(&self) -> u64 {
        self.cumulative_bytes
            .saturating_add(share_of(self.current_file_size, self.percent))
    }
}

/// `round(size * percent / 100)` clamped to `0..=size`.
fn share_of(size: u64, percent: f64) -> u64 {
    let pct = percent.clamp(0.0, 100.0);
    ((size as f64 * pct / 100.0).round() as u64).min(size)
}

/// Per-file counters fed by the tool's stdout.
#[derive(Debug)]
pub struct OutputParser {
    tokens: OutputTokens,
    current_file_size: u64,
    percent: f64,
    last_percent: f64,
    cumulative_bytes: u64,
    has_file_context: bool,
    first_file: bool,
}

impl OutputParser {
    pub fn new(tokens: OutputTokens) -> Self {
        Self {
            tokens,
            current_file_size: 0,
            percent: 0.0,
            last_percent: 0.0,
            cumulative_bytes: 0,
            has_file_context: false,
            first_file: true,
        }
    }

    pub fn cumulative_bytes(&self) -> u64 {
        self.cumulative_bytes
    }

    /// Classify one line and update the counters.
    pub fn feed(&mut self, line: &str) -> LineKind {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return LineKind::Other;
        }
        if let Some(after) = self.tokens.after_new_file_marker(trimmed) {
            // rsync itemizes directories with a trailing slash; their size is not payload.
            if after.ends_with('/') {
                return LineKind::Other;
            }
            if let Some(size) = parse_new_file_size(after) {
                self.start_file(size);
                return LineKind::NewFile(size);
            }
        }
        if let Some(pct) = parse_percent(trimmed) {
            self.record_percent(pct);
            return LineKind::Percent(pct);
        }
        if self.tokens.is_error_line(trimmed) {
            return LineKind::Error;
        }
        LineKind::Other
    }

    fn start_file(&mut self, size: u64) {
        if !self.first_file && self.current_file_size > 0 {
            // Credit the previous file at its last seen percent so an unfinished
            // file is not counted as complete; full size when no percent was seen.
            let credited = if self.last_percent > 0.0 {
                share_of(self.current_file_size, self.last_percent)
            } else {
                self.current_file_size
            };
            self.cumulative_bytes = self.cumulative_bytes.saturating_add(credited);
        }
        self.current_file_size = size;
        self.percent = 0.0;
        self.last_percent = 0.0;
        self.has_file_context = true;
        self.first_file = false;
    }

    fn record_percent(&mut self, pct: f64) {
        let previous = self.last_percent;
        // A drop of more than one point without a new-file line: a new file started.
        if pct + 1.0 < previous && self.current_file_size > 0 {
            let credited = share_of(self.current_file_size, previous);
            self.cumulative_bytes = self.cumulative_bytes.saturating_add(credited);
            self.current_file_size = 0;
        }
        self.last_percent = pct;
        self.percent = pct;
    }

    /// Copy of the counters for the polling loop.
    pub fn snapshot(&mut self) -> ParserSnapshot {
        if !self.has_file_context && self.cumulative_bytes > 0 {
            self.has_file_context = true;
        }
        ParserSnapshot {
            current_file_size: self.current_file_size,
            percent: self.percent,
            cumulative_bytes: self.cumulative_bytes,
            has_file_context: self.has_file_context,
        }
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new(OutputTokens::default())
    }
}
