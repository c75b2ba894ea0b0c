//! Sample-line parsing for the inbound sensor stream.
//!
//! A well-formed line is `POS:<signed decimal>`, optionally followed by `\n`
//! or `\r\n`. Anything else is rejected and the caller moves on to the next line.

/// Longest line (terminator included) that can still be a valid sample.
pub const MAX_SAMPLE_LINE: usize = 128;

const PREFIX: &str = "POS:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleReject {
    TooLong,
    NotUtf8,
    MissingPrefix,
    BadNumber,
}

/// Validate a raw line and extract the position.
pub fn parse_sample(raw: &[u8]) -> Result<f64, SampleReject> {
    if raw.len() > MAX_SAMPLE_LINE {
        return Err(SampleReject::TooLong);
    }
    let text = std::str::from_utf8(raw).map_err(|_| SampleReject::NotUtf8)?;
    let text = text.trim_end_matches(|c: char| c == '\n' || c == '\r');

    let value = text.strip_prefix(PREFIX).ok_or(SampleReject::MissingPrefix)?;
    let position: f64 = value.trim().parse().map_err(|_| SampleReject::BadNumber)?;

    // "inf" and "NaN" parse as f64 but are not readings
    if !position.is_finite() {
        return Err(SampleReject::BadNumber);
    }
    Ok(position)
}
