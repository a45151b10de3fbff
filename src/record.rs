//! Record formatting for the log-relay wire and file format.
//!
//! A record is a single newline-terminated line: a timestamp, then each
//! field, joined with semicolons. The same format is written to local
//! partition files and posted to the collector, so both sides share this
//! module.

use chrono::{DateTime, NaiveDate, Utc};

/// Field delimiter within a record.
pub const FIELD_DELIMITER: char = ';';

/// Timestamp format used as the leading field of every record.
///
/// Example: `2024-01-15 13:45:02.123456`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Errors produced while parsing a record.
#[derive(Debug)]
pub enum RecordError {
    /// The leading field of a line did not start with a parsable
    /// `YYYY-MM-DD` date.
    MalformedTimestamp {
        /// The offending leading field, truncated for display.
        field: String,
    },
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::MalformedTimestamp { field } => {
                write!(f, "record has no parsable leading timestamp: '{}'", field)
            }
        }
    }
}

impl std::error::Error for RecordError {}

/// Format a batch of fields into one record line, timestamped with the
/// current UTC time.
///
/// Fields are joined with `;` and the line is newline-terminated. No
/// escaping is performed: callers must not embed `;` or `\n` inside a
/// field, or read-back parsing of that line will be corrupted.
pub fn format_message<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    format_message_at(Utc::now(), fields)
}

/// Format a batch of fields into one record line with an explicit
/// timestamp.
pub fn format_message_at<I, S>(timestamp: DateTime<Utc>, fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut line = timestamp.format(TIMESTAMP_FORMAT).to_string();
    for field in fields {
        line.push(FIELD_DELIMITER);
        line.push_str(field.as_ref());
    }
    line.push('\n');
    line
}

/// Extract the partition date embedded in an already-formatted record line.
///
/// The collector uses this to file a forwarded record under the date it was
/// originally produced, not the date it arrived. The leading field is
/// everything before the first `;`; its date part is everything before the
/// first space.
///
/// # Errors
///
/// Returns [`RecordError::MalformedTimestamp`] when the leading field does
/// not begin with a `YYYY-MM-DD` date. Callers decide how to report the
/// rejected line; it is never silently discarded here.
pub fn partition_date(line: &str) -> Result<NaiveDate, RecordError> {
    let leading = line.split(FIELD_DELIMITER).next().unwrap_or("");
    let date_part = leading.split(' ').next().unwrap_or("");

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| RecordError::MalformedTimestamp {
        field: leading.chars().take(64).collect(),
    })
}

/// Render a date as the zero-padded 8-digit stamp used in partition file
/// names (`YYYYMMDD`).
pub fn date_stamp(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}
