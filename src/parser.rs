//! Row parser for delimited OHLCV text
//!
//! Rows look like `date, open, high, low, close[, volume]` or the same fields
//! separated by spaces. Quotes are treated as separators and empty tokens are
//! discarded, so `"2021-02-01","10","12",...` parses the same as the bare form.
//!
//! Only the date is mandatory. A price or volume token that fails to parse
//! leaves that field at zero and the row is still accepted.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::trace;

use crate::{bar::Bar, Result, WaveError};

const COMMA_SEPARATORS: &[char] = &[',', ' ', '"'];
const SPACE_SEPARATORS: &[char] = &[' ', '"'];

/// Date/time layouts tried in order
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];
/// `%y` comes before `%Y` so that `01-Feb-21` is read as 2021 rather than year 21.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%y",
    "%d-%b-%Y",
];

/// Field separator family for a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    #[default]
    Comma,
    Space,
}

impl Delimiter {
    /// A file is space-delimited iff its header line has no comma
    pub fn detect(header: &str) -> Self {
        if header.contains(',') {
            Delimiter::Comma
        } else {
            Delimiter::Space
        }
    }

    #[inline]
    pub fn separators(self) -> &'static [char] {
        match self {
            Delimiter::Comma => COMMA_SEPARATORS,
            Delimiter::Space => SPACE_SEPARATORS,
        }
    }

    #[inline]
    pub fn is_space(self) -> bool {
        matches!(self, Delimiter::Space)
    }
}

/// Parse one data row into a [`Bar`].
///
/// Fails with [`WaveError::DateParse`] when the first token is not a date and
/// with [`WaveError::MissingField`] when fewer than five tokens are present.
pub fn parse_row(row: &str, delimiter: Delimiter) -> Result<Bar> {
    let mut tokens = row
        .split(delimiter.separators())
        .filter(|token| !token.is_empty());

    let date = tokens
        .next()
        .ok_or(WaveError::MissingField { field: "date" })?;
    let timestamp = parse_date(date)?;

    let mut bar = Bar::empty(timestamp);
    for (field, slot) in [
        ("open", &mut bar.open),
        ("high", &mut bar.high),
        ("low", &mut bar.low),
        ("close", &mut bar.close),
    ] {
        let token = tokens.next().ok_or(WaveError::MissingField { field })?;
        *slot = tolerant(token, field);
    }

    if let Some(token) = tokens.next() {
        bar.volume = tolerant(token, "volume");
    }

    Ok(bar)
}

/// Parse a date or date-time token. Bare dates land at midnight.
pub fn parse_date(token: &str) -> Result<NaiveDateTime> {
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(token, format) {
            return Ok(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(token, format) {
            return Ok(date.and_time(NaiveTime::MIN));
        }
    }
    if let Some(date) = compact_date(token) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(WaveError::DateParse {
        token: token.to_string(),
    })
}

/// `YYYYMMDD` with no separators
fn compact_date(token: &str) -> Option<NaiveDate> {
    if token.len() != 8 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = token[..4].parse().ok()?;
    let month = token[4..6].parse().ok()?;
    let day = token[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse `token`, falling back to the type's zero on failure
fn tolerant<T: FromStr + Default>(token: &str, field: &'static str) -> T {
    match token.parse() {
        Ok(value) => value,
        Err(_) => {
            trace!(field, token, "unparseable field, defaulting to zero");
            T::default()
        }
    }
}

/// Canonical serialization of a bar. Dates at midnight are written without a
/// time component; prices use their exact decimal representation.
pub fn to_row(bar: &Bar, delimiter: Delimiter) -> String {
    let date = if bar.timestamp.time() == NaiveTime::MIN {
        bar.timestamp.format("%Y-%m-%d").to_string()
    } else {
        bar.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
    };
    let sep = match delimiter {
        Delimiter::Comma => ",",
        Delimiter::Space => " ",
    };
    [
        date,
        bar.open.to_string(),
        bar.high.to_string(),
        bar.low.to_string(),
        bar.close.to_string(),
        bar.volume.to_string(),
    ]
    .join(sep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_parse_comma_row() {
        let bar = parse_row("2021-02-01,10,12,9,11,100", Delimiter::Comma).unwrap();
        assert_eq!(bar.timestamp, day(2021, 2, 1));
        assert_eq!(bar.open, dec!(10));
        assert_eq!(bar.high, dec!(12));
        assert_eq!(bar.low, dec!(9));
        assert_eq!(bar.close, dec!(11));
        assert_eq!(bar.volume, 100);
    }

    #[test]
    fn test_parse_space_row_with_quotes() {
        let bar = parse_row("\"2/3/2021\" 10.5  12.25 9 11", Delimiter::Space).unwrap();
        assert_eq!(bar.timestamp, day(2021, 2, 3));
        assert_eq!(bar.open, dec!(10.5));
        assert_eq!(bar.high, dec!(12.25));
        assert_eq!(bar.volume, 0);
    }

    #[test]
    fn test_comma_mode_also_splits_on_space() {
        let bar = parse_row("2021-02-01, 10, 12, 9, 11, 100", Delimiter::Comma).unwrap();
        assert_eq!(bar.close, dec!(11));
        assert_eq!(bar.volume, 100);
    }

    #[test]
    fn test_bad_price_defaults_to_zero() {
        let bar = parse_row("2021-02-01,10,abc,9,11,100", Delimiter::Comma).unwrap();
        assert_eq!(bar.high, Decimal::ZERO);
        assert_eq!(bar.open, dec!(10));
        assert_eq!(bar.low, dec!(9));
    }

    #[test]
    fn test_bad_volume_defaults_to_zero() {
        let bar = parse_row("2021-02-01,10,12,9,11,1.5e3", Delimiter::Comma).unwrap();
        assert_eq!(bar.volume, 0);
    }

    #[test]
    fn test_bad_date_fails() {
        let err = parse_row("notadate,10,12,9,11,100", Delimiter::Comma).unwrap_err();
        assert!(matches!(err, WaveError::DateParse { ref token } if token == "notadate"));
    }

    #[test]
    fn test_short_row_fails() {
        let err = parse_row("2021-02-01,10,12,9", Delimiter::Comma).unwrap_err();
        assert!(matches!(err, WaveError::MissingField { field: "close" }));
        assert!(parse_row("   ", Delimiter::Space).is_err());
    }

    #[test]
    fn test_date_layouts() {
        assert_eq!(parse_date("2021/02/01").unwrap(), day(2021, 2, 1));
        assert_eq!(parse_date("01-Feb-21").unwrap(), day(2021, 2, 1));
        assert_eq!(parse_date("01-Feb-2021").unwrap(), day(2021, 2, 1));
        assert_eq!(parse_date("20210201").unwrap(), day(2021, 2, 1));
        assert!(parse_date("20211301").is_err());
        assert_eq!(
            parse_date("2021-02-01T09:30:00").unwrap(),
            NaiveDate::from_ymd_opt(2021, 2, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(Delimiter::detect("Date,Open,High"), Delimiter::Comma);
        assert_eq!(Delimiter::detect("Date Open High"), Delimiter::Space);
        assert!(Delimiter::detect("").is_space());
    }

    #[test]
    fn test_to_row_round_trip() {
        let bar = parse_row("2021-02-01,10.50,12,9.125,11,100", Delimiter::Comma).unwrap();
        for delimiter in [Delimiter::Comma, Delimiter::Space] {
            let row = to_row(&bar, delimiter);
            let back = parse_row(&row, delimiter).unwrap();
            assert_eq!(back, bar);
            assert_eq!(back.open.to_string(), "10.50");
        }
    }

    #[test]
    fn test_currency_symbol_not_stripped() {
        let bar = parse_row("2021-02-01,$10,12,9,11", Delimiter::Comma).unwrap();
        assert_eq!(bar.open, Decimal::ZERO);
    }
}
