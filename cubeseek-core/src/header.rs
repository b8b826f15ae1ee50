//! FITS header store.
//!
//! The header is kept as a flat byte buffer of 80-character records, padded
//! to whole 2880-byte blocks and terminated by an `END` record. Keeping the
//! raw buffer (rather than a parsed map) means unknown keywords survive a
//! load/save round trip untouched.

use crate::error::HeaderError;

/// Size of one header record in bytes.
pub const RECORD_SIZE: usize = 80;
/// Size of one header block in bytes.
pub const BLOCK_SIZE: usize = 2880;
/// Number of records per header block.
pub const RECORDS_PER_BLOCK: usize = BLOCK_SIZE / RECORD_SIZE;
/// Maximum keyword length in bytes.
pub const KEYWORD_SIZE: usize = 8;
/// Offset of the value field within a record (keyword + `= `).
pub const VALUE_OFFSET: usize = 10;
/// Size of the value field in bytes.
pub const VALUE_SIZE: usize = RECORD_SIZE - VALUE_OFFSET;
/// Width of the fixed-format numeric value field.
pub const FIXED_WIDTH: usize = 20;

/// FITS header held as a contiguous, block-aligned byte buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    raw: Vec<u8>,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    /// Create a minimal header consisting of a single block holding only `END`.
    pub fn new() -> Self {
        let mut raw = vec![b' '; BLOCK_SIZE];
        raw[..3].copy_from_slice(b"END");
        Self { raw }
    }

    /// Take ownership of a raw header buffer read from disk.
    ///
    /// The buffer must be a whole number of 2880-byte blocks and contain an
    /// `END` record.
    pub fn from_raw(raw: Vec<u8>) -> Result<Self, HeaderError> {
        if raw.is_empty() || raw.len() % BLOCK_SIZE != 0 {
            return Err(HeaderError::IllegalKeyword(String::from(
                "header size is not a multiple of 2880 bytes",
            )));
        }
        let header = Self { raw };
        if header.end_line().is_none() {
            return Err(HeaderError::KeyMissing(String::from("END")));
        }
        Ok(header)
    }

    /// Borrow the raw header bytes.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Header size in bytes (always a multiple of 2880).
    pub fn size(&self) -> usize {
        self.raw.len()
    }

    /// Find the first record carrying `key`, returning its 0-based line.
    ///
    /// A record matches when its leading bytes equal the keyword and the
    /// byte that follows is a space or `=`, so `NAXIS` cannot alias
    /// `NAXIS1`.
    pub fn line_of(&self, key: &str) -> Option<usize> {
        let kb = key.as_bytes();
        if kb.is_empty() || kb.len() > KEYWORD_SIZE {
            return None;
        }
        for (line, record) in self.raw.chunks_exact(RECORD_SIZE).enumerate() {
            if record.starts_with(kb) {
                let next = record[kb.len()];
                if next == b' ' || next == b'=' {
                    return Some(line);
                }
            }
        }
        None
    }

    /// Returns `true` if the header contains `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.line_of(key).is_some()
    }

    fn end_line(&self) -> Option<usize> {
        self.line_of("END")
    }

    /// Borrow the 70-byte value field of the first record carrying `key`.
    fn value_field(&self, key: &str) -> Option<&[u8]> {
        let line = self.line_of(key)?;
        let start = line * RECORD_SIZE + VALUE_OFFSET;
        Some(&self.raw[start..start + VALUE_SIZE])
    }

    /// Read `key` as an integer; returns 0 when the keyword is absent.
    pub fn get_int(&self, key: &str) -> i64 {
        match self.value_field(key) {
            Some(field) => parse_int_field(field),
            None => {
                log::warn!("header keyword '{key}' not found");
                0
            }
        }
    }

    /// Read `key` as a float; returns NaN when the keyword is absent.
    pub fn get_flt(&self, key: &str) -> f64 {
        match self.value_field(key) {
            Some(field) => parse_flt_field(field),
            None => {
                log::warn!("header keyword '{key}' not found");
                f64::NAN
            }
        }
    }

    /// Read `key` as a boolean; returns `false` when the keyword is absent.
    ///
    /// The parse is deliberately lenient: the first non-space character of
    /// the value field is compared against `T`, whatever it is.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.value_field(key) {
            Some(field) => field
                .iter()
                .find(|&&b| b != b' ')
                .map(|&b| b == b'T')
                .unwrap_or(false),
            None => {
                log::warn!("header keyword '{key}' not found");
                false
            }
        }
    }

    /// Read `key` as a quoted string, unescaping doubled quotes.
    pub fn get_str(&self, key: &str) -> Result<String, HeaderError> {
        let field = self
            .value_field(key)
            .ok_or_else(|| HeaderError::KeyMissing(String::from(key)))?;

        let open = field
            .iter()
            .position(|&b| b == b'\'')
            .ok_or_else(|| HeaderError::NotAString(String::from(key)))?;

        let mut value = Vec::new();
        let mut i = open + 1;
        loop {
            match field.get(i) {
                Some(b'\'') if field.get(i + 1) == Some(&b'\'') => {
                    value.push(b'\'');
                    i += 2;
                }
                Some(b'\'') => break,
                Some(&b) => {
                    value.push(b);
                    i += 1;
                }
                None => return Err(HeaderError::UnbalancedQuotes(String::from(key))),
            }
        }

        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    /// Write a raw 70-byte value field under `key`.
    ///
    /// Overwrites the first existing record in place; otherwise inserts a new
    /// record immediately before `END`, growing the buffer by one block when
    /// `END` sits on the last record of a block. Returns `true` when a new
    /// record was created.
    fn put_raw(&mut self, key: &str, field: &[u8; VALUE_SIZE]) -> Result<bool, HeaderError> {
        let kb = key.as_bytes();
        if kb.is_empty() || kb.len() > KEYWORD_SIZE || !kb.iter().all(u8::is_ascii) {
            return Err(HeaderError::IllegalKeyword(String::from(key)));
        }

        if let Some(line) = self.line_of(key) {
            let start = line * RECORD_SIZE + VALUE_OFFSET;
            self.raw[start..start + VALUE_SIZE].copy_from_slice(field);
            return Ok(false);
        }

        let end = self
            .end_line()
            .ok_or_else(|| HeaderError::KeyMissing(String::from("END")))?;

        // The new record replaces END; grow by one block when END occupies
        // the last record of the current final block.
        if (end + 1) % RECORDS_PER_BLOCK == 0 {
            log::debug!("expanding header to fit new entry '{key}'");
            self.raw.resize(self.raw.len() + BLOCK_SIZE, b' ');
        }

        let start = end * RECORD_SIZE;
        self.raw[start..start + RECORD_SIZE].fill(b' ');
        self.raw[start..start + kb.len()].copy_from_slice(kb);
        self.raw[start + KEYWORD_SIZE] = b'=';
        self.raw[start + VALUE_OFFSET..start + RECORD_SIZE].copy_from_slice(field);

        let new_end = (end + 1) * RECORD_SIZE;
        self.raw[new_end..new_end + 3].copy_from_slice(b"END");

        Ok(true)
    }

    /// Write an integer value under `key`. Returns `true` for a new record.
    pub fn put_int(&mut self, key: &str, value: i64) -> Result<bool, HeaderError> {
        let mut field = [b' '; VALUE_SIZE];
        write_fixed(&mut field, &format!("{value:>FIXED_WIDTH$}"));
        self.put_raw(key, &field)
    }

    /// Write a float value under `key` in `%20.11E` format.
    pub fn put_flt(&mut self, key: &str, value: f64) -> Result<bool, HeaderError> {
        let mut field = [b' '; VALUE_SIZE];
        write_fixed(&mut field, &format!("{:>FIXED_WIDTH$}", format_exp(value)));
        self.put_raw(key, &field)
    }

    /// Write a boolean value under `key` (`T`/`F` in column 30).
    pub fn put_bool(&mut self, key: &str, value: bool) -> Result<bool, HeaderError> {
        let mut field = [b' '; VALUE_SIZE];
        field[FIXED_WIDTH - 1] = if value { b'T' } else { b'F' };
        self.put_raw(key, &field)
    }

    /// Write a quoted string value under `key`, escaping embedded quotes.
    pub fn put_str(&mut self, key: &str, value: &str) -> Result<bool, HeaderError> {
        let escaped = value.replace('\'', "''");
        if escaped.len() > VALUE_SIZE - 2 {
            return Err(HeaderError::ValueTooLong {
                key: String::from(key),
                len: value.len(),
            });
        }
        let mut field = [b' '; VALUE_SIZE];
        field[0] = b'\'';
        field[1..1 + escaped.len()].copy_from_slice(escaped.as_bytes());
        field[1 + escaped.len()] = b'\'';
        self.put_raw(key, &field)
    }

    /// Delete every record carrying `key`; returns `true` if any was found.
    ///
    /// Subsequent records shift up and the freed tail is space-filled. Whole
    /// empty blocks left between `END` and the end of the buffer are cut off.
    pub fn remove(&mut self, key: &str) -> bool {
        let mut found = false;
        while let Some(line) = self.line_of(key) {
            found = true;
            let start = line * RECORD_SIZE;
            self.raw.copy_within(start + RECORD_SIZE.., start);
            let len = self.raw.len();
            self.raw[len - RECORD_SIZE..].fill(b' ');
        }

        if found {
            if let Some(end) = self.end_line() {
                let total_lines = self.raw.len() / RECORD_SIZE;
                let empty_blocks = (total_lines - (end + 1)) / RECORDS_PER_BLOCK;
                if empty_blocks > 0 {
                    log::debug!("shrinking header by {empty_blocks} empty block(s)");
                    self.raw.truncate(self.raw.len() - empty_blocks * BLOCK_SIZE);
                }
            }
        }

        found
    }
}

/// Convert a header field to an owned ASCII string, blanking anything else.
fn field_str(field: &[u8]) -> String {
    field
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { ' ' })
        .collect()
}

/// Parse the leading token of a value field as an integer.
///
/// Mirrors `strtol`: the longest parseable prefix wins, anything else is 0.
fn parse_int_field(field: &[u8]) -> i64 {
    let text = field_str(field);
    let mut token = text.trim().split(' ').next().unwrap_or("");
    while !token.is_empty() {
        if let Ok(value) = token.parse::<i64>() {
            return value;
        }
        token = &token[..token.len() - 1];
    }
    0
}

/// Parse the leading token of a value field as a float (`strtod` semantics).
fn parse_flt_field(field: &[u8]) -> f64 {
    let text = field_str(field);
    let mut token = text.trim().split(' ').next().unwrap_or("");
    while !token.is_empty() {
        if let Ok(value) = token.parse::<f64>() {
            return value;
        }
        token = &token[..token.len() - 1];
    }
    0.0
}

/// Render a float the way C's `%.11E` does: eleven fractional digits and a
/// signed, at least two-digit exponent.
fn format_exp(value: f64) -> String {
    let upper = format!("{value:.11E}");
    match upper.rsplit_once('E') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(rest) => ('-', rest),
                None => ('+', exponent),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => upper,
    }
}

fn write_fixed(field: &mut [u8; VALUE_SIZE], text: &str) {
    let bytes = text.as_bytes();
    let len = bytes.len().min(VALUE_SIZE);
    field[..len].copy_from_slice(&bytes[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_header_is_one_block_with_end() {
        let header = Header::new();
        assert_eq!(header.size(), BLOCK_SIZE);
        assert_eq!(header.line_of("END"), Some(0));
    }

    #[test]
    fn test_put_get_int_roundtrip() {
        let mut header = Header::new();
        for value in [0_i64, 1, -1, 42, i64::MIN, i64::MAX] {
            header.put_int("TESTINT", value).unwrap();
            assert_eq!(header.get_int("TESTINT"), value);
        }
    }

    #[test]
    fn test_put_get_flt_roundtrip() {
        let mut header = Header::new();
        for value in [0.0_f64, 1.0, -1.5, 273.15, 1.0e-30, -4.2e25] {
            header.put_flt("TESTFLT", value).unwrap();
            let got = header.get_flt("TESTFLT");
            if value == 0.0 {
                assert_eq!(got, 0.0);
            } else {
                assert!((got - value).abs() / value.abs() < 1.0e-11);
            }
        }
    }

    #[test]
    fn test_put_get_bool_roundtrip() {
        let mut header = Header::new();
        header.put_bool("FLAG", true).unwrap();
        assert!(header.get_bool("FLAG"));
        header.put_bool("FLAG", false).unwrap();
        assert!(!header.get_bool("FLAG"));
    }

    #[test]
    fn test_put_get_str_roundtrip() {
        let mut header = Header::new();
        header.put_str("OBJECT", "NGC 1234").unwrap();
        assert_eq!(header.get_str("OBJECT").unwrap(), "NGC 1234");
    }

    #[test]
    fn test_str_with_embedded_quote() {
        let mut header = Header::new();
        header.put_str("COMMENT1", "it's ok").unwrap();
        assert_eq!(header.get_str("COMMENT1").unwrap(), "it's ok");
    }

    #[test]
    fn test_str_too_long_rejected() {
        let mut header = Header::new();
        let long = "x".repeat(VALUE_SIZE - 1);
        assert!(matches!(
            header.put_str("LONG", &long),
            Err(HeaderError::ValueTooLong { .. })
        ));
    }

    #[test]
    fn test_get_missing_defaults() {
        let header = Header::new();
        assert_eq!(header.get_int("NOPE"), 0);
        assert!(header.get_flt("NOPE").is_nan());
        assert!(!header.get_bool("NOPE"));
        assert!(matches!(
            header.get_str("NOPE"),
            Err(HeaderError::KeyMissing(_))
        ));
    }

    #[test]
    fn test_put_returns_new_flag() {
        let mut header = Header::new();
        assert!(header.put_int("BITPIX", -32).unwrap());
        assert!(!header.put_int("BITPIX", -64).unwrap());
        assert_eq!(header.get_int("BITPIX"), -64);
    }

    #[test]
    fn test_put_then_remove_then_get_fails() {
        let mut header = Header::new();
        header.put_int("NAXIS", 3).unwrap();
        assert!(header.remove("NAXIS"));
        assert_eq!(header.line_of("NAXIS"), None);
        assert!(!header.remove("NAXIS"));
        assert!(matches!(
            header.get_str("NAXIS"),
            Err(HeaderError::KeyMissing(_))
        ));
    }

    #[test]
    fn test_keyword_prefix_does_not_alias() {
        let mut header = Header::new();
        header.put_int("NAXIS1", 100).unwrap();
        header.put_int("NAXIS", 3).unwrap();
        assert_eq!(header.get_int("NAXIS"), 3);
        assert_eq!(header.get_int("NAXIS1"), 100);
    }

    #[test]
    fn test_header_grows_by_one_block() {
        let mut header = Header::new();
        // 35 records plus END fill the first block exactly.
        for i in 0..RECORDS_PER_BLOCK - 1 {
            header.put_int(&format!("KEY{i}"), i as i64).unwrap();
        }
        assert_eq!(header.size(), BLOCK_SIZE);
        header.put_int("OVERFLOW", 1).unwrap();
        assert_eq!(header.size(), 2 * BLOCK_SIZE);
        assert_eq!(header.get_int("OVERFLOW"), 1);
        assert!(header.line_of("END").is_some());
    }

    #[test]
    fn test_header_shrinks_after_remove() {
        let mut header = Header::new();
        for i in 0..RECORDS_PER_BLOCK {
            header.put_int(&format!("KEY{i}"), i as i64).unwrap();
        }
        assert_eq!(header.size(), 2 * BLOCK_SIZE);
        for i in 0..RECORDS_PER_BLOCK {
            header.remove(&format!("KEY{i}"));
        }
        assert_eq!(header.size(), BLOCK_SIZE);
        assert_eq!(header.line_of("END"), Some(0));
    }

    #[test]
    fn test_float_format_fixed_exponent_layout() {
        let mut header = Header::new();
        header.put_flt("CRPIX1", 1.0).unwrap();
        let line = header.line_of("CRPIX1").unwrap();
        let record = &header.raw()[line * RECORD_SIZE..(line + 1) * RECORD_SIZE];
        let text = std::str::from_utf8(record).unwrap();
        assert_eq!(&text[..30], "CRPIX1  =    1.00000000000E+00");
    }

    #[test]
    fn test_int_format_right_justified() {
        let mut header = Header::new();
        header.put_int("BITPIX", -32).unwrap();
        let line = header.line_of("BITPIX").unwrap();
        let record = &header.raw()[line * RECORD_SIZE..(line + 1) * RECORD_SIZE];
        let text = std::str::from_utf8(record).unwrap();
        assert_eq!(&text[..30], "BITPIX  =                  -32");
    }

    #[test]
    fn test_bool_lenient_parse() {
        let mut header = Header::new();
        let mut field = [b' '; VALUE_SIZE];
        field[0] = b'X';
        header.put_raw("WEIRD", &field).unwrap();
        // Any first non-space character other than 'T' reads as false.
        assert!(!header.get_bool("WEIRD"));
        field[0] = b'T';
        header.put_raw("WEIRD", &field).unwrap();
        assert!(header.get_bool("WEIRD"));
    }

    #[test]
    fn test_int_parse_stops_at_junk() {
        let mut header = Header::new();
        let mut field = [b' '; VALUE_SIZE];
        field[..6].copy_from_slice(b"123abc");
        header.put_raw("JUNK", &field).unwrap();
        assert_eq!(header.get_int("JUNK"), 123);
    }

    #[test]
    fn test_flt_parse_ignores_comment() {
        let mut header = Header::new();
        let mut field = [b' '; VALUE_SIZE];
        field[..22].copy_from_slice(b"1.5E+01 / some comment");
        header.put_raw("VAL", &field).unwrap();
        assert_eq!(header.get_flt("VAL"), 15.0);
    }

    #[test]
    fn test_format_exp_negative_exponent() {
        assert_eq!(format_exp(1.5e-5), "1.50000000000E-05");
        assert_eq!(format_exp(-2.0), "-2.00000000000E+00");
    }

    #[test]
    fn test_from_raw_requires_end() {
        assert!(Header::from_raw(vec![b' '; BLOCK_SIZE]).is_err());
        assert!(Header::from_raw(vec![b' '; 100]).is_err());
        let mut raw = vec![b' '; BLOCK_SIZE];
        raw[..3].copy_from_slice(b"END");
        assert!(Header::from_raw(raw).is_ok());
    }
}
