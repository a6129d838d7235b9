use crate::utils::error::{Result, TallyError};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::Path;

/// Physical layout of the dump, detected from the first non-whitespace byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// One JSON record per line.
    NdJson,
    /// A single top-level JSON array of records.
    Array,
    /// A CouchDB page document: `{"total_rows": ..., "offset": ...,
    /// "rows": [...]}`. The records are the elements of `rows`.
    Page,
}

/// Splits the dump into raw per-record byte chunks without ever holding the
/// whole document in memory. Record *boundaries* are found here; decoding the
/// bytes into a [`PackageRecord`](crate::domain::model::PackageRecord) is the
/// adapter's job, so partitioned scans can parse in parallel.
///
/// A truncated trailing record is yielded as-is; it fails to decode
/// downstream and lands in the skipped-record counter instead of aborting
/// the run. Registry dumps of this size are usually partial downloads at
/// least once.
#[derive(Debug)]
pub struct RecordReader<R: BufRead> {
    inner: R,
    layout: Layout,
    started: bool,
    done: bool,
}

impl RecordReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => TallyError::InputNotFound {
                path: path.to_path_buf(),
            },
            _ => TallyError::InputUnreadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let layout = detect_layout(&mut inner)?;
        Ok(Self {
            inner,
            layout,
            started: false,
            done: false,
        })
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut line = Vec::new();
        loop {
            line.clear();
            let n = self.inner.read_until(b'\n', &mut line)?;
            if n == 0 {
                return Ok(None);
            }
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Ok(Some(std::mem::take(&mut line)));
            }
        }
    }

    /// Reads the next top-level array element by tracking brace/bracket
    /// depth and JSON string state. Returns the raw element bytes, or the
    /// unfinished remainder at EOF (left to fail decoding downstream).
    fn next_array_element(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.started {
            self.started = true;
            let opened = match self.layout {
                // Position inside the `rows` array, skipping the other keys.
                Layout::Page => self.seek_rows()?,
                // Consume the opening '['.
                _ => self.skip_to_byte(b'[')?,
            };
            if !opened {
                return match self.layout {
                    Layout::Page => Err(TallyError::IoError(std::io::Error::new(
                        ErrorKind::InvalidData,
                        "page document has no `rows` array",
                    ))),
                    _ => Ok(None),
                };
            }
        }

        // Between elements: commas and whitespace; ']' closes the array.
        loop {
            match self.peek_byte()? {
                None => return Ok(None),
                Some(b) if b.is_ascii_whitespace() || b == b',' => {
                    self.consume_byte();
                }
                Some(b']') => {
                    self.consume_byte();
                    self.done = true;
                    return Ok(None);
                }
                Some(_) => break,
            }
        }

        let mut element = Vec::new();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while let Some(b) = self.peek_byte()? {
            if in_string {
                self.consume_byte();
                element.push(b);
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                    if depth == 0 {
                        return Ok(Some(element));
                    }
                }
                continue;
            }

            match b {
                b'"' => {
                    self.consume_byte();
                    element.push(b);
                    in_string = true;
                }
                b'{' | b'[' => {
                    self.consume_byte();
                    element.push(b);
                    depth += 1;
                }
                b'}' | b']' if depth > 0 => {
                    self.consume_byte();
                    element.push(b);
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Some(element));
                    }
                }
                // At depth 0 a scalar ends at the first delimiter.
                b',' | b']' | b'}' => return Ok(Some(element)),
                _ if b.is_ascii_whitespace() && depth == 0 => return Ok(Some(element)),
                _ => {
                    self.consume_byte();
                    element.push(b);
                }
            }
        }

        // EOF mid-element: truncated dump.
        if element.is_empty() {
            Ok(None)
        } else {
            Ok(Some(element))
        }
    }

    /// Walks the top-level keys of a page document until it can position the
    /// stream just inside the `rows` array. Returns false when the object
    /// closes without one.
    fn seek_rows(&mut self) -> Result<bool> {
        if !self.skip_to_byte(b'{')? {
            return Ok(false);
        }
        loop {
            // Between entries: whitespace and commas; '}' closes the object.
            loop {
                match self.peek_byte()? {
                    None => return Ok(false),
                    Some(b) if b.is_ascii_whitespace() || b == b',' => self.consume_byte(),
                    Some(b'}') => {
                        self.consume_byte();
                        return Ok(false);
                    }
                    Some(_) => break,
                }
            }

            let Some(key) = self.read_key()? else {
                return Ok(false);
            };
            if !self.skip_to_byte(b':')? {
                return Ok(false);
            }
            while matches!(self.peek_byte()?, Some(b) if b.is_ascii_whitespace()) {
                self.consume_byte();
            }

            if key == b"rows" {
                return match self.peek_byte()? {
                    Some(b'[') => {
                        self.consume_byte();
                        Ok(true)
                    }
                    _ => Ok(false),
                };
            }
            self.skip_value()?;
        }
    }

    /// Reads an object key, assuming the next byte opens its string.
    fn read_key(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek_byte()? {
            Some(b'"') => self.consume_byte(),
            _ => return Ok(None),
        }
        let mut key = Vec::new();
        let mut escaped = false;
        while let Some(b) = self.peek_byte()? {
            self.consume_byte();
            if escaped {
                escaped = false;
                key.push(b);
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                return Ok(Some(key));
            } else {
                key.push(b);
            }
        }
        Ok(None)
    }

    /// Skips one JSON value using the same depth/string tracking as the
    /// element splitter, without collecting it. The delimiter after a
    /// depth-0 scalar is left unconsumed.
    fn skip_value(&mut self) -> Result<()> {
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while let Some(b) = self.peek_byte()? {
            if in_string {
                self.consume_byte();
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                continue;
            }

            match b {
                b'"' => {
                    self.consume_byte();
                    in_string = true;
                }
                b'{' | b'[' => {
                    self.consume_byte();
                    depth += 1;
                }
                b'}' | b']' if depth > 0 => {
                    self.consume_byte();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                b',' | b'}' | b']' => return Ok(()),
                _ if b.is_ascii_whitespace() && depth == 0 => return Ok(()),
                _ => self.consume_byte(),
            }
        }
        Ok(())
    }

    fn skip_to_byte(&mut self, target: u8) -> Result<bool> {
        while let Some(b) = self.peek_byte()? {
            self.consume_byte();
            if b == target {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn peek_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.inner.fill_buf()?;
        Ok(buf.first().copied())
    }

    fn consume_byte(&mut self) {
        self.inner.consume(1);
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = match self.layout {
            Layout::NdJson => self.next_line(),
            Layout::Array | Layout::Page => self.next_array_element(),
        };
        match next {
            Ok(Some(raw)) => Some(Ok(raw)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// A page export and an NDJSON dump both start with '{'; the two are told
/// apart by the first object key, inspected in the buffer without consuming.
fn detect_layout<R: BufRead>(inner: &mut R) -> std::io::Result<Layout> {
    match peek_first_byte(inner)? {
        Some(b'[') => Ok(Layout::Array),
        Some(b'{') => {
            let buf = inner.fill_buf()?;
            Ok(match first_object_key(buf) {
                Some(b"rows" | b"total_rows" | b"offset") => Layout::Page,
                _ => Layout::NdJson,
            })
        }
        _ => Ok(Layout::NdJson),
    }
}

fn first_object_key(buf: &[u8]) -> Option<&[u8]> {
    let start = buf.iter().position(|&b| b == b'"')? + 1;
    let len = buf[start..].iter().position(|&b| b == b'"')?;
    Some(&buf[start..start + len])
}

fn peek_first_byte<R: BufRead>(inner: &mut R) -> std::io::Result<Option<u8>> {
    loop {
        let buf = inner.fill_buf()?;
        match buf.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(i) => {
                let b = buf[i];
                // Leading whitespace is noise for both layouts; for NDJSON the
                // blank-line skip handles it again anyway.
                inner.consume(i);
                return Ok(Some(b));
            }
            None => {
                let len = buf.len();
                if len == 0 {
                    return Ok(None);
                }
                inner.consume(len);
            }
        }
    }
}

/// Collects every raw record; test helper.
pub fn read_all<R: Read>(reader: R) -> Result<Vec<Vec<u8>>> {
    RecordReader::new(BufReader::new(reader))?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(input: &str) -> Vec<String> {
        read_all(input.as_bytes())
            .unwrap()
            .into_iter()
            .map(|raw| String::from_utf8(raw).unwrap())
            .collect()
    }

    #[test]
    fn ndjson_layout_yields_one_record_per_line() {
        let input = "{\"name\":\"x\"}\n\n{\"name\":\"y\"}\n";
        assert_eq!(records(input), vec!["{\"name\":\"x\"}", "{\"name\":\"y\"}"]);
    }

    #[test]
    fn ndjson_last_line_without_newline_is_yielded() {
        let input = "{\"name\":\"x\"}\n{\"name\":\"y\"";
        assert_eq!(records(input), vec!["{\"name\":\"x\"}", "{\"name\":\"y\""]);
    }

    #[test]
    fn array_layout_splits_elements() {
        let input = r#"[{"name":"x","dependencies":["a"]}, {"name":"y"},{"name":"z"}]"#;
        assert_eq!(
            records(input),
            vec![
                r#"{"name":"x","dependencies":["a"]}"#,
                r#"{"name":"y"}"#,
                r#"{"name":"z"}"#
            ]
        );
    }

    #[test]
    fn array_layout_handles_nested_structures_and_strings() {
        // Braces and commas inside strings must not split records.
        let input = r#"[{"name":"tricky,]}","dependencies":{"a":"^1.0","b":"~2"}},{"name":"esc\"aped"}]"#;
        let recs = records(input);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].contains("tricky,]}"));
        assert!(recs[1].contains(r#"esc\"aped"#));
    }

    #[test]
    fn array_layout_detected_after_leading_whitespace() {
        let input = "  \n\t[ {\"name\":\"x\"} ]";
        let reader = RecordReader::new(BufReader::new(input.as_bytes())).unwrap();
        assert_eq!(reader.layout(), Layout::Array);
    }

    #[test]
    fn truncated_array_yields_partial_final_record() {
        let input = r#"[{"name":"x"},{"name":"y","depen"#;
        let recs = records(input);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0], r#"{"name":"x"}"#);
        // The partial tail comes through raw; decoding it is what fails.
        assert!(recs[1].starts_with(r#"{"name":"y""#));
    }

    #[test]
    fn page_document_yields_the_rows_elements() {
        let input = r#"{"total_rows":2,"offset":0,"rows":[{"id":"x","doc":{}},{"id":"y","doc":{}}]}"#;
        let reader = RecordReader::new(BufReader::new(input.as_bytes())).unwrap();
        assert_eq!(reader.layout(), Layout::Page);
        assert_eq!(
            records(input),
            vec![r#"{"id":"x","doc":{}}"#, r#"{"id":"y","doc":{}}"#]
        );
    }

    #[test]
    fn page_document_with_rows_first_ignores_trailing_keys() {
        let input = r#"{"rows":[{"id":"x"}],"total_rows":1}"#;
        assert_eq!(records(input), vec![r#"{"id":"x"}"#]);
    }

    #[test]
    fn ndjson_object_lines_are_not_mistaken_for_a_page() {
        let input = "{\"name\":\"x\"}\n{\"name\":\"y\"}\n";
        let reader = RecordReader::new(BufReader::new(input.as_bytes())).unwrap();
        assert_eq!(reader.layout(), Layout::NdJson);
        assert_eq!(records(input), vec!["{\"name\":\"x\"}", "{\"name\":\"y\"}"]);
    }

    #[test]
    fn page_document_without_rows_is_an_error() {
        let input = r#"{"total_rows":3,"offset":0}"#;
        let reader = RecordReader::new(BufReader::new(input.as_bytes())).unwrap();
        assert_eq!(reader.layout(), Layout::Page);
        let result: Result<Vec<Vec<u8>>> = reader.collect();
        assert!(result.is_err());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(records("").is_empty());
        assert!(records("[]").is_empty());
        assert!(records("[ ]").is_empty());
        assert!(records("\n\n").is_empty());
    }

    #[test]
    fn open_missing_file_is_input_not_found() {
        let err = RecordReader::open(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, TallyError::InputNotFound { .. }));
    }
}
