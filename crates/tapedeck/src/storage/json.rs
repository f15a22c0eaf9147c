//! JSON cassette storage: one top-level array of record objects.
//!
//! Appends splice a record in just before the closing `]` instead of
//! rewriting the file. Reads run a depth-tracking byte scanner over a
//! buffered reader, yielding one top-level `{...}` object at a time.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use super::Storage;
use crate::error::{Error, Result};

pub struct JsonStorage {
    path: PathBuf,
    is_new: bool,
    scanner: Option<Scanner>,
}

impl JsonStorage {
    /// Open (or seed) the cassette file at `path`. A missing or zero-byte
    /// file becomes a fresh `[]` cassette; a missing parent directory is a
    /// fatal setup error.
    pub fn new(path: PathBuf) -> Result<Self> {
        super::ensure_parent_exists(&path)?;
        let is_new = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if is_new {
            std::fs::write(&path, b"[]")?;
            debug!(path = %path.display(), "seeded new json cassette");
        }
        Ok(Self {
            path,
            is_new,
            scanner: None,
        })
    }

    fn corrupt(&self, reason: &str) -> Error {
        Error::CorruptCassette {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Locate the closing `]` by scanning backwards from the end, and
    /// whether the array is empty (the previous non-whitespace byte is `[`).
    fn locate_tail(&self, file: &mut File) -> Result<(u64, bool)> {
        const CHUNK: u64 = 256;
        let len = file.metadata()?.len();
        let mut end = len;
        let mut closing: Option<u64> = None;
        let mut before_closing: Option<u8> = None;

        'scan: while end > 0 {
            let start = end.saturating_sub(CHUNK);
            file.seek(SeekFrom::Start(start))?;
            let mut buf = vec![0u8; (end - start) as usize];
            file.read_exact(&mut buf)?;
            for (i, &byte) in buf.iter().enumerate().rev() {
                if byte.is_ascii_whitespace() {
                    continue;
                }
                if closing.is_none() {
                    if byte != b']' {
                        return Err(self.corrupt("file does not end with ']'"));
                    }
                    closing = Some(start + i as u64);
                } else {
                    before_closing = Some(byte);
                    break 'scan;
                }
            }
            end = start;
        }

        let closing = closing.ok_or_else(|| self.corrupt("no closing ']' found"))?;
        match before_closing {
            Some(b'[') => Ok((closing, true)),
            Some(_) => Ok((closing, false)),
            None => Err(self.corrupt("no opening '[' found")),
        }
    }
}

impl Storage for JsonStorage {
    fn store_recording(&mut self, record: &Value) -> Result<()> {
        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let (closing, empty) = self.locate_tail(&mut file)?;

        file.seek(SeekFrom::Start(closing))?;
        if !empty {
            file.write_all(b",\n")?;
        }
        file.write_all(serde_json::to_string(record)?.as_bytes())?;
        file.write_all(b"]")?;
        file.sync_data()?;
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        self.scanner = Some(Scanner::new(BufReader::new(File::open(&self.path)?)));
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Value>> {
        if self.scanner.is_none() {
            self.rewind()?;
        }
        let path = self.path.display().to_string();
        self.scanner
            .as_mut()
            .expect("scanner initialized by rewind")
            .next_record(&path)
    }

    fn is_new(&self) -> bool {
        self.is_new
    }
}

/// Streaming scanner over the top-level array. Tracks brace depth and
/// string-literal state so braces inside string values don't perturb the
/// depth count; memory is bounded by the largest single record.
struct Scanner {
    reader: BufReader<File>,
    finished: bool,
}

impl Scanner {
    fn new(reader: BufReader<File>) -> Self {
        Self {
            reader,
            finished: false,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let buf = self.reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        let byte = buf[0];
        self.reader.consume(1);
        Ok(Some(byte))
    }

    fn next_record(&mut self, path: &str) -> Result<Option<Value>> {
        let corrupt = |reason: &str| Error::CorruptCassette {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if self.finished {
            return Ok(None);
        }

        // Skip array punctuation up to the next top-level object.
        loop {
            match self.next_byte()? {
                None => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(b) if b.is_ascii_whitespace() || b == b'[' || b == b',' => continue,
                Some(b']') => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(b'{') => break,
                Some(other) => {
                    return Err(corrupt(&format!(
                        "unexpected byte '{}' between records",
                        other as char
                    )))
                }
            }
        }

        let mut buf = vec![b'{'];
        let mut depth = 1usize;
        let mut in_string = false;
        let mut escaped = false;
        loop {
            let byte = self
                .next_byte()?
                .ok_or_else(|| corrupt("unexpected end of file inside record"))?;
            buf.push(byte);
            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                }
            } else {
                match byte {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(Some(serde_json::from_slice(&buf)?))
    }
}
