//! YAML cassette storage: a sequence of `- ...` blocks, one per record.
//!
//! Appends dump a one-element list at the end of file; reads scan byte by
//! byte and cut a new record wherever a `-` starts a line at column 0.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;

use super::Storage;
use crate::error::{Error, Result};

pub struct YamlStorage {
    path: PathBuf,
    is_new: bool,
    scanner: Option<Scanner>,
}

impl YamlStorage {
    /// Open (or seed) the cassette file at `path`. A missing or zero-byte
    /// file becomes a fresh empty cassette; a missing parent directory is a
    /// fatal setup error.
    pub fn new(path: PathBuf) -> Result<Self> {
        super::ensure_parent_exists(&path)?;
        let is_new = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        if is_new {
            File::create(&path)?;
            debug!(path = %path.display(), "seeded new yaml cassette");
        }
        Ok(Self {
            path,
            is_new,
            scanner: None,
        })
    }
}

impl Storage for YamlStorage {
    fn store_recording(&mut self, record: &Value) -> Result<()> {
        let dumped = serde_yaml::to_string(std::slice::from_ref(record))?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(b"\n")?;
        file.write_all(dumped.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        let path = self.path.display().to_string();
        self.scanner = Some(Scanner::new(
            BufReader::new(File::open(&self.path)?),
            path,
        ));
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Value>> {
        if self.scanner.is_none() {
            self.rewind()?;
        }
        self.scanner
            .as_mut()
            .expect("scanner initialized by rewind")
            .next_record()
    }

    fn is_new(&self) -> bool {
        self.is_new
    }
}

/// Byte scanner splitting the stream into per-record YAML texts. A list
/// item starts only when `-` follows a newline (or opens the stream), so
/// indented nested sequences stay inside their record.
struct Scanner {
    reader: BufReader<File>,
    path: String,
    prev: u8,
    chunk: Vec<u8>,
}

impl Scanner {
    fn new(reader: BufReader<File>, path: String) -> Self {
        Self {
            reader,
            path,
            prev: b'\n',
            chunk: Vec::new(),
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

    fn parse_chunk(&self, chunk: &[u8]) -> Result<Value> {
        let records: Vec<Value> = serde_yaml::from_slice(chunk)?;
        records.into_iter().next().ok_or(Error::CorruptCassette {
            path: self.path.clone(),
            reason: "empty yaml list item".to_string(),
        })
    }

    fn next_record(&mut self) -> Result<Option<Value>> {
        loop {
            let Some(byte) = self.next_byte()? else {
                if self.chunk.is_empty() {
                    return Ok(None);
                }
                let chunk = std::mem::take(&mut self.chunk);
                return self.parse_chunk(&chunk).map(Some);
            };

            let at_line_start = self.prev == b'\n';
            self.prev = byte;

            if byte == b'-' && at_line_start {
                if self.chunk.is_empty() {
                    self.chunk.push(byte);
                    continue;
                }
                // Boundary: hand out the finished record, start the next.
                let chunk = std::mem::replace(&mut self.chunk, vec![byte]);
                return self.parse_chunk(&chunk).map(Some);
            }

            if self.chunk.is_empty() {
                if byte.is_ascii_whitespace() {
                    continue;
                }
                return Err(Error::CorruptCassette {
                    path: self.path.clone(),
                    reason: format!("unexpected byte '{}' before first list item", byte as char),
                });
            }
            self.chunk.push(byte);
        }
    }
}
