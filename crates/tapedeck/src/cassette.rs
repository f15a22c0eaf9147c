//! A cassette binds a logical name to a storage backend and answers the
//! three questions the recorder asks: is there a match, play it back,
//! record a new interaction.
//!
//! Scrub/unscrub happens here, at the storage boundary, so matching always
//! operates on real values while the on-disk form carries tokens. Writes
//! are strictly append-only; existing records are never mutated.

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::Result;
use crate::http::{Request, Response};
use crate::matchers::CompositeMatcher;
use crate::scrub::Scrubber;
use crate::storage::Storage;

pub struct Cassette {
    name: String,
    /// Serializes appends and scans on the shared cassette file; the
    /// streaming parsers assume a stable file tail.
    storage: Mutex<Box<dyn Storage>>,
    matcher: CompositeMatcher,
    scrubber: Scrubber,
}

impl Cassette {
    pub fn new(
        name: &str,
        storage: Box<dyn Storage>,
        matcher: CompositeMatcher,
        scrubber: Scrubber,
    ) -> Self {
        Self {
            name: name.to_string(),
            storage: Mutex::new(storage),
            matcher,
            scrubber,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the backing file was created in this session.
    pub fn is_new(&self) -> bool {
        self.storage.lock().is_new()
    }

    /// True iff `playback` with the same arguments would return a response.
    pub fn has_response(&self, request: &Request, index: u64) -> Result<bool> {
        Ok(self.playback(request, index)?.is_some())
    }

    /// Scan stored interactions for the `index`-th recording matching
    /// `request` under the configured matcher set.
    ///
    /// Records without an `index` field take the requested index as their
    /// own, so legacy cassettes always replay the first match no matter how
    /// often the request repeats.
    pub fn playback(&self, request: &Request, index: u64) -> Result<Option<Response>> {
        let mut storage = self.storage.lock();
        self.scan(storage.as_mut(), request, index)
    }

    fn scan(
        &self,
        storage: &mut dyn Storage,
        request: &Request,
        index: u64,
    ) -> Result<Option<Response>> {
        storage.rewind()?;
        while let Some(record) = storage.next_record()? {
            let restored = self.scrubber.unscrub(&record)?;
            let stored_request = Request::from_record(&restored["request"])?;
            if !self.matcher.matches(&stored_request, request) {
                continue;
            }
            let record_index = restored.get("index").and_then(Value::as_u64).unwrap_or(index);
            if record_index == index {
                debug!(
                    cassette = %self.name,
                    method = %request.method(),
                    url = request.url(),
                    index,
                    "playback hit"
                );
                return Ok(Some(Response::from_record(&restored["response"])?));
            }
        }
        Ok(None)
    }

    fn count_matches(&self, storage: &mut dyn Storage, request: &Request) -> Result<u64> {
        storage.rewind()?;
        let mut count = 0;
        while let Some(record) = storage.next_record()? {
            let restored = self.scrubber.unscrub(&record)?;
            let stored_request = Request::from_record(&restored["request"])?;
            if self.matcher.matches(&stored_request, request) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Append the interaction unless an equivalent recording already
    /// exists; at most one recording per distinct request identity as seen
    /// by the active matcher set. The record is scrubbed on the way out and
    /// durable on disk before this returns.
    pub fn record(&self, request: &Request, response: &Response) -> Result<()> {
        let mut storage = self.storage.lock();

        let occurrences = self.count_matches(storage.as_mut(), request)?;
        if self.scan(storage.as_mut(), request, occurrences)?.is_some() {
            debug!(
                cassette = %self.name,
                method = %request.method(),
                url = request.url(),
                "interaction already recorded, keeping the existing response"
            );
            return Ok(());
        }

        let mut record = self.scrubber.scrub(request, response);
        if occurrences > 0 {
            if let Some(map) = record.as_object_mut() {
                map.insert("index".to_string(), Value::from(occurrences));
            }
        }
        storage.store_recording(&record)?;
        info!(
            cassette = %self.name,
            method = %request.method(),
            url = request.url(),
            status = response.code(),
            "recorded new interaction"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrub::Redaction;
    use crate::storage::JsonStorage;
    use serde_json::json;

    fn cassette_at(dir: &std::path::Path, name: &str) -> Cassette {
        let storage = Box::new(JsonStorage::new(dir.join(name)).unwrap());
        Cassette::new(name, storage, CompositeMatcher::all(), Scrubber::default())
    }

    fn request(url: &str) -> Request {
        Request::new("GET", url).unwrap()
    }

    #[test]
    fn record_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let cassette = cassette_at(dir.path(), "c.json");
        let req = request("http://example.com/a");

        cassette
            .record(&req, &Response::new(200).with_body("first"))
            .unwrap();
        cassette
            .record(&req, &Response::new(500).with_body("second"))
            .unwrap();

        let played = cassette.playback(&req, 0).unwrap().unwrap();
        assert_eq!(played.code(), 200);
        assert_eq!(played.body(), Some(b"first".as_slice()));
        // The discarded response is nowhere on disk.
        let disk = std::fs::read_to_string(dir.path().join("c.json")).unwrap();
        assert!(!disk.contains("second"));
    }

    #[test]
    fn playback_misses_return_none() {
        let dir = tempfile::tempdir().unwrap();
        let cassette = cassette_at(dir.path(), "c.json");
        assert!(cassette
            .playback(&request("http://example.com/missing"), 0)
            .unwrap()
            .is_none());
        assert!(!cassette
            .has_response(&request("http://example.com/missing"), 0)
            .unwrap());
    }

    #[test]
    fn indexed_records_disambiguate_identical_requests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let records = json!([
            {"request": {"method": "GET", "url": "http://example.com/a"},
             "response": {"status": {"code": 200}, "body": "one"},
             "index": 0},
            {"request": {"method": "GET", "url": "http://example.com/a"},
             "response": {"status": {"code": 200}, "body": "two"},
             "index": 1},
        ]);
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let cassette = cassette_at(dir.path(), "c.json");
        let req = request("http://example.com/a");
        let first = cassette.playback(&req, 0).unwrap().unwrap();
        let second = cassette.playback(&req, 1).unwrap().unwrap();
        assert_eq!(first.body(), Some(b"one".as_slice()));
        assert_eq!(second.body(), Some(b"two".as_slice()));
    }

    #[test]
    fn legacy_records_without_index_always_replay_the_first_match() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let records = json!([
            {"request": {"method": "GET", "url": "http://example.com/a"},
             "response": {"status": {"code": 200}, "body": "one"}},
            {"request": {"method": "GET", "url": "http://example.com/a"},
             "response": {"status": {"code": 200}, "body": "two"}},
        ]);
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let cassette = cassette_at(dir.path(), "c.json");
        let req = request("http://example.com/a");
        for index in [0, 1, 7] {
            let played = cassette.playback(&req, index).unwrap().unwrap();
            assert_eq!(played.body(), Some(b"one".as_slice()));
        }
    }

    #[test]
    fn unindexed_record_shadows_later_indexed_ones() {
        // A record without an index adopts whatever index is requested, so
        // it wins over an indexed record appearing later in the file.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.json");
        let records = json!([
            {"request": {"method": "GET", "url": "http://example.com/a"},
             "response": {"status": {"code": 200}, "body": "one"}},
            {"request": {"method": "GET", "url": "http://example.com/a"},
             "response": {"status": {"code": 200}, "body": "two"},
             "index": 1},
        ]);
        std::fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

        let cassette = cassette_at(dir.path(), "c.json");
        let req = request("http://example.com/a");
        let played = cassette.playback(&req, 1).unwrap().unwrap();
        assert_eq!(played.body(), Some(b"one".as_slice()));
    }

    #[test]
    fn first_recording_carries_no_index_field() {
        let dir = tempfile::tempdir().unwrap();
        let cassette = cassette_at(dir.path(), "c.json");
        cassette
            .record(&request("http://example.com/a"), &Response::new(200))
            .unwrap();
        let disk = std::fs::read_to_string(dir.path().join("c.json")).unwrap();
        assert!(!disk.contains("index"));
    }

    #[test]
    fn secrets_are_scrubbed_on_disk_and_restored_on_playback() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Box::new(JsonStorage::new(dir.path().join("c.json")).unwrap());
        let scrubber = Scrubber::new(vec![Redaction::literal("<TOK>", "sekrit")]);
        let cassette = Cassette::new("c.json", storage, CompositeMatcher::all(), scrubber);

        let mut req = request("http://example.com/login");
        req.set_header("Authorization", "Bearer sekrit");
        cassette
            .record(&req, &Response::new(200).with_body("sekrit granted"))
            .unwrap();

        let disk = std::fs::read_to_string(dir.path().join("c.json")).unwrap();
        assert!(!disk.contains("sekrit"));
        assert!(disk.contains("<TOK>"));

        let played = cassette.playback(&req, 0).unwrap().unwrap();
        assert_eq!(played.body(), Some(b"sekrit granted".as_slice()));
    }

    #[test]
    fn is_new_reflects_the_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cassette_at(dir.path(), "c.json").is_new());
        assert!(!cassette_at(dir.path(), "c.json").is_new());
    }
}
