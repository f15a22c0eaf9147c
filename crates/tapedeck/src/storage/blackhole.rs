//! Storage that persists nothing: writes vanish, iteration is always empty.
//! Used where persistence must be disabled without changing the cassette
//! code path.

use serde_json::Value;

use super::Storage;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct BlackholeStorage;

impl BlackholeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for BlackholeStorage {
    fn store_recording(&mut self, _record: &Value) -> Result<()> {
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        Ok(())
    }

    fn next_record(&mut self) -> Result<Option<Value>> {
        Ok(None)
    }

    fn is_new(&self) -> bool {
        true
    }
}
