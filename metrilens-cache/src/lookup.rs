//! Cache lookup: streams a unit cache file and returns the first record
//! whose name matches exactly.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use serde::de::{Deserializer as _, Error as _, SeqAccess, Visitor};
use serde_json::Value;

use crate::error::Result;
use crate::models::MetricsRecord;

/// Find the record named `name` in the cache file at `file_path`.
///
/// Never fails: a missing, unreadable or malformed file, or no matching
/// record, yields [`MetricsRecord::placeholder`]. Only hard I/O and parse
/// errors are logged.
pub fn find(file_path: &Path, name: &str) -> MetricsRecord {
    match try_find(file_path, name) {
        Ok(Some(record)) => record,
        Ok(None) => {
            tracing::debug!("No metrics for {:?} in {}", name, file_path.display());
            MetricsRecord::placeholder(name)
        }
        Err(e) => {
            tracing::warn!("Failed to read metrics cache {}: {}", file_path.display(), e);
            MetricsRecord::placeholder(name)
        }
    }
}

/// Fallible lookup. `Ok(None)` means the file is absent or holds no match.
pub fn try_find(file_path: &Path, name: &str) -> Result<Option<MetricsRecord>> {
    let file = match File::open(file_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    if reader.fill_buf()?.starts_with(UTF8_BOM) {
        reader.consume(UTF8_BOM.len());
    }

    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    let mut found = None;
    let outcome = (&mut deserializer).deserialize_seq(FirstMatch {
        name,
        found: &mut found,
    });

    // Stopping early leaves the array unterminated from serde_json's point of
    // view, so a match wins over whatever error that produces.
    if found.is_some() {
        return Ok(found);
    }
    outcome?;
    Ok(None)
}

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Visits array elements one at a time, stopping at the first name match.
///
/// Elements are only converted to records once their name matches, so a
/// non-object or badly typed neighbour never hides the symbols after it.
struct FirstMatch<'a> {
    name: &'a str,
    found: &'a mut Option<MetricsRecord>,
}

impl<'de> Visitor<'de> for FirstMatch<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of metrics records")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(element) = seq.next_element::<Value>()? {
            let name = element.get("Name").and_then(Value::as_str).unwrap_or_default();
            if name.is_empty() || name != self.name {
                continue;
            }

            let record = serde_json::from_value::<MetricsRecord>(element)
                .map_err(|e| A::Error::custom(format!("record {:?}: {}", self.name, e)))?;
            *self.found = Some(record);
            return Ok(());
        }
        Ok(())
    }
}
