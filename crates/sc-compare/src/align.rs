//! Timestamp alignment of client records against server records.
//!
//! The server side is indexed once. Keys are epoch seconds rendered as a
//! decimal string when the timestamp parses, otherwise the raw timestamp
//! (absent timestamps share one key). Epoch keys and raw text keys live in
//! the same key space; numeric raw timestamps do not. A later server record
//! takes the slot of an earlier one with the same key. The linear-scan fallback walks the records in order
//! instead, so it returns the *first* record with a matching raw time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::record::{Record, Timestamp};
use crate::time::parse_epoch_seconds;

/// Which lookup found the server record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPath {
    /// Same instant, possibly spelled differently.
    Epoch,
    /// Identical raw timestamp key in the index.
    RawKey,
    /// Linear scan over all server records.
    Scan,
}

impl core::fmt::Display for MatchPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MatchPath::Epoch => write!(f, "epoch"),
            MatchPath::RawKey => write!(f, "raw-key"),
            MatchPath::Scan => write!(f, "scan"),
        }
    }
}

/// A server record matched to a client record.
#[derive(Debug, Clone, Copy)]
pub struct ServerMatch<'a> {
    /// Position in the server dump.
    pub index: usize,
    pub record: &'a Record,
    pub path: MatchPath,
}

/// Index key for a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    /// Epoch seconds as a decimal string, or unparseable text.
    Text(String),
    /// A numeric timestamp, kept apart from every text key.
    Number(String),
    Absent,
}

impl JoinKey {
    /// Key for the timestamp exactly as written, without parsing.
    pub fn raw(time: Option<&Timestamp>) -> Self {
        match time {
            Some(Timestamp::Text(s)) => JoinKey::Text(s.clone()),
            Some(Timestamp::Number(n)) => JoinKey::Number(n.to_string()),
            None => JoinKey::Absent,
        }
    }

    fn epoch(seconds: i64) -> Self {
        JoinKey::Text(seconds.to_string())
    }
}

impl core::fmt::Display for JoinKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            JoinKey::Text(s) => write!(f, "{:?}", s),
            JoinKey::Number(n) => write!(f, "{}", n),
            JoinKey::Absent => write!(f, "null"),
        }
    }
}

/// Join key for a record's timestamp.
pub fn join_key(time: Option<&Timestamp>) -> JoinKey {
    match parse_epoch_seconds(time.and_then(Timestamp::as_text)) {
        Some(seconds) => JoinKey::epoch(seconds),
        None => JoinKey::raw(time),
    }
}

/// Server records indexed by join key, last write wins.
#[derive(Debug)]
pub struct ServerIndex<'a> {
    records: &'a [Record],
    slots: HashMap<JoinKey, usize>,
    collisions: usize,
}

impl<'a> ServerIndex<'a> {
    pub fn build(records: &'a [Record]) -> Self {
        let mut slots = HashMap::with_capacity(records.len());
        let mut collisions = 0;
        for (i, record) in records.iter().enumerate() {
            let key = join_key(record.time.as_ref());
            if let Some(previous) = slots.insert(key.clone(), i) {
                collisions += 1;
                tracing::warn!(
                    %key,
                    replaced = previous,
                    by = i,
                    "server records share a join key; keeping the later one"
                );
            }
        }
        Self {
            records,
            slots,
            collisions,
        }
    }

    /// Number of server records that lost their index slot to a later one.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Find the server record for a client record.
    ///
    /// Tries the epoch key, then the raw timestamp key, then scans all
    /// server records for an identical raw timestamp.
    pub fn find(&self, client: &Record) -> Option<ServerMatch<'a>> {
        let time = client.time.as_ref();

        if let Some(seconds) = parse_epoch_seconds(client.time_str()) {
            if let Some(&index) = self.slots.get(&JoinKey::epoch(seconds)) {
                return Some(self.matched(index, MatchPath::Epoch));
            }
        }

        if let Some(&index) = self.slots.get(&JoinKey::raw(time)) {
            return Some(self.matched(index, MatchPath::RawKey));
        }

        self.scan(time)
    }

    /// First server record whose raw timestamp equals `time`.
    pub fn scan(&self, time: Option<&Timestamp>) -> Option<ServerMatch<'a>> {
        self.records
            .iter()
            .position(|s| s.time.as_ref() == time)
            .map(|index| self.matched(index, MatchPath::Scan))
    }

    fn matched(&self, index: usize, path: MatchPath) -> ServerMatch<'a> {
        ServerMatch {
            index,
            record: &self.records[index],
            path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(time: Option<&str>, temperature: f64) -> Record {
        Record {
            time: time.map(Timestamp::from),
            weather: json!({"temperature": temperature})
                .as_object()
                .cloned()
                .unwrap_or_default(),
            ..Record::default()
        }
    }

    #[test]
    fn test_join_key() {
        assert_eq!(
            join_key(Some(&"2024-01-01T00:00:00Z".into())),
            JoinKey::Text("1704067200".to_string())
        );
        assert_eq!(
            join_key(Some(&"slot-7".into())),
            JoinKey::Text("slot-7".to_string())
        );
        assert_eq!(
            join_key(Some(&Timestamp::Number(1_704_067_200_i64.into()))),
            JoinKey::Number("1704067200".to_string())
        );
        assert_eq!(join_key(None), JoinKey::Absent);
    }

    #[test]
    fn test_epoch_match_across_spellings() {
        let server = vec![at(Some("2024-01-01T00:00:00+00:00"), 1.0)];
        let index = ServerIndex::build(&server);
        let m = index.find(&at(Some("2024-01-01T00:00:00Z"), 1.0)).unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.path, MatchPath::Epoch);
    }

    #[test]
    fn test_raw_key_match() {
        let server = vec![at(Some("slot-1"), 1.0), at(Some("slot-2"), 2.0)];
        let index = ServerIndex::build(&server);
        let m = index.find(&at(Some("slot-2"), 0.0)).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.path, MatchPath::RawKey);
    }

    #[test]
    fn test_absent_times_match_by_key() {
        let server = vec![at(Some("slot-1"), 1.0), at(None, 2.0)];
        let index = ServerIndex::build(&server);
        let m = index.find(&at(None, 0.0)).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.path, MatchPath::RawKey);
    }

    #[test]
    fn test_raw_key_shares_space_with_epoch_keys() {
        // An unparseable timestamp that reads like epoch seconds lands on
        // the same key as a parseable timestamp for that instant.
        let server = vec![
            at(Some("1704067200"), 1.0),
            at(Some("2024-01-01T00:00:00Z"), 2.0),
        ];
        let index = ServerIndex::build(&server);
        assert_eq!(index.collisions(), 1);
        assert_eq!(index.len(), 1);

        let m = index.find(&at(Some("1704067200"), 0.0)).unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.path, MatchPath::RawKey);
        assert_eq!(index.scan(Some(&"1704067200".into())).unwrap().index, 0);
    }

    #[test]
    fn test_numeric_time_keeps_its_own_key() {
        let mut numeric = at(None, 1.0);
        numeric.time = Some(Timestamp::Number(1_704_067_200_i64.into()));
        let server = vec![numeric.clone(), at(Some("2024-01-01T00:00:00Z"), 2.0)];
        let index = ServerIndex::build(&server);
        assert_eq!(index.collisions(), 0);
        assert_eq!(index.len(), 2);

        let by_number = index.find(&numeric).unwrap();
        assert_eq!(by_number.index, 0);
        assert_eq!(by_number.path, MatchPath::RawKey);

        let by_text = index.find(&at(Some("1704067200"), 0.0)).unwrap();
        assert_eq!(by_text.index, 1);
        assert_eq!(by_text.path, MatchPath::RawKey);
    }

    #[test]
    fn test_collision_last_write_wins_scan_first_wins() {
        let server = vec![
            at(Some("2024-01-01T00:00:00Z"), 1.0),
            at(Some("2024-01-01T00:00:00+00:00"), 2.0),
            at(Some("dup"), 3.0),
            at(Some("dup"), 4.0),
        ];
        let index = ServerIndex::build(&server);
        assert_eq!(index.collisions(), 2);

        let by_epoch = index.find(&at(Some("2024-01-01T00:00:00Z"), 0.0)).unwrap();
        assert_eq!(by_epoch.index, 1);
        assert_eq!(by_epoch.path, MatchPath::Epoch);

        let by_key = index.find(&at(Some("dup"), 0.0)).unwrap();
        assert_eq!(by_key.index, 3);
        assert_eq!(by_key.record.weather["temperature"], json!(4.0));

        let scanned = index.scan(Some(&"dup".into())).unwrap();
        assert_eq!(scanned.index, 2);
        assert_eq!(scanned.path, MatchPath::Scan);
    }

    #[test]
    fn test_no_match() {
        let server = vec![at(Some("2024-01-01T00:00:00Z"), 1.0)];
        let index = ServerIndex::build(&server);
        assert!(index.find(&at(Some("2024-01-01T01:00:00Z"), 1.0)).is_none());
        assert!(index.find(&at(None, 1.0)).is_none());
    }

    #[test]
    fn test_empty_server() {
        let index = ServerIndex::build(&[]);
        assert!(index.is_empty());
        assert!(index.find(&at(Some("2024-01-01T00:00:00Z"), 1.0)).is_none());
    }
}
