//! In-memory log of the communication between the external reader and the emulated card.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use crate::filter::Filter;
use crate::sink::{self, Event, Sink};
use crate::status::StatusWord;

/// How many entries are kept unless configured otherwise.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Which side of the emulation an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// APDU traffic exchanged with the external reader.
    Reader,

    /// State changes reported by the host.
    Host,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entry {
    pub message: String,
    pub direction: Direction,
    pub success: Option<bool>,
    pub timestamp: SystemTime,
}

impl Entry {
    pub fn new(message: impl Into<String>, direction: Direction, success: Option<bool>) -> Self {
        Self {
            message: message.into(),
            direction,
            success,
            timestamp: SystemTime::now(),
        }
    }
}

/// A bounded log; the oldest entries are dropped once the capacity is reached.
#[derive(Debug)]
pub struct CommunicationLog {
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
}

impl Default for CommunicationLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CommunicationLog {
    pub fn new() -> Self {
        Default::default()
    }

    /// Creates a log keeping at most `capacity` entries, at least one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a new entry.
    pub fn add(
        &self,
        message: impl Into<String>,
        direction: Direction,
        success: Option<bool>,
    ) -> sink::Result<()> {
        self.push(Entry::new(message, direction, success))
    }

    /// Appends the entry, dropping the oldest one when the log is full.
    pub fn push(&self, entry: Entry) -> sink::Result<()> {
        let mut entries = self.lock()?;
        entries.push_back(entry);
        while entries.len() > self.capacity {
            entries.pop_front();
        }

        Ok(())
    }

    /// Removes every entry.
    pub fn clear(&self) -> sink::Result<()> {
        self.lock()?.clear();

        Ok(())
    }

    /// Takes a snapshot of the entries, oldest first.
    pub fn entries(&self) -> sink::Result<Vec<Entry>> {
        Ok(self.lock()?.iter().cloned().collect())
    }

    /// Takes a snapshot of the entries the filter does not hide.
    pub fn visible(&self, filter: &Filter) -> sink::Result<Vec<Entry>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|e| !filter.should_hide(&e.message))
            .cloned()
            .collect())
    }

    /// Counts the entries. A poisoned lock is recovered here, since a panicking writer
    /// cannot leave the ring half-updated.
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the messages of the entries to the writer, separated by newlines.
    pub fn write_to<W>(writer: &mut W, entries: &[Entry]) -> std::io::Result<()>
    where
        W: Write,
    {
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                writer.write_all(b"\n")?;
            }
            writer.write_all(entry.message.as_bytes())?;
        }

        writer.flush()
    }

    fn lock(&self) -> sink::Result<MutexGuard<'_, VecDeque<Entry>>> {
        self.entries.lock().map_err(|_| sink::Error::Poisoned)
    }
}

impl Sink for CommunicationLog {
    fn record(&self, event: &Event<'_>) -> sink::Result<()> {
        match event {
            Event::Command(bytes) => self.add(
                format!("REQ: {}", hex::encode_upper(bytes)),
                Direction::Reader,
                None,
            ),
            Event::Response(bytes) => self.add(
                format!("RESP: {}", hex::encode_upper(bytes)),
                Direction::Reader,
                Some(StatusWord::from_response(bytes).map_or(false, StatusWord::is_ok)),
            ),
            Event::Deactivated(reason) => self.add(
                format!("STATE: Deactivated: {}", reason),
                Direction::Host,
                None,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::nfc::{DeactivationReason, HostApduService};
    use crate::responder::Responder;

    fn messages(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.message.as_str()).collect()
    }

    #[test]
    fn test_add_appends_entry() {
        let log = CommunicationLog::new();
        log.add("DATA", Direction::Host, None).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(1, entries.len());
        assert_eq!("DATA", entries[0].message);
        assert_eq!(Direction::Host, entries[0].direction);
        assert_eq!(None, entries[0].success);
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let log = CommunicationLog::new();
        log.add("ONE", Direction::Host, None).unwrap();
        log.add("TWO", Direction::Reader, None).unwrap();
        log.clear().unwrap();

        assert!(log.is_empty());
    }

    #[test]
    fn test_drops_oldest_past_capacity() {
        let log = CommunicationLog::with_capacity(2);
        for message in ["ONE", "TWO", "THREE"] {
            log.add(message, Direction::Reader, None).unwrap();
        }

        assert_eq!(vec!["TWO", "THREE"], messages(&log.entries().unwrap()));
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let log = CommunicationLog::with_capacity(0);
        log.add("ONE", Direction::Reader, None).unwrap();
        log.add("TWO", Direction::Reader, None).unwrap();

        assert_eq!(1, log.capacity());
        assert_eq!(vec!["TWO"], messages(&log.entries().unwrap()));
    }

    #[test]
    fn test_records_events() {
        let log = CommunicationLog::new();
        log.record(&Event::Command(&[0x00, 0xA4, 0x04, 0x00])).unwrap();
        log.record(&Event::Response(&[0x90, 0x00])).unwrap();
        log.record(&Event::Response(&[0x6A, 0x82])).unwrap();
        log.record(&Event::Deactivated(DeactivationReason::DESELECTED))
            .unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(
            vec![
                "REQ: 00A40400",
                "RESP: 9000",
                "RESP: 6A82",
                "STATE: Deactivated: deselected (1)",
            ],
            messages(&entries)
        );
        assert_eq!(Some(true), entries[1].success);
        assert_eq!(Some(false), entries[2].success);
        assert_eq!(Direction::Host, entries[3].direction);
    }

    #[test]
    fn test_records_empty_command() {
        let log = CommunicationLog::new();
        log.record(&Event::Command(&[])).unwrap();

        assert_eq!(vec!["REQ: "], messages(&log.entries().unwrap()));
    }

    #[test]
    fn test_visible_applies_filter() {
        let log = CommunicationLog::new();
        log.record(&Event::Command(&[0x00, 0xA4, 0x04, 0x00])).unwrap();
        log.record(&Event::Response(&[0x90, 0x00])).unwrap();

        let filter = Filter::from_patterns(["9000"]);

        assert_eq!(
            vec!["REQ: 00A40400"],
            messages(&log.visible(&filter).unwrap())
        );
        assert_eq!(2, log.len());
    }

    #[test]
    fn test_poisoned_lock_surfaces_as_error() {
        let log = CommunicationLog::new();
        log.add("ONE", Direction::Reader, None).unwrap();

        let joined = thread::scope(|s| {
            s.spawn(|| {
                let _guard = log.entries.lock().unwrap();
                panic!("writer crashed while holding the log");
            })
            .join()
        });
        assert!(joined.is_err());

        assert!(matches!(
            log.record(&Event::Command(&[0x00])),
            Err(sink::Error::Poisoned)
        ));
        assert!(matches!(log.entries(), Err(sink::Error::Poisoned)));
        assert_eq!(1, log.len());

        let responder = Responder::new(&log);
        assert_eq!(vec![0x90, 0x00], responder.handle_command(&[]));
        responder.handle_deactivation(DeactivationReason::LINK_LOSS);
    }

    #[test]
    fn test_write_to() {
        let entries = vec![
            Entry::new("REQ: 00", Direction::Reader, None),
            Entry::new("RESP: 9000", Direction::Reader, Some(true)),
        ];

        let mut buf = Vec::new();
        CommunicationLog::write_to(&mut buf, &entries).unwrap();

        assert_eq!(b"REQ: 00\nRESP: 9000".to_vec(), buf);
    }
}
