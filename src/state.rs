//! Clock sequence state and its persistence.
//!
//! The state is the triple of node identifier, last timestamp, and clock sequence. A
//! [`SequenceState`] keeps it in memory and writes it through a [`StateStore`] after every
//! mutation. Two stores are provided: [`FileStore`] keeps the record in a small binary file so
//! that the clock sequence survives restarts and is shared by processes on the same host, and
//! [`EphemeralStore`] keeps nothing.
//!
//! # Record layout
//!
//! ```text
//! +--------+--------+----------------+--------------+
//! | "uid1" |  node  |   timestamp    |  clock_seq   |
//! | 4 bytes| 6 bytes| 8 bytes (BE)   | 2 bytes (BE) |
//! +--------+--------+----------------+--------------+
//! ```
//!
//! A file of any other length, with a different magic, or with out-of-range field values is
//! treated as absent.

use std::{
    fmt, fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
    process,
    sync::atomic::{AtomicUsize, Ordering},
};

use log::{debug, trace, warn};

use crate::{node::MAX_NODE, Error, Result};

/// Mask of the 14-bit clock sequence.
pub const MAX_CLOCK_SEQ: u16 = (1 << 14) - 1;

const MAGIC: &[u8; 4] = b"uid1";
const RECORD_LEN: usize = 20;

/// A snapshot of the generator state as persisted.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Record {
    /// The 48-bit node identifier the state belongs to.
    pub node_id: u64,
    /// The latest 60-bit timestamp observed.
    pub timestamp: u64,
    /// The 14-bit clock sequence.
    pub clock_sequence: u16,
}

impl Record {
    /// Serializes the record into its fixed-length binary form.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[..4].copy_from_slice(MAGIC);
        buf[4..10].copy_from_slice(&self.node_id.to_be_bytes()[2..]);
        buf[10..18].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[18..].copy_from_slice(&self.clock_sequence.to_be_bytes());
        buf
    }

    /// Deserializes a record, failing with [`Error::CorruptRecord`] on any malformed input.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() != RECORD_LEN || &src[..4] != MAGIC {
            return Err(Error::CorruptRecord);
        }

        let mut node = [0u8; 8];
        node[2..].copy_from_slice(&src[4..10]);
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&src[10..18]);

        let record = Self {
            node_id: u64::from_be_bytes(node),
            timestamp: u64::from_be_bytes(timestamp),
            clock_sequence: u16::from_be_bytes([src[18], src[19]]),
        };
        if record.node_id > MAX_NODE
            || record.timestamp >= 1 << 60
            || record.clock_sequence > MAX_CLOCK_SEQ
        {
            return Err(Error::CorruptRecord);
        }
        Ok(record)
    }
}

/// A persistence strategy for the generator state.
pub trait StateStore {
    /// Reads the persisted record. Returns `Ok(None)` if none has been written yet.
    fn load(&mut self) -> Result<Option<Record>>;

    /// Overwrites the persisted record.
    fn save(&mut self, record: &Record) -> Result<()>;
}

/// Keeps the state only in memory for the lifetime of the generator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct EphemeralStore;

impl StateStore for EphemeralStore {
    fn load(&mut self) -> Result<Option<Record>> {
        Ok(None)
    }

    fn save(&mut self, _: &Record) -> Result<()> {
        Ok(())
    }
}

/// Keeps the state in a file.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct FileStore {
    path: PathBuf,
    mode: u32,
}

impl FileStore {
    /// Creates a store backed by the file at `path`, which gets the permission bits `mode` on
    /// every save (ignored on non-Unix platforms).
    pub fn new(path: impl Into<PathBuf>, mode: u32) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }

    /// Returns a sibling path, unique within the process, to stage a new record in.
    fn staging_path(&self) -> io::Result<PathBuf> {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let mut name = self
            .path
            .file_name()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "state file has no name"))?
            .to_os_string();
        name.push(format!(
            ".{}.{}.tmp",
            process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        Ok(self.path.with_file_name(name))
    }

    /// Writes `bytes` to a new file at `path` with the configured mode.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        std::os::unix::fs::OpenOptionsExt::mode(&mut options, self.mode);

        let mut file = options.open(path)?;
        // apply the exact mode regardless of umask
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(self.mode))?;
        }
        file.write_all(bytes)
    }
}

impl StateStore for FileStore {
    fn load(&mut self) -> Result<Option<Record>> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        // one extra byte is enough to tell an oversized file
        let mut bytes = Vec::with_capacity(RECORD_LEN + 1);
        file.take(RECORD_LEN as u64 + 1).read_to_end(&mut bytes)?;
        Record::decode(&bytes).map(Some)
    }

    /// Stages the record in a sibling file and renames it over the state file, so that readers
    /// see either the previous record or the new one.
    fn save(&mut self, record: &Record) -> Result<()> {
        let staging = self.staging_path()?;
        let written = self
            .write_new(&staging, &record.encode())
            .and_then(|_| fs::rename(&staging, &self.path));
        if let Err(err) = written {
            let _ = fs::remove_file(&staging);
            return Err(err.into());
        }
        Ok(())
    }
}

/// The in-memory generator state, written through to a [`StateStore`] on every mutation.
pub struct SequenceState {
    current: Option<Record>,
    store: Box<dyn StateStore + Send>,
    save_failed: bool,
}

impl fmt::Debug for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceState")
            .field("current", &self.current)
            .field("save_failed", &self.save_failed)
            .finish_non_exhaustive()
    }
}

impl SequenceState {
    /// Creates the state, reading the persisted record once. An unreadable or corrupt record is
    /// reported and treated as absent.
    pub fn new(mut store: Box<dyn StateStore + Send>) -> Self {
        let current = match store.load() {
            Ok(record) => record,
            Err(err) => {
                warn!("ignoring persisted clock sequence state: {err}");
                None
            }
        };
        Self {
            current,
            store,
            save_failed: false,
        }
    }

    /// Returns the latest record, if any.
    pub fn current(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    /// Returns the current clock sequence, if initialized.
    pub fn clock_sequence(&self) -> Option<u16> {
        self.current.map(|e| e.clock_sequence)
    }

    /// Determines the clock sequence and timestamp for a new UUID generated by `node_id` at
    /// `now`, updating and persisting the state.
    ///
    /// The clock sequence is randomly initialized if there is no state for `node_id`, incremented
    /// if `now` does not exceed the latest timestamp observed, and kept otherwise. The returned
    /// timestamp is always `now`.
    pub fn next(&mut self, node_id: u64, now: u64) -> (u16, u64) {
        (self.step(node_id, now, false), now)
    }

    /// Unconditionally advances the clock sequence, returning the new value.
    pub fn advance(&mut self, node_id: u64, now: u64) -> u16 {
        self.step(node_id, now, true)
    }

    fn step(&mut self, node_id: u64, now: u64, force: bool) -> u16 {
        let record = match self.current {
            Some(prev) if prev.node_id == node_id => {
                let clock_sequence = if force || now <= prev.timestamp {
                    trace!("bumping clock sequence past {}", prev.clock_sequence);
                    (prev.clock_sequence + 1) & MAX_CLOCK_SEQ
                } else {
                    prev.clock_sequence
                };
                Record {
                    node_id,
                    timestamp: now.max(prev.timestamp),
                    clock_sequence,
                }
            }
            _ => {
                let clock_sequence = rand::random::<u16>() & MAX_CLOCK_SEQ;
                debug!("initialized clock sequence {clock_sequence} for node {node_id:012x}");
                Record {
                    node_id,
                    timestamp: now,
                    clock_sequence,
                }
            }
        };

        self.current = Some(record);
        match self.store.save(&record) {
            Ok(()) if self.save_failed => {
                debug!("persisting clock sequence state again");
                self.save_failed = false;
            }
            Ok(()) => {}
            // report only the first of a run of failures
            Err(err) if self.save_failed => {
                trace!("could not persist clock sequence state: {err}");
            }
            Err(err) => {
                warn!("could not persist clock sequence state: {err}");
                self.save_failed = true;
            }
        }
        record.clock_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::{
        EphemeralStore, FileStore, Record, SequenceState, StateStore, MAGIC, MAX_CLOCK_SEQ,
    };
    use crate::{Error, Result};
    use std::{
        cell::Cell,
        fs,
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Mutex,
        },
        thread,
    };

    /// A store shared with the test body to observe writes.
    #[derive(Clone, Default)]
    struct SharedStore(Arc<Mutex<Option<Record>>>);

    impl StateStore for SharedStore {
        fn load(&mut self) -> Result<Option<Record>> {
            Ok(*self.0.lock().unwrap())
        }

        fn save(&mut self, record: &Record) -> Result<()> {
            *self.0.lock().unwrap() = Some(*record);
            Ok(())
        }
    }

    /// A store whose writes always fail.
    struct BrokenStore;

    impl StateStore for BrokenStore {
        fn load(&mut self) -> Result<Option<Record>> {
            Err(Error::CorruptRecord)
        }

        fn save(&mut self, _: &Record) -> Result<()> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into())
        }
    }

    /// A store whose writes fail while the flag is set.
    #[derive(Clone, Default)]
    struct FlakyStore(Arc<AtomicBool>);

    impl StateStore for FlakyStore {
        fn load(&mut self) -> Result<Option<Record>> {
            Ok(None)
        }

        fn save(&mut self, _: &Record) -> Result<()> {
            if self.0.load(Ordering::SeqCst) {
                Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied).into())
            } else {
                Ok(())
            }
        }
    }

    thread_local!(static WARNINGS: Cell<usize> = Cell::new(0));

    /// Counts warnings logged by the current thread.
    struct WarningCounter;

    impl log::Log for WarningCounter {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::Level::Warn
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                WARNINGS.with(|n| n.set(n.get() + 1));
            }
        }

        fn flush(&self) {}
    }

    /// Returns the number of warnings `f` logs.
    fn count_warnings(f: impl FnOnce()) -> usize {
        static LOGGER: WarningCounter = WarningCounter;
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Warn);

        WARNINGS.with(|n| n.set(0));
        f();
        WARNINGS.with(|n| n.get())
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "uuid1-state-test-{}-{}",
            std::process::id(),
            name
        ));
        let _ = fs::remove_file(&path);
        path
    }

    const NODE: u64 = 0x001b_6384_45e6;

    /// Decodes what it encodes
    #[test]
    fn decodes_what_it_encodes() {
        let cases = [
            Record {
                node_id: 0,
                timestamp: 0,
                clock_sequence: 0,
            },
            Record {
                node_id: (1 << 48) - 1,
                timestamp: (1 << 60) - 1,
                clock_sequence: MAX_CLOCK_SEQ,
            },
            Record {
                node_id: NODE,
                timestamp: 0x01d3_696e_2a3f_8000,
                clock_sequence: 0x1234,
            },
        ];

        for e in cases {
            assert_eq!(Record::decode(&e.encode()).unwrap(), e);
        }
    }

    /// Rejects malformed records
    #[test]
    fn rejects_malformed_records() {
        let valid = Record {
            node_id: NODE,
            timestamp: 1,
            clock_sequence: 1,
        }
        .encode();

        let mut bad_magic = valid;
        bad_magic[0] = b'x';
        let mut bad_timestamp = valid;
        bad_timestamp[10] = 0xf0;
        let mut bad_clock_seq = valid;
        bad_clock_seq[18] = 0x40;

        let trailing = [valid.as_slice(), b"\n"].concat();

        let cases: [&[u8]; 6] = [
            b"",
            &valid[..19],
            &trailing,
            &bad_magic,
            &bad_timestamp,
            &bad_clock_seq,
        ];
        for e in cases {
            assert!(matches!(Record::decode(e), Err(Error::CorruptRecord)));
        }
    }

    /// Initializes random clock sequence without prior state
    #[test]
    fn initializes_random_clock_sequence_without_prior_state() {
        let mut state = SequenceState::new(Box::new(EphemeralStore));
        assert_eq!(state.clock_sequence(), None);

        let (seq, ts) = state.next(NODE, 1_000);
        assert!(seq <= MAX_CLOCK_SEQ);
        assert_eq!(ts, 1_000);
        assert_eq!(state.clock_sequence(), Some(seq));
    }

    /// Keeps clock sequence while clock advances
    #[test]
    fn keeps_clock_sequence_while_clock_advances() {
        let mut state = SequenceState::new(Box::new(EphemeralStore));
        let (seq, _) = state.next(NODE, 1_000);
        for now in 1_001..2_000 {
            assert_eq!(state.next(NODE, now), (seq, now));
        }
    }

    /// Bumps clock sequence on constant or decreasing timestamp
    #[test]
    fn bumps_clock_sequence_on_constant_or_decreasing_timestamp() {
        let mut state = SequenceState::new(Box::new(EphemeralStore));
        let (seq, _) = state.next(NODE, 1_000);

        assert_eq!(state.next(NODE, 1_000), ((seq + 1) & MAX_CLOCK_SEQ, 1_000));
        assert_eq!(state.next(NODE, 10), ((seq + 2) & MAX_CLOCK_SEQ, 10));

        // still behind the latest timestamp observed
        assert_eq!(state.next(NODE, 500), ((seq + 3) & MAX_CLOCK_SEQ, 500));
        assert_eq!(state.next(NODE, 1_001), ((seq + 3) & MAX_CLOCK_SEQ, 1_001));
    }

    /// Wraps clock sequence around at 14 bits
    #[test]
    fn wraps_clock_sequence_around_at_14_bits() {
        let store = SharedStore::default();
        *store.0.lock().unwrap() = Some(Record {
            node_id: NODE,
            timestamp: 1_000,
            clock_sequence: MAX_CLOCK_SEQ,
        });

        let mut state = SequenceState::new(Box::new(store));
        assert_eq!(state.next(NODE, 1_000), (0, 1_000));
    }

    /// Writes through every mutation
    #[test]
    fn writes_through_every_mutation() {
        let store = SharedStore::default();
        let mut state = SequenceState::new(Box::new(store.clone()));

        let (seq, _) = state.next(NODE, 1_000);
        assert_eq!(
            *store.0.lock().unwrap(),
            Some(Record {
                node_id: NODE,
                timestamp: 1_000,
                clock_sequence: seq,
            })
        );

        let seq = state.advance(NODE, 900);
        assert_eq!(
            *store.0.lock().unwrap(),
            Some(Record {
                node_id: NODE,
                timestamp: 1_000,
                clock_sequence: seq,
            })
        );
    }

    /// Continues persisted clock sequence of same node
    #[test]
    fn continues_persisted_clock_sequence_of_same_node() {
        let store = SharedStore::default();
        *store.0.lock().unwrap() = Some(Record {
            node_id: NODE,
            timestamp: 1_000,
            clock_sequence: 42,
        });

        let mut state = SequenceState::new(Box::new(store.clone()));
        assert_eq!(state.next(NODE, 1_000), (43, 1_000));

        let mut state = SequenceState::new(Box::new(store));
        assert_eq!(state.next(NODE, 2_000), (43, 2_000));
    }

    /// Reinitializes when persisted node differs
    #[test]
    fn reinitializes_when_persisted_node_differs() {
        let store = SharedStore::default();
        *store.0.lock().unwrap() = Some(Record {
            node_id: NODE + 1,
            timestamp: 1_000,
            clock_sequence: 42,
        });

        let mut state = SequenceState::new(Box::new(store.clone()));
        let (seq, ts) = state.next(NODE, 10);
        assert_eq!(ts, 10);
        assert_eq!(
            *store.0.lock().unwrap(),
            Some(Record {
                node_id: NODE,
                timestamp: 10,
                clock_sequence: seq,
            })
        );
    }

    /// Survives store failures
    #[test]
    fn survives_store_failures() {
        let mut state = SequenceState::new(Box::new(BrokenStore));
        let (seq, _) = state.next(NODE, 1_000);
        assert_eq!(state.next(NODE, 1_000).0, (seq + 1) & MAX_CLOCK_SEQ);
        assert_eq!(state.advance(NODE, 2_000), (seq + 2) & MAX_CLOCK_SEQ);
    }

    /// Round-trips record through file
    #[test]
    fn round_trips_record_through_file() {
        let path = temp_path("round-trip");
        let mut store = FileStore::new(&path, 0o644);
        assert!(store.load().unwrap().is_none());

        let a = Record {
            node_id: NODE,
            timestamp: 0x01d3_696e_2a3f_8000,
            clock_sequence: 7,
        };
        store.save(&a).unwrap();
        assert_eq!(store.load().unwrap(), Some(a));

        let b = Record {
            clock_sequence: 8,
            ..a
        };
        store.save(&b).unwrap();
        assert_eq!(FileStore::new(&path, 0o644).load().unwrap(), Some(b));

        fs::remove_file(&path).unwrap();
    }

    /// Reports corrupt file as error
    #[test]
    fn reports_corrupt_file_as_error() {
        let path = temp_path("corrupt");
        fs::write(&path, b"definitely not a record").unwrap();
        assert!(matches!(
            FileStore::new(&path, 0o644).load(),
            Err(Error::CorruptRecord)
        ));

        // and recovers by overwriting it
        let mut state = SequenceState::new(Box::new(FileStore::new(&path, 0o644)));
        assert!(state.current().is_none());
        let (seq, _) = state.next(NODE, 5);
        assert_eq!(
            FileStore::new(&path, 0o644).load().unwrap(),
            Some(Record {
                node_id: NODE,
                timestamp: 5,
                clock_sequence: seq,
            })
        );

        fs::remove_file(&path).unwrap();
    }

    /// Creates file with configured mode
    #[cfg(unix)]
    #[test]
    fn creates_file_with_configured_mode() {
        use std::os::unix::fs::PermissionsExt;

        for mode in [0o644, 0o666, 0o600] {
            let path = temp_path(&format!("mode-{:o}", mode));
            let record = Record {
                node_id: NODE,
                timestamp: 1,
                clock_sequence: 1,
            };
            FileStore::new(&path, mode).save(&record).unwrap();
            let actual = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(actual, mode);
            fs::remove_file(&path).unwrap();
        }
    }

    /// Fails to save into missing directory
    #[test]
    fn fails_to_save_into_missing_directory() {
        let path = temp_path("missing-dir").join("state");
        let mut store = FileStore::new(&path, 0o644);
        let record = Record {
            node_id: NODE,
            timestamp: 1,
            clock_sequence: 1,
        };
        assert!(matches!(store.save(&record), Err(Error::Io(_))));
        assert!(store.load().unwrap().is_none());
    }

    /// Warns once per run of persistence failures
    #[test]
    fn warns_once_per_run_of_persistence_failures() {
        let failing = Arc::new(AtomicBool::new(true));
        let mut state = SequenceState::new(Box::new(FlakyStore(Arc::clone(&failing))));

        let warnings = count_warnings(|| {
            for now in 0..1_000 {
                state.next(NODE, now);
            }
        });
        assert_eq!(warnings, 1);

        failing.store(false, Ordering::SeqCst);
        let warnings = count_warnings(|| {
            state.next(NODE, 1_000);
        });
        assert_eq!(warnings, 0);

        failing.store(true, Ordering::SeqCst);
        let warnings = count_warnings(|| {
            for now in 1_001..1_100 {
                state.next(NODE, now);
            }
        });
        assert_eq!(warnings, 1);
    }

    /// Warns once when state file directory is missing
    #[test]
    fn warns_once_when_state_file_directory_is_missing() {
        let path = temp_path("missing-dir-warnings").join("state");
        let warnings = count_warnings(|| {
            let mut state = SequenceState::new(Box::new(FileStore::new(&path, 0o644)));
            for now in 0..1_000 {
                state.next(NODE, now);
            }
        });
        assert_eq!(warnings, 1);
    }

    /// Never exposes partial record to concurrent readers
    #[test]
    fn never_exposes_partial_record_to_concurrent_readers() {
        let path = temp_path("concurrent");
        let record = Record {
            node_id: NODE,
            timestamp: 1,
            clock_sequence: 0,
        };
        let mut writer = FileStore::new(&path, 0o644);
        writer.save(&record).unwrap();

        thread::scope(|s| {
            s.spawn(|| {
                for i in 0..1_000 {
                    let record = Record {
                        timestamp: i + 2,
                        ..record
                    };
                    writer.save(&record).unwrap();
                }
            });

            let mut reader = FileStore::new(&path, 0o644);
            for _ in 0..1_000 {
                assert!(matches!(reader.load(), Ok(Some(e)) if e.node_id == NODE));
            }
        });

        // no staged copies are left behind
        let prefix = format!("{}.", path.file_name().unwrap().to_string_lossy());
        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .count();
        assert_eq!(leftovers, 0);

        fs::remove_file(&path).unwrap();
    }

    /// Rejects oversized file
    #[test]
    fn rejects_oversized_file() {
        let path = temp_path("oversized");
        fs::write(&path, MAGIC.repeat(1 << 16)).unwrap();
        assert!(matches!(
            FileStore::new(&path, 0o644).load(),
            Err(Error::CorruptRecord)
        ));
        fs::remove_file(&path).unwrap();
    }

    /// Reapplies configured mode on every save
    #[cfg(unix)]
    #[test]
    fn reapplies_configured_mode_on_every_save() {
        use std::os::unix::fs::PermissionsExt;

        let path = temp_path("mode-reapplied");
        fs::write(&path, b"").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();

        let record = Record {
            node_id: NODE,
            timestamp: 1,
            clock_sequence: 1,
        };
        FileStore::new(&path, 0o644).save(&record).unwrap();
        let actual = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(actual, 0o644);

        fs::remove_file(&path).unwrap();
    }
}
