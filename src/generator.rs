//! UUIDv1 generator and related types.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    clock::{Clock, SystemClock},
    node::{resolve_node_id, NodeSource, SystemNodeSource},
    state::SequenceState,
    Config, Format, Result, Uuid,
};

/// Represents a UUIDv1 generator that owns a node identifier and a clock sequence and guarantees
/// that no two UUIDs it generates are equal, even when the clock stands still or goes backwards.
///
/// The node identifier is resolved once at construction. The clock sequence is read from the state
/// file named by the [`Config`] (if any) and written back after every generation, so that
/// generators in later or concurrent processes on the same host continue the sequence. Every
/// method takes `&self`; the state is guarded by a mutex so a generator can be shared across
/// threads.
///
/// # Examples
///
/// ```rust
/// use std::{sync::Arc, thread};
/// use uuid1::{Config, Generator};
///
/// let g = Arc::new(Generator::with_config(Config::ephemeral()));
/// thread::scope(|s| {
///     for i in 0..4 {
///         let g = Arc::clone(&g);
///         s.spawn(move || {
///             for _ in 0..8 {
///                 println!("{} by thread {}", g.generate_uuid(), i);
///             }
///         });
///     }
/// });
/// ```
///
/// # Clock rollback
///
/// When the clock reading does not exceed the latest one observed, the clock sequence is
/// incremented and the reading is embedded as it is. A large backward jump is treated the same as
/// a repeated tick.
#[derive(Debug)]
pub struct Generator<C = SystemClock> {
    node_id: u64,
    clock: C,
    state: Mutex<SequenceState>,
}

impl Generator {
    /// Creates a generator with the default configuration, which persists the state at
    /// [`default_state_file()`](crate::default_state_file).
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a generator with the system clock and the host's hardware address.
    pub fn with_config(config: Config) -> Self {
        Self::with_sources(&config, SystemClock, &SystemNodeSource)
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> Generator<C> {
    /// Creates a generator with a specified clock and hardware address source.
    ///
    /// The state store is consulted once here: if it holds a record for the same node, the clock
    /// sequence continues from it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use uuid1::{clock::FixedClock, Config, Generator};
    ///
    /// let clock = FixedClock(Utc.with_ymd_and_hms(1999, 9, 13, 0, 0, 0).unwrap());
    /// let hardware = || Some([2u8, 0, 0, 0, 0, 1]);
    /// let g = Generator::with_sources(&Config::ephemeral(), clock, &hardware);
    /// assert_eq!(g.node_id(), 0x0200_0000_0001);
    /// assert!(g.generate_uuid().to_string().starts_with("2a3f8000-696e-11d3-"));
    /// ```
    pub fn with_sources(config: &Config, clock: C, node_source: &impl NodeSource) -> Self {
        let node_id = resolve_node_id(node_source);
        let mut state = SequenceState::new(config.open_store());
        state.next(node_id, clock.ticks());
        Self {
            node_id,
            clock,
            state: Mutex::new(state),
        }
    }

    /// Returns the lock handle of the sequence state.
    fn lock_state(&self) -> MutexGuard<'_, SequenceState> {
        // every step leaves the state consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generates a new UUIDv1 object.
    pub fn generate_uuid(&self) -> Uuid {
        let mut state = self.lock_state();
        let (clock_seq, timestamp) = state.next(self.node_id, self.clock.ticks());
        Uuid::from_fields_v1(timestamp, clock_seq, self.node_id)
    }

    /// Generates a new UUIDv1 string in the form named by `kind` (`compact`, `default`, or
    /// `urn`, with or without a leading colon).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`](crate::Error::InvalidFormat) naming `kind` if it is not a
    /// recognized format. No UUID is generated in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use uuid1::{Config, Generator};
    ///
    /// let g = Generator::with_config(Config::ephemeral());
    /// assert_eq!(g.generate("compact")?.len(), 32);
    /// assert_eq!(g.generate(":urn")?.len(), 45);
    /// assert!(g.generate(":unknown").is_err());
    /// # Ok::<(), uuid1::Error>(())
    /// ```
    pub fn generate(&self, kind: &str) -> Result<String> {
        let kind: Format = kind.parse()?;
        Ok(self.generate_as(kind))
    }

    /// Generates a new UUIDv1 string in the given form.
    pub fn generate_as(&self, kind: Format) -> String {
        self.generate_uuid().to_format(kind)
    }

    /// Advances the clock sequence by one, persisting it, and returns the new value.
    pub fn next_sequence(&self) -> u16 {
        let mut state = self.lock_state();
        state.advance(self.node_id, self.clock.ticks())
    }

    /// Returns the 48-bit node identifier embedded in every UUID of this generator.
    pub fn node_id(&self) -> u64 {
        self.node_id
    }

    /// Returns the current 14-bit clock sequence.
    pub fn clock_sequence(&self) -> u16 {
        // initialized at construction
        self.lock_state().clock_sequence().unwrap_or_default()
    }
}

/// Supports operations as an infinite iterator that produces a new UUIDv1 object for each call of
/// `next()`.
///
/// # Examples
///
/// ```rust
/// use uuid1::{Config, Generator};
///
/// Generator::with_config(Config::ephemeral())
///     .enumerate()
///     .skip(4)
///     .take(4)
///     .for_each(|(i, e)| println!("[{i}] {e}"));
/// ```
impl<C: Clock> Iterator for Generator<C> {
    type Item = Uuid;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.generate_uuid())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

impl<C: Clock> std::iter::FusedIterator for Generator<C> {}
