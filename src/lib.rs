//! An implementation of RFC 4122 UUID version 1 with a persisted clock sequence
//!
//! ```rust
//! use uuid1::{Config, Generator};
//!
//! let g = Generator::with_config(Config::ephemeral());
//! println!("{}", g.generate("default")?); // e.g. "c232ab00-9414-11ec-b3c8-9f6bdeced846"
//! println!("{}", g.generate("compact")?); // e.g. "c232ab00941411ecb3c89f6bdeced846"
//! println!("{}", g.generate("urn")?); // e.g. "urn:uuid:c232ab00-9414-11ec-b3c8-9f6bdeced846"
//!
//! assert!(uuid1::validate("C232AB00-9414-11EC-B3C8-9F6BDECED846"));
//! # Ok::<(), uuid1::Error>(())
//! ```
//!
//! See [RFC 4122](https://www.rfc-editor.org/rfc/rfc4122).
//!
//! # Field and bit layout
//!
//! This implementation produces identifiers with the following bit layout:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          time_low                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |       time_mid                |  ver  |       time_hi         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |var|        clock_seq          |             node              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                              node                             |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Where:
//!
//! - The 60-bit timestamp counts 100-nanosecond intervals since 1582-10-15T00:00:00Z; its low 32
//!   bits go to `time_low`, the next 16 bits to `time_mid`, and the top 12 bits to `time_hi`.
//!   The timestamp wraps around to zero after 5236-03-31T21:21:00.6846975Z.
//! - The 4-bit `ver` field is set at `0001`.
//! - The 2-bit `var` field is set at `10`.
//! - The 14-bit `clock_seq` field holds the clock sequence, which is randomly initialized and
//!   incremented whenever the clock does not advance past the latest timestamp observed.
//! - The 48-bit `node` field holds the hardware address of the host, or a random number with the
//!   multicast bit set if no hardware address is available.
//!
//! # Persistence
//!
//! By default, a [`Generator`] keeps its clock sequence in a state file (see
//! [`default_state_file()`]) so that the sequence continues across restarts and across processes
//! on the same host. The file is read once when the generator is created and overwritten after
//! every generation. Failure to read or write the file is logged through the [`log`] facade and
//! does not affect generation within the process. Use [`Config::ephemeral()`] to keep the state in
//! memory only.

mod error;
pub use error::{Error, Result};

mod uuid;
pub use uuid::{Uuid, Variant};

mod format;
pub use format::{format, validate, Format, ParseError};

mod config;
pub use config::{default_state_file, Config};

pub mod clock;
pub mod node;
pub mod state;

mod generator;
pub use generator::Generator;
