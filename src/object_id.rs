//! The key under which every blog post is stored.

use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng as _};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

/// The largest value the three byte counter can hold.
const COUNTER_MASK: u32 = 0x00FF_FFFF;

/// Random bytes identifying this process, generated once.
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
/// Incremented for every id generated by this process.
static COUNTER: OnceLock<AtomicU32> = OnceLock::new();

/// A 12 byte identifier assigned by the store when a blog post is created.
///
/// The layout is a four byte big-endian timestamp (seconds since the Unix epoch), five bytes that
/// are random per process, and a three byte big-endian counter. Until the counter wraps, ids
/// generated later in a process compare greater than earlier ones. Cursors return documents in
/// id order.
///
/// Externally an id is always written as 24 lowercase hexadecimal digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId([u8; Self::LEN]);

impl ObjectId {
    /// The length of an id in bytes.
    pub const LEN: usize = 12;

    /// Generate a new, unique id.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as u32);
        let process = PROCESS_UNIQUE.get_or_init(|| SmallRng::from_entropy().r#gen());
        let counter = COUNTER
            .get_or_init(|| AtomicU32::new(SmallRng::from_entropy().r#gen::<u32>() & COUNTER_MASK))
            .fetch_add(1, Ordering::Relaxed)
            & COUNTER_MASK;

        let mut bytes = [0; Self::LEN];
        bytes[..4].copy_from_slice(&timestamp.to_be_bytes());
        bytes[4..9].copy_from_slice(process);
        bytes[9..].copy_from_slice(&counter.to_be_bytes()[1..]);
        Self(bytes)
    }

    /// The raw bytes of the id.
    #[must_use]
    pub const fn bytes(&self) -> [u8; Self::LEN] {
        self.0
    }

    /// Format the id as 24 lowercase hexadecimal digits.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; ObjectId::LEN]> for ObjectId {
    fn from(bytes: [u8; ObjectId::LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for ObjectId {
    type Error = ParseObjectIdError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; Self::LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| ParseObjectIdError::WrongByteLength(bytes.len()))
    }
}

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN * 2 {
            return Err(ParseObjectIdError::WrongHexLength(s.len()));
        }
        let mut bytes = [0; Self::LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ParseObjectIdError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The reason a value could not be interpreted as an [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseObjectIdError {
    /// The string was not 24 characters long.
    #[error("expected 24 hexadecimal digits, found {0} characters")]
    WrongHexLength(usize),
    /// The string contained something other than hexadecimal digits.
    #[error("id contains a character that is not a hexadecimal digit")]
    InvalidHex,
    /// The raw key was not 12 bytes long.
    #[error("expected a 12 byte key, found {0} bytes")]
    WrongByteLength(usize),
}
