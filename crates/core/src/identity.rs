//! Timestamp-derived row identities
//!
//! Every row is keyed by a 17-digit identity `YYYYMMDDHHMMSSmmm` sampled from
//! the local clock at millisecond resolution. Because every field has a fixed
//! width, the decimal string sorts lexicographically exactly as the integer
//! sorts numerically.
//!
//! ## Usage
//!
//! ```
//! use juntdb_core::{Identity, IdentityGenerator};
//!
//! let id = IdentityGenerator::new().next_id();
//! assert_eq!(id.to_string().len(), 17);
//!
//! let parsed = Identity::parse("20240101120000000").unwrap();
//! assert_eq!(parsed.as_u64(), 20240101120000000);
//! ```
//!
//! The generator gives no uniqueness guarantee on its own. Two calls inside
//! the same millisecond return the same identity; the record store resolves
//! such collisions at insert time.

use crate::error::{Error, Result};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Number of decimal digits in an identity
pub const IDENTITY_WIDTH: usize = 17;

/// Exclusive upper bound of the identity space (10^17)
const IDENTITY_LIMIT: u64 = 100_000_000_000_000_000;

/// Smallest integer that renders with exactly 17 digits (10^16)
const SEVENTEEN_DIGIT_MIN: u64 = 10_000_000_000_000_000;

/// 17-digit timestamp identity
///
/// ## Invariants
///
/// - The value is below 10^17, so it always renders in 17 digits
///   (zero-padded)
/// - Ordering matches chronological ordering for clock-generated identities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(u64);

impl Identity {
    /// Smallest identity
    pub const MIN: Identity = Identity(0);

    /// Largest identity
    pub const MAX: Identity = Identity(IDENTITY_LIMIT - 1);

    /// Parse exactly 17 ASCII digits
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != IDENTITY_WIDTH {
            return Err(Error::malformed_identity(format!(
                "'{}' has {} characters, expected {}",
                s,
                s.len(),
                IDENTITY_WIDTH
            )));
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::malformed_identity(format!(
                "'{}' contains non-digit characters",
                s
            )));
        }
        s.parse::<u64>()
            .map(Identity)
            .map_err(|e| Error::malformed_identity(e.to_string()))
    }

    /// Create from an integer below 10^17
    pub fn from_u64(value: u64) -> Result<Self> {
        if value >= IDENTITY_LIMIT {
            return Err(Error::malformed_identity(format!(
                "{} has more than {} digits",
                value, IDENTITY_WIDTH
            )));
        }
        Ok(Identity(value))
    }

    /// Create from an integer that itself has exactly 17 digits
    ///
    /// Stricter than [`Identity::from_u64`]: `1` is rejected even though
    /// `Identity::from_u64(1)` would zero-pad it.
    pub fn from_seventeen_digits(value: i64) -> Result<Self> {
        let v = u64::try_from(value)
            .map_err(|_| Error::malformed_identity(format!("{} is negative", value)))?;
        if !(SEVENTEEN_DIGIT_MIN..IDENTITY_LIMIT).contains(&v) {
            return Err(Error::malformed_identity(format!(
                "{} does not have exactly {} digits",
                value, IDENTITY_WIDTH
            )));
        }
        Ok(Identity(v))
    }

    /// Format a local date-time at millisecond resolution
    ///
    /// Years outside `0..=9999` are clamped so the result keeps 17 digits.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let year = dt.year().clamp(0, 9999) as u64;
        // Leap-second nanos run past 1e9
        let millis = (dt.nanosecond() / 1_000_000).min(999) as u64;
        Identity(
            year * 10_000_000_000_000
                + dt.month() as u64 * 100_000_000_000
                + dt.day() as u64 * 1_000_000_000
                + dt.hour() as u64 * 10_000_000
                + dt.minute() as u64 * 100_000
                + dt.second() as u64 * 1_000
                + millis,
        )
    }

    /// Integer form
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Integer form as stored in the `date` column
    #[inline]
    pub const fn as_i64(&self) -> i64 {
        // Below 10^17, always fits
        self.0 as i64
    }

    /// Decode back to a local date-time, if the digits form a valid one
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let v = self.0;
        let millis = (v % 1_000) as u32;
        let second = (v / 1_000 % 100) as u32;
        let minute = (v / 100_000 % 100) as u32;
        let hour = (v / 10_000_000 % 100) as u32;
        let day = (v / 1_000_000_000 % 100) as u32;
        let month = (v / 100_000_000_000 % 100) as u32;
        let year = (v / 10_000_000_000_000) as i32;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_milli_opt(hour, minute, second, millis)
    }

    /// Human-readable form: `dbase ID: 2024/01/01 12h00m00.000s`
    pub fn pretty(&self) -> String {
        let s = self.to_string();
        format!(
            "dbase ID: {}/{}/{} {}h{}m{}.{}s",
            &s[0..4],
            &s[4..6],
            &s[6..8],
            &s[8..10],
            &s[10..12],
            &s[12..14],
            &s[14..17]
        )
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:017}", self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identity::parse(s)
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    /// Current local date-time
    fn now(&self) -> NaiveDateTime;
}

/// Local system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at one instant, for deterministic tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

// ============================================================================
// IdentityGenerator
// ============================================================================

/// Produces identities from a clock
#[derive(Clone)]
pub struct IdentityGenerator {
    clock: Arc<dyn Clock>,
}

impl IdentityGenerator {
    /// Generator over the local system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Generator over a custom clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        IdentityGenerator { clock }
    }

    /// Sample the clock
    pub fn next_id(&self) -> Identity {
        Identity::from_datetime(self.clock.now())
    }

    /// Fresh identity strictly after `previous`
    ///
    /// Returns the later of the current clock sample and `previous + 1ms`,
    /// so repeated calls make progress even inside one millisecond. Falls
    /// back to a plain clock sample when `previous` is not a valid date.
    pub fn next_after(&self, previous: Identity) -> Identity {
        let now = self.next_id();
        match previous.timestamp() {
            Some(ts) => {
                let bumped = Identity::from_datetime(ts + Duration::milliseconds(1));
                now.max(bumped)
            }
            None => now,
        }
    }
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IdentityGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityGenerator").finish_non_exhaustive()
    }
}
