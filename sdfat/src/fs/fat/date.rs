//! Timestamps as stored in directory entries.
//!
//! Dates count years from 1980 and pack into 16 bits; times have a
//! two-second granularity, refined by a hundredths byte that only the
//! creation stamp carries.

use core::fmt;

/// A calendar date in the range a directory entry can hold.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct Date {
    /// Valid range is [1980, 2107].
    year: u16,
    /// Valid range is [1, 12].
    month: u8,
    /// Valid range is [1, 31], not checked against the month.
    day: u8,
}

impl Date {
    const MIN_YEAR: u16 = 1980;
    const MAX_YEAR: u16 = 2107;

    /// 1980-01-01, the date encoded as `0x0021`.
    pub const EPOCH: Self = Self {
        year: Self::MIN_YEAR,
        month: 1,
        day: 1,
    };

    /// Creates a new `Date` instance.
    ///
    /// # Panics
    ///
    /// Panics if one of provided arguments is out of the supported range.
    #[must_use]
    pub fn new(year: u16, month: u8, day: u8) -> Self {
        Self::checked(year, month, day).expect("year out of range")
    }

    #[must_use]
    /// Creates a new `Date`, or `None` if it cannot be encoded.
    pub fn checked(year: u16, month: u8, day: u8) -> Option<Self> {
        let valid = (Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year)
            && (1..=12).contains(&month)
            && (1..=31).contains(&day);
        valid.then_some(Self { year, month, day })
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    /// Decodes a packed date.
    ///
    /// Fields are taken as stored: a zeroed entry yields month and day 0.
    pub(crate) const fn from_dos(raw: u16) -> Self {
        Self {
            year: (raw >> 9) + Self::MIN_YEAR,
            month: ((raw >> 5) & 0xF) as u8,
            day: (raw & 0x1F) as u8,
        }
    }

    #[must_use]
    pub(crate) fn to_dos(self) -> u16 {
        ((self.year - Self::MIN_YEAR) << 9) | (u16::from(self.month) << 5) | u16::from(self.day)
    }

    #[must_use]
    #[inline]
    pub const fn year(&self) -> u16 {
        self.year
    }

    #[must_use]
    #[inline]
    pub const fn month(&self) -> u8 {
        self.month
    }

    #[must_use]
    #[inline]
    pub const fn day(&self) -> u8 {
        self.day
    }
}

/// A time of day.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct Time {
    hour: u8,
    min: u8,
    sec: u8,
    /// Only the creation stamp keeps sub-second precision, in steps of 10ms.
    ms: u16,
}

impl Time {
    pub const MIDNIGHT: Self = Self {
        hour: 0,
        min: 0,
        sec: 0,
        ms: 0,
    };

    /// Creates a new `Time` instance.
    ///
    /// # Panics
    ///
    /// Panics if one of provided arguments is out of the supported range.
    #[must_use]
    pub fn new(hour: u8, min: u8, sec: u8, ms: u16) -> Self {
        assert!(hour <= 23 && min <= 59 && sec <= 59 && ms <= 999);
        Self { hour, min, sec, ms }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    /// Decodes a packed time and its optional hundredths byte.
    pub(crate) const fn from_dos(raw: u16, hundredths: u8) -> Self {
        Self {
            hour: (raw >> 11) as u8,
            min: ((raw >> 5) & 0x3F) as u8,
            sec: ((raw & 0x1F) * 2) as u8 + hundredths / 100,
            ms: (hundredths % 100) as u16 * 10,
        }
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    /// Returns the packed time and the hundredths byte.
    pub(crate) const fn to_dos(self) -> (u16, u8) {
        let raw = ((self.hour as u16) << 11) | ((self.min as u16) << 5) | (self.sec as u16 / 2);
        let hundredths = (self.ms / 10) as u8 + (self.sec % 2) * 100;
        (raw, hundredths)
    }

    #[must_use]
    #[inline]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    #[inline]
    pub const fn min(self) -> u8 {
        self.min
    }

    #[must_use]
    #[inline]
    pub const fn sec(&self) -> u8 {
        self.sec
    }

    #[must_use]
    #[inline]
    pub const fn ms(&self) -> u16 {
        self.ms
    }
}

/// A date and a time of day.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct DateTime {
    date: Date,
    time: Time,
}

impl DateTime {
    pub const EPOCH: Self = Self::new(Date::EPOCH, Time::MIDNIGHT);

    #[must_use]
    #[inline]
    pub const fn new(date: Date, time: Time) -> Self {
        Self { date, time }
    }

    #[must_use]
    pub(crate) const fn from_dos(date: u16, time: u16, hundredths: u8) -> Self {
        Self::new(Date::from_dos(date), Time::from_dos(time, hundredths))
    }

    #[must_use]
    #[inline]
    pub const fn date(&self) -> Date {
        self.date
    }

    #[must_use]
    #[inline]
    pub const fn time(&self) -> Time {
        self.time
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.date.year, self.date.month, self.date.day, self.time.hour, self.time.min, self.time.sec
        )
    }
}

/// A source of wall-clock time for stamping entries.
pub trait TimeProvider {
    fn get_current_date(&self) -> Date;
    fn get_current_time(&self) -> Time;
    fn get_current_date_time(&self) -> DateTime {
        DateTime::new(self.get_current_date(), self.get_current_time())
    }
}

/// Provider for boards without a real-time clock.
///
/// Every stamp reads 1980-01-01 00:00:00.
#[derive(Debug, Clone, Copy, Default)]
pub struct DosMinTimeProvider;

impl DosMinTimeProvider {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self
    }
}

impl TimeProvider for DosMinTimeProvider {
    fn get_current_date(&self) -> Date {
        Date::EPOCH
    }

    fn get_current_time(&self) -> Time {
        Time::MIDNIGHT
    }
}
