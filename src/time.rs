use core::fmt;

use time::{macros::date, macros::datetime, PrimitiveDateTime};

/// The earliest point in time a FAT timestamp can represent
pub(crate) const EPOCH: PrimitiveDateTime = date!(1980 - 01 - 01).midnight();
/// The latest point in time a FAT timestamp can represent
const FAT_LATEST: PrimitiveDateTime = datetime!(2107-12-31 23:59:58);

/// An object that can measure and return the current time
///
/// Used to stamp the creation and modification times of files written to the card.
/// Boards with an RTC should provide their own implementation.
pub trait Clock: fmt::Debug {
    /// Returns the current date and time in your local timezone
    /// (https://learn.microsoft.com/en-us/windows/win32/sysinfo/file-times)
    fn now(&self) -> PrimitiveDateTime;
}

/// The default [`Clock`] component
///
/// Returns the current local time in a `std` environment
/// (UTC if the local offset can't be determined).
/// In a `no-std` environment, it just returns the [`EPOCH`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClock;

impl Clock for DefaultClock {
    fn now(&self) -> PrimitiveDateTime {
        #[cfg(feature = "std")]
        {
            use time::OffsetDateTime;

            let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
            PrimitiveDateTime::new(now.date(), now.time())
        }
        #[cfg(not(feature = "std"))]
        EPOCH
    }
}

/// A [`Clock`] that always returns the same point in time
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub PrimitiveDateTime);

impl Default for FixedClock {
    fn default() -> Self {
        FixedClock(EPOCH)
    }
}

impl Clock for FixedClock {
    #[inline]
    fn now(&self) -> PrimitiveDateTime {
        self.0
    }
}

/// Adapts a [`Clock`] into the FAT library's [`fatfs::TimeProvider`]
#[derive(Debug, Clone)]
pub struct ClockTimeProvider<C>
where
    C: Clock,
{
    clock: C,
}

impl<C> ClockTimeProvider<C>
where
    C: Clock,
{
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    /// The current time, clamped to what a FAT timestamp can hold
    fn fat_now(&self) -> PrimitiveDateTime {
        self.clock.now().clamp(EPOCH, FAT_LATEST)
    }
}

fn fat_date(datetime: &PrimitiveDateTime) -> fatfs::Date {
    fatfs::Date::new(
        datetime.year() as u16,
        u8::from(datetime.month()).into(),
        datetime.day().into(),
    )
}

impl<C> fatfs::TimeProvider for ClockTimeProvider<C>
where
    C: Clock,
{
    fn get_current_date(&self) -> fatfs::Date {
        fat_date(&self.fat_now())
    }

    fn get_current_date_time(&self) -> fatfs::DateTime {
        let now = self.fat_now();

        fatfs::DateTime::new(
            fat_date(&now),
            fatfs::Time::new(
                now.hour().into(),
                now.minute().into(),
                now.second().into(),
                now.millisecond(),
            ),
        )
    }
}
