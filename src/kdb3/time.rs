//
// Packed date/time fields
//

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::kdb3::error::FormatError;


/// Packed form of 2999-12-28 23:59:59, which KeePass writes for "never".
pub const KDB3_TIME_NEVER: [u8; 5] = [0x2E, 0xDF, 0x39, 0x7E, 0xFB];

const KDB3_TIME_ALL_ONES: [u8; 5] = [0xFF; 5];


/// A group or entry time attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timestamp {
    At(DateTime<Utc>),
    #[default]
    Never,
}

impl Timestamp {
    /// Calendar value of this timestamp. `Never` maps to the date KeePass
    /// itself uses for it.
    pub fn datetime(&self) -> DateTime<Utc> {
        match *self {
            Timestamp::At(t) => t,
            Timestamp::Never => never(),
        }
    }

    pub fn is_never(&self) -> bool {
        *self == Timestamp::Never
    }
}

impl From<Timestamp> for DateTime<Utc> {
    fn from(t: Timestamp) -> Self {
        t.datetime()
    }
}


fn never() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2999, 12, 28, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}


// Bit layout, most significant first:
// yyyyyyyy yyyyyymm mmdddddh hhhhmmmm mmssssss
pub fn unpack(raw: &[u8; 5]) -> Result<Timestamp, FormatError> {
    if *raw == KDB3_TIME_NEVER || *raw == KDB3_TIME_ALL_ONES {
        return Ok(Timestamp::Never);
    }

    let b: [u32; 5] = raw.map(u32::from);

    let year = (b[0] << 6) | (b[1] >> 2);
    let month = ((b[1] & 0x03) << 2) | (b[2] >> 6);
    let day = (b[2] >> 1) & 0x1F;
    let hour = ((b[2] & 0x01) << 4) | (b[3] >> 4);
    let minute = ((b[3] & 0x0F) << 2) | (b[4] >> 6);
    let second = b[4] & 0x3F;

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .map(|t| Timestamp::At(Utc.from_utc_datetime(&t)))
        .ok_or(FormatError::InvalidTimestamp(*raw))
}
