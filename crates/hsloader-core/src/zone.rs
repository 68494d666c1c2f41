//! Time zone used to resolve zone-less record timestamps into instants

use std::fmt;
use std::str::FromStr;

use chrono::offset::LocalResult;
use chrono::{DateTime, Local, NaiveDateTime, Offset, SecondsFormat, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone the monitored JVM wrote its timestamps in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// System default zone of the loader host
    #[default]
    Local,
    /// IANA zone, e.g. `Asia/Tokyo`
    Named(Tz),
}

impl Zone {
    /// Resolve a local date-time in this zone to a UTC instant.
    ///
    /// Overlapping local times pick the earlier instant; local times inside
    /// a DST gap use the offset in force before the gap.
    pub fn to_utc(&self, local: &NaiveDateTime) -> DateTime<Utc> {
        match self {
            Self::Local => resolve(&Local, local),
            Self::Named(tz) => resolve(tz, local),
        }
    }

    /// `@timestamp` rendering: RFC 3339 in UTC with a `Z` suffix.
    pub fn timestamp(&self, local: &NaiveDateTime) -> String {
        self.to_utc(local)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

fn resolve<T: TimeZone>(tz: &T, local: &NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(local) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(*local - TimeDelta::days(1)))
                .fix();
            let utc = *local - TimeDelta::seconds(i64::from(before.local_minus_utc()));
            Utc.from_utc_datetime(&utc)
        }
    }
}

impl FromStr for Zone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "local" | "system" => Ok(Self::Local),
            name => name
                .parse::<Tz>()
                .map(Self::Named)
                .map_err(|_| format!("unknown time zone: {name}")),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}
