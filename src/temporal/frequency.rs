use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Error, Result};

lazy_static! {
    static ref FREQ_PATTERN: Regex =
        Regex::new(r"^\s*(\d+)?\s*([A-Za-z]+)\s*$").unwrap_or_else(|_| unreachable!());
}

const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// 時系列データの頻度（周期）を表す列挙型
///
/// 秒から週までは固定幅、月・四半期・年はカレンダーに揃えた区間になる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    /// n秒ごと
    Second(u32),
    /// n分ごと
    Minute(u32),
    /// n時間ごと
    Hour(u32),
    /// n日ごと
    Day(u32),
    /// n週間ごと（月曜始まり）
    Week(u32),
    /// nヶ月ごと
    Month(u32),
    /// n四半期ごと
    Quarter(u32),
    /// n年ごと
    Year(u32),
}

impl Frequency {
    /// 倍数
    pub fn multiple(&self) -> u32 {
        match *self {
            Frequency::Second(n)
            | Frequency::Minute(n)
            | Frequency::Hour(n)
            | Frequency::Day(n)
            | Frequency::Week(n)
            | Frequency::Month(n)
            | Frequency::Quarter(n)
            | Frequency::Year(n) => n,
        }
    }

    /// 固定幅の頻度かどうか
    pub fn is_tick(&self) -> bool {
        self.unit_seconds().is_some()
    }

    fn unit_seconds(&self) -> Option<i64> {
        match self {
            Frequency::Second(_) => Some(1),
            Frequency::Minute(_) => Some(60),
            Frequency::Hour(_) => Some(3_600),
            Frequency::Day(_) => Some(86_400),
            Frequency::Week(_) => Some(604_800),
            _ => None,
        }
    }

    /// 固定幅の頻度の幅（ナノ秒）。カレンダー頻度か、i64に収まらなければNone
    pub fn tick_nanos(&self) -> Option<i64> {
        i64::from(self.multiple())
            .checked_mul(self.unit_seconds()?)?
            .checked_mul(NANOS_PER_SECOND)
    }

    /// カレンダー頻度の月数。固定幅か、u32に収まらなければNone
    pub fn months(&self) -> Option<u32> {
        match *self {
            Frequency::Month(n) => Some(n),
            Frequency::Quarter(n) => n.checked_mul(3),
            Frequency::Year(n) => n.checked_mul(12),
            _ => None,
        }
    }

    fn overflow(&self) -> Error {
        Error::InvalidFrequency(format!("{} is too wide", self))
    }

    /// The frequency itself, or `InvalidFrequency` when its width overflows
    pub fn validated(self) -> Result<Self> {
        let fits = if self.is_tick() {
            self.tick_nanos().is_some()
        } else {
            self.months().is_some()
        };
        if fits {
            Ok(self)
        } else {
            Err(self.overflow())
        }
    }

    /// `ts` を含む左閉区間 `[start, start + 1期間)` の開始時刻
    ///
    /// 固定幅の頻度は `origin` を起点にする。週は月曜0時、
    /// カレンダー頻度は1970年1月を起点に揃える。
    pub fn floor(&self, ts: NaiveDateTime, origin: NaiveDateTime) -> Result<NaiveDateTime> {
        let out_of_range = || Error::InvalidInput(format!("timestamp {} out of range", ts));
        if !self.is_tick() {
            let months = i64::from(self.months().ok_or_else(|| self.overflow())?);
            let index = i64::from(ts.year() - 1970) * 12 + i64::from(ts.month0());
            let bucket = index.div_euclid(months) * months;
            let year = 1970 + bucket.div_euclid(12);
            let month = bucket.rem_euclid(12) + 1;
            return i32::try_from(year)
                .ok()
                .and_then(|y| NaiveDate::from_ymd_opt(y, month as u32, 1))
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(out_of_range);
        }

        let width = self.tick_nanos().ok_or_else(|| self.overflow())?;
        let anchor = match self {
            // 1970-01-05 was a Monday
            Frequency::Week(_) => NaiveDate::from_ymd_opt(1970, 1, 5)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .unwrap_or(origin),
            _ => origin,
        };
        let delta = (ts - anchor)
            .num_nanoseconds()
            .ok_or_else(|| Error::InvalidInput(format!("timestamp {} too far from origin", ts)))?;
        let offset = delta.div_euclid(width) * width;
        anchor
            .checked_add_signed(Duration::nanoseconds(offset))
            .ok_or_else(out_of_range)
    }

    /// 区間の開始時刻から次の区間の開始時刻へ進める
    pub fn advance(&self, start: NaiveDateTime) -> Result<NaiveDateTime> {
        let next = if self.is_tick() {
            let width = self.tick_nanos().ok_or_else(|| self.overflow())?;
            start.checked_add_signed(Duration::nanoseconds(width))
        } else {
            let months = self.months().ok_or_else(|| self.overflow())?;
            start.checked_add_months(Months::new(months))
        };
        next.ok_or_else(|| Error::InvalidInput(format!("timestamp overflow after {}", start)))
    }
}

impl FromStr for Frequency {
    type Err = Error;

    /// "5min"、"5T"、"30S"、"2H"、"D"、"W"、"M"、"Q"、"A" のような文字列を解析
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidFrequency(s.to_string());
        let caps = FREQ_PATTERN.captures(s).ok_or_else(invalid)?;
        let n: u32 = match caps.get(1) {
            Some(m) => m.as_str().parse().map_err(|_| invalid())?,
            None => 1,
        };
        if n == 0 {
            return Err(invalid());
        }
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        // 大文字のMは月、分は "min" か "T"
        let freq = match unit {
            "M" | "MS" | "ME" => Frequency::Month(n),
            _ => match unit.to_lowercase().as_str() {
                "s" | "sec" | "second" | "seconds" => Frequency::Second(n),
                "t" | "min" | "minute" | "minutes" => Frequency::Minute(n),
                "h" | "hour" | "hours" => Frequency::Hour(n),
                "d" | "day" | "days" => Frequency::Day(n),
                "w" | "week" | "weeks" => Frequency::Week(n),
                "month" | "months" => Frequency::Month(n),
                "q" | "qs" | "qe" | "quarter" | "quarters" => Frequency::Quarter(n),
                "a" | "as" | "y" | "ys" | "ye" | "year" | "years" | "annual" => Frequency::Year(n),
                _ => return Err(invalid()),
            },
        };
        freq.validated().map_err(|_| invalid())
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self {
            Frequency::Second(_) => "S",
            Frequency::Minute(_) => "min",
            Frequency::Hour(_) => "H",
            Frequency::Day(_) => "D",
            Frequency::Week(_) => "W",
            Frequency::Month(_) => "M",
            Frequency::Quarter(_) => "Q",
            Frequency::Year(_) => "A",
        };
        write!(f, "{}{}", self.multiple(), unit)
    }
}
