//! Chart resolutions and exchange intervals.
//!
//! The chart speaks in resolution codes (`"1"`, `"60"`, `"1D"`, `"5S"`, ...).
//! The exchange only streams a fixed set of kline intervals. Sub-minute
//! synthetic resolutions (5S, 10S, 30S) have no native interval: they stream
//! 1s klines and are folded into wider bars in-process.

use crate::error::CoreError;
use std::str::FromStr;

/// Kline intervals the exchange accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeInterval {
    Sec1,
    Min1,
    Min5,
    Min15,
    Min30,
    Hour1,
    Hour4,
    Day1,
    Week1,
    Month1,
}

impl ExchangeInterval {
    /// Every interval the exchange supports, finest first.
    pub const ALL: [ExchangeInterval; 10] = [
        Self::Sec1,
        Self::Min1,
        Self::Min5,
        Self::Min15,
        Self::Min30,
        Self::Hour1,
        Self::Hour4,
        Self::Day1,
        Self::Week1,
        Self::Month1,
    ];

    /// Interval string as used in REST queries and stream names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sec1 => "1s",
            Self::Min1 => "1m",
            Self::Min5 => "5m",
            Self::Min15 => "15m",
            Self::Min30 => "30m",
            Self::Hour1 => "1h",
            Self::Hour4 => "4h",
            Self::Day1 => "1d",
            Self::Week1 => "1w",
            Self::Month1 => "1M",
        }
    }
}

impl std::fmt::Display for ExchangeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How partial (not yet closed) candles are treated for a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandlePolicy {
    /// Forward a kline only once the exchange marks it final.
    ClosedOnly,
    /// Forward every update into the aggregator; bucket boundaries decide
    /// when a synthetic bar is complete.
    LiveAggregate,
}

/// Chart resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    Sec1,
    Sec5,
    Sec10,
    Sec30,
    Min1,
    Min5,
    Min15,
    Min30,
    Min60,
    Min240,
    Day1,
    Week1,
    Month1,
}

impl Resolution {
    /// Every resolution in the translation table.
    pub const ALL: [Resolution; 13] = [
        Self::Sec1,
        Self::Sec5,
        Self::Sec10,
        Self::Sec30,
        Self::Min1,
        Self::Min5,
        Self::Min15,
        Self::Min30,
        Self::Min60,
        Self::Min240,
        Self::Day1,
        Self::Week1,
        Self::Month1,
    ];

    /// Resolution used when a chart code is not in the table.
    pub const DEFAULT: Resolution = Resolution::Sec1;

    /// Chart resolution code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sec1 => "1S",
            Self::Sec5 => "5S",
            Self::Sec10 => "10S",
            Self::Sec30 => "30S",
            Self::Min1 => "1",
            Self::Min5 => "5",
            Self::Min15 => "15",
            Self::Min30 => "30",
            Self::Min60 => "60",
            Self::Min240 => "240",
            Self::Day1 => "1D",
            Self::Week1 => "1W",
            Self::Month1 => "1M",
        }
    }

    /// Look up a chart code. Codes are case-sensitive (`"1M"` is a month).
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|r| r.code() == code)
    }

    /// Look up a chart code, falling back to [`Resolution::DEFAULT`].
    pub fn from_code_or_default(code: &str) -> Self {
        Self::from_code(code).unwrap_or(Self::DEFAULT)
    }

    /// Exchange interval to request for this resolution.
    ///
    /// Synthetic sub-minute resolutions map to the finest native interval
    /// and must be aggregated by the caller.
    pub fn interval(&self) -> ExchangeInterval {
        match self {
            Self::Sec1 | Self::Sec5 | Self::Sec10 | Self::Sec30 => ExchangeInterval::Sec1,
            Self::Min1 => ExchangeInterval::Min1,
            Self::Min5 => ExchangeInterval::Min5,
            Self::Min15 => ExchangeInterval::Min15,
            Self::Min30 => ExchangeInterval::Min30,
            Self::Min60 => ExchangeInterval::Hour1,
            Self::Min240 => ExchangeInterval::Hour4,
            Self::Day1 => ExchangeInterval::Day1,
            Self::Week1 => ExchangeInterval::Week1,
            Self::Month1 => ExchangeInterval::Month1,
        }
    }

    /// Bucket width in milliseconds for synthetic resolutions.
    pub fn bucket_width_ms(&self) -> Option<i64> {
        match self {
            Self::Sec5 => Some(5_000),
            Self::Sec10 => Some(10_000),
            Self::Sec30 => Some(30_000),
            _ => None,
        }
    }

    /// Whether this resolution has no native exchange interval.
    pub fn is_synthetic(&self) -> bool {
        self.bucket_width_ms().is_some()
    }

    /// Partial-candle policy for this resolution class.
    pub fn candle_policy(&self) -> CandlePolicy {
        if self.is_synthetic() {
            CandlePolicy::LiveAggregate
        } else {
            CandlePolicy::ClosedOnly
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Resolution {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| CoreError::UnknownResolution(s.to_string()))
    }
}

/// Translate a chart resolution code into an exchange interval.
///
/// Total: unknown codes fall back to the finest interval (`1s`).
pub fn to_exchange_interval(code: &str) -> ExchangeInterval {
    Resolution::from_code_or_default(code).interval()
}
