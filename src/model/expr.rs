use crate::error::ValidationError;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Time unit of a rate expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl RateUnit {
    /// Single-letter symbol used on the wire.
    pub fn symbol(self) -> char {
        match self {
            RateUnit::Second => 's',
            RateUnit::Minute => 'm',
            RateUnit::Hour => 'h',
            RateUnit::Day => 'd',
        }
    }

    /// Length of one period of this unit.
    pub fn period(self) -> Duration {
        match self {
            RateUnit::Second => Duration::from_secs(1),
            RateUnit::Minute => Duration::from_secs(60),
            RateUnit::Hour => Duration::from_secs(60 * 60),
            RateUnit::Day => Duration::from_secs(24 * 60 * 60),
        }
    }

    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "s" => Some(RateUnit::Second),
            "m" => Some(RateUnit::Minute),
            "h" => Some(RateUnit::Hour),
            "d" => Some(RateUnit::Day),
            _ => None,
        }
    }
}

/// Parsed `"<n>/<unit>"` rate expression, e.g. `5/m` for five permits per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateExpr {
    permits: u64,
    unit: RateUnit,
}

impl RateExpr {
    pub fn new(permits: u64, unit: RateUnit) -> Self {
        Self { permits, unit }
    }

    /// Permits granted per period.
    pub fn permits(&self) -> u64 {
        self.permits
    }

    pub fn unit(&self) -> RateUnit {
        self.unit
    }

    /// Length of the refill period.
    pub fn period(&self) -> Duration {
        self.unit.period()
    }
}

impl fmt::Display for RateExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.permits, self.unit.symbol())
    }
}

impl FromStr for RateExpr {
    type Err = ValidationError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ValidationError::InvalidRateExpression {
            expression: text.to_string(),
            reason: reason.to_string(),
        };
        let (count, unit) = text.trim().split_once('/').ok_or_else(|| invalid("expected '<n>/<unit>'"))?;
        let count = count.trim();
        if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("permit count must be a non-negative integer"));
        }
        let permits = count.parse::<u64>().map_err(|_| invalid("permit count is out of range"))?;
        let unit = RateUnit::from_symbol(unit.trim())
            .ok_or_else(|| invalid("unit must be one of s, m, h, d"))?;
        Ok(Self { permits, unit })
    }
}
