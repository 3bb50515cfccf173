//! Score bounds for range queries.

use crate::error::EngineError;
use std::fmt;
use std::str::FromStr;

/// One end of a score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBoundary {
    Inclusive(f64),
    Exclusive(f64),
    NegInfinity,
    PosInfinity,
}

impl ScoreBoundary {
    /// Whether `score` lies on the allowed side when this is the lower bound.
    #[inline]
    pub fn admits_from_below(&self, score: f64) -> bool {
        match *self {
            ScoreBoundary::Inclusive(min) => score >= min,
            ScoreBoundary::Exclusive(min) => score > min,
            ScoreBoundary::NegInfinity => true,
            ScoreBoundary::PosInfinity => false,
        }
    }

    /// Whether `score` lies on the allowed side when this is the upper bound.
    #[inline]
    pub fn admits_from_above(&self, score: f64) -> bool {
        match *self {
            ScoreBoundary::Inclusive(max) => score <= max,
            ScoreBoundary::Exclusive(max) => score < max,
            ScoreBoundary::PosInfinity => true,
            ScoreBoundary::NegInfinity => false,
        }
    }
}

impl fmt::Display for ScoreBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBoundary::Inclusive(score) => write!(f, "{score}"),
            ScoreBoundary::Exclusive(score) => write!(f, "({score}"),
            ScoreBoundary::NegInfinity => write!(f, "-inf"),
            ScoreBoundary::PosInfinity => write!(f, "+inf"),
        }
    }
}

impl FromStr for ScoreBoundary {
    type Err = EngineError;

    /// Parses `5`, `(5`, `-inf`, `+inf` and `inf`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "-inf" => return Ok(ScoreBoundary::NegInfinity),
            "+inf" | "inf" => return Ok(ScoreBoundary::PosInfinity),
            _ => {}
        }

        let (exclusive, number) = match s.strip_prefix('(') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let score: f64 = number.parse().map_err(|_| EngineError::NotAFloat)?;
        if score.is_nan() {
            return Err(EngineError::NotAFloat);
        }

        Ok(match (exclusive, score) {
            (_, s) if s == f64::NEG_INFINITY => ScoreBoundary::NegInfinity,
            (_, s) if s == f64::INFINITY => ScoreBoundary::PosInfinity,
            (true, s) => ScoreBoundary::Exclusive(s),
            (false, s) => ScoreBoundary::Inclusive(s),
        })
    }
}

/// A score interval, each end independently open, closed or unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreRange {
    pub min: ScoreBoundary,
    pub max: ScoreBoundary,
}

impl ScoreRange {
    pub fn new(min: ScoreBoundary, max: ScoreBoundary) -> Self {
        Self { min, max }
    }

    /// `[min, max]`
    pub fn inclusive(min: f64, max: f64) -> Self {
        Self::new(ScoreBoundary::Inclusive(min), ScoreBoundary::Inclusive(max))
    }

    /// `(-inf, +inf)`
    pub fn all() -> Self {
        Self::new(ScoreBoundary::NegInfinity, ScoreBoundary::PosInfinity)
    }

    /// Parses a `min max` pair as given to `ZRANGEBYSCORE`.
    pub fn parse(min: &str, max: &str) -> Result<Self, EngineError> {
        Ok(Self::new(min.parse()?, max.parse()?))
    }

    #[inline]
    pub fn contains(&self, score: f64) -> bool {
        self.min.admits_from_below(score) && self.max.admits_from_above(score)
    }

    /// True when `score` is past the upper end.
    #[inline]
    pub fn is_above(&self, score: f64) -> bool {
        !self.max.admits_from_above(score)
    }

    /// True when no score can satisfy both ends.
    pub fn is_empty(&self) -> bool {
        use ScoreBoundary::*;
        match (self.min, self.max) {
            (PosInfinity, _) | (_, NegInfinity) => true,
            (NegInfinity, _) | (_, PosInfinity) => false,
            (Inclusive(a), Inclusive(b)) => a > b,
            (Inclusive(a), Exclusive(b))
            | (Exclusive(a), Inclusive(b))
            | (Exclusive(a), Exclusive(b)) => a >= b,
        }
    }

    /// Swaps the ends, turning a `max min` pair given to a REV command into a
    /// forward range.
    pub fn reversed(&self) -> Self {
        Self::new(self.max, self.min)
    }
}

impl fmt::Display for ScoreRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.min, self.max)
    }
}
