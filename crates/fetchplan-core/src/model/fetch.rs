use serde::{Deserialize, Serialize};
use std::fmt;

///
/// FetchTiming
///
/// Whether an association is loaded together with its owner.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchTiming {
    Immediate,
    Deferred,
}

///
/// FetchStyle
///
/// How an association is loaded when it is loaded.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStyle {
    Join,
    Select,
}

///
/// FetchStrategy
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FetchStrategy {
    pub timing: FetchTiming,
    pub style: FetchStyle,
}

impl FetchStrategy {
    pub const IMMEDIATE_JOIN: Self = Self::new(FetchTiming::Immediate, FetchStyle::Join);
    pub const IMMEDIATE_SELECT: Self = Self::new(FetchTiming::Immediate, FetchStyle::Select);
    pub const DEFERRED_SELECT: Self = Self::new(FetchTiming::Deferred, FetchStyle::Select);

    #[must_use]
    pub const fn new(timing: FetchTiming, style: FetchStyle) -> Self {
        Self { timing, style }
    }

    #[must_use]
    pub const fn is_immediate(&self) -> bool {
        matches!(self.timing, FetchTiming::Immediate)
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timing = match self.timing {
            FetchTiming::Immediate => "immediate",
            FetchTiming::Deferred => "deferred",
        };
        let style = match self.style {
            FetchStyle::Join => "join",
            FetchStyle::Select => "select",
        };
        write!(f, "{timing}/{style}")
    }
}

///
/// LockMode
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    #[default]
    None,
    Read,
    PessimisticRead,
    PessimisticWrite,
}
