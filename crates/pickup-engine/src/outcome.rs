use pickup_core::ResolutionResult;
use serde::Serialize;

/// Terminal result of one request as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Resolved(ResolutionResult),
    Failed(Failure),
    TimedOut,
    SystemError,
}

impl Outcome {
    pub(crate) fn failed(reason: FailureReason, addr_type: AddrType) -> Self {
        Self::Failed(Failure { reason, addr_type })
    }

    /// HTTP-style status code.
    pub fn status(&self) -> u16 {
        match self {
            Self::Resolved(_) => 200,
            Self::Failed(_) => 500,
            Self::TimedOut => 408,
            Self::SystemError => 999,
        }
    }

    pub fn result(&self) -> Option<&ResolutionResult> {
        match self {
            Self::Resolved(r) => Some(r),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(f) => Some(f),
            _ => None,
        }
    }
}

/// A caller-recoverable business failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub reason: FailureReason,
    pub addr_type: AddrType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Nothing was said.
    Silence,
    /// Too short or unintelligible to be an address.
    PassengerIssue,
    MissingNumber,
    MissingRoad,
    /// A district shared by several cities with no city given.
    Ambiguous,
    /// Every cascade step came back empty.
    Unresolved,
    /// An intersection keyword without a real second road.
    FakeCrossRoad,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Silence => "silence",
            Self::PassengerIssue => "passenger-issue",
            Self::MissingNumber => "missing-number",
            Self::MissingRoad => "missing-road",
            Self::Ambiguous => "ambiguous",
            Self::Unresolved => "unresolved",
            Self::FakeCrossRoad => "fake-cross-road",
        }
    }
}

/// Which path the failed request was on, for differentiated prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AddrType {
    Unknown,
    Address,
    Landmark,
    CrossRoad,
    Junction,
}

impl AddrType {
    pub fn code(&self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Address => 1,
            Self::Landmark => 2,
            Self::CrossRoad => 3,
            Self::Junction => 4,
        }
    }
}
