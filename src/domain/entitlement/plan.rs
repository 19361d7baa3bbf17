//! Entitlement plan state machine.
//!
//! The plan is the coarse lifecycle position of an account with respect to
//! paid functionality. Every writer moves the plan through `transition_to`.

use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};

/// Entitlement plan of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Never engaged a paid flow, or the subscription was removed.
    Inactive,

    /// Inside a time-boxed free trial.
    Trial,

    /// Trial or subscription lapsed.
    Free,

    /// Provider confirms (or the checkout redirect suggests) a live
    /// paid subscription.
    Active,
}

impl Plan {
    /// Stable lowercase name, used for storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Inactive => "inactive",
            Plan::Trial => "trial",
            Plan::Free => "free",
            Plan::Active => "active",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Plan::Inactive),
            "trial" => Ok(Plan::Trial),
            "free" => Ok(Plan::Free),
            "active" => Ok(Plan::Active),
            other => Err(ValidationError::invalid_format(
                "plan",
                format!("unknown plan '{}'", other),
            )),
        }
    }
}

impl StateMachine for Plan {
    fn can_transition_to(&self, target: &Self) -> bool {
        use Plan::*;
        match target {
            // A trial is only ever granted to an account that has not
            // engaged yet; re-applying the current plan is always allowed.
            Trial => matches!(self, Inactive | Trial),
            Active | Free | Inactive => true,
        }
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use Plan::*;
        match self {
            Inactive => vec![Inactive, Trial, Free, Active],
            Trial => vec![Trial, Free, Active, Inactive],
            Free => vec![Free, Active, Inactive],
            Active => vec![Active, Free, Inactive],
        }
    }
}
