use serde::{Deserialize, Serialize};
use thiserror::Error;

/// key: plan-catalog -> tier,quota lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Unlimited,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown plan `{0}`")]
pub struct UnknownPlan(pub String);

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Unlimited => "unlimited",
        }
    }

    pub fn parse(raw: &str) -> Result<Plan, UnknownPlan> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "unlimited" => Ok(Plan::Unlimited),
            other => Err(UnknownPlan(other.to_string())),
        }
    }

    /// Generations permitted per account under this plan.
    pub fn quota(&self) -> i64 {
        match self {
            Plan::Free => 5,
            Plan::Pro => 50,
            Plan::Unlimited => 999_999,
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_plans() {
        assert_eq!(Plan::parse("free"), Ok(Plan::Free));
        assert_eq!(Plan::parse("PRO"), Ok(Plan::Pro));
        assert_eq!(Plan::parse(" unlimited "), Ok(Plan::Unlimited));
    }

    #[test]
    fn unknown_plan_is_an_error_not_a_default() {
        let err = Plan::parse("enterprise").unwrap_err();
        assert_eq!(err, UnknownPlan("enterprise".to_string()));
    }

    #[test]
    fn quotas_match_catalog() {
        assert_eq!(Plan::Free.quota(), 5);
        assert_eq!(Plan::Pro.quota(), 50);
        assert_eq!(Plan::Unlimited.quota(), 999_999);
    }
}
