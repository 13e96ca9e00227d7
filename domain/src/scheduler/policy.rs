//! Victim selection policy for steals

use serde::{Deserialize, Serialize};

/// How an idle agent picks the deque it steals from
///
/// - `Busiest`: the deque with the most queued tasks, ties broken by the
///   lowest agent id (deterministic, default)
/// - `Random`: any non-empty deque, uniformly
///
/// # Example
///
/// ```
/// use liminal_domain::StealPolicy;
///
/// assert_eq!("busiest".parse::<StealPolicy>().ok(), Some(StealPolicy::Busiest));
/// assert_eq!("RANDOM".parse::<StealPolicy>().ok(), Some(StealPolicy::Random));
/// assert!("round-robin".parse::<StealPolicy>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StealPolicy {
    #[default]
    Busiest,
    Random,
}

impl StealPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            StealPolicy::Busiest => "busiest",
            StealPolicy::Random => "random",
        }
    }
}

impl std::fmt::Display for StealPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StealPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "busiest" => Ok(StealPolicy::Busiest),
            "random" => Ok(StealPolicy::Random),
            other => Err(format!(
                "Unknown steal policy: {}. Valid: busiest, random",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_busiest() {
        assert_eq!(StealPolicy::default(), StealPolicy::Busiest);
    }

    #[test]
    fn test_parse_round_trips_display() {
        for policy in [StealPolicy::Busiest, StealPolicy::Random] {
            assert_eq!(policy.to_string().parse::<StealPolicy>(), Ok(policy));
        }
    }

    #[test]
    fn test_parse_error_lists_choices() {
        let err = "lifo".parse::<StealPolicy>().unwrap_err();
        assert!(err.contains("busiest, random"));
    }
}
