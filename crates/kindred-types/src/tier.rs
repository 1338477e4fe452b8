use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Payment tiers, ordered. Feature gates compare against this ordering,
/// so the variant order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    Free,
    Basic,
    Premium,
    Owner,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "Free",
            Tier::Basic => "Basic",
            Tier::Premium => "Premium",
            Tier::Owner => "Owner",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown payment tier: {0}")]
pub struct ParseTierError(String);

impl FromStr for Tier {
    type Err = ParseTierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Free" => Ok(Tier::Free),
            "Basic" => Ok(Tier::Basic),
            "Premium" => Ok(Tier::Premium),
            "Owner" => Ok(Tier::Owner),
            other => Err(ParseTierError(other.to_string())),
        }
    }
}

/// What a tier is allowed to see. `None` caps mean unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub interest_category_cap: Option<u32>,
    pub items_per_category_cap: Option<u32>,
    pub friends_list_cap: Option<u32>,
    pub can_see_friends_list: bool,
    pub can_see_recommendations: bool,
}

/// Pure tier-to-limits policy. Never touches storage.
///
/// The interest caps only take effect under [`InterestPolicy::Capped`];
/// the default profile read returns everything regardless of tier.
pub fn limits_for(tier: Tier) -> Limits {
    Limits {
        interest_category_cap: (tier < Tier::Basic).then_some(3),
        items_per_category_cap: (tier < Tier::Basic).then_some(5),
        friends_list_cap: (tier == Tier::Basic).then_some(10),
        can_see_friends_list: tier >= Tier::Basic,
        can_see_recommendations: tier >= Tier::Premium,
    }
}

/// Whether the profile read applies the interest caps from [`limits_for`].
/// Two policies exist; `Unrestricted` is the active default, pending a
/// product decision on the capped variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterestPolicy {
    #[default]
    Unrestricted,
    Capped,
}

impl InterestPolicy {
    /// Parses the `KINDRED_INTEREST_POLICY` setting. Unknown values fall
    /// back to the default.
    pub fn from_env_str(s: &str) -> Self {
        match s {
            "capped" => InterestPolicy::Capped,
            _ => InterestPolicy::Unrestricted,
        }
    }
}
