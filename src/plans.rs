// src/plans.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Starter,
    Pro,
    Plus,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Plus => "plus",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown plan: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Plan::Starter),
            "pro" => Ok(Plan::Pro),
            "plus" => Ok(Plan::Plus),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}

/// Plan -> Stripe price id, plus the derived reverse mapping used when
/// an invoice only tells us which price was paid.
#[derive(Debug, Clone, Default)]
pub struct PlanCatalog {
    prices: HashMap<Plan, String>,
    plans_by_price: HashMap<String, Plan>,
}

impl PlanCatalog {
    /// Empty or missing price ids are left out, so such plans count as
    /// not configured.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Plan, Option<S>)>,
        S: Into<String>,
    {
        let mut prices = HashMap::new();
        let mut plans_by_price = HashMap::new();

        for (plan, price) in entries {
            let Some(price) = price.map(Into::into) else {
                continue;
            };
            let price = price.trim().to_string();
            if price.is_empty() {
                continue;
            }
            plans_by_price.insert(price.clone(), plan);
            prices.insert(plan, price);
        }

        Self {
            prices,
            plans_by_price,
        }
    }

    pub fn price_for(&self, plan: Plan) -> Option<&str> {
        self.prices.get(&plan).map(String::as_str)
    }

    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        self.plans_by_price.get(price_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_tags_only() {
        assert_eq!("pro".parse::<Plan>(), Ok(Plan::Pro));
        assert_eq!("starter".parse::<Plan>(), Ok(Plan::Starter));
        assert!("Pro".parse::<Plan>().is_err());
        assert!("enterprise".parse::<Plan>().is_err());
    }

    #[test]
    fn reverse_mapping_is_derived() {
        let catalog = PlanCatalog::new([
            (Plan::Starter, Some("price_starter")),
            (Plan::Pro, Some("price_pro")),
            (Plan::Plus, None),
        ]);

        assert_eq!(catalog.price_for(Plan::Pro), Some("price_pro"));
        assert_eq!(catalog.plan_for_price("price_starter"), Some(Plan::Starter));
        assert_eq!(catalog.price_for(Plan::Plus), None);
        assert_eq!(catalog.plan_for_price("price_unknown"), None);
    }

    #[test]
    fn blank_price_counts_as_unconfigured() {
        let catalog = PlanCatalog::new([(Plan::Plus, Some("  "))]);
        assert_eq!(catalog.price_for(Plan::Plus), None);
        assert!(catalog.is_empty());
    }
}
