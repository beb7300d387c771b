//! Strategy variants: a weighting policy combined with a rebalancing regime.

use super::allocation::Weighting;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rebalancing {
    /// Liquidate and reallocate every year.
    Annual,
    /// Allocate once; afterwards only admit new listings.
    BuyHold,
}

impl Rebalancing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rebalancing::Annual => "rebalance",
            Rebalancing::BuyHold => "buy_hold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StrategySpec {
    pub name: String,
    pub weighting: Weighting,
    pub rebalancing: Rebalancing,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StrategyError {
    #[error("unknown strategy: {0}")]
    Unknown(String),

    #[error("duplicate strategy: {0}")]
    Duplicate(String),

    #[error("no strategies given")]
    Empty,
}

impl StrategySpec {
    pub fn new(weighting: Weighting, rebalancing: Rebalancing) -> Self {
        StrategySpec {
            name: format!("{}_{}", weighting.as_str(), rebalancing.as_str()),
            weighting,
            rebalancing,
        }
    }

    /// Parse identifiers such as `equal_rebalance` or `cap_buy_hold`.
    pub fn parse(id: &str) -> Result<Self, StrategyError> {
        let normalized = id.trim().to_lowercase().replace('-', "_");
        let (weighting, rest) = if let Some(rest) = normalized.strip_prefix("equal_") {
            (Weighting::Equal, rest)
        } else if let Some(rest) = normalized
            .strip_prefix("cap_")
            .or_else(|| normalized.strip_prefix("market_cap_"))
        {
            (Weighting::MarketCap, rest)
        } else {
            return Err(StrategyError::Unknown(id.trim().to_string()));
        };

        let rebalancing = match rest {
            "rebalance" | "rebalanced" => Rebalancing::Annual,
            "buy_hold" | "buy_and_hold" => Rebalancing::BuyHold,
            _ => return Err(StrategyError::Unknown(id.trim().to_string())),
        };

        Ok(StrategySpec::new(weighting, rebalancing))
    }

    /// All four weighting/rebalancing combinations.
    pub fn all() -> Vec<Self> {
        vec![
            StrategySpec::new(Weighting::Equal, Rebalancing::Annual),
            StrategySpec::new(Weighting::MarketCap, Rebalancing::Annual),
            StrategySpec::new(Weighting::Equal, Rebalancing::BuyHold),
            StrategySpec::new(Weighting::MarketCap, Rebalancing::BuyHold),
        ]
    }
}

/// Parse a comma separated strategy list.
pub fn parse_strategies(input: &str) -> Result<Vec<StrategySpec>, StrategyError> {
    let mut specs: Vec<StrategySpec> = Vec::new();
    for token in input.split(',').filter(|t| !t.trim().is_empty()) {
        let spec = StrategySpec::parse(token)?;
        if specs.contains(&spec) {
            return Err(StrategyError::Duplicate(spec.name));
        }
        specs.push(spec);
    }
    if specs.is_empty() {
        return Err(StrategyError::Empty);
    }
    Ok(specs)
}
