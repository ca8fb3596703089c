//! Day-ahead wind bidding and imbalance settlement.

pub mod evaluate;
pub mod optimizer;
pub mod settlement;

pub use evaluate::{evaluate, evaluate_breakdown, expected_profit};
pub use optimizer::{BidDecision, BidSettings, solve_bid};
pub use settlement::{Profit, SettlementRule, SettlementScheme, SystemState};
