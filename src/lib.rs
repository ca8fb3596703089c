//! Risk-aware reserve offers and day-ahead wind bidding.
//!
//! Consumption profiles feed two reserve-offer solvers (CVaR and an ALSO-X
//! chance-constraint search); wind, price and system-imbalance ensembles feed
//! the bidding optimizer, whose bid is then settled against a realisation
//! with the same rule it was optimised under.

pub mod bidding;
pub mod cli;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod io;
pub mod profile;
pub mod report;
/// Chance-constrained and CVaR reserve capacity offers.
pub mod reserve;
pub mod runner;
pub mod solver;
