//! Persona registry data.
//!
//! Personas are data, not logic: the seed [`catalog`] describes who posts,
//! and the [`vote_rules`] book describes how each of them votes. Adding a
//! persona means adding a catalog entry and (optionally) a rule; the engine
//! code never names a persona.

pub mod catalog;
pub mod vote_rules;

pub use catalog::{seed_communities, seed_personas, CommunitySeed, PersonaSeed};
pub use vote_rules::{Lean, PrimaryVote, VoteRule, VoteRuleBook};
