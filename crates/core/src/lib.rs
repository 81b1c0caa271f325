//! Edge Promo
//!
//! Promotion compiler and offline eligibility model for multi-brand restaurant
//! point-of-sale terminals. Promotions are compiled once into self-contained
//! documents; terminals evaluate those documents against a bill with no further
//! lookups, and the resolver decides which eligible promotions apply together.

pub mod bill;
pub mod compiler;
pub mod discounts;
pub mod evaluation;
pub mod fixtures;
pub mod ids;
pub mod promotions;
pub mod reference;
pub mod resolution;
