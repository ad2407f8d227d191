//! Pair selection for the next comparison

pub mod selector;

pub use selector::{closest_pair, Matchmaker};
