//! Graph representation and neighborhood queries

pub mod algorithms;
pub mod builder;
pub mod compressed;

pub use builder::GraphBuilder;
pub use compressed::{NodeId, SocialGraph};
