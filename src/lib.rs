//! Lane-graph encoder and goal-conditioned aggregator for vehicle
//! trajectory prediction.
//!
//! Given a target agent's past motion, a vectorized lane-graph map and
//! the histories of surrounding agents, this crate predicts a probability
//! distribution over likely goal nodes on the lane graph and produces
//! goal-conditioned context encodings for a downstream trajectory decoder.
//!
//! # Architecture
//!
//! ```text
//! EncoderInputs
//!     │
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  LaneGraphEncoder                                           │
//! │  - GRU summaries of target agent, lane nodes, neighbors     │
//! │  - Agent-node attention fuses nearby agent context          │
//! │  - GAT layers aggregate local context along the lane graph  │
//! └─────────────────────────────────────────────────────────────┘
//!     │ Encodings
//!     ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  GoalConditioned (wraps GlobalAttention)                    │
//! │  - Goal head: log probabilities over valid lane nodes       │
//! │  - Samples N goals (or forces ground truth in pre-training) │
//! │  - Appends goal encodings to the aggregated context         │
//! └─────────────────────────────────────────────────────────────┘
//!     │ AggregatorOutput
//!     ▼
//! trajectory decoder (external)
//! ```
//!
//! Masks follow the inverted convention throughout: 1.0 = padded/invalid,
//! 0.0 = valid. Goal sampling draws from the backend RNG; seed it with
//! `Backend::seed` for reproducible outputs.

pub mod adjacency;
pub mod aggregator;
pub mod attention;
pub mod config;
pub mod encoder;
pub mod seq;
pub mod types;

// Re-export commonly used types
pub use adjacency::build_adjacency;
pub use aggregator::{Aggregate, GlobalAttention, GoalConditioned};
pub use attention::{AgentNodeAttention, GatLayer};
pub use config::{EncoderConfig, GoalConditionedConfig};
pub use encoder::LaneGraphEncoder;
pub use seq::encode_sequences;
pub use types::{
    AgentNodeMasks, AggregatorOutput, EncoderInputs, Encodings, GraphEncodings, MapRepresentation,
    SurroundingAgents, TraversalInputs,
};
