//! Real-time bar streaming for the chart datafeed.
//!
//! - `Aggregator`: folds fine-grained bars into fixed-width synthetic bars
//! - `OrderingGuard`: drops bars that do not strictly advance in time
//! - `SubscriptionRegistry`: owns every live subscription and its socket
//! - `run_dispatch`: single consumer that feeds socket events to the registry

pub mod aggregator;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod registry;

pub use aggregator::{AggregationBucket, Aggregator};
pub use dispatch::{run_dispatch, SharedRegistry};
pub use error::{StreamError, StreamResult};
pub use guard::OrderingGuard;
pub use registry::{
    BarCallback, ResetCallback, SocketState, SubscriptionRegistry, SubscriptionRequest,
};
