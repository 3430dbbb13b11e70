//! # Peer-LOB
//!
//! One replica node of a decentralized limit order book.
//!
//! ## Design Principles
//!
//! - **Replicated, not sequenced**: every node keeps its own book and
//!   matches each broadcast order on arrival
//! - **Price-time priority**: best price first, FIFO within a price
//! - **Advisory pause**: a joining node asks peers to hold new orders while
//!   it copies the book
//! - **Explicit state**: no globals, so many nodes can share one process
//!
//! ## Architecture
//!
//! ```text
//!                     [Peer Network]
//!                    /      |       \
//!   [BootstrapCoordinator] [NodeService] [TradingLoop]
//!                    \      |       /
//!          [NodeState: MatchingEngine + AdvisoryLockSet]
//! ```

pub mod order;
pub mod price_level;
pub mod order_book;
pub mod matching;
pub mod lock;
pub mod command;
pub mod network;
pub mod local;
pub mod service;
pub mod bootstrap;
pub mod trading;
pub mod config;
pub mod node;

// Re-exports for convenience
pub use order::{Fill, Order, OrderId, Side};
pub use price_level::PriceLevel;
pub use order_book::OrderBook;
pub use matching::{MatchingEngine, PlaceResult};
pub use lock::AdvisoryLockSet;
pub use command::{OrderRequest, Request, Response, ServiceKey, SubmitReply};
pub use network::{NetworkError, PeerId, PeerNetwork, RequestHandler, RequestId};
pub use local::{Fault, LocalGrape, LocalLink};
pub use service::{NodeService, NodeState};
pub use bootstrap::{BootstrapCoordinator, BootstrapError, BootstrapState};
pub use trading::{GeneratedOrder, OrderGenerator, SubmitReport, TradingError, TradingLoop};
pub use config::{ConfigError, NodeConfig};
pub use node::{Node, NodeError};
