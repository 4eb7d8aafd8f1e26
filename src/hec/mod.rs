pub mod client;
pub mod destination;
pub mod selector;
pub mod wire;

pub use client::HecClient;
pub use destination::{Destination, DestinationPool};
pub use selector::{BalanceStrategy, DestinationSelector};
pub use wire::{HecTransport, RoutingFields};
