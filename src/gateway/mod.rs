pub mod client;
pub mod messages;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::types::QueryCriteria;

pub use client::P2pClient;
pub use messages::RawListing;

/// The only suspension point of a pipeline cycle: one query in, raw listings out.
#[async_trait]
pub trait MarketplaceGateway: Send + Sync + 'static {
    async fn fetch_listings(
        &self,
        criteria: &QueryCriteria,
    ) -> Result<Vec<RawListing>, GatewayError>;
}
