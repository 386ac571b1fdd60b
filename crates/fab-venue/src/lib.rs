//! Venue integrations: the `VenueAdapter` contract plus the two concrete
//! adapters this core ever talks to — `VenueAAdapter` (maker-fee-rebate CLOB,
//! EdDSA-signed) and `VenueBAdapter` (taker-oriented CLOB, HMAC-signed REST).

pub mod adapter;
pub mod funding;
pub mod id_map;
pub mod metadata;
pub mod rate_limit;
pub mod signing;
pub mod venue_a;
pub mod venue_b;

pub use adapter::{
    AccountTier, ModifyOrderRequest, OrderCallback, PlaceOrderRequest, Position, PositionCallback,
    VenueAdapter, VenueError, VenueResult,
};
pub use funding::normalize_and_clamp;
pub use id_map::VenueOrderMap;
pub use metadata::{MarketMetadata, MarketMetadataCache};
pub use rate_limit::{RateLimiter, TokenManager};
pub use signing::{VenueASigner, VenueBSigner};
pub use venue_a::VenueAAdapter;
pub use venue_b::VenueBAdapter;
