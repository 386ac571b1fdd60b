//! Venue request-signing, enrichment grounded on `hot3246624-pm_as_ofi`'s
//! HMAC request-signing pattern and `aibysid-HyperLiquidMM`'s local-key
//! signing: the teacher ships no signing code of its own, since its broker
//! adapters (`mqk-broker-paper`, `mqk-broker-alpaca`) authenticate with a
//! static API key rather than per-request signatures.

pub mod venue_a;
pub mod venue_b;

pub use venue_a::VenueASigner;
pub use venue_b::VenueBSigner;
