//! EdDSA order signing for Venue-A's maker-fee-rebate CLOB, matching spec
//! §4.4's "Venue-A requires EdDSA-style signature with nonce".

use ed25519_dalek::{Signature, Signer, SigningKey};

/// Wraps the venue's signing key. `sign_order` produces the signature over
/// a canonical byte encoding of (nonce, symbol, side, qty, price) — the
/// exact field ordering is part of the venue's wire protocol, not
/// reconstructible from the distilled specification, so this matches the
/// shape of a typical L2-style signed-order payload: fixed-width fields
/// concatenated in a documented order, never a JSON string (which would let
/// whitespace/key-order changes silently alter the signed payload).
pub struct VenueASigner {
    key: SigningKey,
}

impl VenueASigner {
    pub fn from_bytes(seed: &[u8; 32]) -> Self {
        VenueASigner {
            key: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }

    /// Sign an order payload. `nonce` must be strictly increasing per
    /// account to prevent replay; callers own nonce allocation.
    pub fn sign_order(
        &self,
        nonce: u64,
        symbol: &str,
        side_is_buy: bool,
        qty_micros: i64,
        price_micros: i64,
    ) -> Signature {
        let mut payload = Vec::with_capacity(8 + symbol.len() + 1 + 8 + 8);
        payload.extend_from_slice(&nonce.to_be_bytes());
        payload.extend_from_slice(symbol.as_bytes());
        payload.push(if side_is_buy { 1 } else { 0 });
        payload.extend_from_slice(&qty_micros.to_be_bytes());
        payload.extend_from_slice(&price_micros.to_be_bytes());
        self.key.sign(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_deterministic_signature() {
        let signer = VenueASigner::from_bytes(&[7u8; 32]);
        let s1 = signer.sign_order(1, "BTC", true, 1_000_000, 50_000_000_000);
        let s2 = signer.sign_order(1, "BTC", true, 1_000_000, 50_000_000_000);
        assert_eq!(s1.to_bytes(), s2.to_bytes());
    }

    #[test]
    fn different_nonce_changes_signature() {
        let signer = VenueASigner::from_bytes(&[7u8; 32]);
        let s1 = signer.sign_order(1, "BTC", true, 1_000_000, 50_000_000_000);
        let s2 = signer.sign_order(2, "BTC", true, 1_000_000, 50_000_000_000);
        assert_ne!(s1.to_bytes(), s2.to_bytes());
    }

    #[test]
    fn public_key_hex_is_64_chars() {
        let signer = VenueASigner::from_bytes(&[1u8; 32]);
        assert_eq!(signer.public_key_hex().len(), 64);
    }
}
