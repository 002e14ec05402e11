//! Destination address validation
//!
//! Addresses are base58check strings whose first decoded byte is the version
//! byte identifying the network and address type (for example 0 for Bitcoin
//! P2PKH, 5 for P2SH, 48 for Litecoin P2PKH).

/// Decoded length of a base58check address: version byte + 20-byte hash
const ADDRESS_PAYLOAD_LEN: usize = 21;

/// Version byte of a base58check address, or `None` if the string is not a
/// well-formed address (bad alphabet, bad checksum or wrong length).
pub fn address_version(address: &str) -> Option<u8> {
    let payload = bs58::decode(address).with_check(None).into_vec().ok()?;
    if payload.len() != ADDRESS_PAYLOAD_LEN {
        return None;
    }
    payload.first().copied()
}

/// Whether the address decodes and its version is one of `accepted`
pub fn is_valid_address(address: &str, accepted: &[u8]) -> bool {
    address_version(address).is_some_and(|version| accepted.contains(&version))
}
