use crate::{
    bls::{BlsError, PublicKey, SecretKey, Signature},
    error::Error,
};
use alloy_primitives::{aliases::B32, fixed_bytes, hex, B256};
use ssz_types::{typenum, FixedVector};
use tree_hash::TreeHash;
use tree_hash_derive::TreeHash;

/// Domain type binding signatures to the application builder namespace.
pub const DOMAIN_APPLICATION_BUILDER: B32 = fixed_bytes!("0x00000001");

#[derive(TreeHash)]
struct ForkData {
    current_version: FixedVector<u8, typenum::U4>,
    genesis_validators_root: B256,
}

#[derive(TreeHash)]
struct SigningData {
    object_root: B256,
    domain: B256,
}

/// Derives the 32-byte signing domain: the 4-byte domain type followed by the
/// first 28 bytes of the fork data root.
pub fn compute_domain(
    domain_type: B32,
    fork_version_hex: &str,
    genesis_validators_root: B256,
) -> Result<B256, Error> {
    let fork_version = hex::decode(fork_version_hex)
        .map_err(|_| Error::InvalidForkVersion(fork_version_hex.to_string()))?;
    if fork_version.len() != 4 {
        return Err(Error::InvalidForkVersion(fork_version_hex.to_string()));
    }

    let fork_data = ForkData {
        current_version: FixedVector::from(fork_version),
        genesis_validators_root,
    };
    let fork_data_root = fork_data.tree_hash_root();

    let mut domain = [0u8; 32];
    domain[..4].copy_from_slice(domain_type.as_slice());
    domain[4..].copy_from_slice(&fork_data_root[..28]);
    Ok(B256::from(domain))
}

pub fn compute_signing_root<T: TreeHash>(object: &T, domain: B256) -> B256 {
    let signing_data = SigningData { object_root: object.tree_hash_root(), domain };
    signing_data.tree_hash_root()
}

/// Checks `signature` over `message` under `domain` against `public_key`.
pub fn verify_signed_builder_message<T: TreeHash>(
    message: &T,
    signature: &Signature,
    public_key: &PublicKey,
    domain: B256,
) -> Result<bool, BlsError> {
    let signing_root = compute_signing_root(message, domain);
    signature.verify(public_key, signing_root.as_slice())
}

pub fn sign_builder_message<T: TreeHash>(
    message: &T,
    secret_key: &SecretKey,
    domain: B256,
) -> Signature {
    let signing_root = compute_signing_root(message, domain);
    secret_key.sign(signing_root.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_has_builder_prefix() {
        let domain = compute_domain(DOMAIN_APPLICATION_BUILDER, "0x00000000", B256::ZERO).unwrap();
        assert_eq!(&domain[..4], DOMAIN_APPLICATION_BUILDER.as_slice());
    }

    #[test]
    fn domain_differs_across_fork_versions() {
        let mainnet = compute_domain(DOMAIN_APPLICATION_BUILDER, "0x00000000", B256::ZERO).unwrap();
        let sepolia = compute_domain(DOMAIN_APPLICATION_BUILDER, "0x90000069", B256::ZERO).unwrap();
        assert_ne!(mainnet, sepolia);
    }

    #[test]
    fn rejects_malformed_fork_versions() {
        for input in ["", "0x", "0x000000", "0x0000000000", "0xzzzzzzzz", "genesis"] {
            assert!(compute_domain(DOMAIN_APPLICATION_BUILDER, input, B256::ZERO).is_err());
        }
    }

    #[test]
    fn builder_message_round_trip() {
        let secret_key = SecretKey::from_ikm(&[3u8; 32]).unwrap();
        let public_key = secret_key.public_key();
        let domain = compute_domain(DOMAIN_APPLICATION_BUILDER, "0x00000000", B256::ZERO).unwrap();

        let message = B256::repeat_byte(0xab);
        let signature = sign_builder_message(&message, &secret_key, domain);
        assert!(verify_signed_builder_message(&message, &signature, &public_key, domain).unwrap());

        let other_domain =
            compute_domain(DOMAIN_APPLICATION_BUILDER, "0x00000001", B256::ZERO).unwrap();
        assert!(
            !verify_signed_builder_message(&message, &signature, &public_key, other_domain)
                .unwrap()
        );
    }
}
