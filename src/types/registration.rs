use crate::bls::{PublicKey, Signature};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tree_hash_derive::TreeHash;

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize, TreeHash)]
#[serde(deny_unknown_fields)]
pub struct ValidatorRegistration {
    pub fee_recipient: Address,
    #[serde(with = "serde_utils::quoted_u64")]
    pub gas_limit: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub timestamp: u64,
    #[serde(rename = "pubkey")]
    pub public_key: PublicKey,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignedValidatorRegistration {
    pub message: ValidatorRegistration,
    pub signature: Signature,
}
