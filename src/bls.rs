use alloy_primitives::hex;
use blst::{
    min_pk::{PublicKey as BlstPublicKey, SecretKey as BlstSecretKey, Signature as BlstSignature},
    BLST_ERROR,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ssz_types::{typenum, FixedVector};
use std::{fmt, str::FromStr};
use thiserror::Error;
use tree_hash_derive::TreeHash;

/// Domain separation tag for BLS signatures over SSZ signing roots.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

const PUBLIC_KEY_BYTES_LEN: usize = 48;
const SIGNATURE_BYTES_LEN: usize = 96;

#[derive(Debug, Error)]
pub enum BlsError {
    #[error("invalid hex string")]
    InvalidHexString,
    #[error("invalid byte length")]
    InvalidByteLength,
    #[error("blst error: {0:?}")]
    Blst(BLST_ERROR),
}

#[derive(Debug, PartialEq, Eq, Clone, Default, TreeHash)]
pub struct PublicKey {
    inner: FixedVector<u8, typenum::U48>,
}

impl PublicKey {
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        if bytes.len() != PUBLIC_KEY_BYTES_LEN {
            return Err(BlsError::InvalidByteLength);
        }
        Ok(Self { inner: FixedVector::from(bytes.to_vec()) })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner[..]
    }

    fn to_blst_public_key(&self) -> Result<BlstPublicKey, BlsError> {
        BlstPublicKey::from_bytes(self.as_slice()).map_err(BlsError::Blst)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_prefixed(self.as_slice()))
    }
}

impl FromStr for PublicKey {
    type Err = BlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| BlsError::InvalidHexString)?;
        Self::try_from_bytes(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode_prefixed(self.as_slice()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Default, TreeHash)]
pub struct Signature {
    inner: FixedVector<u8, typenum::U96>,
}

impl Signature {
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        if bytes.len() != SIGNATURE_BYTES_LEN {
            return Err(BlsError::InvalidByteLength);
        }
        Ok(Self { inner: FixedVector::from(bytes.to_vec()) })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.inner[..]
    }

    /// Verifies this signature over `message` against `public_key`.
    ///
    /// Malformed key or signature encodings surface as errors; a well-formed
    /// signature that does not verify yields `Ok(false)`.
    pub fn verify(&self, public_key: &PublicKey, message: &[u8]) -> Result<bool, BlsError> {
        let signature = BlstSignature::from_bytes(self.as_slice()).map_err(BlsError::Blst)?;
        let public_key = public_key.to_blst_public_key()?;
        Ok(signature.verify(true, message, DST, &[], &public_key, true) == BLST_ERROR::BLST_SUCCESS)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_prefixed(self.as_slice()))
    }
}

impl FromStr for Signature {
    type Err = BlsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| BlsError::InvalidHexString)?;
        Self::try_from_bytes(&bytes)
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode_prefixed(self.as_slice()))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: String = Deserialize::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

pub struct SecretKey {
    inner: BlstSecretKey,
}

impl SecretKey {
    /// Derives a secret key from at least 32 bytes of input key material.
    pub fn from_ikm(ikm: &[u8]) -> Result<Self, BlsError> {
        let inner = BlstSecretKey::key_gen(ikm, &[]).map_err(BlsError::Blst)?;
        Ok(Self { inner })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey { inner: FixedVector::from(self.inner.sk_to_pk().to_bytes().to_vec()) }
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.inner.sign(message, DST, &[]);
        Signature { inner: FixedVector::from(signature.to_bytes().to_vec()) }
    }
}
