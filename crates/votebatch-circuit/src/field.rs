//! Field element encoding helpers

use ff::PrimeField;
use halo2curves::pasta::Fp;
use votebatch_runtime::{FieldBytes, Result, VoteBatchError};

pub fn fp_to_bytes(value: &Fp) -> FieldBytes {
    value.to_repr()
}

/// Decode a canonical little-endian field element.
pub fn fp_from_bytes(bytes: &FieldBytes) -> Result<Fp> {
    Option::<Fp>::from(Fp::from_repr(*bytes))
        .ok_or_else(|| VoteBatchError::serialization_error("non-canonical field element"))
}

pub fn fp_to_hex(value: &Fp) -> String {
    format!("0x{}", hex::encode(value.to_repr()))
}

/// Parse either a `0x`-prefixed little-endian hex encoding or a decimal `u64`.
pub fn fp_from_str(s: &str) -> Result<Fp> {
    if let Some(hex_str) = s.strip_prefix("0x") {
        let bytes = hex::decode(hex_str)
            .map_err(|e| VoteBatchError::serialization_error(format!("invalid hex: {}", e)))?;
        let repr: FieldBytes = bytes.try_into().map_err(|_| {
            VoteBatchError::serialization_error("field element must be 32 bytes")
        })?;
        fp_from_bytes(&repr)
    } else {
        let val: u64 = s.parse().map_err(|_| {
            VoteBatchError::serialization_error(format!("invalid field element string: {}", s))
        })?;
        Ok(Fp::from(val))
    }
}

/// Little-endian bit `index` of the canonical representation.
pub fn fp_bit(value: &Fp, index: usize) -> bool {
    let repr = value.to_repr();
    (repr[index / 8] >> (index % 8)) & 1 == 1
}

/// Serde adapter encoding a single [`Fp`] as a hex string.
pub mod serde_fp {
    use super::{fp_from_str, fp_to_hex};
    use halo2curves::pasta::Fp;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Fp, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&fp_to_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Fp, D::Error> {
        let s = String::deserialize(deserializer)?;
        fp_from_str(&s).map_err(D::Error::custom)
    }
}

/// Serde adapter encoding a `Vec<Fp>` as a list of hex strings.
pub mod serde_fp_vec {
    use super::{fp_from_str, fp_to_hex};
    use halo2curves::pasta::Fp;
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[Fp], serializer: S) -> Result<S::Ok, S::Error> {
        values.iter().map(fp_to_hex).collect::<Vec<_>>().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Fp>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings.iter().map(|s| fp_from_str(s).map_err(D::Error::custom)).collect()
    }
}
