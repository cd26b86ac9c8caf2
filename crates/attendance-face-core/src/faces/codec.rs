//! Storage form of face encodings: standard base64 over the little-endian
//! IEEE-754 bytes of each `f64`. Decoding never panics; anything that does not
//! come back as a finite vector of the expected dimension is a [`CodecError`].

use base64::{engine::general_purpose, Engine as _};
use thiserror::Error;

/// Length of the vectors produced by the dlib ResNet face encoder.
pub const ENCODING_DIMENSION: usize = 128;

const VALUE_BYTES: usize = std::mem::size_of::<f64>();

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encoding is not valid base64: {0}")]
    Base64(String),

    #[error("encoding payload of {0} bytes is not a whole number of values")]
    Truncated(usize),

    #[error("expected {expected} values, found {found}")]
    Dimension { expected: usize, found: usize },

    #[error("value at position {0} is not finite")]
    NonFinite(usize),
}

pub fn encode_vector(values: &[f64]) -> String {
    let mut bytes = Vec::with_capacity(values.len() * VALUE_BYTES);
    for value in values {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    general_purpose::STANDARD.encode(bytes)
}

pub fn decode_vector(encoded: &str) -> Result<Vec<f64>, CodecError> {
    decode_vector_with_dimension(encoded, ENCODING_DIMENSION)
}

pub fn decode_vector_with_dimension(
    encoded: &str,
    expected: usize,
) -> Result<Vec<f64>, CodecError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| CodecError::Base64(err.to_string()))?;
    if bytes.len() % VALUE_BYTES != 0 {
        return Err(CodecError::Truncated(bytes.len()));
    }

    let found = bytes.len() / VALUE_BYTES;
    if found != expected {
        return Err(CodecError::Dimension { expected, found });
    }

    let mut values = Vec::with_capacity(found);
    for (idx, chunk) in bytes.chunks_exact(VALUE_BYTES).enumerate() {
        let mut raw = [0u8; VALUE_BYTES];
        raw.copy_from_slice(chunk);
        let value = f64::from_le_bytes(raw);
        if !value.is_finite() {
            return Err(CodecError::NonFinite(idx));
        }
        values.push(value);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vector() -> Vec<f64> {
        (0..ENCODING_DIMENSION)
            .map(|idx| (idx as f64 * 0.37).sin() / 3.0)
            .collect()
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let mut values = sample_vector();
        values[3] = -0.0;
        values[7] = f64::MIN_POSITIVE;
        values[11] = 1.0e-300;

        let decoded = decode_vector(&encode_vector(&values)).unwrap();
        let original_bits: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
        let decoded_bits: Vec<u64> = decoded.iter().map(|v| v.to_bits()).collect();
        assert_eq!(original_bits, decoded_bits);
    }

    #[test]
    fn garbage_is_reported_as_base64_error() {
        let err = decode_vector("not base64 at all!").unwrap_err();
        assert!(matches!(err, CodecError::Base64(_)));
    }

    #[test]
    fn partial_values_are_rejected() {
        let encoded = general_purpose::STANDARD.encode([0u8; 12]);
        assert_eq!(decode_vector(&encoded), Err(CodecError::Truncated(12)));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let encoded = encode_vector(&[0.5, 0.25]);
        assert_eq!(
            decode_vector(&encoded),
            Err(CodecError::Dimension {
                expected: ENCODING_DIMENSION,
                found: 2
            })
        );
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut values = sample_vector();
        values[5] = f64::NAN;
        let encoded = encode_vector(&values);
        assert_eq!(decode_vector(&encoded), Err(CodecError::NonFinite(5)));
    }

    #[test]
    fn empty_payload_is_a_dimension_error() {
        assert_eq!(
            decode_vector(""),
            Err(CodecError::Dimension {
                expected: ENCODING_DIMENSION,
                found: 0
            })
        );
    }
}
