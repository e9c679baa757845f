//! Base64url helpers
//!
//! JOSE uses the URL-safe alphabet without padding. Decoding is lenient
//! about trailing `=` because some providers pad the `n`/`e` members of
//! their published keys anyway.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

use crate::error::InvalidBase64Data;

const DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const ENCODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_encode_padding(false),
);

/// Decodes base64url data, with or without padding
///
/// # Errors
///
/// Returns an error if `enc` contains characters outside the URL-safe
/// alphabet or has an impossible length.
pub fn decode(enc: impl AsRef<[u8]>) -> Result<Vec<u8>, InvalidBase64Data> {
    Ok(DECODER.decode(enc)?)
}

/// Encodes raw bytes as unpadded base64url
#[must_use]
pub fn encode(raw: impl AsRef<[u8]>) -> String {
    ENCODER.encode(raw)
}
