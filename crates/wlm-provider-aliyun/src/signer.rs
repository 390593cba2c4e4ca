//! RPC request signing
//!
//! Alibaba Cloud RPC APIs authenticate with signature version 1.0:
//!
//! 1. Sort every query parameter by name
//! 2. Percent-encode names and values (RFC 3986, unreserved set only)
//! 3. `StringToSign = "GET&" + enc("/") + "&" + enc(canonical_query)`
//! 4. `Signature = base64(HMAC-SHA1(secret + "&", StringToSign))`

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
use std::collections::BTreeMap;

type HmacSha1 = Hmac<Sha1>;

/// Everything except RFC 3986 unreserved characters
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a query component the way the signature expects
pub fn percent_encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986).to_string()
}

/// Sorted, encoded `name=value` pairs joined with `&`
pub fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{}={}", percent_encode(name), percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// The string signed for a GET request with the given canonical query
pub fn string_to_sign(canonical: &str) -> String {
    format!("GET&{}&{}", percent_encode("/"), percent_encode(canonical))
}

/// Base64 HMAC-SHA1 signature of `string_to_sign`
pub fn sign(access_key_secret: &str, string_to_sign: &str) -> Result<String, InvalidLength> {
    let mut mac = HmacSha1::new_from_slice(format!("{}&", access_key_secret).as_bytes())?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Full query string (with `Signature`) for a parameter set
pub fn signed_query(
    access_key_secret: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, InvalidLength> {
    let canonical = canonical_query(params);
    let signature = sign(access_key_secret, &string_to_sign(&canonical))?;
    Ok(format!("{}&Signature={}", canonical, percent_encode(&signature)))
}
