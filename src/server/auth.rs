use hmac::{ Hmac, Mac };
use sha2::Sha256;
use std::collections::HashMap;
use url::form_urlencoded;

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew between client and relay, in seconds.
pub const MAX_SKEW_SECS: i64 = 300;

pub fn sign(secret: &str, ts: i64) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => {
            return String::new();
        }
    };
    mac.update(ts.to_string().as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Query string fragment a client appends to the relay URL.
pub fn signed_query(secret: &str, ts: i64) -> String {
    form_urlencoded::Serializer
        ::new(String::new())
        .append_pair("ts", &ts.to_string())
        .append_pair("sig", &sign(secret, ts))
        .finish()
}

/// Checks `ts`/`sig` in a handshake query string. The error is the reason
/// sent back with the 401.
pub fn verify(secret: &str, query: &str, now: i64) -> Result<(), &'static str> {
    let params: HashMap<String, String> = form_urlencoded
        ::parse(query.as_bytes())
        .into_owned()
        .collect();

    let ts = params.get("ts").or_else(|| params.get("X-Api-Ts"));
    let sig = params.get("sig").or_else(|| params.get("X-Api-Sign"));

    let (ts, sig) = match (ts, sig) {
        (Some(ts), Some(sig)) => (ts, sig),
        _ => {
            return Err("missing ts/sig");
        }
    };

    let ts: i64 = ts.parse().map_err(|_| "bad timestamp")?;
    if (now - ts).abs() > MAX_SKEW_SECS {
        return Err("timestamp out of range");
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad secret")?;
    mac.update(ts.to_string().as_bytes());
    let expected = hex::decode(sig).map_err(|_| "bad signature")?;
    mac.verify_slice(&expected).map_err(|_| "bad signature")
}
