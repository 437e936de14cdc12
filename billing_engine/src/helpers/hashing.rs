use blake2::{Blake2b512, Digest};
use serde::Serialize;

/// Hex-encoded Blake2b-512 digest of the JSON serialisation of `value`. Audit rows store this so that a later reader
/// can tell whether the stored document still matches what was written at the time of the change.
pub fn digest_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(value)?;
    Ok(format!("{:x}", Blake2b512::digest(&bytes)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn digest_is_stable_and_sensitive() {
        let a = digest_json(&("report", 1)).unwrap();
        let b = digest_json(&("report", 1)).unwrap();
        let c = digest_json(&("report", 2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 128);
    }
}
