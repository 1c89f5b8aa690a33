//! Deterministic item identifiers

use crate::error::ConnectorError;
use sha1::{Digest, Sha1};

/// Hash an ordered list of non-empty strings into a hex identifier
///
/// The arguments are joined with `:` and digested with SHA-1, so the same
/// arguments always give the same identifier and changing the order changes it.
///
/// # Errors
///
/// Returns `InvalidIdentifier` if any argument is empty.
pub fn uuid(args: &[&str]) -> Result<String, ConnectorError> {
    if let Some(position) = args.iter().position(|arg| arg.is_empty()) {
        return Err(ConnectorError::InvalidIdentifier(format!(
            "argument {} is empty",
            position
        )));
    }

    let joined = args.join(":");
    let digest = Sha1::digest(joined.as_bytes());
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_known_values() {
        assert_eq!(
            uuid(&["1", "2", "3", "4"]).unwrap(),
            "e7b71c81f5a0723e2237f157dba81777ce7c6c21"
        );
        assert_eq!(
            uuid(&["c01", "bugs", "2019-01-01T00:00:00+0000"]).unwrap(),
            "00c1ea2e1663fb879df9ac6dd395cd67928bba47"
        );
    }

    #[test]
    fn test_uuid_order_matters() {
        assert_ne!(uuid(&["a", "b"]).unwrap(), uuid(&["b", "a"]).unwrap());
    }

    #[test]
    fn test_uuid_rejects_empty_argument() {
        let result = uuid(&["c01", "", "bugs"]);
        assert!(matches!(result, Err(ConnectorError::InvalidIdentifier(_))));
    }
}
