use serde_json::Value;

use crate::FormatError;

pub fn decode(bytes: &[u8]) -> Result<Value, FormatError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::decode;
    use crate::FormatError;

    #[test]
    fn reports_json_errors() {
        assert!(matches!(decode(b"[1, 2"), Err(FormatError::Json(_))));
        assert_eq!(decode(b" [1, 2] ").unwrap().as_array().map(Vec::len), Some(2));
    }
}
