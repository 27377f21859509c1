use serde::Serialize;
use serde::de::DeserializeOwned;
use crate::core::error::{IndexError, Result};
use crate::core::types::StoredValue;

/// Serializes whole entities into the stored payload field.
pub trait PayloadCodec<T>: Send + Sync {
    fn encode(&self, element: &T) -> Result<StoredValue>;

    fn decode(&self, payload: &StoredValue) -> Result<T>;
}

/// JSON payloads, stored as strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T> PayloadCodec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, element: &T) -> Result<StoredValue> {
        serde_json::to_string(element)
            .map(StoredValue::Str)
            .map_err(|e| IndexError::Encode(e.to_string()))
    }

    fn decode(&self, payload: &StoredValue) -> Result<T> {
        match payload {
            StoredValue::Str(json) => Ok(serde_json::from_str(json)?),
            StoredValue::Bytes(bytes) => Ok(serde_json::from_slice(bytes)?),
            StoredValue::Number(_) => Err(IndexError::Decode("payload is not JSON".to_string())),
        }
    }
}

/// Compact binary payloads, stored as bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl<T> PayloadCodec<T> for BincodeCodec
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, element: &T) -> Result<StoredValue> {
        bincode::serialize(element)
            .map(StoredValue::Bytes)
            .map_err(|e| IndexError::Encode(e.to_string()))
    }

    fn decode(&self, payload: &StoredValue) -> Result<T> {
        match payload {
            StoredValue::Bytes(bytes) => {
                bincode::deserialize(bytes).map_err(|e| IndexError::Decode(e.to_string()))
            }
            _ => Err(IndexError::Decode("payload is not binary".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        size: i32,
    }

    #[test]
    fn test_json_payload() {
        let item = Item { name: "fox".into(), size: 3 };
        let payload = JsonCodec.encode(&item).unwrap();
        assert_eq!(payload.as_str(), Some(r#"{"name":"fox","size":3}"#));
        let decoded: Item = JsonCodec.decode(&payload).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn test_corrupt_payload_is_decode_error() {
        let result: Result<Item> = JsonCodec.decode(&StoredValue::Str("{not json".into()));
        assert!(matches!(result, Err(IndexError::Decode(_))));

        let result: Result<Item> = BincodeCodec.decode(&StoredValue::Str("x".into()));
        assert!(matches!(result, Err(IndexError::Decode(_))));
    }
}
