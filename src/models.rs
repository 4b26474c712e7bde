use serde::{Deserialize, Serialize};

/// A single entry of the log.
///
/// `value` is an opaque payload, carried as standard base64 in JSON and as
/// protobuf bytes on disk. `offset` is assigned by the log on append.
#[derive(Clone, PartialEq, Eq, prost::Message, Serialize, Deserialize)]
pub struct Record {
    #[prost(bytes = "vec", tag = "1")]
    #[serde(default, with = "base64_value")]
    pub value: Vec<u8>,

    #[prost(uint64, optional, tag = "2")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl Record {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Record {
            value: value.into(),
            offset: None,
        }
    }
}

mod base64_value {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ProduceRequest {
    #[serde(default)]
    pub record: Record,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ProduceResponse {
    pub offset: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConsumeRequest {
    #[serde(default)]
    pub offset: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ConsumeResponse {
    pub record: Record,
}
