// rust/distgraph-core/src/feature.rs

//! Typed node features.
//!
//! The engine hands back raw byte payloads. This module owns the declared
//! schema for every `(node type, feature)` pair and turns payloads into
//! typed values aligned with the requested node list.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;

use crate::config::FeatureInfo;
use crate::engine::{NodeId, RemoteGraphEngine};
use crate::error::{GraphError, Result};

/// Scalar kind of a feature payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureDtype {
    /// UTF-8 text.
    String,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl FeatureDtype {
    /// Width in bytes of one element, `None` for text.
    pub fn width(&self) -> Option<usize> {
        match self {
            FeatureDtype::String => None,
            FeatureDtype::Int8 | FeatureDtype::UInt8 => Some(1),
            FeatureDtype::Int16 | FeatureDtype::UInt16 => Some(2),
            FeatureDtype::Int32 | FeatureDtype::UInt32 | FeatureDtype::Float32 => Some(4),
            FeatureDtype::Int64 | FeatureDtype::UInt64 | FeatureDtype::Float64 => Some(8),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeatureDtype::String => "string",
            FeatureDtype::Int8 => "int8",
            FeatureDtype::Int16 => "int16",
            FeatureDtype::Int32 => "int32",
            FeatureDtype::Int64 => "int64",
            FeatureDtype::UInt8 => "uint8",
            FeatureDtype::UInt16 => "uint16",
            FeatureDtype::UInt32 => "uint32",
            FeatureDtype::UInt64 => "uint64",
            FeatureDtype::Float32 => "float32",
            FeatureDtype::Float64 => "float64",
        }
    }

    /// Encode whitespace-separated text tokens into a payload of this dtype
    /// (little-endian for numeric kinds).
    pub fn encode_tokens(&self, tokens: &[&str]) -> Result<Bytes> {
        let dtype_name = self.name();
        macro_rules! encode_le {
            ($ty:ty) => {{
                let mut out = Vec::with_capacity(tokens.len() * std::mem::size_of::<$ty>());
                for token in tokens {
                    let value: $ty = token.parse().map_err(|_| {
                        GraphError::decode(format!(
                            "'{}' is not a valid {} value",
                            token,
                            dtype_name
                        ))
                    })?;
                    out.extend_from_slice(&value.to_le_bytes());
                }
                out
            }};
        }

        let encoded = match self {
            FeatureDtype::String => tokens.join(" ").into_bytes(),
            FeatureDtype::Int8 => encode_le!(i8),
            FeatureDtype::Int16 => encode_le!(i16),
            FeatureDtype::Int32 => encode_le!(i32),
            FeatureDtype::Int64 => encode_le!(i64),
            FeatureDtype::UInt8 => encode_le!(u8),
            FeatureDtype::UInt16 => encode_le!(u16),
            FeatureDtype::UInt32 => encode_le!(u32),
            FeatureDtype::UInt64 => encode_le!(u64),
            FeatureDtype::Float32 => encode_le!(f32),
            FeatureDtype::Float64 => encode_le!(f64),
        };
        Ok(Bytes::from(encoded))
    }

    /// Decode one raw payload.
    pub fn decode(&self, payload: &[u8]) -> Result<FeatureValue> {
        let dtype_name = self.name();
        macro_rules! decode_le {
            ($variant:ident, $ty:ty) => {{
                const WIDTH: usize = std::mem::size_of::<$ty>();
                if payload.len() % WIDTH != 0 {
                    return Err(GraphError::shape(format!(
                        "{}-byte payload is not a multiple of the {} width ({} bytes)",
                        payload.len(),
                        dtype_name,
                        WIDTH
                    )));
                }
                FeatureValue::$variant(
                    payload
                        .chunks_exact(WIDTH)
                        .map(|chunk| {
                            let mut raw = [0u8; WIDTH];
                            raw.copy_from_slice(chunk);
                            <$ty>::from_le_bytes(raw)
                        })
                        .collect(),
                )
            }};
        }

        let value = match self {
            FeatureDtype::String => {
                let text = std::str::from_utf8(payload).map_err(|e| {
                    GraphError::decode(format!("text feature is not valid UTF-8: {e}"))
                })?;
                FeatureValue::Text(text.to_string())
            }
            FeatureDtype::Int8 => decode_le!(Int8, i8),
            FeatureDtype::Int16 => decode_le!(Int16, i16),
            FeatureDtype::Int32 => decode_le!(Int32, i32),
            FeatureDtype::Int64 => decode_le!(Int64, i64),
            FeatureDtype::UInt8 => decode_le!(UInt8, u8),
            FeatureDtype::UInt16 => decode_le!(UInt16, u16),
            FeatureDtype::UInt32 => decode_le!(UInt32, u32),
            FeatureDtype::UInt64 => decode_le!(UInt64, u64),
            FeatureDtype::Float32 => decode_le!(Float32, f32),
            FeatureDtype::Float64 => decode_le!(Float64, f64),
        };
        Ok(value)
    }
}

impl FromStr for FeatureDtype {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self> {
        let dtype = match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => FeatureDtype::String,
            "int8" => FeatureDtype::Int8,
            "int16" => FeatureDtype::Int16,
            "int32" => FeatureDtype::Int32,
            "int64" => FeatureDtype::Int64,
            "uint8" => FeatureDtype::UInt8,
            "uint16" => FeatureDtype::UInt16,
            "uint32" => FeatureDtype::UInt32,
            "uint64" => FeatureDtype::UInt64,
            "float32" => FeatureDtype::Float32,
            "float64" | "double" => FeatureDtype::Float64,
            other => {
                return Err(GraphError::config(format!(
                    "unknown feature dtype '{other}'"
                )))
            }
        };
        Ok(dtype)
    }
}

impl fmt::Display for FeatureDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded feature payload for one node.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    Text(String),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl FeatureValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FeatureValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            FeatureValue::Int64(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            FeatureValue::Float32(values) => Some(values),
            _ => None,
        }
    }
}

/// Declared decode schema of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    pub dtype: FeatureDtype,
    /// Opaque shape hint; decoding does not interpret it.
    pub shape: String,
}

/// Feature schemas keyed by node type, then feature name.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    specs: HashMap<String, HashMap<String, FeatureSpec>>,
}

impl FeatureTable {
    pub fn from_infos(infos: &[FeatureInfo]) -> Result<Self> {
        let mut specs: HashMap<String, HashMap<String, FeatureSpec>> = HashMap::new();
        for info in infos {
            let spec = FeatureSpec {
                dtype: info.dtype.parse()?,
                shape: info.shape.clone(),
            };
            specs
                .entry(info.node_type.clone())
                .or_default()
                .insert(info.name.clone(), spec);
        }
        Ok(Self { specs })
    }

    /// Look up a feature schema.
    ///
    /// # Errors
    ///
    /// Returns `UnknownFeature` if the pair was never declared.
    pub fn spec(&self, node_type: &str, feature: &str) -> Result<&FeatureSpec> {
        self.specs
            .get(node_type)
            .and_then(|features| features.get(feature))
            .ok_or_else(|| GraphError::unknown_feature(node_type, feature))
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Fetches node features from the engine and decodes them.
pub struct FeatureDecoder {
    engine: Arc<dyn RemoteGraphEngine>,
    table: FeatureTable,
}

impl FeatureDecoder {
    pub fn new(engine: Arc<dyn RemoteGraphEngine>, table: FeatureTable) -> Self {
        Self { engine, table }
    }

    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    /// Fetch a single feature: one decoded value per node, in node order.
    pub fn fetch_one(
        &self,
        nodes: &[NodeId],
        node_type: &str,
        feature: &str,
    ) -> Result<Vec<FeatureValue>> {
        let mut decoded = self.fetch_many(nodes, node_type, &[feature.to_string()])?;
        decoded
            .pop()
            .ok_or_else(|| GraphError::shape("engine returned no payload list"))
    }

    /// Fetch several features: one list per feature name, each aligned with
    /// `nodes`.
    ///
    /// Every name is checked against the schema before the engine is
    /// called.
    pub fn fetch_many(
        &self,
        nodes: &[NodeId],
        node_type: &str,
        features: &[String],
    ) -> Result<Vec<Vec<FeatureValue>>> {
        let specs = features
            .iter()
            .map(|name| self.table.spec(node_type, name))
            .collect::<Result<Vec<_>>>()?;
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        let payloads = self.engine.fetch_feature(node_type, nodes, features)?;
        if payloads.len() != features.len() {
            return Err(GraphError::shape(format!(
                "requested {} features but engine returned {} payload lists",
                features.len(),
                payloads.len()
            )));
        }

        specs
            .iter()
            .zip(features)
            .zip(payloads)
            .map(|((spec, name), feature_payloads)| {
                if feature_payloads.len() != nodes.len() {
                    return Err(GraphError::shape(format!(
                        "feature '{}' returned {} payloads for {} nodes",
                        name,
                        feature_payloads.len(),
                        nodes.len()
                    )));
                }
                feature_payloads
                    .iter()
                    .map(|payload| spec.dtype.decode(payload))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }
}
