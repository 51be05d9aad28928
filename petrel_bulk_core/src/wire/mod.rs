//! Framed bulk wire format.
//!
//! A bulk body is a stream of newline-delimited records alternating an
//! action header (a single-key JSON object naming the operation) and, for
//! every action except delete, a raw payload record:
//!
//! ```text
//! {"index":{"_index":"logs","_id":"1"}}
//! {"message":"hello"}
//! {"delete":{"_index":"logs","_id":"2"}}
//! ```

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

mod encode;
mod parse;

pub use encode::{encode_batch, encode_operation};
pub use parse::{FramedDefaults, FramedReader};

/// Record separator of the framed format.
pub const RECORD_SEPARATOR: u8 = b'\n';

/// Errors raised while parsing or encoding a framed bulk body.
///
/// Parse errors abort the remainder of the stream; operations parsed before
/// the error are not rolled back.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WireError {
    #[snafu(display("record {record} is not a valid action header: {source}"))]
    InvalidHeader {
        record: usize,
        source: serde_json::Error,
    },
    #[snafu(display("record {record} is missing its record separator"))]
    MissingDelimiter { record: usize },
    #[snafu(display("action at record {record} requires a payload record"))]
    MissingPayload { record: usize },
    #[snafu(display("action at record {record} names no collection and no default was given"))]
    MissingCollection { record: usize },
    #[snafu(display("failed to serialize action header"))]
    Encode { source: serde_json::Error },
}

/// Action header record: a single-key object naming the operation kind.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ActionHeader<'a> {
    Index(#[serde(borrow)] ActionMetadata<'a>),
    Create(#[serde(borrow)] ActionMetadata<'a>),
    Delete(#[serde(borrow)] ActionMetadata<'a>),
    Update(#[serde(borrow)] ActionMetadata<'a>),
}

/// Sub-fields of an action header.
///
/// Legacy fields of the convention (`_type`, `_parent`, `_timestamp`,
/// `_ttl`, `_version_type`) are accepted and ignored.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ActionMetadata<'a> {
    #[serde(rename = "_index", skip_serializing_if = "Option::is_none", borrow)]
    pub collection: Option<Cow<'a, str>>,
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none", borrow)]
    pub id: Option<Cow<'a, str>>,
    #[serde(
        rename = "_routing",
        alias = "routing",
        skip_serializing_if = "Option::is_none",
        borrow
    )]
    pub routing: Option<Cow<'a, str>>,
    #[serde(
        rename = "_version",
        alias = "version",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<u64>,
    #[serde(
        rename = "op_type",
        alias = "opType",
        skip_serializing_if = "Option::is_none",
        borrow
    )]
    pub op_type: Option<Cow<'a, str>>,
}
