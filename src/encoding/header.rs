// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Fixed-width header parts.
//!
//! The standard header is 48 bits:
//!
//! | part                 | bits | default              |
//! |----------------------|------|----------------------|
//! | `_ccl_id`            | 8    | 0x20                 |
//! | `_id`                | 9    | message id           |
//! | `_time`              | 17   | seconds of day (now) |
//! | `_src_id`            | 5    | local modem id       |
//! | `_dest_id`           | 5    | 0 (broadcast)        |
//! | `_multimessage_flag` | 1    | false                |
//! | `_broadcast_flag`    | 1    | false                |
//! | `_unused`            | 2    | 0                    |

use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::bitset::Bitset;
use super::EncodeContext;
use crate::core::{DcclError, FieldKind, Result, Value};

/// CCL protocol identifier carried in the first header byte.
pub const DCCL_CCL_HEADER: u64 = 32;

/// Seconds in a day.
pub const SECONDS_IN_DAY: i64 = 86_400;

/// One part of the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPart {
    CclId,
    Id,
    Time,
    SrcId,
    DestId,
    MultimessageFlag,
    BroadcastFlag,
    Unused,
}

impl HeaderPart {
    /// All parts in wire order.
    pub const ALL: [HeaderPart; 8] = [
        HeaderPart::CclId,
        HeaderPart::Id,
        HeaderPart::Time,
        HeaderPart::SrcId,
        HeaderPart::DestId,
        HeaderPart::MultimessageFlag,
        HeaderPart::BroadcastFlag,
        HeaderPart::Unused,
    ];

    /// Field name of this part.
    pub fn name(&self) -> &'static str {
        match self {
            HeaderPart::CclId => "_ccl_id",
            HeaderPart::Id => "_id",
            HeaderPart::Time => "_time",
            HeaderPart::SrcId => "_src_id",
            HeaderPart::DestId => "_dest_id",
            HeaderPart::MultimessageFlag => "_multimessage_flag",
            HeaderPart::BroadcastFlag => "_broadcast_flag",
            HeaderPart::Unused => "_unused",
        }
    }

    /// Look up a part by field name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Wire width in bits.
    pub fn bit_width(&self) -> usize {
        match self {
            HeaderPart::CclId => 8,
            HeaderPart::Id => 9,
            HeaderPart::Time => 17,
            HeaderPart::SrcId | HeaderPart::DestId => 5,
            HeaderPart::MultimessageFlag | HeaderPart::BroadcastFlag => 1,
            HeaderPart::Unused => 2,
        }
    }

    /// Field kind reported for this part.
    pub fn kind(&self) -> FieldKind {
        match self {
            HeaderPart::MultimessageFlag | HeaderPart::BroadcastFlag => FieldKind::Bool,
            _ => FieldKind::Int,
        }
    }

    /// Value used when the caller supplies none.
    pub fn default_value(&self, message_id: u32, ctx: &EncodeContext) -> Value {
        match self {
            HeaderPart::CclId => Value::Long(DCCL_CCL_HEADER as i64),
            HeaderPart::Id => Value::Long(i64::from(message_id)),
            HeaderPart::Time => Value::Long(i64::from(ctx.now.num_seconds_from_midnight())),
            HeaderPart::SrcId => Value::Long(i64::from(ctx.modem_id)),
            HeaderPart::DestId | HeaderPart::Unused => Value::Long(0),
            HeaderPart::MultimessageFlag | HeaderPart::BroadcastFlag => Value::Bool(false),
        }
    }

    /// Encode a value, masking it to the part's width.
    ///
    /// `_time` accepts either seconds of day or seconds since the epoch.
    pub fn encode(&self, field: &str, value: &Value) -> Result<Bitset> {
        let width = self.bit_width();
        let raw = match self {
            HeaderPart::MultimessageFlag | HeaderPart::BroadcastFlag => {
                u64::from(value.as_bool().unwrap_or(false))
            }
            HeaderPart::Time => match value.as_f64() {
                Some(t) if t.is_finite() => (t.floor() as i64).rem_euclid(SECONDS_IN_DAY) as u64,
                None if value.is_empty() => 0,
                _ => {
                    return Err(DcclError::type_mismatch(
                        field,
                        "time in seconds",
                        value.kind().as_str(),
                    ))
                }
            },
            _ => value.as_i64().unwrap_or(0) as u64,
        };
        Ok(Bitset::from_u64(raw, width))
    }

    /// Decode a part. `_time` decodes to seconds of day; see [`expand_time`].
    pub fn decode(&self, bits: &Bitset) -> Value {
        let raw = bits.to_u64();
        match self {
            HeaderPart::MultimessageFlag | HeaderPart::BroadcastFlag => Value::Bool(raw != 0),
            _ => Value::Long(raw as i64),
        }
    }
}

/// Rebuild a full timestamp (seconds since the epoch) from seconds of day.
///
/// The date is not transmitted; the receive date is assumed, or the day
/// before when the time of day lies more than 12 hours after `now`.
pub fn expand_time(seconds_of_day: i64, now: DateTime<Utc>) -> i64 {
    let midnight = Utc
        .from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
        .timestamp();
    let now_of_day = i64::from(now.num_seconds_from_midnight());
    let day_start = if seconds_of_day - now_of_day > SECONDS_IN_DAY / 2 {
        midnight - SECONDS_IN_DAY
    } else {
        midnight
    };
    day_start + seconds_of_day
}
