// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! CLI command implementations.

pub mod decode;
pub mod encode;
pub mod schema;

pub use decode::DecodeCmd;
pub use encode::EncodeCmd;
pub use schema::SchemaCmd;
