// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram Bot API delivery for mediaferry.
//!
//! Implements [`RemoteClient`](mediaferry_core::RemoteClient) over raw
//! Bot API HTTP with least-used pools spreading load across multiple
//! base URLs and bot tokens.

pub mod client;
pub mod pool;
pub mod types;

pub use client::TelegramClient;
pub use pool::LeastUsedPool;
pub use types::{ApiResponse, ResponseParameters};
