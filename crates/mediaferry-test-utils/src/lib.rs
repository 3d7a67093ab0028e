// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test doubles for the mediaferry workspace.

pub mod mock_remote;

pub use mock_remote::{MockRemote, RemoteCall};
