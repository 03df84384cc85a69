// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules for the memory tables.

pub mod archival;
pub mod blocks;
pub mod bot_memory;
