// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persisted document models, one per graph kind.

pub mod quest;
pub mod scene;
