// SPDX-License-Identifier: MIT OR Apache-2.0
//! Narrative graph framework for Storyline Editor.
//!
//! This crate provides the editing engine behind the quest and scene graph
//! views:
//! - Quest phase graphs (symmetric connection records held by both sockets)
//! - Cinematic scene graphs (destination descriptors held by the source)
//!
//! ## Architecture
//!
//! Every graph keeps the persisted resource document and a transient view
//! graph of wrapped nodes in lock-step; mutations update both as one step.
//! Around that core sit:
//! - A node kind catalog, built once and injected per graph
//! - Name-keyed socket reconciliation after out-of-band property edits
//! - A layered auto-layout engine and the sidecar layout store
//! - Drill-down navigation through nested phase graphs

pub mod catalog;
pub mod connection;
pub mod graph;
pub mod graphs;
pub mod history;
pub mod layout;
pub mod layout_store;
pub mod node;
pub mod reconcile;
pub mod socket;

pub use catalog::{GraphKind, NodeCatalog, NodeKindSpec, NodePayload};
pub use connection::{Connection, ConnectionHandle};
pub use graph::{ConnectOutcome, Graph, GraphError, PendingTarget};
pub use history::{SubgraphNavigator, SubgraphOutcome};
pub use layout::{Rect, ViewportState};
pub use layout_store::{GraphLayout, LayoutStore, LayoutStoreError};
pub use node::{GraphNode, NodeId, Point, Size};
pub use socket::{Socket, SocketDirection, SocketRef};
