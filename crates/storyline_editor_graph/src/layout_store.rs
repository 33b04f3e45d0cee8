// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sidecar persistence of graph layouts.
//!
//! Layouts live next to the project rather than inside the resource file, so
//! opening someone else's project never dirties its documents. One JSON file
//! per edited graph, keyed by the resource's project-relative path, under the
//! project's `GraphEditorStates` directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory under the project root holding the layout sidecar files
pub const LAYOUT_DIR: &str = "GraphEditorStates";

/// Error raised by layout persistence
#[derive(Debug, thiserror::Error)]
pub enum LayoutStoreError {
    /// Filesystem failure
    #[error("layout i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The layout file is not valid JSON of the expected shape
    #[error("layout file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Saved layout of one graph: viewport transform plus node positions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphLayout {
    /// Viewport pan, horizontal
    #[serde(rename = "EditorX")]
    pub editor_x: f64,
    /// Viewport pan, vertical
    #[serde(rename = "EditorY")]
    pub editor_y: f64,
    /// Viewport zoom
    #[serde(rename = "EditorZ")]
    pub editor_z: f64,
    /// Per-node positions
    #[serde(rename = "Nodes", default)]
    pub nodes: Vec<NodeLayout>,
}

/// Saved position of one node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeLayout {
    /// View node id
    #[serde(rename = "NodeID")]
    pub node_id: u32,
    /// Top-left x
    #[serde(rename = "X")]
    pub x: f64,
    /// Top-left y
    #[serde(rename = "Y")]
    pub y: f64,
}

/// Handle on one graph's layout sidecar file
#[derive(Debug, Clone)]
pub struct LayoutStore {
    path: PathBuf,
}

impl LayoutStore {
    /// Store for the resource at `relative_path` within the project rooted at
    /// `project_root`. The sidecar mirrors the resource's relative path with
    /// a `.json` suffix appended.
    pub fn for_resource(project_root: &Path, relative_path: &Path) -> Self {
        let mut path = project_root.join(LAYOUT_DIR).join(relative_path);
        let file_name = path
            .file_name()
            .map(|name| {
                let mut name = name.to_os_string();
                name.push(".json");
                name
            })
            .unwrap_or_else(|| "layout.json".into());
        path.set_file_name(file_name);
        Self { path }
    }

    /// Store backed by an explicit file path
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the sidecar file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved layout, or `None` when no sidecar exists yet
    pub fn load(&self) -> Result<Option<GraphLayout>, LayoutStoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write the layout atomically: serialize into a temporary file in the
    /// same directory, then rename it over the sidecar, so a crash mid-write
    /// cannot leave a truncated file behind.
    pub fn save(&self, layout: &GraphLayout) -> Result<(), LayoutStoreError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut temp, layout)?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
