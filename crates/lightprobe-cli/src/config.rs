//! Runtime configuration for the command-line tool.

use lightprobe_core::mesh::MeshConfig;

/// Default edge length of polar and cube exports, and chart height.
const DEFAULT_EXPORT_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CliConfig {
    pub mesh: MeshConfig,
    pub export_size: u32,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }
}

impl CliConfig {
    /// Defaults, overridden by whatever `lookup` finds for the
    /// `LIGHTPROBE_*` variables. Unparsable values are ignored.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let number = |name: &str| lookup(name).and_then(|s| s.trim().parse::<u32>().ok());
        let mesh = MeshConfig::default();
        Self {
            mesh: MeshConfig {
                rows: number("LIGHTPROBE_MESH_ROWS").unwrap_or(mesh.rows),
                columns: number("LIGHTPROBE_MESH_COLUMNS").unwrap_or(mesh.columns),
            },
            export_size: number("LIGHTPROBE_EXPORT_SIZE").unwrap_or(DEFAULT_EXPORT_SIZE),
        }
    }

    /// Apply command-line overrides.
    pub fn with_overrides(
        mut self,
        rows: Option<u32>,
        columns: Option<u32>,
        export_size: Option<u32>,
    ) -> Self {
        if let Some(rows) = rows {
            self.mesh.rows = rows;
        }
        if let Some(columns) = columns {
            self.mesh.columns = columns;
        }
        if let Some(size) = export_size {
            self.export_size = size;
        }
        self
    }
}
