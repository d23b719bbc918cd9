//! Command-line surface.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};
use lightprobe_core::calibration::CalibrationKey;
use lightprobe_core::request::{CubeFace, RenderFlags, RenderMode};
use lightprobe_gpu::ExportKind;

#[derive(Parser, Debug)]
#[command(author, version, about = "Stitch mirror-ball photographs into light probes")]
pub struct Cli {
    /// Sphere mesh rows (overrides LIGHTPROBE_MESH_ROWS).
    #[arg(long, global = true)]
    pub mesh_rows: Option<u32>,
    /// Sphere mesh columns (overrides LIGHTPROBE_MESH_COLUMNS).
    #[arg(long, global = true)]
    pub mesh_columns: Option<u32>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a project file from a set of photographs.
    Init {
        /// Project file to write.
        #[arg(short, long)]
        output: PathBuf,
        /// Source photographs, at most eight.
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
    /// Change the calibration or visibility of one project image.
    Calibrate {
        project: PathBuf,
        /// Slot of the image to adjust; becomes the selected image.
        #[arg(long)]
        slot: usize,
        /// Calibration assignment such as `sphere_azimuth=90`. Repeatable.
        #[arg(long = "set", value_name = "KEY=VALUE")]
        assignments: Vec<Assignment>,
        /// Exclude the image from blend-all composites.
        #[arg(long, conflicts_with = "show")]
        hide: bool,
        /// Include the image in blend-all composites again.
        #[arg(long)]
        show: bool,
    },
    /// Export a chart, polar or cube float TIFF.
    Export {
        #[command(flatten)]
        source: Source,
        #[arg(long, value_enum, default_value_t = Kind::Chart)]
        kind: Kind,
        /// Polar and cube face edge, chart height (overrides LIGHTPROBE_EXPORT_SIZE).
        #[arg(long)]
        size: Option<u32>,
        #[command(flatten)]
        flags: FlagArgs,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Render a single view, including the globe and image previews.
    Render {
        #[command(flatten)]
        source: Source,
        #[arg(long, value_enum, default_value_t = Mode::Globe)]
        mode: Mode,
        /// Cube face index (0..6, +X -X +Y -Y +Z -Z) for `--mode cube`.
        #[arg(long, default_value_t = 0)]
        face: usize,
        #[arg(long, default_value_t = 1024)]
        width: u32,
        #[arg(long, default_value_t = 1024)]
        height: u32,
        /// Yaw and pitch in degrees for the globe, plane offset otherwise.
        #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true)]
        pan: Option<Vec<f32>>,
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
        /// Exposure in stops; leaves values linear when absent.
        #[arg(long, allow_negative_numbers = true)]
        exposure: Option<f32>,
        #[command(flatten)]
        flags: FlagArgs,
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Where the images come from: a project file or a list of photographs
/// with default calibration.
#[derive(Args, Debug)]
pub struct Source {
    #[arg(long, conflicts_with = "images")]
    pub project: Option<PathBuf>,
    /// Select this slot instead of the project's selection.
    #[arg(long)]
    pub select: Option<usize>,
    pub images: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, Copy)]
pub struct FlagArgs {
    /// Draw the wireframe and grid overlay.
    #[arg(long)]
    pub grid: bool,
    /// Show blend weights as false color.
    #[arg(long)]
    pub quality: bool,
    /// Blend every visible image instead of only the selected one.
    #[arg(long)]
    pub blend_all: bool,
    /// Keep the alpha channel.
    #[arg(long)]
    pub alpha: bool,
}

impl FlagArgs {
    pub fn render_flags(self) -> RenderFlags {
        let mut flags = RenderFlags::NONE;
        flags.set(RenderFlags::GRID, self.grid);
        flags.set(RenderFlags::QUALITY, self.quality);
        flags.set(RenderFlags::BLEND_ALL, self.blend_all);
        flags.set(RenderFlags::ALPHA, self.alpha);
        flags
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Chart,
    Polar,
    Cube,
}

impl From<Kind> for ExportKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Chart => ExportKind::Chart,
            Kind::Polar => ExportKind::Polar,
            Kind::Cube => ExportKind::Cube,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Image,
    Globe,
    Chart,
    Polar,
    Cube,
}

impl Mode {
    /// The render mode, or `None` for an out-of-range cube face.
    pub fn render_mode(self, face: usize) -> Option<RenderMode> {
        Some(match self {
            Self::Image => RenderMode::Image,
            Self::Globe => RenderMode::Globe,
            Self::Chart => RenderMode::Chart,
            Self::Polar => RenderMode::Polar,
            Self::Cube => RenderMode::CubeFace(CubeFace::from_index(face)?),
        })
    }
}

/// `key=value` calibration assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assignment {
    pub key: CalibrationKey,
    pub value: f32,
}

impl FromStr for Assignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
        let key = key.trim();
        let key = CalibrationKey::all()
            .iter()
            .copied()
            .find(|k| k.label() == key)
            .ok_or_else(|| {
                let known: Vec<_> = CalibrationKey::all().iter().map(|k| k.label()).collect();
                format!("unknown calibration key `{key}` (expected one of {})", known.join(", "))
            })?;
        let value = value
            .trim()
            .parse()
            .map_err(|e| format!("invalid value for {}: {e}", key.label()))?;
        Ok(Self { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_assignment() {
        let a: Assignment = "sphere_azimuth=90".parse().unwrap();
        assert_eq!(a.key, CalibrationKey::SphereAzimuth);
        assert_eq!(a.value, 90.0);
        let b: Assignment = " circle_radius = 120.5 ".parse().unwrap();
        assert_eq!((b.key, b.value), (CalibrationKey::CircleRadius, 120.5));
        assert!("radius=1".parse::<Assignment>().is_err());
        assert!("circle_x".parse::<Assignment>().is_err());
        assert!("circle_x=wide".parse::<Assignment>().is_err());
    }

    #[test]
    fn test_export_arguments() {
        let cli = Cli::try_parse_from([
            "lightprobe",
            "export",
            "--project",
            "probe.json",
            "--kind",
            "cube",
            "--blend-all",
            "--alpha",
            "-o",
            "cube.tif",
        ])
        .unwrap();
        let Command::Export {
            source,
            kind,
            size,
            flags,
            output,
        } = cli.command
        else {
            panic!("expected export");
        };
        assert_eq!(source.project, Some(PathBuf::from("probe.json")));
        assert_eq!(kind, Kind::Cube);
        assert_eq!(size, None);
        assert_eq!(
            flags.render_flags(),
            RenderFlags::BLEND_ALL | RenderFlags::ALPHA
        );
        assert_eq!(output, PathBuf::from("cube.tif"));
    }

    #[test]
    fn test_render_cube_face_mode() {
        assert_eq!(
            Mode::Cube.render_mode(4),
            Some(RenderMode::CubeFace(CubeFace::PosZ))
        );
        assert_eq!(Mode::Cube.render_mode(6), None);
        assert_eq!(Mode::Image.render_mode(9), Some(RenderMode::Image));
    }

    #[test]
    fn test_render_accepts_negative_pan() {
        let cli = Cli::try_parse_from([
            "lightprobe",
            "render",
            "a.jpg",
            "--pan",
            "-30",
            "10",
            "--exposure",
            "-1.5",
            "-o",
            "view.tif",
        ])
        .unwrap();
        let Command::Render {
            pan, exposure, source, ..
        } = cli.command
        else {
            panic!("expected render");
        };
        assert_eq!(pan, Some(vec![-30.0, 10.0]));
        assert_eq!(exposure, Some(-1.5));
        assert_eq!(source.images, vec![PathBuf::from("a.jpg")]);
    }
}
