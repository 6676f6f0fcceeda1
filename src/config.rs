//! Configuration records
//!
//! `GlConfig` describes the requested framebuffer and context, `CanvasConfig`
//! is the canvas construction record, and `AppConfig` is the TOML file read
//! by the demo binary.

use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::canvas::CanvasId;
use crate::context::GlContext;
use crate::error::Result;

/// Requested GL framebuffer and context attributes
///
/// Sizes are in bits; 0 means "don't care". Fields a backend does not
/// understand are reset to their defaults before context creation without
/// touching any other field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GlConfig {
    pub double_buffer: bool,
    pub stereo: bool,
    pub depth_size: u8,
    pub stencil_size: u8,
    pub samples: u8,
    pub red_size: u8,
    pub green_size: u8,
    pub blue_size: u8,
    pub alpha_size: u8,
    pub accum_red_size: u8,
    pub accum_green_size: u8,
    pub accum_blue_size: u8,
    pub accum_alpha_size: u8,
    pub aux_buffers: u8,
    pub major_version: u8,
    pub minor_version: u8,
    pub vsync: bool,
}

impl Default for GlConfig {
    fn default() -> Self {
        Self {
            double_buffer: true,
            stereo: false,
            depth_size: 24,
            stencil_size: 0,
            samples: 0,
            red_size: 8,
            green_size: 8,
            blue_size: 8,
            alpha_size: 8,
            accum_red_size: 0,
            accum_green_size: 0,
            accum_blue_size: 0,
            accum_alpha_size: 0,
            aux_buffers: 0,
            major_version: 2,
            minor_version: 0,
            vsync: false,
        }
    }
}

/// Individual `GlConfig` fields, used to declare capability gaps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlField {
    DoubleBuffer,
    Stereo,
    DepthSize,
    StencilSize,
    Samples,
    ColorSizes,
    AccumSizes,
    AuxBuffers,
    Version,
    Vsync,
}

impl GlConfig {
    /// Reset one field to its default
    pub fn reset(&mut self, field: GlField) {
        let d = GlConfig::default();
        match field {
            GlField::DoubleBuffer => self.double_buffer = d.double_buffer,
            GlField::Stereo => self.stereo = d.stereo,
            GlField::DepthSize => self.depth_size = d.depth_size,
            GlField::StencilSize => self.stencil_size = d.stencil_size,
            GlField::Samples => self.samples = d.samples,
            GlField::ColorSizes => {
                self.red_size = d.red_size;
                self.green_size = d.green_size;
                self.blue_size = d.blue_size;
                self.alpha_size = d.alpha_size;
            }
            GlField::AccumSizes => {
                self.accum_red_size = d.accum_red_size;
                self.accum_green_size = d.accum_green_size;
                self.accum_blue_size = d.accum_blue_size;
                self.accum_alpha_size = d.accum_alpha_size;
            }
            GlField::AuxBuffers => self.aux_buffers = d.aux_buffers,
            GlField::Version => {
                self.major_version = d.major_version;
                self.minor_version = d.minor_version;
            }
            GlField::Vsync => self.vsync = d.vsync,
        }
    }

    /// Copy with the given fields reset, logging each one that changed
    pub fn sanitized(&self, ignored: &[GlField]) -> GlConfig {
        let mut out = self.clone();
        for &field in ignored {
            let before = out.clone();
            out.reset(field);
            if out != before {
                debug!("GL config field {:?} not supported here, ignoring", field);
            }
        }
        out
    }

    /// Requested context version as (major, minor)
    pub fn version(&self) -> (u8, u8) {
        (self.major_version, self.minor_version)
    }
}

/// Fullscreen request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "FullscreenRepr")]
pub enum Fullscreen {
    #[default]
    Off,
    /// Fullscreen on the primary monitor
    Primary,
    /// Fullscreen on the monitor with this index
    Monitor(usize),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FullscreenRepr {
    Flag(bool),
    Index(usize),
}

impl From<FullscreenRepr> for Fullscreen {
    fn from(repr: FullscreenRepr) -> Self {
        match repr {
            FullscreenRepr::Flag(on) => on.into(),
            FullscreenRepr::Index(i) => Fullscreen::Monitor(i),
        }
    }
}

impl From<bool> for Fullscreen {
    fn from(on: bool) -> Self {
        if on {
            Fullscreen::Primary
        } else {
            Fullscreen::Off
        }
    }
}

impl Fullscreen {
    pub fn is_on(&self) -> bool {
        !matches!(self, Fullscreen::Off)
    }

    /// Monitor index to use, `None` when off
    pub fn monitor_index(&self) -> Option<usize> {
        match self {
            Fullscreen::Off => None,
            Fullscreen::Primary => Some(0),
            Fullscreen::Monitor(i) => Some(*i),
        }
    }
}

/// Canvas construction record
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub title: String,
    /// Client size in pixels
    pub size: (u32, u32),
    /// Client origin in screen coordinates; platform default when `None`
    pub position: Option<(i32, i32)>,
    pub show: bool,
    /// Sync buffer swaps to the display refresh
    pub vsync: bool,
    pub resizable: bool,
    pub decorated: bool,
    pub fullscreen: Fullscreen,
    /// Canvas to embed into
    pub parent: Option<CanvasId>,
    /// GL configuration and context ownership token; canvases built from
    /// clones of the same token share GL objects
    #[serde(rename = "gl")]
    pub context: GlContext,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            title: "glcanvas".to_string(),
            size: (800, 600),
            position: None,
            show: true,
            vsync: false,
            resizable: true,
            decorated: true,
            fullscreen: Fullscreen::Off,
            parent: None,
            context: GlContext::default(),
        }
    }
}

impl CanvasConfig {
    /// Swap interval requested by either the canvas or its GL config
    pub fn wants_vsync(&self) -> bool {
        self.vsync || self.context.config().vsync
    }
}

/// Event-loop tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on how long `run()` idles between sweeps
    pub idle_wait_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { idle_wait_ms: 1 }
    }
}

impl LoopConfig {
    pub fn idle_wait(&self) -> Duration {
        Duration::from_millis(self.idle_wait_ms)
    }
}

/// Demo binary settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Repaint timer interval
    pub interval_ms: u64,
    /// Close the canvas after this many frames
    pub max_frames: Option<u64>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            interval_ms: 16,
            max_frames: None,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend identifier passed to `backend::open`
    pub backend: String,
    /// Log filter, overridden by `RUST_LOG`
    pub log: Option<String>,
    pub canvas: CanvasConfig,
    #[serde(rename = "loop")]
    pub event_loop: LoopConfig,
    pub demo: DemoConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: crate::backend::default_name().to_string(),
            log: None,
            canvas: CanvasConfig::default(),
            event_loop: LoopConfig::default(),
            demo: DemoConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl_defaults() {
        let gl = GlConfig::default();
        assert!(gl.double_buffer);
        assert_eq!(gl.version(), (2, 0));
        assert_eq!(gl.samples, 0);
    }

    #[test]
    fn test_sanitize_only_touches_ignored_fields() {
        let gl = GlConfig {
            stereo: true,
            samples: 4,
            accum_red_size: 16,
            depth_size: 16,
            ..GlConfig::default()
        };
        let out = gl.sanitized(&[GlField::Stereo, GlField::AccumSizes]);
        assert!(!out.stereo);
        assert_eq!(out.accum_red_size, 0);
        assert_eq!(out.samples, 4);
        assert_eq!(out.depth_size, 16);
    }

    #[test]
    fn test_fullscreen_forms() {
        #[derive(Deserialize)]
        struct Wrap {
            fullscreen: Fullscreen,
        }
        let parse = |s: &str| toml::from_str::<Wrap>(s).unwrap().fullscreen;
        assert_eq!(parse("fullscreen = false"), Fullscreen::Off);
        assert_eq!(parse("fullscreen = true"), Fullscreen::Primary);
        assert_eq!(parse("fullscreen = 1"), Fullscreen::Monitor(1));
    }

    #[test]
    fn test_app_config_from_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            backend = "headless:gtk"

            [canvas]
            title = "scope"
            size = [1024, 768]
            resizable = false

            [canvas.gl]
            samples = 4
            vsync = true

            [loop]
            idle_wait_ms = 5

            [demo]
            max_frames = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.backend, "headless:gtk");
        assert_eq!(config.canvas.title, "scope");
        assert_eq!(config.canvas.size, (1024, 768));
        assert!(!config.canvas.resizable);
        assert!(config.canvas.decorated);
        assert_eq!(config.canvas.context.config().samples, 4);
        assert!(config.canvas.wants_vsync());
        assert_eq!(config.event_loop.idle_wait(), Duration::from_millis(5));
        assert_eq!(config.demo.max_frames, Some(10));
        assert_eq!(config.demo.interval_ms, 16);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
