use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use image::Rgba;
use log::{debug, info};
use serde::Deserialize;

use crate::canvas::parse_hex_color;
use crate::scene::{Scene, default_scenes};
use crate::scheduler::IdleStrategy;
use crate::sequence::FrameSequence;

// ---------------------------------------------------------------------------
// ConfigFile: deserialized from TOML (all fields optional)
// ---------------------------------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub frames: FramesConfigFile,
    pub animation: AnimationConfigFile,
    pub cache: CacheConfigFile,
    pub render: RenderConfigFile,
    pub viewer: ViewerConfigFile,
    pub scenes: Option<Vec<Scene>>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct FramesConfigFile {
    pub path: Option<String>,
    pub prefix: Option<String>,
    pub extension: Option<String>,
    pub pad: Option<usize>,
    pub total: Option<u32>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct AnimationConfigFile {
    pub damping: Option<f64>,
    pub epsilon: Option<f64>,
    pub fps: Option<u32>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct CacheConfigFile {
    pub batch_size: Option<u32>,
    pub max_size: Option<usize>,
    pub initial_batch: Option<u32>,
    pub retries: Option<u32>,
    pub loader_threads: Option<usize>,
    pub idle_strategy: Option<IdleStrategy>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RenderConfigFile {
    pub background: Option<String>,
    pub device_pixel_ratio: Option<f64>,
    pub bias: Option<f64>,
    pub bias_min_width: Option<f64>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ViewerConfigFile {
    pub scroll_step: Option<u32>,
    pub region_screens: Option<f64>,
    pub overlay_rows: Option<u16>,
}

// ---------------------------------------------------------------------------
// Config: resolved (all fields concrete)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub frames: FrameSequence,
    pub animation: AnimationConfig,
    pub cache: CacheConfig,
    pub render: RenderConfig,
    pub viewer: ViewerConfig,
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone)]
pub struct AnimationConfig {
    pub damping: f64,
    pub epsilon: f64,
    pub frame_budget: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub batch_size: u32,
    pub max_size: usize,
    pub initial_batch: u32,
    pub retries: u32,
    pub loader_threads: usize,
    pub idle_strategy: IdleStrategy,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub background: Rgba<u8>,
    pub device_pixel_ratio: f64,
    pub bias: f64,
    pub bias_min_width: f64,
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Scroll step in terminal cells.
    pub scroll_step: u32,
    /// Height of the tracked region in viewport heights.
    pub region_screens: f64,
    /// Text rows reserved below the canvas for scene overlay text.
    pub overlay_rows: u16,
}

/// CLI values that take precedence over the config file.
#[derive(Default, Clone)]
pub struct CliOverrides {
    pub frames: Option<String>,
    pub prefix: Option<String>,
    pub extension: Option<String>,
    pub pad: Option<usize>,
    pub total: Option<u32>,
    pub damping: Option<f64>,
}

impl ConfigFile {
    /// Merge CLI values (overwrites non-None fields).
    pub fn merge_cli(&mut self, cli: &CliOverrides) {
        if let Some(ref v) = cli.frames {
            debug!("config: CLI override frames.path={v}");
            self.frames.path = Some(v.clone());
        }
        if let Some(ref v) = cli.prefix {
            debug!("config: CLI override frames.prefix={v}");
            self.frames.prefix = Some(v.clone());
        }
        if let Some(ref v) = cli.extension {
            debug!("config: CLI override frames.extension={v}");
            self.frames.extension = Some(v.clone());
        }
        if let Some(v) = cli.pad {
            debug!("config: CLI override frames.pad={v}");
            self.frames.pad = Some(v);
        }
        if let Some(v) = cli.total {
            debug!("config: CLI override frames.total={v}");
            self.frames.total = Some(v);
        }
        if let Some(v) = cli.damping {
            debug!("config: CLI override animation.damping={v}");
            self.animation.damping = Some(v);
        }
    }

    /// Resolve to a Config by applying defaults to missing fields.
    pub fn resolve(self) -> Result<Config> {
        let background = self.render.background.unwrap_or_else(|| "#33434c".into());
        let Some(background_rgba) = parse_hex_color(&background) else {
            bail!("render.background: expected #rrggbb, got '{background}'");
        };

        let config = Config {
            frames: FrameSequence {
                path: self.frames.path.unwrap_or_else(|| "images/".into()),
                prefix: self.frames.prefix.unwrap_or_else(|| "ffout".into()),
                extension: self.frames.extension.unwrap_or_else(|| ".gif".into()),
                pad: self.frames.pad.unwrap_or(3),
                total: self.frames.total.unwrap_or(192),
            },
            animation: AnimationConfig {
                damping: self.animation.damping.unwrap_or(0.1),
                epsilon: self.animation.epsilon.unwrap_or(0.05),
                frame_budget: Duration::from_secs_f64(
                    1.0 / self.animation.fps.unwrap_or(60).max(1) as f64,
                ),
            },
            cache: CacheConfig {
                batch_size: self.cache.batch_size.unwrap_or(10),
                max_size: self.cache.max_size.unwrap_or(60),
                initial_batch: self.cache.initial_batch.unwrap_or(15),
                retries: self.cache.retries.unwrap_or(2),
                loader_threads: self.cache.loader_threads.unwrap_or(4),
                idle_strategy: self.cache.idle_strategy.unwrap_or_default(),
            },
            render: RenderConfig {
                background: background_rgba,
                device_pixel_ratio: self.render.device_pixel_ratio.unwrap_or(1.0),
                bias: self.render.bias.unwrap_or(0.0),
                bias_min_width: self.render.bias_min_width.unwrap_or(1024.0),
            },
            viewer: ViewerConfig {
                scroll_step: self.viewer.scroll_step.unwrap_or(3),
                region_screens: self.viewer.region_screens.unwrap_or(5.0),
                overlay_rows: self.viewer.overlay_rows.unwrap_or(4),
            },
            scenes: self.scenes.unwrap_or_else(default_scenes),
        };
        config.validate()?;
        info!(
            "config: resolved frames={}{}{{n:0{}}}{} x{}, damping={}, epsilon={}, \
             frame_budget={}ms, batch_size={}, max_cache={}, initial_batch={}, \
             retries={}, loader_threads={}, idle={:?}, dpr={}, scenes={}",
            config.frames.path,
            config.frames.prefix,
            config.frames.pad,
            config.frames.extension,
            config.frames.total,
            config.animation.damping,
            config.animation.epsilon,
            config.animation.frame_budget.as_millis(),
            config.cache.batch_size,
            config.cache.max_size,
            config.cache.initial_batch,
            config.cache.retries,
            config.cache.loader_threads,
            config.cache.idle_strategy,
            config.render.device_pixel_ratio,
            config.scenes.len(),
        );
        Ok(config)
    }
}

impl Config {
    fn validate(&self) -> Result<()> {
        let damping = self.animation.damping;
        if damping.is_nan() || damping <= 0.0 || damping >= 1.0 {
            bail!("animation.damping must be in (0, 1), got {damping}");
        }
        if self.animation.epsilon.is_nan() || self.animation.epsilon <= 0.0 {
            bail!("animation.epsilon must be positive, got {}", self.animation.epsilon);
        }
        if self.frames.total == 0 {
            bail!("frames.total must be at least 1");
        }
        if self.render.device_pixel_ratio.is_nan() || self.render.device_pixel_ratio <= 0.0 {
            bail!(
                "render.device_pixel_ratio must be positive, got {}",
                self.render.device_pixel_ratio
            );
        }
        if self.viewer.region_screens.is_nan() || self.viewer.region_screens < 1.0 {
            bail!(
                "viewer.region_screens must be at least 1, got {}",
                self.viewer.region_screens
            );
        }
        for s in &self.scenes {
            if s.start > s.end {
                bail!("scene {}: start {} is after end {}", s.id, s.start, s.end);
            }
        }
        Ok(())
    }
}

/// Resolve the XDG config path for framescroll.
fn config_path() -> Option<PathBuf> {
    let config_dir = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(config_dir.join("framescroll").join("config.toml"))
}

/// Load the config file at `explicit`, or the XDG default.
///
/// A missing default file yields `ConfigFile::default()`; a missing explicit
/// file, or any file that cannot be parsed, is an error.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) => p,
            None => {
                info!("config: no HOME or XDG_CONFIG_HOME set, using defaults");
                return Ok(ConfigFile::default());
            }
        },
    };
    debug!("config: looking for {}", path.display());
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("config: loaded from {}", path.display());
            let cfg: ConfigFile = toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && explicit.is_none() => {
            info!("config: {} not found, using defaults", path.display());
            Ok(ConfigFile::default())
        }
        Err(e) => Err(anyhow::anyhow!("failed to read {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml() {
        let cfg: ConfigFile = toml::from_str("").unwrap();
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.frames.path, "images/");
        assert_eq!(resolved.frames.prefix, "ffout");
        assert_eq!(resolved.frames.extension, ".gif");
        assert_eq!(resolved.frames.pad, 3);
        assert_eq!(resolved.frames.total, 192);
        assert_eq!(resolved.animation.damping, 0.1);
        assert_eq!(resolved.cache.batch_size, 10);
        assert_eq!(resolved.cache.max_size, 60);
        assert_eq!(resolved.cache.initial_batch, 15);
        assert_eq!(resolved.cache.retries, 2);
        assert_eq!(resolved.cache.idle_strategy, IdleStrategy::Idle);
        assert_eq!(resolved.render.background, Rgba([0x33, 0x43, 0x4c, 255]));
        assert_eq!(resolved.scenes.len(), 7);
    }

    #[test]
    fn partial_toml() {
        let text = r#"
            [frames]
            path = "https://cdn.example.com/hero/"
            total = 240
            [cache]
            idle_strategy = "deferred"
            [animation]
            fps = 30
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.frames.path, "https://cdn.example.com/hero/");
        assert_eq!(resolved.frames.total, 240);
        assert_eq!(resolved.cache.idle_strategy, IdleStrategy::Deferred);
        assert_eq!(resolved.animation.frame_budget.as_millis(), 33);
        // Defaults for unspecified fields
        assert_eq!(resolved.frames.prefix, "ffout");
        assert_eq!(resolved.cache.max_size, 60);
    }

    #[test]
    fn scenes_from_toml() {
        let text = r#"
            [[scenes]]
            id = 1
            start = 1
            end = 40
            title = "Intro"
            subtitle = "Hello"
            description = "First"

            [[scenes]]
            id = 2
            start = 41
            end = 80
            title = "Outro"
            subtitle = "Bye"
            description = "Last"
            cta = "Read more"
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.scenes.len(), 2);
        assert!(!resolved.scenes[0].has_cta());
        assert!(resolved.scenes[1].has_cta());
    }

    #[test]
    fn invalid_toml() {
        let text = "this is not valid toml [[[";
        let result = toml::from_str::<ConfigFile>(text);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_idle_strategy_is_rejected() {
        let text = "[cache]\nidle_strategy = \"sometimes\"";
        assert!(toml::from_str::<ConfigFile>(text).is_err());
    }

    #[test]
    fn damping_out_of_range_is_rejected() {
        for text in ["[animation]\ndamping = 0.0", "[animation]\ndamping = 1.0"] {
            let cfg: ConfigFile = toml::from_str(text).unwrap();
            assert!(cfg.resolve().is_err(), "{text}");
        }
    }

    #[test]
    fn bad_background_is_rejected() {
        let cfg: ConfigFile = toml::from_str("[render]\nbackground = \"blue\"").unwrap();
        let err = cfg.resolve().unwrap_err();
        assert!(err.to_string().contains("render.background"));
    }

    #[test]
    fn inverted_scene_range_is_rejected() {
        let text = r#"
            [[scenes]]
            id = 1
            start = 10
            end = 5
            title = "t"
            subtitle = "s"
            description = "d"
        "#;
        let cfg: ConfigFile = toml::from_str(text).unwrap();
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn cli_overrides() {
        let mut cfg: ConfigFile = toml::from_str("[frames]\npad = 4\nprefix = \"shot\"").unwrap();
        cfg.merge_cli(&CliOverrides {
            pad: Some(5),
            damping: Some(0.2),
            ..Default::default()
        });
        let resolved = cfg.resolve().unwrap();
        assert_eq!(resolved.frames.pad, 5); // CLI wins
        assert_eq!(resolved.frames.prefix, "shot"); // config file
        assert_eq!(resolved.animation.damping, 0.2);
        assert_eq!(resolved.frames.total, 192); // default (neither config nor CLI)
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("framescroll-definitely-missing.toml");
        assert!(load_config(Some(&path)).is_err());
    }
}
