use std::path::{Path, PathBuf};

use anyhow::Context;
use ash::vk;
use serde::{Deserialize, Serialize};
use vela_crate_tools::resource::VelaPath;

/// 渲染器默认配置
pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        // shader 输出会被自动改变： liner -> sRGB
        format: vk::Format::R8G8B8A8_SRGB,
        // 通知 OS，将数值按照 sRGB 空间进行处理和显示
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;
    pub const DEFAULT_DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
    pub const DEFAULT_CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.12, 1.0];
    pub const DEFAULT_AMBIENT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];
    pub const DEFAULT_AMBIENT_INTENSITY: f32 = 0.1;

    pub const DEFAULT_WINDOW_TITLE: &'static str = "Vela Viewer";
    pub const DEFAULT_WINDOW_WIDTH: u32 = 1280;
    pub const DEFAULT_WINDOW_HEIGHT: u32 = 720;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// 垂直同步，一定支持
    Fifo,
    #[default]
    Mailbox,
}

impl PresentModePreference {
    #[inline]
    pub fn vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::Mailbox => DefaultRendererSettings::DEFAULT_PRESENT_MODE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthFormat {
    #[default]
    D32Sfloat,
    D24UnormS8Uint,
    D16Unorm,
}

impl DepthFormat {
    #[inline]
    pub fn vk(self) -> vk::Format {
        match self {
            Self::D32Sfloat => DefaultRendererSettings::DEFAULT_DEPTH_FORMAT,
            Self::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
            Self::D16Unorm => vk::Format::D16_UNORM,
        }
    }
}

/// 渲染器的运行时配置，缺省的字段使用 [`DefaultRendererSettings`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub clear_color: [f32; 4],
    pub ambient_color: [f32; 3],
    pub ambient_intensity: f32,
    pub present_mode: PresentModePreference,
    pub depth_format: DepthFormat,
    /// SPIR-V 所在目录，None 时使用 `engine/shader/.build`
    pub shader_dir: Option<PathBuf>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_color: DefaultRendererSettings::DEFAULT_CLEAR_COLOR,
            ambient_color: DefaultRendererSettings::DEFAULT_AMBIENT_COLOR,
            ambient_intensity: DefaultRendererSettings::DEFAULT_AMBIENT_INTENSITY,
            present_mode: PresentModePreference::default(),
            depth_format: DepthFormat::default(),
            shader_dir: None,
        }
    }
}

impl RendererSettings {
    #[inline]
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        DefaultRendererSettings::DEFAULT_SURFACE_FORMAT
    }

    pub fn shader_dir(&self) -> PathBuf {
        self.shader_dir.clone().unwrap_or_else(VelaPath::shader_build_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: DefaultRendererSettings::DEFAULT_WINDOW_TITLE.to_string(),
            width: DefaultRendererSettings::DEFAULT_WINDOW_WIDTH,
            height: DefaultRendererSettings::DEFAULT_WINDOW_HEIGHT,
        }
    }
}

/// viewer 的配置文件
///
/// ```toml
/// [window]
/// title = "Vela Viewer"
/// width = 1280
/// height = 720
///
/// [renderer]
/// clear_color = [0.1, 0.1, 0.12, 1.0]
/// present_mode = "fifo"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowSettings,
    pub renderer: RendererSettings,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid config")
    }

    /// 文件不存在时使用默认配置
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("config {} not found, use default settings", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&text).with_context(|| format!("failed to parse {}", path.display()))?;
        log::info!("config loaded from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.renderer.present_mode.vk(), vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.renderer.depth_format.vk(), vk::Format::D32_SFLOAT);
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::from_toml_str(
            r#"
            [window]
            width = 640

            [renderer]
            clear_color = [1.0, 0.0, 0.0, 1.0]
            present_mode = "fifo"
            depth_format = "d16_unorm"
            shader_dir = "/tmp/shaders"
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.height, DefaultRendererSettings::DEFAULT_WINDOW_HEIGHT);
        assert_eq!(config.window.title, DefaultRendererSettings::DEFAULT_WINDOW_TITLE);
        assert_eq!(config.renderer.clear_color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.renderer.present_mode.vk(), vk::PresentModeKHR::FIFO);
        assert_eq!(config.renderer.depth_format.vk(), vk::Format::D16_UNORM);
        assert_eq!(config.renderer.shader_dir(), PathBuf::from("/tmp/shaders"));
        assert_eq!(config.renderer.ambient_intensity, DefaultRendererSettings::DEFAULT_AMBIENT_INTENSITY);
    }

    #[test]
    fn test_unknown_present_mode_is_rejected() {
        assert!(AppConfig::from_toml_str("[renderer]\npresent_mode = \"vsync\"").is_err());
    }

    #[test]
    fn test_missing_file_gives_default() {
        let config = AppConfig::load(Path::new("/definitely/not/here/vela.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.renderer.shader_dir().ends_with("engine/shader/.build"));
    }
}
