use std::path::PathBuf;

use clap::Parser;

/// 显示一个 glTF 场景
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "vela-viewer", version, about)]
pub struct ViewerArgs {
    /// .gltf 或 .glb 文件
    pub gltf: PathBuf,

    /// TOML 配置文件，不存在时使用默认配置
    #[arg(short, long, default_value = "vela.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = ViewerArgs::try_parse_from(["vela-viewer", "assets/Box.gltf"]).unwrap();
        assert_eq!(args.gltf, PathBuf::from("assets/Box.gltf"));
        assert_eq!(args.config, PathBuf::from("vela.toml"));

        let args = ViewerArgs::try_parse_from(["vela-viewer", "scene.glb", "--config", "my.toml"]).unwrap();
        assert_eq!(args.config, PathBuf::from("my.toml"));
    }

    #[test]
    fn test_gltf_is_required() {
        assert!(ViewerArgs::try_parse_from(["vela-viewer"]).is_err());
    }
}
