use clap::Parser;
use vela_winit_app::app::WinitApp;
use vela_winit_app::cli::ViewerArgs;

fn main() -> anyhow::Result<()> {
    WinitApp::run(ViewerArgs::parse())
}
