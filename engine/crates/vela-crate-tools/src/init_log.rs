use std::io::Write;

/// 初始化全局 logger
///
/// 默认等级为 `info`，可以通过 `RUST_LOG` 环境变量覆盖，例如 `RUST_LOG=vela_renderer=debug`。
/// 重复调用是安全的，只有第一次生效。
pub fn init_log() {
    let _ = builder().try_init();
}

/// 测试中使用：输出会被 test harness 捕获
pub fn init_test_log() {
    let _ = builder().is_test(true).filter(None, log::LevelFilter::Debug).try_init();
}

fn builder() -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let level_style = match record.level() {
                log::Level::Error => anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Red.into())).bold(),
                log::Level::Warn => anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Yellow.into())),
                log::Level::Info => anstyle::Style::new().fg_color(Some(anstyle::AnsiColor::Green.into())),
                log::Level::Debug | log::Level::Trace => buf.default_level_style(record.level()),
            };
            let grey_style =
                anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let line = record.line().unwrap_or(0);
            // windows 与 unix 的路径分隔符都需要处理
            let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} {}",
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .parse_default_env();
    builder
}
