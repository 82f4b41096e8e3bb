/// YOLO Studio
///
/// 桌面目标检测工作台
///
/// 系统架构:
/// 1. 主线程:   界面与显示 (macroquad + egui)
/// 2. 检测线程: 视频/摄像头逐帧检测 (VideoWorker)
/// 3. 解码线程: FFmpeg 解码 (每次检测运行一个)
use clap::Parser;
use macroquad::prelude::*;

use yolo_studio::detection::install_font;
use yolo_studio::renderer::Renderer;
use yolo_studio::{AppConfig, Args, DetectionApp};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "YOLO Object Detection".to_owned(),
        window_width: 1200,
        window_height: 800,
        high_dpi: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path);
    config.apply_args(&args);

    install_font(config.font_path.as_deref());

    log::info!("🚀 YOLO Studio 启动 (配置: {})", config_path.display());

    let mut app = DetectionApp::new(config);
    app.set_config_path(config_path);

    // 命令行指定的模型直接加载
    if let Some(model) = args.model {
        app.browse_model(model);
        app.load_model();
    }

    let mut renderer = Renderer::new();
    prevent_quit();

    loop {
        if is_quit_requested() {
            app.shutdown();
            break;
        }

        app.poll_worker();
        renderer.update(&mut app);
        renderer.draw();
        renderer.draw_egui(&mut app);

        next_frame().await
    }
}
