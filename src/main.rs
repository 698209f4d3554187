use media_upload_rust::config::UploaderConfig;
use media_upload_rust::logging;
use media_upload_rust::{UploadEngine, UploadPhase, UploadRequest, UploadResult};
use std::sync::Arc;
use tracing::{error, info};

/// 配置文件路径
const CONFIG_PATH: &str = "config/uploader.toml";

fn print_usage() {
    eprintln!("用法: media-upload-rust <文件路径> [目标目录]");
    eprintln!();
    eprintln!("示例:");
    eprintln!("  media-upload-rust ./recording.m4a");
    eprintln!("  media-upload-rust ./clip.mp4 videos");
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(2);
    }
    let file_path = &args[1];
    let folder = args.get(2).map(|s| s.as_str()).unwrap_or("media");

    // 加载配置（文件缺失时使用默认值）
    let config = UploaderConfig::load_or_default(CONFIG_PATH).await;

    // 初始化日志（guard 持有到进程结束，保证文件日志落盘）
    let _log_guard = logging::init_logging(&config.log);

    info!("配置加载完成: backend={}", config.backend.base_url);

    let request = match UploadRequest::from_path(file_path, folder).await {
        Ok(request) => request,
        Err(e) => {
            error!("无法读取上传文件 {}: {}", file_path, e);
            std::process::exit(1);
        }
    };

    let engine = match UploadEngine::new(&config.backend) {
        Ok(engine) => engine,
        Err(e) => {
            error!("初始化上传引擎失败: {}", e);
            std::process::exit(1);
        }
    };

    // 进度按整数百分比去重打印
    let last_percent = Arc::new(std::sync::atomic::AtomicU64::new(u64::MAX));
    let progress: media_upload_rust::uploader::ProgressCallback = {
        let last_percent = Arc::clone(&last_percent);
        Arc::new(move |progress: media_upload_rust::UploadProgress| {
            let percent = (progress.fraction * 100.0) as u64;
            let previous =
                last_percent.swap(percent, std::sync::atomic::Ordering::SeqCst);
            if percent != previous || matches!(progress.phase, UploadPhase::Done | UploadPhase::Failed) {
                info!("上传进度: {}% ({:?})", percent, progress.phase);
            }
        })
    };

    match engine.start_upload(&request, Some(progress)).await {
        UploadResult::Success {
            object_key,
            public_url,
        } => {
            info!("上传完成: key={}", object_key);
            if let Some(url) = public_url {
                println!("{}", url);
            } else {
                println!("{}", object_key);
            }
        }
        UploadResult::Failure { stage, message } => {
            error!("上传失败 [{:?}]: {}", stage, message);
            std::process::exit(1);
        }
    }
}
