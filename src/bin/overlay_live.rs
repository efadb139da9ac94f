// 该文件是 Kanjian （看见） 项目的一部分。
// src/bin/overlay_live.rs - 实时检测叠加循环
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use kanjian::{
  FromUrl,
  args::OverlayArgs,
  config::SharedConfig,
  input::InputWrapper,
  model::EngineWrapper,
  output::{DetectionLog, ImageCanvas, SaveImageFileOutput, TracingLogSink},
  task::{ContinuousTask, DEFAULT_REFRESH_RATE, LoopControl, Pipeline, RefreshTicker, Task},
};

/// Kanjian 实时检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎（replay:///out.json 或 rknn:///model.rknn）
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源（image:///frame.png?repeat 或 v4l:///dev/video0）
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 循环结束时保存最后一帧叠加层的路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<Url>,
  /// 将叠加层合成到最后一帧上再保存
  #[arg(long)]
  pub backdrop: bool,

  #[arg(long, value_name = "FRAME_NUMBER")]
  pub frame_number: Option<usize>,

  /// 显示刷新率 (Hz)
  #[arg(long, default_value_t = DEFAULT_REFRESH_RATE, value_name = "HZ")]
  pub refresh_rate: f32,

  /// 内存中保留的日志条数
  #[arg(long, default_value_t = 100, value_name = "COUNT")]
  pub log_capacity: usize,

  #[command(flatten)]
  pub overlay: OverlayArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("推理引擎: {}", args.model);
  info!("输入来源: {}", args.input);

  let input = InputWrapper::from_url(&args.input)?;
  let engine = EngineWrapper::from_url(&args.model)?;
  let output = args
    .output
    .as_ref()
    .map(SaveImageFileOutput::from_url)
    .transpose()?;

  let config = args.overlay.to_config()?;
  let mirror = config.mirror;
  let pipeline = Pipeline::new(engine, args.overlay.to_renderer()?, SharedConfig::new(config));

  let mut input = input.peekable();
  let Some(first) = input.peek() else {
    warn!("采集源没有产生任何帧");
    return Ok(());
  };
  let (width, height) = args.overlay.display_size(first.width(), first.height());
  let mut canvas = ImageCanvas::new(width, height);
  if let Some(font) = &args.overlay.font {
    canvas = canvas.with_font(ImageCanvas::load_font(font)?);
  }
  canvas.warn_if_fontless();

  // 先置位锁存器再安装信号处理，启动前收到的中断不会丢失
  let control = LoopControl::new();
  control.start();
  let handle = control.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，当前周期结束后退出...");
    handle.stop();
  })?;

  let mut log = (DetectionLog::bounded(args.log_capacity), TracingLogSink);
  let mut last_frame = None;
  let frames = input.inspect(|frame| last_frame = Some(frame.clone()));

  let summary = ContinuousTask::default()
    .with_frame_number(args.frame_number)
    .with_started_control(control)
    .with_ticker(RefreshTicker::new(args.refresh_rate))
    .run_task(frames, &pipeline, &mut canvas, &mut log)?;

  info!(
    "共 {} 个周期，跳过 {} 帧，检测 {} 个物体，日志保留 {} 条",
    summary.cycles,
    summary.skipped,
    summary.detections,
    log.0.len()
  );

  if let Some(output) = output {
    match last_frame {
      Some(frame) if args.backdrop => {
        let backdrop = if mirror { frame.mirrored() } else { frame };
        output.save_composite(&canvas, &backdrop)?;
      }
      _ => output.save(&canvas)?,
    }
  }

  Ok(())
}
