// 该文件是 Kanjian （看见） 项目的一部分。
// src/bin/overlay_oneshot.rs - 单次采集并保存检测叠加层
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use kanjian::{
  FromUrl,
  args::OverlayArgs,
  config::SharedConfig,
  input::InputWrapper,
  model::EngineWrapper,
  output::{DetectionLog, ImageCanvas, SaveImageFileOutput, TracingLogSink},
  task::{OneShotTask, Pipeline, Task},
};

/// Kanjian 单次检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理引擎（replay:///out.json 或 rknn:///model.rknn）
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 将叠加层合成到输入帧上再保存
  #[arg(long)]
  pub backdrop: bool,

  #[command(flatten)]
  pub overlay: OverlayArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("推理引擎: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let mut input = InputWrapper::from_url(&args.input)?;
  let engine = EngineWrapper::from_url(&args.model)?;
  let output = SaveImageFileOutput::from_url(&args.output)?;

  let config = args.overlay.to_config()?;
  let mirror = config.mirror;
  let pipeline = Pipeline::new(engine, args.overlay.to_renderer()?, SharedConfig::new(config));

  let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
  let (width, height) = args.overlay.display_size(frame.width(), frame.height());
  let mut canvas = ImageCanvas::new(width, height);
  if let Some(font) = &args.overlay.font {
    canvas = canvas.with_font(ImageCanvas::load_font(font)?);
  }
  canvas.warn_if_fontless();

  let mut log = (DetectionLog::unbounded(), TracingLogSink);
  let report = OneShotTask.run_task(std::iter::once(frame.clone()), &pipeline, &mut canvas, &mut log)?;
  match &report {
    Some(report) => info!(
      "检测到 {} 个物体，推理耗时: {:.2?}",
      report.detections.len(),
      report.stats.inference
    ),
    None => info!("本次采集没有产生结果"),
  }

  if args.backdrop {
    let backdrop = if mirror { frame.mirrored() } else { frame };
    output.save_composite(&canvas, &backdrop)?;
  } else {
    output.save(&canvas)?;
  }

  Ok(())
}
