// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/log.rs - 检测日志
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{error, info};

const SEPARATOR: &str = "===================";

/// 日志中的一条检测，置信度为保留一位小数的百分比
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedDetection {
  pub class_name: String,
  pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionLogEntry {
  pub timestamp: DateTime<Local>,
  pub detections: Vec<LoggedDetection>,
}

impl DetectionLogEntry {
  pub fn new(detections: Vec<LoggedDetection>) -> Self {
    Self {
      timestamp: Local::now(),
      detections,
    }
  }

  pub fn format(&self) -> String {
    let output = serde_json::to_string(&self.detections).unwrap_or_else(|_| "[]".to_string());
    format!(
      "{SEPARATOR}\nTimestamp: {}\nModel Output:\n{}\n{SEPARATOR}\n",
      self.timestamp.format("%H:%M:%S"),
      output
    )
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
  Cycle(DetectionLogEntry),
  Failure {
    timestamp: DateTime<Local>,
    message: String,
  },
}

impl LogRecord {
  pub fn failure(message: impl Into<String>) -> Self {
    LogRecord::Failure {
      timestamp: Local::now(),
      message: message.into(),
    }
  }

  pub fn timestamp(&self) -> DateTime<Local> {
    match self {
      LogRecord::Cycle(entry) => entry.timestamp,
      LogRecord::Failure { timestamp, .. } => *timestamp,
    }
  }

  pub fn format(&self) -> String {
    match self {
      LogRecord::Cycle(entry) => entry.format(),
      LogRecord::Failure { timestamp, message } => format!(
        "{SEPARATOR}\nTimestamp: {}\nInference Error:\n{}\n{SEPARATOR}\n",
        timestamp.format("%H:%M:%S"),
        message
      ),
    }
  }
}

/// 只追加的日志接收端
pub trait LogSink {
  fn append(&mut self, record: LogRecord);
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
  fn append(&mut self, record: LogRecord) {
    (**self).append(record);
  }
}

impl<A: LogSink, B: LogSink> LogSink for (A, B) {
  fn append(&mut self, record: LogRecord) {
    self.0.append(record.clone());
    self.1.append(record);
  }
}

/// 内存中的滚动日志，最新的记录在前
#[derive(Debug, Clone, Default)]
pub struct DetectionLog {
  records: VecDeque<LogRecord>,
  capacity: Option<usize>,
}

impl DetectionLog {
  pub fn unbounded() -> Self {
    Self::default()
  }

  /// 超出容量时丢弃最旧的记录
  pub fn bounded(capacity: usize) -> Self {
    Self {
      records: VecDeque::with_capacity(capacity),
      capacity: Some(capacity),
    }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn latest(&self) -> Option<&LogRecord> {
    self.records.front()
  }

  pub fn iter(&self) -> impl Iterator<Item = &LogRecord> {
    self.records.iter()
  }

  pub fn clear(&mut self) {
    self.records.clear();
  }

  /// 所有记录按最新在前拼接成文本
  pub fn render(&self) -> String {
    self.records.iter().map(LogRecord::format).collect()
  }
}

impl LogSink for DetectionLog {
  fn append(&mut self, record: LogRecord) {
    self.records.push_front(record);
    if let Some(capacity) = self.capacity {
      self.records.truncate(capacity);
    }
  }
}

/// 转发到 tracing
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
  fn append(&mut self, record: LogRecord) {
    match &record {
      LogRecord::Cycle(entry) => info!("检测日志:\n{}", entry.format()),
      LogRecord::Failure { message, .. } => error!("推理失败: {}", message),
    }
  }
}
