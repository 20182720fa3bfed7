//! # Dispatcher
//!
//! 帧写入模块。
//!
//! 负责：
//! - 每个传感器一个 `FrameWriter`（LiDAR `.bin`、相机 `.png`）
//! - 回调只做窗口检查与入队，写盘在独立 worker 中完成
//! - 写入失败只记录日志与计数，不中断采集

pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod window;
pub mod writer;

pub use error::DispatcherError;
pub use handle::{WriterCommand, WriterHandle};
pub use metrics::{WriterMetrics, WriterSnapshot};
pub use sinks::{LidarBinWriter, PngImageWriter};
pub use window::FrameWindow;
pub use writer::{prepare_output_dirs, sensor_dir, writer_for, FrameWriter};
