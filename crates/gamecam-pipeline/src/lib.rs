#![deny(unreachable_patterns)]
//! Stage processors and orchestration for the camera recording-ingestion
//! pipeline (§2, §4).
//!
//! This crate provides:
//! - The Camera Poller discovery loop (§4.2)
//! - The Download, Video (Convert/Combine/Trim) and Upload stage processors
//!   (§4.3-§4.5)
//! - The State Auditor reconciliation loop (§4.6)
//! - The Orchestrator that wires everything together and owns shutdown
//!   (§4.7)
//! - Pipeline configuration loaded from `config.ini` (§6, §9)

pub mod auditor;
pub mod config;
pub mod download_processor;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod upload_processor;
pub mod video_processor;

pub use auditor::StateAuditor;
pub use config::PipelineConfig;
pub use download_processor::DownloadProcessor;
pub use error::{PipelineError, PipelineResult};
pub use orchestrator::Orchestrator;
pub use poller::CameraPoller;
pub use upload_processor::UploadProcessor;
pub use video_processor::VideoProcessor;
