// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic rendering contract: sizes, the `Renderer` trait, and the
//! setup/frame error taxonomy with its process-boundary status codes.

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One distinct initialization step. Discriminants are the process exit
/// statuses: assigned monotonically in creation order, first failing step
/// wins and all later steps are skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum SetupStage {
    Instance = 1,
    Surface = 2,
    PickDevice = 3,
    LogicalDevice = 4,
    Swapchain = 5,
    RenderPass = 6,
    Pipeline = 7,
    Framebuffers = 8,
    CommandPool = 9,
    CommandBuffers = 10,
    SyncObjects = 11,
}

impl SetupStage {
    pub fn status(self) -> i32 {
        self as i32
    }
}

impl std::fmt::Display for SetupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SetupStage::Instance => "instance",
            SetupStage::Surface => "surface",
            SetupStage::PickDevice => "pick-device",
            SetupStage::LogicalDevice => "logical-device",
            SetupStage::Swapchain => "swapchain",
            SetupStage::RenderPass => "render-pass",
            SetupStage::Pipeline => "pipeline",
            SetupStage::Framebuffers => "framebuffers",
            SetupStage::CommandPool => "command-pool",
            SetupStage::CommandBuffers => "command-buffers",
            SetupStage::SyncObjects => "sync-objects",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SetupErrorKind {
    #[error("validation layers requested but not available")]
    ValidationUnavailable,
    #[error("no suitable physical device")]
    NoSuitableDevice,
    #[error("device creation failed: {0}")]
    DeviceCreationFailed(String),
    #[error("shader bytecode empty or missing: {0}")]
    ShaderLoadFailed(&'static str),
    #[error("{0}")]
    Api(String),
}

/// Fatal initialization failure. Carries the failing stage for diagnostics
/// and for the per-stage exit status.
#[derive(Debug, Error)]
#[error("setup failed at {stage}: {kind}")]
pub struct SetupError {
    pub stage: SetupStage,
    pub kind: SetupErrorKind,
}

impl SetupError {
    pub fn new(stage: SetupStage, kind: SetupErrorKind) -> Self {
        Self { stage, kind }
    }

    pub fn status(&self) -> i32 {
        self.stage.status()
    }
}

/// Per-frame failure outside staleness. Does not tear the engine down; the
/// caller decides whether to continue or quit.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("image acquisition failed: {0}")]
    Acquire(String),
    #[error("queue submission failed: {0}")]
    Submit(String),
    #[error("presentation failed: {0}")]
    Present(String),
}

impl FrameError {
    pub fn status(&self) -> i32 {
        match self {
            FrameError::Acquire(_) => 2,
            FrameError::Submit(_) => 3,
            FrameError::Present(_) => 4,
        }
    }
}

/// Outcome of one successful pass through the frame state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Image submitted and presented.
    Presented,
    /// The presentation chain reported itself stale; the caller should run
    /// the resize path and retry next tick. Not an error.
    Stale,
}

/// Status code for one `render` call: 0 presented, 1 stale, 2 acquire
/// failure, 3 submit failure, 4 present failure.
pub fn frame_status(result: &Result<FrameOutcome, FrameError>) -> i32 {
    match result {
        Ok(FrameOutcome::Presented) => 0,
        Ok(FrameOutcome::Stale) => 1,
        Err(e) => e.status(),
    }
}

/// Knobs the backend needs at creation time.
#[derive(Clone, Debug)]
pub struct RendererOptions {
    /// Application name reported to the graphics API.
    pub app_name: String,
    /// Require validation layers; fails setup when they are absent.
    pub validation: bool,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            app_name: "trigon".into(),
            validation: false,
        }
    }
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        opts: &RendererOptions,
    ) -> Result<Self, SetupError>
    where
        Self: Sized;

    /// Drive the resize coordinator. A zero-area size pauses rendering
    /// instead of rebuilding; rebuild failures are fatal.
    fn resize(&mut self, size: RenderSize) -> Result<(), SetupError>;

    /// Run the frame state machine once with the given clear color.
    fn render(&mut self, clear: [f32; 4]) -> Result<FrameOutcome, FrameError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_stage_codes_are_monotonic_in_creation_order() {
        let stages = [
            SetupStage::Instance,
            SetupStage::Surface,
            SetupStage::PickDevice,
            SetupStage::LogicalDevice,
            SetupStage::Swapchain,
            SetupStage::RenderPass,
            SetupStage::Pipeline,
            SetupStage::Framebuffers,
            SetupStage::CommandPool,
            SetupStage::CommandBuffers,
            SetupStage::SyncObjects,
        ];
        for (i, stage) in stages.iter().enumerate() {
            assert_eq!(stage.status(), i as i32 + 1);
        }
    }

    #[test]
    fn no_suitable_device_reports_pick_device_status() {
        let err = SetupError::new(SetupStage::PickDevice, SetupErrorKind::NoSuitableDevice);
        assert_eq!(err.status(), 3);
        assert!(err.to_string().contains("no suitable physical device"));
    }

    #[test]
    fn frame_statuses_cover_zero_through_four() {
        assert_eq!(frame_status(&Ok(FrameOutcome::Presented)), 0);
        assert_eq!(frame_status(&Ok(FrameOutcome::Stale)), 1);
        assert_eq!(frame_status(&Err(FrameError::Acquire("x".into()))), 2);
        assert_eq!(frame_status(&Err(FrameError::Submit("x".into()))), 3);
        assert_eq!(frame_status(&Err(FrameError::Present("x".into()))), 4);
    }

    #[test]
    fn zero_area_sizes_are_detected() {
        assert!(RenderSize {
            width: 0,
            height: 600
        }
        .is_zero());
        assert!(RenderSize {
            width: 800,
            height: 0
        }
        .is_zero());
        assert!(!RenderSize {
            width: 800,
            height: 600
        }
        .is_zero());
    }
}
