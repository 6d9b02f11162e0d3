// THEORY:
// `PipelineHandle` moves a `DetectionPipeline` onto its own tokio task so that
// async callers (a capture loop, a network service) can hand frames over
// without owning the detector. The task is the single owner of the pipeline;
// callers talk to it through an mpsc channel and get each result back on a
// oneshot.
//
// The channel preserves send order, and the task handles one message at a
// time, so frames reach the background model and the heat maps in exactly the
// order they were submitted. Concurrent callers are serialized, never run in
// parallel against the same stream state.

use crate::core_modules::background::BackgroundModel;
use crate::core_modules::frame::Frame;
use crate::core_modules::mask_filter::MaskFilter;
use crate::error::{DetectionError, Result};
use crate::pipeline::{DetectionPipeline, FrameAnalysis};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub enum PipelineMessage {
    Analyze(Frame, oneshot::Sender<Result<FrameAnalysis>>),
    Shutdown,
}

pub struct PipelineHandle {
    sender: mpsc::UnboundedSender<PipelineMessage>,
    worker: JoinHandle<u64>,
}

impl PipelineHandle {
    /// Spawns the pipeline's task. Must be called from within a tokio runtime.
    pub fn spawn<B, F>(mut pipeline: DetectionPipeline<B, F>) -> Self
    where
        B: BackgroundModel + 'static,
        F: MaskFilter + 'static,
    {
        let (sender, mut receiver) = mpsc::unbounded_channel::<PipelineMessage>();

        let worker = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    PipelineMessage::Analyze(frame, reply) => {
                        let result = pipeline.analyze(&frame);
                        if reply.send(result).is_err() {
                            debug!("caller dropped before the result was ready");
                        }
                    }
                    PipelineMessage::Shutdown => break,
                }
            }
            info!(frames = pipeline.frames_processed(), "pipeline task stopped");
            pipeline.frames_processed()
        });

        Self { sender, worker }
    }

    pub async fn analyze(&self, frame: Frame) -> Result<FrameAnalysis> {
        let (reply, result) = oneshot::channel();
        self.sender
            .send(PipelineMessage::Analyze(frame, reply))
            .map_err(|_| DetectionError::PipelineClosed)?;
        result.await.map_err(|_| DetectionError::PipelineClosed)?
    }

    pub async fn process(&self, frame: Frame) -> Result<Frame> {
        self.analyze(frame).await.map(|analysis| analysis.annotated)
    }

    /// Stops the task after every frame already submitted has been handled.
    /// Returns the number of frames the pipeline processed.
    pub async fn shutdown(self) -> Result<u64> {
        // The task may already be gone; the join below reports that.
        let _ = self.sender.send(PipelineMessage::Shutdown);
        self.worker.await.map_err(|_| DetectionError::PipelineClosed)
    }
}
