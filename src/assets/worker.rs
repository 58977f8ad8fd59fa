//! Background worker for asset loading.
//!
//! Decoding runs off the frame loop; finished work comes back over a channel
//! that the loop drains without blocking.

use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::source::AssetSource;
use super::LoadError;
use crate::material::{Texture, TextureChannel};
use crate::scene::{EnvironmentMap, NodeSpec};

/// Commands sent from the frame loop to the worker.
#[derive(Debug)]
pub enum WorkerCommand {
    LoadEnvironment { path: PathBuf },
    LoadModel { path: PathBuf },
    LoadTexture { channel: TextureChannel, path: PathBuf },
    Stop,
}

/// Finished work sent back to the frame loop.
pub enum WorkerResult {
    Environment {
        path: PathBuf,
        result: Result<EnvironmentMap, LoadError>,
    },
    Model {
        path: PathBuf,
        result: Result<NodeSpec, LoadError>,
    },
    Texture {
        channel: TextureChannel,
        path: PathBuf,
        result: Result<Texture, LoadError>,
    },
}

/// Returned by `try_recv` once the worker thread is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerGone;

pub struct WorkerHandle {
    tx: Sender<WorkerCommand>,
    rx: Receiver<WorkerResult>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(source: Arc<dyn AssetSource>) -> Self {
        let (cmd_tx, cmd_rx) = channel::<WorkerCommand>();
        let (res_tx, res_rx) = channel::<WorkerResult>();

        let handle = thread::Builder::new()
            .name("asset-worker".to_string())
            .spawn(move || worker_loop(source, cmd_rx, res_tx))
            .map_err(|err| log::error!("Failed to spawn asset worker: {}", err))
            .ok();

        Self {
            tx: cmd_tx,
            rx: res_rx,
            handle,
        }
    }

    /// Queue a command. Returns false when the worker is no longer running.
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.handle.is_some() && self.tx.send(command).is_ok()
    }

    /// Next finished result, if any (non-blocking).
    pub fn try_recv(&self) -> Result<Option<WorkerResult>, WorkerGone> {
        match self.rx.try_recv() {
            Ok(result) => Ok(Some(result)),
            Err(TryRecvError::Empty) if self.handle.is_some() => Ok(None),
            Err(_) => Err(WorkerGone),
        }
    }
}

impl Drop for WorkerHandle {
    /// Loads cannot be cancelled: the thread is told to stop and detached.
    /// A load already in progress finishes and its result is dropped.
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerCommand::Stop);
        self.handle.take();
    }
}

fn worker_loop(
    source: Arc<dyn AssetSource>,
    rx: Receiver<WorkerCommand>,
    tx: Sender<WorkerResult>,
) {
    while let Ok(command) = rx.recv() {
        let result = match command {
            WorkerCommand::LoadEnvironment { path } => {
                log::debug!("Decoding environment {}", path.display());
                let result = source.load_environment(&path);
                WorkerResult::Environment { path, result }
            }
            WorkerCommand::LoadModel { path } => {
                log::debug!("Decoding model {}", path.display());
                let result = source.load_model(&path);
                WorkerResult::Model { path, result }
            }
            WorkerCommand::LoadTexture { channel, path } => {
                log::debug!("Decoding {} texture {}", channel, path.display());
                let result = source.load_texture(channel, &path);
                WorkerResult::Texture {
                    channel,
                    path,
                    result,
                }
            }
            WorkerCommand::Stop => break,
        };
        if tx.send(result).is_err() {
            break; // loader dropped
        }
    }
}
