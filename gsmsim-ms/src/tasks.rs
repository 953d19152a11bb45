//! MS Task Framework
//!
//! The MM layer runs as an async actor. Its neighbours (CM sublayers, RR,
//! SIM, the CLI) send [`MmInput`] messages to its mailbox, and everything
//! the layer emits is forwarded on an [`MmOutput`] channel.
//!
//! The task drives the layer's timers from a periodic tick, so the layer
//! itself never reads the clock.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cell::ServingCell;
use crate::nas::mm::{MmLayer, MmStateSnapshot};
use crate::primitives::{MmEvent, MmOutput, MmrPrim, MmxxPrim, RrPrim};

/// Default channel capacity for task message queues.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Interval of the timer tick in milliseconds.
pub const MM_TICK_INTERVAL_MS: u64 = 100;

// ============================================================================
// Task Message Envelope
// ============================================================================

/// Task message envelope wrapping typed messages with control signals.
#[derive(Debug)]
pub enum TaskMessage<T> {
    /// Regular message payload
    Message(T),
    /// Shutdown signal - task should terminate gracefully
    Shutdown,
}

impl<T> TaskMessage<T> {
    pub fn message(msg: T) -> Self {
        TaskMessage::Message(msg)
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    /// Returns the message payload if present, or None for shutdown.
    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

/// Base trait for MS tasks.
#[async_trait]
pub trait Task: Send + 'static {
    /// The message type this task processes.
    type Message: Send;

    /// Runs the task's main loop, processing messages until shutdown.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

// ============================================================================
// MM Task Messages
// ============================================================================

/// Messages for the MM task.
#[derive(Debug)]
pub enum MmInput {
    /// MMxx primitive from CC, SS or SMS
    Upper(MmxxPrim),
    /// MMR primitive from the SIM manager
    Mmr(MmrPrim),
    /// Primitive from RR
    Rr(RrPrim),
    /// Internal event (cell selection, SIM, system information)
    Event(MmEvent),
    /// Cell selection camped on a new cell, followed by NEW_LAI
    Cell(ServingCell),
    /// Request a snapshot of the current state
    Status(oneshot::Sender<MmStateSnapshot>),
}

// ============================================================================
// Task Handle
// ============================================================================

/// Handle for sending messages to a task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    /// Sends a message to the task.
    ///
    /// Returns an error if the task has been dropped.
    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends a message to the task without waiting.
    pub fn try_send(&self, msg: T) -> Result<(), mpsc::error::TrySendError<TaskMessage<T>>> {
        self.tx.try_send(TaskMessage::Message(msg))
    }

    /// Sends a shutdown signal to the task.
    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// MM Task
// ============================================================================

/// Async wrapper around [`MmLayer`].
pub struct MmTask {
    layer: MmLayer,
    output_tx: mpsc::Sender<MmOutput>,
    tick_interval: Duration,
}

impl MmTask {
    pub fn new(layer: MmLayer, output_tx: mpsc::Sender<MmOutput>) -> Self {
        Self {
            layer,
            output_tx,
            tick_interval: Duration::from_millis(MM_TICK_INTERVAL_MS),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Create the task together with its handle and receivers.
    pub fn spawn_channels(
        layer: MmLayer,
        capacity: usize,
    ) -> (
        Self,
        TaskHandle<MmInput>,
        mpsc::Receiver<TaskMessage<MmInput>>,
        mpsc::Receiver<MmOutput>,
    ) {
        let (input_tx, input_rx) = mpsc::channel(capacity);
        let (output_tx, output_rx) = mpsc::channel(capacity);
        (
            Self::new(layer, output_tx),
            TaskHandle::new(input_tx),
            input_rx,
            output_rx,
        )
    }

    pub fn layer(&self) -> &MmLayer {
        &self.layer
    }

    fn handle_input(&mut self, input: MmInput) {
        match input {
            MmInput::Upper(prim) => self.layer.push_upper(prim),
            MmInput::Mmr(prim) => self.layer.push_mmr(prim),
            MmInput::Rr(prim) => self.layer.push_rr(prim),
            MmInput::Event(event) => self.layer.push_event(event),
            MmInput::Cell(cell) => {
                info!("Serving cell: {}", cell);
                self.layer.cell_mut().reselect(cell);
                self.layer.push_event(MmEvent::NewLai);
            }
            MmInput::Status(reply) => {
                if reply.send(self.layer.snapshot()).is_err() {
                    debug!("Status requester went away");
                }
            }
        }
    }

    /// Run queued work and forward everything the layer emitted.
    async fn process(&mut self, now: Instant) {
        let processed = self.layer.work(now);
        if processed > 0 {
            debug!("MM processed {} inputs", processed);
        }

        for output in self.layer.take_outputs() {
            debug!("MM output {}", output);
            if let Err(e) = self.output_tx.send(output).await {
                warn!("Failed to forward MM output: {}", e);
            }
        }
    }
}

#[async_trait]
impl Task for MmTask {
    type Message = MmInput;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("MM task started");

        let mut tick = interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(TaskMessage::Message(input)) => {
                            self.handle_input(input);
                            self.process(Instant::now()).await;
                        }
                        Some(TaskMessage::Shutdown) => {
                            info!("MM task received shutdown signal");
                            break;
                        }
                        None => {
                            info!("MM task channel closed");
                            break;
                        }
                    }
                }
                _ = tick.tick() => {
                    let now = Instant::now();
                    self.layer.tick(now);
                    self.process(now).await;
                }
            }
        }

        self.layer.exit();
        info!("MM task stopped");
    }
}
