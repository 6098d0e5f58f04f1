use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::live::{LiveRunner, RequestTrace, TickSnapshot, TraceId, STEP_MS};
use crate::models::{GraphSpec, Node};

/// Frame pacing for the background loop, ~60 steps/sec.
const FRAME: Duration = Duration::from_millis(16);
const EVENT_BUFFER: usize = 256;
const COMMAND_BUFFER: usize = 64;

/// Control messages accepted by the host task.
#[derive(Debug)]
pub enum HostCommand {
    Init {
        graph: Box<GraphSpec>,
        speed: f64,
        load_factor: f64,
    },
    Start,
    Pause,
    SetSpeed(f64),
    SetLoadFactor(f64),
    StepOnce,
    Inject {
        client_id: String,
        reply: oneshot::Sender<Option<TraceId>>,
    },
    UpdateNodes(Vec<Node>),
    Reset,
    Shutdown,
}

/// Events pushed to the subscriber.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Tick(TickSnapshot),
    TraceDone(RequestTrace),
}

/// Handle to a simulation loop running on its own task. Dropping the handle
/// (or calling `shutdown`) stops the task.
pub struct SimulationHost {
    commands: mpsc::Sender<HostCommand>,
}

impl SimulationHost {
    /// Spawns the host task. Tick and trace events arrive on the returned
    /// receiver.
    pub fn spawn(spec: &GraphSpec) -> (Self, mpsc::Receiver<HostEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let runner = LiveRunner::new(spec);
        tokio::spawn(run_host(runner, command_rx, event_tx));
        (
            Self {
                commands: command_tx,
            },
            event_rx,
        )
    }

    pub async fn start(&self) -> Result<()> {
        self.send(HostCommand::Start).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(HostCommand::Pause).await
    }

    pub async fn set_speed(&self, speed: f64) -> Result<()> {
        self.send(HostCommand::SetSpeed(speed)).await
    }

    pub async fn set_load_factor(&self, load_factor: f64) -> Result<()> {
        self.send(HostCommand::SetLoadFactor(load_factor)).await
    }

    pub async fn step_once(&self) -> Result<()> {
        self.send(HostCommand::StepOnce).await
    }

    pub async fn update_nodes(&self, nodes: Vec<Node>) -> Result<()> {
        self.send(HostCommand::UpdateNodes(nodes)).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send(HostCommand::Reset).await
    }

    /// Replaces the running graph wholesale; counters and traces reset.
    pub async fn init(&self, graph: GraphSpec, speed: f64, load_factor: f64) -> Result<()> {
        self.send(HostCommand::Init {
            graph: Box::new(graph),
            speed,
            load_factor,
        })
        .await
    }

    /// Injects a traced debug request and waits for the assigned trace id.
    pub async fn inject(&self, client_id: &str) -> Result<Option<TraceId>> {
        let (reply, response) = oneshot::channel();
        self.send(HostCommand::Inject {
            client_id: client_id.to_string(),
            reply,
        })
        .await?;
        response.await.map_err(|_| Error::HostReplyDropped)
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(HostCommand::Shutdown).await
    }

    async fn send(&self, command: HostCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::HostStopped)
    }
}

async fn run_host(
    mut runner: LiveRunner,
    mut commands: mpsc::Receiver<HostCommand>,
    events: mpsc::Sender<HostEvent>,
) {
    // The timer exists only while running; pausing disarms it before the
    // runner state changes so a stale frame can never fire.
    let mut timer: Option<Interval> = None;

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    HostCommand::Init { graph, speed, load_factor } => {
                        timer = None;
                        runner = LiveRunner::new(&graph);
                        runner.set_speed(speed);
                        runner.set_load_factor(load_factor);
                        debug!("host reinitialized");
                    }
                    HostCommand::Start => {
                        if timer.is_none() {
                            timer = Some(frame_timer());
                            runner.start();
                        }
                    }
                    HostCommand::Pause => {
                        timer = None;
                        runner.pause();
                    }
                    HostCommand::SetSpeed(speed) => runner.set_speed(speed),
                    HostCommand::SetLoadFactor(factor) => runner.set_load_factor(factor),
                    HostCommand::StepOnce => {
                        let snapshot = runner.step_once(true);
                        if !publish(&events, &mut runner, snapshot).await {
                            break;
                        }
                    }
                    HostCommand::Inject { client_id, reply } => {
                        let trace_id = runner.inject_request(&client_id);
                        let snapshot = runner.step_until_next_arrival();
                        if reply.send(trace_id).is_err() {
                            warn!("inject reply receiver dropped");
                        }
                        if !publish(&events, &mut runner, snapshot).await {
                            break;
                        }
                    }
                    HostCommand::UpdateNodes(nodes) => runner.update_nodes(nodes),
                    HostCommand::Reset => {
                        timer = None;
                        runner.reset();
                    }
                    HostCommand::Shutdown => break,
                }
            }
            _ = tick(&mut timer) => {
                let snapshot = runner.step(STEP_MS);
                if !publish(&events, &mut runner, snapshot).await {
                    break;
                }
            }
        }
    }
    debug!("host task stopped");
}

fn frame_timer() -> Interval {
    let mut timer = interval(FRAME);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    timer
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Sends the tick and any finished traces; false when the subscriber is gone.
async fn publish(
    events: &mpsc::Sender<HostEvent>,
    runner: &mut LiveRunner,
    snapshot: TickSnapshot,
) -> bool {
    if events.send(HostEvent::Tick(snapshot)).await.is_err() {
        return false;
    }
    for trace in runner.drain_completed_traces() {
        if events.send(HostEvent::TraceDone(trace)).await.is_err() {
            return false;
        }
    }
    true
}
