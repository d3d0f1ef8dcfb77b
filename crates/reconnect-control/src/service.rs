// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Central service running the scheduler on its own thread.

use crate::scheduler::{SamplingScheduler, UploaderFactory};
use crate::session::{ExerciseSpec, SessionSpec};
use crossbeam_channel::{Receiver, Sender};
use reconnect_core::{
    ChannelOutbound, EventBus, FeedbackStatus, OutboundMessage, SessionDomain, StatsSnapshot,
};
use reconnect_telemetry::FlushOutcome;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Configuration of the service loop.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How often the loop wakes to poll the sampling tasks.
    pub poll_interval: Duration,
    /// Maximum number of queued commands.
    pub command_buffer_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            command_buffer_size: 64,
        }
    }
}

/// Requests from the collaborator.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    /// Opens a session. A UUID v4 is generated when `session_id` is `None`.
    Start {
        /// Requested id.
        session_id: Option<String>,
        /// Landmark model.
        domain: SessionDomain,
        /// Rule engine.
        exercise: ExerciseSpec,
    },
    /// Ends a session (the active one when `session_id` is `None`).
    End {
        /// Id to end.
        session_id: Option<String>,
    },
    /// Starts both sampling tasks.
    StartSampling,
    /// Stops both sampling tasks.
    StopSampling,
}

/// What the service publishes on its event bus.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A session was opened.
    Started {
        /// Its id.
        session_id: String,
    },
    /// Stats after a landmark cycle.
    Snapshot {
        /// Session id.
        session_id: String,
        /// The stats.
        stats: StatsSnapshot,
        /// Status on display.
        feedback: FeedbackStatus,
    },
    /// An out-of-band event was sent.
    Triggered {
        /// Session id.
        session_id: String,
        /// The tagged message.
        message: String,
        /// Its severity.
        status: FeedbackStatus,
    },
    /// A session was closed.
    Ended {
        /// Its id.
        session_id: String,
        /// Final stats.
        stats: StatsSnapshot,
        /// Result of the teardown flush.
        flush: FlushOutcome,
    },
    /// A command could not be carried out.
    Rejected {
        /// Why.
        reason: String,
    },
}

/// Runs a [`SamplingScheduler`] on a dedicated thread.
///
/// The thread is the scheduler's single execution context: commands arrive
/// over a channel and are applied between cycles.
pub struct SessionService {
    config: ServiceConfig,
    scheduler: Option<SamplingScheduler>,
    uploaders: Arc<UploaderFactory>,
    events: Arc<EventBus<SessionEvent>>,
    outbound_tx: flume::Sender<OutboundMessage>,
    command_tx: Sender<SessionCommand>,
    command_rx: Receiver<SessionCommand>,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<SamplingScheduler>>,
}

impl SessionService {
    /// Creates a stopped service. Returns the receiving end of the outbound
    /// channel shared by all sessions.
    pub fn new(
        config: ServiceConfig,
        scheduler: SamplingScheduler,
        uploaders: UploaderFactory,
    ) -> (Self, flume::Receiver<OutboundMessage>) {
        let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_buffer_size);
        let (outbound_tx, outbound_rx) = flume::unbounded();
        let service = Self {
            config,
            scheduler: Some(scheduler),
            uploaders: Arc::new(uploaders),
            events: Arc::new(EventBus::new()),
            outbound_tx,
            command_tx,
            command_rx,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        };
        (service, outbound_rx)
    }

    /// Returns a sender to submit commands.
    pub fn command_sender(&self) -> Sender<SessionCommand> {
        self.command_tx.clone()
    }

    /// The bus events are published on.
    pub fn events(&self) -> &EventBus<SessionEvent> {
        &self.events
    }

    /// Whether the thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts the service thread. Calling it while running does nothing.
    pub fn start(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(mut scheduler) = self.scheduler.take() else {
            log::error!("Session service has no scheduler to run.");
            return;
        };

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let events = Arc::clone(&self.events);
        let uploaders = Arc::clone(&self.uploaders);
        let outbound_tx = self.outbound_tx.clone();
        let command_rx = self.command_rx.clone();
        let poll_interval = self.config.poll_interval;

        let handle = thread::spawn(move || {
            let origin = Instant::now();
            log::info!("Session service thread started.");

            while running.load(Ordering::Relaxed) {
                let start_time = Instant::now();
                let now = origin.elapsed();

                // 1. Apply pending commands
                while let Ok(command) = command_rx.try_recv() {
                    apply_command(&mut scheduler, command, now, &events, &uploaders, &outbound_tx);
                }

                // 2. Run whatever is due
                let outcome = scheduler.tick(now);

                // 3. Publish
                if let (Some(cycle), Some(session)) = (outcome.landmark, scheduler.session()) {
                    let session_id = session.id().to_string();
                    if let Some(message) = cycle.message {
                        events.publish(SessionEvent::Triggered {
                            session_id: session_id.clone(),
                            message,
                            status: cycle.status,
                        });
                    }
                    events.publish(SessionEvent::Snapshot {
                        session_id,
                        stats: session.stats().snapshot(),
                        feedback: scheduler.feedback(now),
                    });
                }

                // 4. Sleep until next poll
                let elapsed = start_time.elapsed();
                if elapsed < poll_interval {
                    thread::sleep(poll_interval - elapsed);
                }
            }

            // Teardown: an active session still gets its bounded flush.
            if scheduler.session().is_some() {
                end_session(&mut scheduler, None, origin.elapsed(), &events);
            }
            log::info!("Session service thread stopped.");
            scheduler
        });

        self.handle = Some(handle);
    }

    /// Stops the thread, ending any active session first.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(scheduler) => self.scheduler = Some(scheduler),
                Err(_) => log::error!("Session service thread panicked."),
            }
        }
    }
}

fn apply_command(
    scheduler: &mut SamplingScheduler,
    command: SessionCommand,
    now: Duration,
    events: &EventBus<SessionEvent>,
    uploaders: &UploaderFactory,
    outbound_tx: &flume::Sender<OutboundMessage>,
) {
    match command {
        SessionCommand::Start {
            session_id,
            domain,
            exercise,
        } => {
            let spec = SessionSpec {
                session_id,
                domain,
                exercise,
            };
            let outbound = Box::new(ChannelOutbound::from_sender(outbound_tx.clone()));
            match scheduler.start_session(spec, outbound, uploaders(), now) {
                Ok(session_id) => events.publish(SessionEvent::Started { session_id }),
                Err(e) => {
                    log::warn!("Session start rejected: {e}");
                    events.publish(SessionEvent::Rejected { reason: e.to_string() });
                }
            }
        }
        SessionCommand::End { session_id } => end_session(scheduler, session_id.as_deref(), now, events),
        SessionCommand::StartSampling => scheduler.start_sampling(now),
        SessionCommand::StopSampling => scheduler.stop_sampling(),
    }
}

fn end_session(
    scheduler: &mut SamplingScheduler,
    session_id: Option<&str>,
    now: Duration,
    events: &EventBus<SessionEvent>,
) {
    match scheduler.end_session(session_id, now) {
        Ok(summary) => events.publish(SessionEvent::Ended {
            session_id: summary.session_id,
            stats: summary.stats,
            flush: summary.flush,
        }),
        Err(e) => {
            log::warn!("Session end rejected: {e}");
            events.publish(SessionEvent::Rejected { reason: e.to_string() });
        }
    }
}

impl Drop for SessionService {
    fn drop(&mut self) {
        self.stop();
    }
}
