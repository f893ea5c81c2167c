//! UI loop
//!
//! All controller, page and view mutation happens on one task that drains a
//! bounded channel. Anything else (button presses, service broadcasts,
//! engine callbacks, worker results) posts a [`UiEvent`] through a cloneable
//! [`UiHandle`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::controller::{LifecycleController, Work};
use crate::events::{CheckOutcome, EngineEvent, ServiceEvent, UiEvent, UserAction};
use crate::orchestrator::{CheckRequest, UpdateChecker};

/// Longest gap between two "is a scheduled check due" wake-ups
const MAX_SCHEDULE_TICK: Duration = Duration::from_secs(3600);

/// Posts events to the UI loop
#[derive(Clone)]
pub struct UiHandle {
    tx: mpsc::Sender<UiEvent>,
}

impl UiHandle {
    /// Queue an event, waiting for room
    pub async fn send(&self, event: UiEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| anyhow!("UI loop has stopped"))
    }

    /// Queue an event without waiting, for callers outside the runtime.
    /// Returns false when the event was dropped.
    pub fn post(&self, event: UiEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event = event.name(), "UI queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                debug!(event = event.name(), "UI loop stopped, dropping event");
                false
            }
        }
    }

    pub async fn user(&self, action: UserAction) -> Result<()> {
        self.send(UiEvent::User(action)).await
    }

    pub async fn service(&self, event: ServiceEvent) -> Result<()> {
        self.send(UiEvent::Service(event)).await
    }

    /// Engine callbacks arrive on foreign threads and must not block
    pub fn engine(&self, event: EngineEvent) -> bool {
        self.post(UiEvent::Engine(event))
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(UiEvent::Stop).await
    }
}

/// Owns the controller and feeds it events one at a time
pub struct UiLoop {
    controller: LifecycleController,
    rx: mpsc::Receiver<UiEvent>,
    handle: UiHandle,
    checker: Arc<dyn UpdateChecker>,
    schedule: Option<Duration>,
}

impl UiLoop {
    pub fn new(controller: LifecycleController, checker: Arc<dyn UpdateChecker>) -> (Self, UiHandle) {
        let capacity = controller.config().ui_channel_capacity.max(1);
        let schedule = controller
            .config()
            .auto_check_interval
            .period()
            .map(|period| period.min(MAX_SCHEDULE_TICK));

        let (tx, rx) = mpsc::channel(capacity);
        let handle = UiHandle { tx };

        let ui = Self {
            controller,
            rx,
            handle: handle.clone(),
            checker,
            schedule,
        };
        (ui, handle)
    }

    /// Run until `Stop` or the user exits, then hand the controller back
    #[instrument(skip(self), name = "ui_loop")]
    pub async fn run(mut self) -> LifecycleController {
        info!(schedule_secs = ?self.schedule.map(|d| d.as_secs()), "Starting UI loop");

        let mut schedule = self.schedule.map(|period| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });

        loop {
            let event = tokio::select! {
                event = self.rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        self.controller.shutdown();
                        break;
                    }
                },
                _ = next_tick(&mut schedule) => UiEvent::ScheduledCheck,
            };

            let stop = matches!(event, UiEvent::Stop);
            self.controller.handle(event);

            for work in self.controller.take_work() {
                self.dispatch(work);
            }

            if stop || self.controller.exit_requested() {
                if !self.controller.is_stopped() {
                    self.controller.shutdown();
                }
                break;
            }
        }

        info!("UI loop stopped");
        self.controller
    }

    fn dispatch(&self, work: Work) {
        let handle = self.handle.clone();

        match work {
            Work::Check(request) => {
                let checker = self.checker.clone();
                tokio::spawn(async move {
                    let outcome = run_check(checker.as_ref(), &request).await;
                    let _ = handle.send(UiEvent::CheckFinished(outcome)).await;
                });
            }
            Work::ResolveAfter(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = handle.send(UiEvent::ResolveFallback).await;
                });
            }
            Work::PollBattery(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = handle.send(UiEvent::BatteryPoll).await;
                });
            }
        }
    }
}

async fn next_tick(schedule: &mut Option<Interval>) {
    match schedule {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Ask the server and fetch the changelog of whatever it offers
pub async fn run_check(checker: &dyn UpdateChecker, request: &CheckRequest) -> CheckOutcome {
    let record = match checker.check(request).await {
        Ok(Some(record)) => record,
        Ok(None) => return CheckOutcome::UpToDate,
        Err(e) => return CheckOutcome::Failed(format!("{:#}", e)),
    };

    let changelog = if record.changelog_url.is_empty() {
        String::new()
    } else {
        match checker.fetch_changelog(&record.changelog_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(url = %record.changelog_url, error = %e, "Failed to fetch changelog");
                String::new()
            }
        }
    };

    CheckOutcome::Available { record, changelog }
}
