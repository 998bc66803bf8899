//! Async driver for a link-code session.
//!
//! Once a code is issued the controller spawns one background task that
//! owns two timers: a countdown tick and a status poll. Poll requests run
//! as an in-flight future alongside the timers, so a slow request never
//! holds up the countdown. The task ends on its own when the code is linked
//! (after the dismiss delay) or expires, and [`LinkController::close`]
//! stops it at any point.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, OptionFuture};
use jiff::Timestamp;
use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::api::{AccountLink, LinkApi, LinkCode, LinkStatusReport};
use crate::error::{LinkError, Result};
use crate::platform::Platform;

use super::{LinkPoll, LinkSession, LinkStatus, SessionSnapshot, SessionTimings};

const EVENT_CAPACITY: usize = 256;

/// Notification published as a session progresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A code was issued and the countdown started.
    CodeIssued { code: String, expires_in: Duration },
    /// One countdown step elapsed.
    Tick { remaining: Duration },
    /// A status poll failed; polling continues.
    PollFailed { message: String },
    /// The external account is linked. Timers have stopped.
    Linked { link: AccountLink },
    /// The code ran out. A new one can be requested.
    Expired,
    /// The dismiss delay after `Linked` elapsed.
    Dismissed,
    /// The session was closed by its owner.
    Closed,
}

/// Owns a [`LinkSession`] and the timers that drive it.
pub struct LinkController<A: LinkApi + 'static> {
    api: Arc<A>,
    platform: Platform,
    user_id: String,
    timings: SessionTimings,
    session: Arc<Mutex<LinkSession>>,
    events: broadcast::Sender<SessionEvent>,
    driver: Option<Driver>,
    closed: bool,
}

struct Driver {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl<A: LinkApi + 'static> LinkController<A> {
    pub fn new(
        api: A,
        platform: Platform,
        user_id: impl Into<String>,
        timings: SessionTimings,
    ) -> Result<Self> {
        timings.validate()?;
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(LinkError::Config(
                "a user ID is required to check link status".to_string(),
            ));
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            api: Arc::new(api),
            platform,
            user_id,
            timings,
            session: Arc::new(Mutex::new(LinkSession::new(timings.expires_in))),
            events,
            driver: None,
            closed: false,
        })
    }

    /// Receive events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().snapshot()
    }

    pub fn status(&self) -> LinkStatus {
        self.session.lock().status()
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Request a link code and start the countdown and polling.
    ///
    /// Allowed while `Idle` (including retrying after a failed attempt) and
    /// after `Expired`, which discards the old code first. A failure is
    /// returned as `LinkError::CodeGeneration` and leaves the session `Idle`;
    /// nothing is retried automatically.
    pub async fn generate_code(&mut self) -> Result<LinkCode> {
        if self.closed {
            return Err(LinkError::InvalidTransition(
                "session has been closed".to_string(),
            ));
        }

        match self.status() {
            LinkStatus::Idle => {}
            LinkStatus::Expired => self.renew().await?,
            status => {
                return Err(LinkError::InvalidTransition(format!(
                    "a code cannot be requested while {status}"
                )));
            }
        }

        let code = match self.api.generate_link_code().await {
            Ok(code) => code,
            Err(e) => {
                let err = match e {
                    LinkError::CodeGeneration(_) => e,
                    other => LinkError::CodeGeneration(other.to_string()),
                };
                warn!("{err}");
                self.session.lock().record_failure(err.to_string());
                return Err(err);
            }
        };

        if let Some(hint) = code.expires_in
            && hint != self.timings.expires_in
        {
            debug!(
                server_secs = hint.as_secs(),
                local_secs = self.timings.expires_in.as_secs(),
                "server expiry hint differs from configured expiry"
            );
        }

        self.session.lock().begin(code.clone(), Timestamp::now())?;
        info!(platform = %self.platform, "link code issued");
        let _ = self.events.send(SessionEvent::CodeIssued {
            code: code.code.clone(),
            expires_in: self.timings.expires_in,
        });

        self.spawn_driver();
        Ok(code)
    }

    /// Discard an expired code and return to `Idle`.
    ///
    /// Only valid after `Expired`; the next `generate_code` starts a fresh
    /// cycle.
    pub async fn renew(&mut self) -> Result<()> {
        if self.closed {
            return Err(LinkError::InvalidTransition(
                "session has been closed".to_string(),
            ));
        }
        self.session.lock().renew()?;
        self.stop_driver().await;
        debug!("expired code discarded");
        Ok(())
    }

    /// Run a single status check outside the poll timer.
    ///
    /// Same semantics as a timer-driven poll: errors are reported as
    /// `PollTransient` and never change the session. Fails once the
    /// controller is closed.
    pub async fn poll_status(&self) -> Result<LinkPoll> {
        if self.closed {
            return Err(LinkError::InvalidTransition(
                "session has been closed".to_string(),
            ));
        }
        let result = self.api.check_link_status(&self.user_id).await;
        self.context().report(result)
    }

    /// Wait until the background task finishes (dismissed after a link, or
    /// expired) and return the final status.
    pub async fn wait(&mut self) -> LinkStatus {
        if let Some(driver) = self.driver.take() {
            let _ = driver.handle.await;
        }
        self.status()
    }

    /// Stop both timers and discard the session.
    ///
    /// No request is sent to the server; the code simply expires there.
    /// Once this returns, no further state changes or events happen.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.stop_driver().await;
        self.closed = true;
        debug!("link session closed");
        let _ = self.events.send(SessionEvent::Closed);
    }

    async fn stop_driver(&mut self) {
        let Some(mut driver) = self.driver.take() else {
            return;
        };
        if let Some(shutdown) = driver.shutdown.take() {
            let _ = shutdown.send(());
        }
        driver.handle.abort();
        let _ = driver.handle.await;
    }

    fn context(&self) -> DriverContext<A> {
        DriverContext {
            api: Arc::clone(&self.api),
            platform: self.platform.clone(),
            user_id: self.user_id.clone(),
            timings: self.timings,
            session: Arc::clone(&self.session),
            events: self.events.clone(),
        }
    }

    fn spawn_driver(&mut self) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let context = self.context();
        let handle = tokio::spawn(async move {
            context.run(shutdown_rx).await;
        });
        self.driver = Some(Driver {
            shutdown: Some(shutdown_tx),
            handle,
        });
    }
}

impl<A: LinkApi + 'static> Drop for LinkController<A> {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.handle.abort();
        }
    }
}

/// Everything the background task needs, detached from the controller.
struct DriverContext<A: LinkApi + 'static> {
    api: Arc<A>,
    platform: Platform,
    user_id: String,
    timings: SessionTimings,
    session: Arc<Mutex<LinkSession>>,
    events: broadcast::Sender<SessionEvent>,
}

type PollFuture = BoxFuture<'static, Result<LinkStatusReport>>;

impl<A: LinkApi + 'static> DriverContext<A> {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let SessionTimings {
            tick_interval,
            poll_interval,
            dismiss_delay,
            ..
        } = self.timings;

        let start = Instant::now();
        let mut countdown = interval_at(start + tick_interval, tick_interval);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poller = interval_at(start + poll_interval, poll_interval);
        poller.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut in_flight: Option<PollFuture> = None;

        // Branch order matters: a finished poll is looked at before a
        // countdown tick that became ready in the same turn.
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => return,

                Some(result) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                    in_flight = None;
                    if matches!(self.report(result), Ok(LinkPoll::Linked(_))) {
                        break;
                    }
                }

                _ = countdown.tick() => {
                    let expiring = self.session.lock().would_expire(tick_interval);
                    if expiring && let Some(pending) = in_flight.take() {
                        // Give the outstanding poll a chance to report a link
                        // before the code is declared expired.
                        if matches!(self.report(pending.await), Ok(LinkPoll::Linked(_))) {
                            break;
                        }
                    }

                    let (status, remaining) = {
                        let mut session = self.session.lock();
                        let status = session.tick(tick_interval);
                        (status, session.remaining())
                    };
                    match status {
                        LinkStatus::Pending => {
                            let _ = self.events.send(SessionEvent::Tick { remaining });
                        }
                        LinkStatus::Expired => {
                            info!("link code expired");
                            let _ = self.events.send(SessionEvent::Tick { remaining });
                            let _ = self.events.send(SessionEvent::Expired);
                            return;
                        }
                        // Linked through `poll_status` outside the timers
                        LinkStatus::Linked => break,
                        LinkStatus::Idle => return,
                    }
                }

                _ = poller.tick(), if in_flight.is_none() => {
                    if self.session.lock().status() == LinkStatus::Linked {
                        break;
                    }
                    in_flight = Some(self.start_poll());
                }
            }
        }

        // Linked: both timers are dropped here; only the dismiss delay remains.
        drop(countdown);
        drop(poller);
        tokio::select! {
            biased;
            _ = &mut shutdown => {}
            _ = tokio::time::sleep(dismiss_delay) => {
                let _ = self.events.send(SessionEvent::Dismissed);
            }
        }
    }

    fn start_poll(&self) -> PollFuture {
        let api = Arc::clone(&self.api);
        let user_id = self.user_id.clone();
        Box::pin(async move { api.check_link_status(&user_id).await })
    }

    /// Apply a poll result and publish what happened.
    fn report(&self, result: Result<LinkStatusReport>) -> Result<LinkPoll> {
        let outcome = self.apply_poll(result);
        match &outcome {
            Ok(LinkPoll::Linked(link)) => {
                let _ = self.events.send(SessionEvent::Linked { link: link.clone() });
            }
            Ok(LinkPoll::Pending) => {}
            Err(e) => {
                let _ = self.events.send(SessionEvent::PollFailed {
                    message: e.to_string(),
                });
            }
        }
        outcome
    }

    fn apply_poll(&self, result: Result<LinkStatusReport>) -> Result<LinkPoll> {
        match result {
            Ok(report) => {
                let outcome = self.session.lock().apply_poll(&report, &self.platform);
                if let LinkPoll::Linked(link) = &outcome {
                    info!(
                        platform = %link.platform,
                        account = %link.display_name(),
                        "external account linked"
                    );
                }
                Ok(outcome)
            }
            Err(e) => {
                let err = match e {
                    LinkError::PollTransient(_) => e,
                    other => LinkError::PollTransient(other.to_string()),
                };
                debug!("{err}");
                Err(err)
            }
        }
    }
}
