//! Content share controller
//!
//! [`ContentShareController`] is a cheap, clonable handle. Every start, stop
//! and transport callback is funnelled into one [`ContentShareEngine`] task,
//! so transitions are applied strictly one at a time.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::observers::{NotificationDispatcher, ObserverRegistry};
use super::{ContentShareError, ContentShareObserver, ContentShareSource, ContentShareStatus};
use crate::config::{Config, SessionConfig};
use crate::session::MeetingSessionConfiguration;
use crate::turn::{
    default_url_rewriter, TurnCredentials, TurnCredentialsClient, TurnRequestParams, UrlRewriter,
};
use crate::video::{
    ensure_globals_initialized, GraphicsContext, GraphicsContextFactory, StartServiceParams,
    TurnCredentialUpdate, VideoClient, VideoClientDelegate, VideoClientEvent, VideoClientFactory,
    VIDEO_CLIENT_START_OK,
};

const NOTIFICATION_THREAD_NAME: &str = "content-share-observers";

/// Lifecycle of the content share session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentShareState {
    Idle,
    Starting,
    Sharing,
    Stopping,
    Failed,
}

/// External collaborators the controller drives
#[derive(Clone)]
pub struct ContentShareDependencies {
    pub video_client_factory: Arc<dyn VideoClientFactory>,
    pub graphics_context_factory: Arc<dyn GraphicsContextFactory>,
    pub url_rewriter: UrlRewriter,
}

impl ContentShareDependencies {
    pub fn new(
        video_client_factory: Arc<dyn VideoClientFactory>,
        graphics_context_factory: Arc<dyn GraphicsContextFactory>,
    ) -> Self {
        Self {
            video_client_factory,
            graphics_context_factory,
            url_rewriter: default_url_rewriter(),
        }
    }

    pub fn with_url_rewriter(mut self, url_rewriter: UrlRewriter) -> Self {
        self.url_rewriter = url_rewriter;
        self
    }
}

enum ControllerCommand {
    Start {
        source: ContentShareSource,
        done: oneshot::Sender<()>,
    },
    Stop {
        done: oneshot::Sender<()>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

struct TurnResponse {
    client_id: u64,
    credentials: Option<TurnCredentials>,
}

/// The transport session currently owned by the engine
struct ActiveShare {
    client_id: u64,
    share_id: Uuid,
    client: Box<dyn VideoClient>,
    turn_task: Option<JoinHandle<()>>,
}

impl ActiveShare {
    fn abort_turn_request(&mut self) {
        if let Some(task) = self.turn_task.take() {
            task.abort();
        }
    }
}

/// Handle for starting and stopping content share
#[derive(Clone)]
pub struct ContentShareController {
    cmd_tx: mpsc::UnboundedSender<ControllerCommand>,
    observers: Arc<ObserverRegistry<dyn ContentShareObserver>>,
    state_rx: watch::Receiver<ContentShareState>,
}

impl ContentShareController {
    /// Build a controller and its engine without starting the engine.
    ///
    /// `configuration` is the attendee's own meeting configuration; the
    /// `#content` identity is derived from it here. The engine must be driven
    /// with [`ContentShareEngine::run`].
    pub fn new(
        configuration: &MeetingSessionConfiguration,
        config: &Config,
        dependencies: ContentShareDependencies,
    ) -> Result<(Self, ContentShareEngine)> {
        let content_configuration = configuration.content_share_configuration();

        let turn_client = TurnCredentialsClient::new(
            TurnRequestParams::from_configuration(&content_configuration),
            dependencies.url_rewriter.clone(),
            &config.http,
        )
        .context("Failed to create TURN credentials client")?;

        let dispatcher = NotificationDispatcher::spawn(NOTIFICATION_THREAD_NAME)
            .context("Failed to spawn notification thread")?;
        let observers = Arc::new(ObserverRegistry::new(dispatcher));

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ContentShareState::Idle);

        let engine = ContentShareEngine::new(
            content_configuration,
            config.session.clone(),
            dependencies,
            turn_client,
            observers.clone(),
            cmd_rx,
            state_tx,
        );

        Ok((
            Self {
                cmd_tx,
                observers,
                state_rx,
            },
            engine,
        ))
    }

    /// Build a controller and run its engine on the current tokio runtime
    pub fn spawn(
        configuration: &MeetingSessionConfiguration,
        config: &Config,
        dependencies: ContentShareDependencies,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("Content share controller requires a tokio runtime")?;

        let (controller, engine) = Self::new(configuration, config, dependencies)?;
        runtime.spawn(engine.run());
        Ok(controller)
    }

    /// Start sharing `source`, replacing any share in progress.
    ///
    /// Returns once the transport has been asked to start. The outcome is
    /// reported to observers.
    pub async fn start_content_share(&self, source: ContentShareSource) {
        let (done, done_rx) = oneshot::channel();
        self.send(ControllerCommand::Start { source, done }, done_rx)
            .await;
    }

    /// Stop the current share. Returns once the share has been torn down.
    pub async fn stop_content_share(&self) {
        let (done, done_rx) = oneshot::channel();
        self.send(ControllerCommand::Stop { done }, done_rx).await;
    }

    pub fn add_content_share_observer(&self, observer: Arc<dyn ContentShareObserver>) {
        if !self.observers.subscribe(observer) {
            debug!("Content share observer already registered");
        }
    }

    pub fn remove_content_share_observer(&self, observer: &Arc<dyn ContentShareObserver>) {
        if !self.observers.unsubscribe(observer) {
            debug!("Content share observer was not registered");
        }
    }

    pub fn state(&self) -> ContentShareState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ContentShareState> {
        self.state_rx.clone()
    }

    /// Wait until every observer notification raised so far has been delivered
    pub async fn flush_notifications(&self) {
        self.observers.dispatcher().flush().await;
    }

    /// Stop any active share and terminate the engine
    pub async fn shutdown(&self) {
        let (done, done_rx) = oneshot::channel();
        self.send(ControllerCommand::Shutdown { done }, done_rx)
            .await;
    }

    async fn send(&self, cmd: ControllerCommand, done_rx: oneshot::Receiver<()>) {
        if self.cmd_tx.send(cmd).is_err() {
            warn!("Content share engine is not running");
            return;
        }
        let _ = done_rx.await;
    }
}

/// Owns the transport session and applies every state transition
pub struct ContentShareEngine {
    configuration: MeetingSessionConfiguration,
    session_config: SessionConfig,
    video_client_factory: Arc<dyn VideoClientFactory>,
    graphics_context_factory: Arc<dyn GraphicsContextFactory>,
    turn_client: TurnCredentialsClient,
    observers: Arc<ObserverRegistry<dyn ContentShareObserver>>,
    cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    client_tx: mpsc::UnboundedSender<(u64, VideoClientEvent)>,
    client_rx: mpsc::UnboundedReceiver<(u64, VideoClientEvent)>,
    turn_tx: mpsc::UnboundedSender<TurnResponse>,
    turn_rx: mpsc::UnboundedReceiver<TurnResponse>,
    state_tx: watch::Sender<ContentShareState>,
    state: ContentShareState,
    active: Option<ActiveShare>,
    graphics_context: Option<Box<dyn GraphicsContext>>,
    next_client_id: u64,
}

impl ContentShareEngine {
    fn new(
        configuration: MeetingSessionConfiguration,
        session_config: SessionConfig,
        dependencies: ContentShareDependencies,
        turn_client: TurnCredentialsClient,
        observers: Arc<ObserverRegistry<dyn ContentShareObserver>>,
        cmd_rx: mpsc::UnboundedReceiver<ControllerCommand>,
        state_tx: watch::Sender<ContentShareState>,
    ) -> Self {
        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (turn_tx, turn_rx) = mpsc::unbounded_channel();

        Self {
            configuration,
            session_config,
            video_client_factory: dependencies.video_client_factory,
            graphics_context_factory: dependencies.graphics_context_factory,
            turn_client,
            observers,
            cmd_rx,
            client_tx,
            client_rx,
            turn_tx,
            turn_rx,
            state_tx,
            state: ContentShareState::Idle,
            active: None,
            graphics_context: None,
            next_client_id: 0,
        }
    }

    /// Run the engine main loop
    pub async fn run(mut self) {
        info!(
            "Content share engine starting for meeting {}",
            self.configuration.meeting_id
        );

        loop {
            // Transport callbacks already queued are applied before the next
            // command, so a connect reported during start precedes a later stop.
            tokio::select! {
                biased;

                Some((client_id, event)) = self.client_rx.recv() => {
                    self.handle_client_event(client_id, event);
                }

                Some(response) = self.turn_rx.recv() => {
                    self.handle_turn_response(response);
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(ControllerCommand::Start { source, done }) => {
                            self.start_content_share(source).await;
                            let _ = done.send(());
                        }
                        Some(ControllerCommand::Stop { done }) => {
                            self.stop_content_share().await;
                            let _ = done.send(());
                        }
                        Some(ControllerCommand::Shutdown { done }) => {
                            info!("Shutdown command received");
                            self.stop_content_share().await;
                            let _ = done.send(());
                            break;
                        }
                        None => {
                            debug!("All controller handles dropped");
                            self.stop_content_share().await;
                            break;
                        }
                    }
                }
            }
        }

        info!("Content share engine stopped");
    }

    async fn start_content_share(&mut self, source: ContentShareSource) {
        let Some(video_source) = source.video_source else {
            warn!("Content share source has no video source, ignoring start");
            return;
        };

        if self.active.is_some() {
            info!("Replacing active content share");
            self.stop_content_share().await;
        }

        self.set_state(ContentShareState::Starting);

        if self.graphics_context.is_none() {
            match self.graphics_context_factory.create_graphics_context() {
                Ok(context) => self.graphics_context = Some(context),
                Err(e) => {
                    self.fail_start(ContentShareError::GraphicsContext(e.to_string()));
                    return;
                }
            }
        }
        let context_handle = self.graphics_context.as_ref().map(|c| c.handle());

        ensure_globals_initialized(self.video_client_factory.as_ref());

        self.next_client_id += 1;
        let client_id = self.next_client_id;
        let delegate = VideoClientDelegate::new(client_id, self.client_tx.clone());

        let client = match self.video_client_factory.create_video_client(delegate) {
            Ok(client) => client,
            Err(e) => {
                self.fail_start(ContentShareError::ClientCreation(e.to_string()));
                return;
            }
        };

        let params = StartServiceParams {
            meeting_id: self.configuration.meeting_id.clone(),
            join_token: self.configuration.credentials.join_token.clone(),
            flags: self.session_config.video_client_flags(),
            graphics_context: context_handle,
        };

        client.set_receiving(false);
        let result = client.start_service(&params);
        if result != VIDEO_CLIENT_START_OK {
            client.destroy();
            self.fail_start(ContentShareError::StartRejected(result));
            return;
        }

        client.set_external_video_source(video_source, context_handle);
        client.set_sending(true);

        let share_id = Uuid::new_v4();
        info!(
            "Content share {} starting (client {}, flags {:#x})",
            share_id, client_id, params.flags
        );

        self.active = Some(ActiveShare {
            client_id,
            share_id,
            client,
            turn_task: None,
        });
    }

    async fn stop_content_share(&mut self) {
        let Some(mut active) = self.active.take() else {
            debug!("No active content share to stop");
            self.release_graphics_context();
            return;
        };

        info!("Stopping content share {}", active.share_id);
        self.set_state(ContentShareState::Stopping);
        active.abort_turn_request();

        active.client.stop_service();
        let status = self.await_stop_confirmation(&active).await;

        active.client.destroy();
        self.release_graphics_context();
        self.set_state(ContentShareState::Idle);

        info!(
            "Content share {} stopped ({:?})",
            active.share_id, status.status_code
        );
        self.notify_stopped(status);
    }

    /// Wait for the transport to confirm the stop, bounded by the stop timeout
    async fn await_stop_confirmation(&mut self, active: &ActiveShare) -> ContentShareStatus {
        let timeout_ms = self.session_config.stop_timeout_ms;
        let client_rx = &mut self.client_rx;

        let confirmation = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            loop {
                match client_rx.recv().await {
                    Some((id, _)) if id != active.client_id => continue,
                    Some((_, VideoClientEvent::Stopped)) => return ContentShareStatus::ok(),
                    Some((_, VideoClientEvent::Failed { status, .. })) => {
                        warn!("Video client failed while stopping (status {})", status);
                        return ContentShareStatus::video_service_failed();
                    }
                    Some((_, VideoClientEvent::TurnCredentialsRequested)) => {
                        active
                            .client
                            .update_turn_credentials(TurnCredentialUpdate::failure());
                    }
                    Some((_, event)) => debug!("Ignoring {:?} while stopping", event),
                    None => return ContentShareStatus::ok(),
                }
            }
        })
        .await;

        confirmation.unwrap_or_else(|_| {
            warn!("Video client did not confirm stop within {}ms", timeout_ms);
            ContentShareStatus::ok()
        })
    }

    fn handle_client_event(&mut self, client_id: u64, event: VideoClientEvent) {
        let Some(active) = self.active.as_mut() else {
            debug!("Ignoring {:?} from client {}: no active share", event, client_id);
            return;
        };
        if active.client_id != client_id {
            debug!("Ignoring {:?} from stale client {}", event, client_id);
            return;
        }

        match event {
            VideoClientEvent::Connecting => {
                debug!("Content share {} connecting", active.share_id);
            }
            VideoClientEvent::Connected { control_status } => {
                if self.state != ContentShareState::Starting {
                    debug!("Ignoring repeated connect in state {:?}", self.state);
                    return;
                }
                info!(
                    "Content share {} connected (control status {})",
                    active.share_id, control_status
                );
                self.set_state(ContentShareState::Sharing);
                self.observers
                    .notify_all("content share started", |o| o.on_content_share_started());
            }
            VideoClientEvent::Failed {
                status,
                control_status,
            } => {
                error!(
                    "Content share {} failed (status {}, control status {})",
                    active.share_id, status, control_status
                );
                self.teardown();
                self.set_state(ContentShareState::Failed);
                self.notify_stopped(ContentShareStatus::video_service_failed());
            }
            VideoClientEvent::Stopped => {
                info!("Content share {} stopped by transport", active.share_id);
                self.teardown();
                self.set_state(ContentShareState::Idle);
                self.notify_stopped(ContentShareStatus::ok());
            }
            VideoClientEvent::TurnCredentialsRequested => {
                active.abort_turn_request();

                let turn_client = self.turn_client.clone();
                let turn_tx = self.turn_tx.clone();
                active.turn_task = Some(tokio::spawn(async move {
                    let credentials = turn_client.request_credentials().await;
                    let _ = turn_tx.send(TurnResponse {
                        client_id,
                        credentials,
                    });
                }));
            }
        }
    }

    fn handle_turn_response(&mut self, response: TurnResponse) {
        let Some(active) = self.active.as_mut() else {
            debug!("Dropping TURN credentials: no active share");
            return;
        };
        if active.client_id != response.client_id {
            debug!(
                "Dropping TURN credentials for stale client {}",
                response.client_id
            );
            return;
        }
        active.turn_task = None;

        let update = match response.credentials {
            Some(credentials) if active.client.is_active() => TurnCredentialUpdate::available(
                credentials,
                self.turn_client.params().signaling_url.clone(),
            ),
            Some(_) => {
                warn!("Video client no longer active, reporting TURN failure");
                TurnCredentialUpdate::failure()
            }
            None => TurnCredentialUpdate::failure(),
        };

        debug!("Updating TURN credentials ({:?})", update.status);
        active.client.update_turn_credentials(update);
    }

    fn fail_start(&mut self, err: ContentShareError) {
        error!("Failed to start content share: {}", err);
        self.release_graphics_context();
        self.set_state(ContentShareState::Failed);
        self.notify_stopped(ContentShareStatus::video_service_failed());
    }

    /// Drop the active client after the transport ended the session itself
    fn teardown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.abort_turn_request();
            active.client.destroy();
        }
        self.release_graphics_context();
    }

    fn release_graphics_context(&mut self) {
        if let Some(mut context) = self.graphics_context.take() {
            debug!("Releasing graphics context {:?}", context.handle());
            context.release();
        }
    }

    fn notify_stopped(&self, status: ContentShareStatus) {
        self.observers
            .notify_all("content share stopped", move |o| o.on_content_share_stopped(status));
    }

    fn set_state(&mut self, state: ContentShareState) {
        if self.state != state {
            debug!("Content share state {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MeetingSessionCredentials, MeetingSessionUrls};
    use crate::video::{ClientDetails, VideoSink, VideoSource};

    struct NoTransport;

    impl VideoClientFactory for NoTransport {
        fn initialize_globals(&self, _details: &ClientDetails) {}

        fn create_video_client(
            &self,
            _delegate: VideoClientDelegate,
        ) -> anyhow::Result<Box<dyn VideoClient>> {
            anyhow::bail!("no transport in unit tests")
        }
    }

    struct NoGraphics;

    struct Blank;

    impl VideoSource for Blank {
        fn add_video_sink(&self, _sink: Arc<dyn VideoSink>) {}

        fn remove_video_sink(&self, _sink: &Arc<dyn VideoSink>) {}
    }

    impl GraphicsContextFactory for NoGraphics {
        fn create_graphics_context(&self) -> anyhow::Result<Box<dyn GraphicsContext>> {
            anyhow::bail!("no graphics in unit tests")
        }
    }

    fn configuration() -> MeetingSessionConfiguration {
        MeetingSessionConfiguration::new(
            "meeting-1",
            MeetingSessionCredentials {
                attendee_id: "attendee".to_string(),
                external_user_id: "user".to_string(),
                join_token: "token".to_string(),
            },
            MeetingSessionUrls {
                turn_control_url: "http://127.0.0.1:9/turn".to_string(),
                signaling_url: "wss://signal.example.com".to_string(),
                ..Default::default()
            },
        )
    }

    fn dependencies() -> ContentShareDependencies {
        ContentShareDependencies::new(Arc::new(NoTransport), Arc::new(NoGraphics))
    }

    #[test]
    fn test_spawn_requires_runtime() {
        let result = ContentShareController::spawn(&configuration(), &Config::default(), dependencies());
        assert!(result.is_err());
    }

    #[test]
    fn test_engine_uses_content_identity() {
        let (controller, engine) =
            ContentShareController::new(&configuration(), &Config::default(), dependencies()).unwrap();

        assert_eq!(controller.state(), ContentShareState::Idle);
        assert_eq!(engine.configuration.credentials.join_token, "token#content");
        assert_eq!(engine.configuration.credentials.attendee_id, "attendee#content");
        assert_eq!(engine.turn_client.params().join_token, "token#content");
        assert_eq!(engine.turn_client.params().meeting_id, "meeting-1");
    }

    #[tokio::test]
    async fn test_graphics_failure_reports_failed_state() {
        let controller =
            ContentShareController::spawn(&configuration(), &Config::default(), dependencies()).unwrap();

        controller
            .start_content_share(ContentShareSource::from_video_source(Arc::new(Blank)))
            .await;
        assert_eq!(controller.state(), ContentShareState::Failed);

        // Stop from Failed holds nothing and changes nothing
        controller.stop_content_share().await;
        assert_eq!(controller.state(), ContentShareState::Failed);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_commands_after_shutdown_are_ignored() {
        let controller =
            ContentShareController::spawn(&configuration(), &Config::default(), dependencies()).unwrap();
        controller.shutdown().await;

        controller.stop_content_share().await;
        controller.start_content_share(ContentShareSource::empty()).await;
        assert_eq!(controller.state(), ContentShareState::Idle);
    }
}
