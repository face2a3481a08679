//! Reactive recomposition.
//!
//! A [`Trigger`] owns the session [`Settings`] behind a `watch` channel and runs two tasks:
//!
//! - the symbol worker, which regenerates the QR bitmap whenever the payload, level, size or
//!   colors change and posts a "bitmap ready" event;
//! - the coordinator, which debounces settings changes and bitmap events, then composites the
//!   latest snapshot.
//!
//! Every composite gets a monotonically increasing token. Image decodes are not cancelled, so
//! a slow composite can finish after a newer one; its frame is dropped unless its token is still
//! the latest one issued.

use crate::compositor::{compose, CompositeResult, Layers};
use crate::decode::{decode_layer, DecodedImage, ImageDecoder, ImageSource};
use crate::error::{Error, Layer, Result};
use crate::settings::Settings;
use crate::symbol::{SymbolRequest, SymbolSource};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Delay used to coalesce bursts of edits into one redraw.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerConfig {
    pub debounce: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        TriggerConfig {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// A published composite and the inputs it reflects.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Token of the composite request that produced this frame.
    pub token: u64,
    /// Settings snapshot the frame was composed from.
    pub settings: Settings,
    pub payload: String,
    pub result: CompositeResult,
    /// User-visible messages about skipped layers.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The symbol generator could not produce anything.
    Unavailable,
    /// The payload does not fit the chosen error-correction level.
    Rejected,
}

/// Why no frame can be shown for a symbol request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub request: SymbolRequest,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    fn from_error(request: SymbolRequest, err: &Error) -> Self {
        let kind = match err {
            Error::InvalidPayload(_) => FailureKind::Rejected,
            _ => FailureKind::Unavailable,
        };
        let message = match err {
            Error::InvalidPayload(detail) | Error::SymbolSourceUnavailable(detail) => detail.clone(),
            other => other.to_string(),
        };
        Failure {
            request,
            kind,
            message,
        }
    }

    pub fn to_error(&self) -> Error {
        match self.kind {
            FailureKind::Rejected => Error::InvalidPayload(self.message.clone()),
            FailureKind::Unavailable => Error::SymbolSourceUnavailable(self.message.clone()),
        }
    }
}

/// What the preview currently shows.
#[derive(Debug, Clone, Default)]
pub enum FrameState {
    /// Nothing composited yet.
    #[default]
    Pending,
    Ready(Arc<Frame>),
    /// A placeholder with a status message; export is disabled.
    Failed(Arc<Failure>),
}

impl FrameState {
    pub fn frame(&self) -> Option<&Arc<Frame>> {
        match self {
            FrameState::Ready(frame) => Some(frame),
            _ => None,
        }
    }

    /// Export is allowed only with a ready frame for a non-empty payload.
    pub fn can_export(&self) -> bool {
        self.frame().is_some_and(|frame| !frame.payload.is_empty())
    }

    /// Status line for the user, if any.
    pub fn status_message(&self) -> Option<String> {
        match self {
            FrameState::Pending => None,
            FrameState::Ready(frame) => {
                (!frame.warnings.is_empty()).then(|| frame.warnings.join("; "))
            }
            FrameState::Failed(failure) => Some(failure.to_error().to_string()),
        }
    }

    fn reflects(&self, settings: &Settings, request: &SymbolRequest) -> bool {
        match self {
            FrameState::Pending => false,
            FrameState::Ready(frame) => frame.settings == *settings,
            FrameState::Failed(failure) => failure.request == *request,
        }
    }
}

/// Handle to a running recomposition loop.
///
/// Dropping the handle stops both background tasks.
pub struct Trigger {
    settings: watch::Sender<Settings>,
    frames: watch::Receiver<FrameState>,
    tasks: Vec<JoinHandle<()>>,
}

impl Trigger {
    /// Starts the symbol worker and coordinator for `settings`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(
        settings: Settings,
        source: Arc<dyn SymbolSource>,
        decoder: Arc<dyn ImageDecoder>,
        config: TriggerConfig,
    ) -> Self {
        let (settings_tx, settings_rx) = watch::channel(settings);
        let (frames_tx, frames_rx) = watch::channel(FrameState::Pending);
        let (symbol_tx, symbol_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_symbol_worker(settings_rx.clone(), source, symbol_tx));
        let coordinator = Coordinator {
            settings_rx,
            symbol_rx,
            frames_tx,
            done_tx,
            done_rx,
            decoder,
            debounce: config.debounce,
            symbol: None,
            issued: 0,
        };
        let coordinator = tokio::spawn(coordinator.run());

        Trigger {
            settings: settings_tx,
            frames: frames_rx,
            tasks: vec![worker, coordinator],
        }
    }

    /// Applies a mutation to the settings and schedules a recompute.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) {
        self.settings.send_modify(mutate);
    }

    /// Replaces the settings wholesale and schedules a recompute.
    pub fn replace(&self, settings: Settings) {
        self.settings.send_replace(settings);
    }

    /// A copy of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn current(&self) -> FrameState {
        self.frames.borrow().clone()
    }

    /// Receiver that observes every published [`FrameState`].
    pub fn subscribe(&self) -> watch::Receiver<FrameState> {
        self.frames.clone()
    }

    /// Waits until the published state reflects the current settings.
    ///
    /// The settings are re-read on every published state, so edits made while waiting move
    /// the target instead of leaving it on a snapshot the debounce may skip.
    ///
    /// # Errors
    ///
    /// The symbol failure for the current settings, or
    /// [`Error::SymbolSourceUnavailable`] if the loop has stopped.
    pub async fn settled(&self) -> Result<Arc<Frame>> {
        let mut frames = self.frames.clone();
        let state = frames
            .wait_for(|state| {
                let target = self.settings.borrow();
                state.reflects(&target, &SymbolRequest::from_settings(&target))
            })
            .await
            .map_err(|_| Error::SymbolSourceUnavailable("compositor stopped".to_string()))?
            .clone();
        match state {
            FrameState::Ready(frame) => Ok(frame),
            FrameState::Failed(failure) => Err(failure.to_error()),
            FrameState::Pending => Err(Error::ExportUnavailable),
        }
    }

    /// Encodes the current frame as PNG.
    ///
    /// # Errors
    ///
    /// [`Error::ExportUnavailable`] when no valid frame exists.
    pub fn export_png(&self) -> Result<Vec<u8>> {
        let state = self.current();
        match state.frame() {
            Some(frame) if state.can_export() => crate::export::encode_png(&frame.result),
            _ => Err(Error::ExportUnavailable),
        }
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[derive(Debug)]
struct SymbolEvent {
    request: SymbolRequest,
    outcome: std::result::Result<Arc<RgbaImage>, Failure>,
}

async fn run_symbol_worker(
    mut settings_rx: watch::Receiver<Settings>,
    source: Arc<dyn SymbolSource>,
    events: mpsc::UnboundedSender<SymbolEvent>,
) {
    let mut last: Option<SymbolRequest> = None;
    loop {
        let request = SymbolRequest::from_settings(&settings_rx.borrow_and_update());
        if last.as_ref() != Some(&request) {
            debug!("Regenerating symbol for payload {:?}", request.payload);
            let render_source = Arc::clone(&source);
            let render_request = request.clone();
            let rendered = tokio::task::spawn_blocking(move || render_source.render(&render_request))
                .await
                .unwrap_or_else(|err| Err(Error::SymbolSourceUnavailable(err.to_string())));
            let outcome = rendered.map(Arc::new).map_err(|err| {
                warn!("Symbol generation failed: {err}");
                Failure::from_error(request.clone(), &err)
            });
            let event = SymbolEvent {
                request: request.clone(),
                outcome,
            };
            if events.send(event).is_err() {
                break;
            }
            last = Some(request);
        }
        if settings_rx.changed().await.is_err() {
            break;
        }
    }
    debug!("Symbol worker stopped");
}

struct Completed {
    token: u64,
    frame: Frame,
}

struct Coordinator {
    settings_rx: watch::Receiver<Settings>,
    symbol_rx: mpsc::UnboundedReceiver<SymbolEvent>,
    frames_tx: watch::Sender<FrameState>,
    done_tx: mpsc::UnboundedSender<Completed>,
    done_rx: mpsc::UnboundedReceiver<Completed>,
    decoder: Arc<dyn ImageDecoder>,
    debounce: Duration,
    /// Latest bitmap event from the symbol worker.
    symbol: Option<SymbolEvent>,
    /// Token of the most recently started composite.
    issued: u64,
}

impl Coordinator {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;
        loop {
            tokio::select! {
                changed = self.settings_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    deadline = Some(Instant::now() + self.debounce);
                }
                event = self.symbol_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    self.symbol = Some(event);
                    deadline = Some(Instant::now() + self.debounce);
                }
                Some(done) = self.done_rx.recv() => self.publish(done),
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.start_composite();
                }
            }
        }
        debug!("Coordinator stopped");
    }

    fn start_composite(&mut self) {
        let settings = self.settings_rx.borrow().clone();
        let wanted = SymbolRequest::from_settings(&settings);
        let symbol = match &self.symbol {
            Some(event) if event.request == wanted => &event.outcome,
            _ => {
                debug!("Symbol not regenerated yet, waiting for bitmap");
                return;
            }
        };

        self.issued += 1;
        let token = self.issued;
        let bitmap = match symbol {
            Ok(bitmap) => Arc::clone(bitmap),
            Err(failure) => {
                self.frames_tx
                    .send_replace(FrameState::Failed(Arc::new(failure.clone())));
                return;
            }
        };

        debug!("Starting composite {token}");
        let decoder = Arc::clone(&self.decoder);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let background = settings.style.active_background_image().cloned();
            let logo = settings.logo.image.clone();
            let (background, logo) = tokio::join!(
                load_layer(Arc::clone(&decoder), Layer::Background, background),
                load_layer(decoder, Layer::Logo, logo),
            );

            let mut warnings = Vec::new();
            let background = keep_loaded(background, &mut warnings);
            let logo = keep_loaded(logo, &mut warnings);

            let composed = tokio::task::spawn_blocking(move || {
                let layers = Layers {
                    symbol: &bitmap,
                    background: background.as_ref(),
                    logo: logo.as_ref(),
                };
                let result = compose(&settings, &layers);
                (settings, result)
            })
            .await;

            match composed {
                Ok((settings, result)) => {
                    let frame = Frame {
                        token,
                        payload: settings.payload(),
                        settings,
                        result,
                        warnings,
                    };
                    let _ = done_tx.send(Completed { token, frame });
                }
                Err(err) => error!("Composite {token} did not finish: {err}"),
            }
        });
    }

    fn publish(&mut self, done: Completed) {
        if done.token != self.issued {
            debug!(
                "Discarding stale composite {}, latest is {}",
                done.token, self.issued
            );
            return;
        }
        debug!("Publishing composite {}", done.token);
        if !done.frame.warnings.is_empty() {
            info!("Composite {} skipped layers: {:?}", done.token, done.frame.warnings);
        }
        self.frames_tx
            .send_replace(FrameState::Ready(Arc::new(done.frame)));
    }
}

async fn load_layer(
    decoder: Arc<dyn ImageDecoder>,
    layer: Layer,
    source: Option<ImageSource>,
) -> Option<Result<DecodedImage>> {
    match source {
        Some(source) => Some(decode_layer(decoder, layer, source).await),
        None => None,
    }
}

fn keep_loaded(loaded: Option<Result<DecodedImage>>, warnings: &mut Vec<String>) -> Option<DecodedImage> {
    match loaded? {
        Ok(image) => Some(image),
        Err(err) => {
            warnings.push(err.to_string());
            None
        }
    }
}
