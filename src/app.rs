use std::{
    sync::mpsc::{self, TryRecvError},
    thread::JoinHandle,
};

use anyhow::Context as _;
use eframe::egui::{self, Color32, Rect, TextureHandle, TextureOptions};
use tracing::{debug, info, warn};

use crate::{
    artwork::Artwork,
    config::Config,
    display::{DisplayController, Surface},
    fit::FitRect,
    mpd_client::MpdConnector,
    poll::{spawn_poll_thread, DisplayClosed, Publication, Publisher},
};

/// Sends publications into the UI thread's queue and wakes the event loop.
pub struct ChannelPublisher {
    tx: mpsc::Sender<Publication>,
    ctx: egui::Context,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::Sender<Publication>, ctx: egui::Context) -> Self {
        Self { tx, ctx }
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, publication: Publication) -> Result<(), DisplayClosed> {
        self.tx.send(publication).map_err(|_| DisplayClosed)?;
        self.ctx.request_repaint();
        Ok(())
    }
}

/// Draws the artwork as a texture centered in the window. The texture is
/// uploaded once per artwork and scaled by the renderer at paint time.
pub struct EguiSurface {
    ctx: egui::Context,
    viewport: egui::Vec2,
    shown: Option<(Artwork, TextureHandle)>,
    fit: Option<FitRect>,
}

impl EguiSurface {
    pub fn new(ctx: egui::Context, viewport: egui::Vec2) -> Self {
        Self {
            ctx,
            viewport,
            shown: None,
            fit: None,
        }
    }

    pub fn viewport(&self) -> egui::Vec2 {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: egui::Vec2) {
        self.viewport = viewport;
    }

    pub fn texture(&self) -> Option<&TextureHandle> {
        self.shown.as_ref().map(|(_, texture)| texture)
    }

    pub fn fit(&self) -> Option<FitRect> {
        self.fit
    }

    fn paint(&self, painter: &egui::Painter, area: Rect) {
        let (Some((_, texture)), Some(fit)) = (&self.shown, self.fit) else {
            return;
        };
        if fit.is_empty() {
            return;
        }
        let rect = Rect::from_center_size(area.center(), egui::vec2(fit.width, fit.height));
        let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        painter.image(texture.id(), rect, uv, Color32::WHITE);
    }
}

impl Surface for EguiSurface {
    fn container_size(&self) -> (f32, f32) {
        (self.viewport.x, self.viewport.y)
    }

    fn show(&mut self, artwork: &Artwork, fit: FitRect) {
        let max_side = self.ctx.input(|i| i.max_texture_side);
        let [width, height] = artwork.texture_size();
        if width.max(height) > max_side {
            warn!(width, height, max_side, "artwork exceeds the renderer's texture limit");
            self.clear();
            return;
        }

        let uploaded = matches!(&self.shown, Some((shown, _)) if shown.same_image(artwork));
        if !uploaded {
            let texture = self.ctx.load_texture(
                "mpd_art_box.artwork",
                artwork.image().clone(),
                TextureOptions::LINEAR,
            );
            self.shown = Some((artwork.clone(), texture));
        }
        self.fit = Some(fit);
        self.ctx.request_repaint();
    }

    fn clear(&mut self) {
        self.shown = None;
        self.fit = None;
        self.ctx.request_repaint();
    }
}

pub struct ArtBoxApp {
    display: DisplayController<EguiSurface>,
    updates: Option<mpsc::Receiver<Publication>>,
    background: Color32,
    poll_thread: Option<JoinHandle<()>>,
}

impl ArtBoxApp {
    /// Starts the poll thread against the configured daemon.
    pub fn new(cc: &eframe::CreationContext<'_>, config: &Config) -> anyhow::Result<Self> {
        let source = config.art.source()?;
        let (tx, rx) = mpsc::channel();
        let publisher = ChannelPublisher::new(tx, cc.egui_ctx.clone());
        let poll_thread = spawn_poll_thread(
            MpdConnector,
            config.daemon.addr(),
            config.daemon.retry_policy(),
            source,
            publisher,
        )
        .context("Failed to start the mpd poll thread")?;

        let viewport = egui::vec2(config.window.width, config.window.height);
        let mut app = Self::with_receiver(cc.egui_ctx.clone(), rx, viewport, config.window.background);
        app.poll_thread = Some(poll_thread);
        Ok(app)
    }

    pub fn with_receiver(
        ctx: egui::Context,
        updates: mpsc::Receiver<Publication>,
        viewport: egui::Vec2,
        background: Color32,
    ) -> Self {
        Self {
            display: DisplayController::new(EguiSurface::new(ctx, viewport)),
            updates: Some(updates),
            background,
            poll_thread: None,
        }
    }

    pub fn display(&self) -> &DisplayController<EguiSurface> {
        &self.display
    }

    /// Raises a resize when the viewport differs from the last one seen.
    pub fn handle_viewport(&mut self, size: egui::Vec2) {
        if self.display.surface().viewport() == size {
            return;
        }
        debug!(width = size.x, height = size.y, "viewport resized");
        self.display.surface_mut().set_viewport(size);
        self.display.on_resize();
    }

    /// Applies every queued publication in arrival order.
    pub fn drain_publications(&mut self) {
        let mut closed = false;
        if let Some(rx) = self.updates.as_ref() {
            loop {
                match rx.try_recv() {
                    Ok(publication) => self.display.on_published(publication),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        closed = true;
                        break;
                    }
                }
            }
        }

        if closed {
            warn!("poll thread has stopped; artwork will no longer update");
            self.updates = None;
        }
    }
}

impl eframe::App for ArtBoxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let area = ctx.screen_rect();
        self.handle_viewport(area.size());
        self.drain_publications();

        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(self.background))
            .show(ctx, |ui| {
                self.display.surface().paint(ui.painter(), area);
            });
    }
}

impl Drop for ArtBoxApp {
    fn drop(&mut self) {
        // The poll thread may be parked in a blocking idle call; leave it
        // to die with the process.
        if self.poll_thread.take().is_some() {
            info!("window closed, abandoning poll thread");
        }
    }
}
