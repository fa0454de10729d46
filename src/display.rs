use tracing::debug;

use crate::{
    artwork::Artwork,
    fit::{fit, FitRect},
    poll::Publication,
};

/// The piece of the UI toolkit the controller draws into.
pub trait Surface {
    /// Current width and height of the display area.
    fn container_size(&self) -> (f32, f32);

    /// Replace whatever is shown with `artwork` drawn at `fit`.
    fn show(&mut self, artwork: &Artwork, fit: FitRect);

    fn clear(&mut self);
}

/// Owns the most recently published artwork and redraws it whenever new
/// art arrives or the container changes size. Lives on the UI thread.
pub struct DisplayController<S: Surface> {
    surface: S,
    current: Option<Artwork>,
    last_seq: u64,
}

impl<S: Surface> DisplayController<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            current: None,
            last_seq: 0,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn current(&self) -> Option<&Artwork> {
        self.current.as_ref()
    }

    pub fn on_published(&mut self, publication: Publication) {
        if publication.seq <= self.last_seq {
            debug!(
                seq = publication.seq,
                last = self.last_seq,
                "dropping out-of-order publication"
            );
            return;
        }
        self.last_seq = publication.seq;
        self.current = publication.artwork;
        self.render();
    }

    pub fn on_resize(&mut self) {
        if self.current.is_some() {
            self.render();
        }
    }

    fn render(&mut self) {
        match &self.current {
            Some(artwork) => {
                let (width, height) = self.surface.container_size();
                let rect = fit(artwork.aspect(), width, height);
                self.surface.show(artwork, rect);
            }
            None => self.surface.clear(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Drawn {
        Art { size: (usize, usize), fit: (u32, u32) },
        Cleared,
    }

    pub struct RecordingSurface {
        pub size: (f32, f32),
        pub drawn: Vec<Drawn>,
    }

    impl RecordingSurface {
        pub fn new(width: f32, height: f32) -> Self {
            Self {
                size: (width, height),
                drawn: Vec::new(),
            }
        }
    }

    impl Surface for RecordingSurface {
        fn container_size(&self) -> (f32, f32) {
            self.size
        }

        fn show(&mut self, artwork: &Artwork, fit: FitRect) {
            self.drawn.push(Drawn::Art {
                size: (artwork.width(), artwork.height()),
                fit: fit.rounded(),
            });
        }

        fn clear(&mut self) {
            self.drawn.push(Drawn::Cleared);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use eframe::egui::{Color32, ColorImage};

    fn artwork(width: usize, height: usize) -> Artwork {
        Artwork::from_image(ColorImage::new(
            [width, height],
            vec![Color32::WHITE; width * height],
        ))
        .unwrap()
    }

    fn publication(seq: u64, artwork: Option<Artwork>) -> Publication {
        Publication {
            seq,
            track: None,
            artwork,
        }
    }

    #[test]
    fn resize_refits_last_published_art() {
        let mut display = DisplayController::new(RecordingSurface::new(400.0, 400.0));
        display.on_published(publication(1, Some(artwork(20, 10))));

        display.surface_mut().size = (100.0, 100.0);
        display.on_resize();

        assert_eq!(
            display.surface().drawn,
            vec![
                Drawn::Art { size: (20, 10), fit: (400, 200) },
                Drawn::Art { size: (20, 10), fit: (100, 50) },
            ]
        );
    }

    #[test]
    fn resize_without_art_draws_nothing() {
        let mut display = DisplayController::new(RecordingSurface::new(300.0, 300.0));
        display.on_resize();
        display.on_published(publication(1, None));
        display.on_resize();

        assert_eq!(display.surface().drawn, vec![Drawn::Cleared]);
    }

    #[test]
    fn missing_art_clears_previous_image() {
        let mut display = DisplayController::new(RecordingSurface::new(300.0, 300.0));
        display.on_published(publication(1, Some(artwork(4, 4))));
        display.on_published(publication(2, None));

        assert!(display.current().is_none());
        assert_eq!(display.surface().drawn.last(), Some(&Drawn::Cleared));
    }

    #[test]
    fn stale_publication_is_ignored() {
        let mut display = DisplayController::new(RecordingSurface::new(300.0, 300.0));
        display.on_published(publication(2, Some(artwork(4, 4))));
        display.on_published(publication(1, None));

        assert!(display.current().is_some());
        assert_eq!(display.surface().drawn.len(), 1);
    }

    #[test]
    fn zero_sized_container_draws_degenerate_fit() {
        let mut display = DisplayController::new(RecordingSurface::new(0.0, 240.0));
        display.on_published(publication(1, Some(artwork(4, 3))));

        assert_eq!(
            display.surface().drawn,
            vec![Drawn::Art { size: (4, 3), fit: (0, 0) }]
        );
    }
}
