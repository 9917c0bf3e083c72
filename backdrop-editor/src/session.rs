//! Editor session state.
//!
//! `EditorSession` owns the uploaded images, the ordered text layers, the
//! active selection and the surface filters. Every mutation goes through a
//! method here so layer positions are recomputed from slider values before
//! anything can be drawn.

use backdrop_api::{LayerId, SurfaceFilters, TextLayer};
use backdrop_render::{Frame, SelectionStyle};
use image::RgbaImage;

use crate::coords::{clamp_slider, to_absolute};

#[derive(Debug, Clone)]
pub struct EditorSession {
    base: Option<RgbaImage>,
    cutout: Option<RgbaImage>,
    layers: Vec<TextLayer>,
    active: usize,
    filters: SurfaceFilters,
    next_id: u64,
    revision: u64,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    /// A fresh session with one default layer, selected.
    pub fn new() -> Self {
        let mut session = Self {
            base: None,
            cutout: None,
            layers: Vec::new(),
            active: 0,
            filters: SurfaceFilters::default(),
            next_id: 1,
            revision: 0,
        };
        let id = session.allocate_id();
        session.layers.push(TextLayer::new(id));
        session.recompute_positions();
        session
    }

    fn allocate_id(&mut self) -> LayerId {
        let id = LayerId(self.next_id);
        self.next_id += 1;
        id
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn layers(&self) -> &[TextLayer] {
        &self.layers
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_layer(&self) -> Option<&TextLayer> {
        self.layers.get(self.active)
    }

    pub fn active_id(&self) -> Option<LayerId> {
        self.active_layer().map(|l| l.id)
    }

    pub fn filters(&self) -> &SurfaceFilters {
        &self.filters
    }

    pub fn base(&self) -> Option<&RgbaImage> {
        self.base.as_ref()
    }

    pub fn cutout(&self) -> Option<&RgbaImage> {
        self.cutout.as_ref()
    }

    /// Bumped by every mutation that changed something.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Pixel size of the loaded image.
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.base.as_ref().map(|b| b.dimensions())
    }

    /// Borrow the current state as a compositor frame.
    pub fn frame<'a>(&'a self, selection: &'a SelectionStyle) -> Frame<'a> {
        Frame {
            base: self.base.as_ref(),
            cutout: self.cutout.as_ref(),
            layers: &self.layers,
            filters: &self.filters,
            active: self.active_id(),
            selection,
        }
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Install a new image pair. Dimensions are checked by the caller.
    pub fn load_images(&mut self, base: RgbaImage, cutout: RgbaImage) {
        self.base = Some(base);
        self.cutout = Some(cutout);
        self.recompute_positions();
    }

    /// Append a default layer and select it.
    pub fn add_text(&mut self) -> LayerId {
        let id = self.allocate_id();
        self.layers.push(TextLayer::new(id));
        self.active = self.layers.len() - 1;
        self.recompute_positions();
        id
    }

    /// Remove the active layer. The last remaining layer is never removed.
    pub fn delete_text(&mut self) -> bool {
        if self.layers.len() <= 1 {
            return false;
        }
        self.layers.remove(self.active);
        self.active = self.active.min(self.layers.len() - 1);
        self.recompute_positions();
        true
    }

    /// Copy the active layer directly above itself and select the copy.
    pub fn duplicate_text(&mut self) -> Option<LayerId> {
        let mut copy = self.active_layer()?.clone();
        copy.id = self.allocate_id();
        let id = copy.id;
        self.active += 1;
        self.layers.insert(self.active, copy);
        self.recompute_positions();
        Some(id)
    }

    /// Swap the active layer with the next one (painted later).
    pub fn move_layer_up(&mut self) -> bool {
        if self.active + 1 >= self.layers.len() {
            return false;
        }
        self.layers.swap(self.active, self.active + 1);
        self.active += 1;
        self.recompute_positions();
        true
    }

    /// Swap the active layer with the previous one (painted earlier).
    pub fn move_layer_down(&mut self) -> bool {
        if self.active == 0 || self.layers.is_empty() {
            return false;
        }
        self.layers.swap(self.active, self.active - 1);
        self.active -= 1;
        self.recompute_positions();
        true
    }

    pub fn select_layer(&mut self, index: usize) -> bool {
        if index >= self.layers.len() {
            return false;
        }
        self.active = index;
        self.recompute_positions();
        true
    }

    pub fn select_id(&mut self, id: LayerId) -> bool {
        match self.layers.iter().position(|l| l.id == id) {
            Some(index) => self.select_layer(index),
            None => false,
        }
    }

    /// Edit the active layer in place.
    ///
    /// The layer id is preserved and slider values are clamped afterwards.
    pub fn update_active<R>(&mut self, f: impl FnOnce(&mut TextLayer) -> R) -> Option<R> {
        let layer = self.layers.get_mut(self.active)?;
        let id = layer.id;
        let result = f(layer);
        layer.id = id;
        layer.slider_x = clamp_slider(layer.slider_x);
        layer.slider_y = clamp_slider(layer.slider_y);
        self.recompute_positions();
        Some(result)
    }

    /// Set the active layer's slider position.
    pub fn set_slider(&mut self, slider_x: f32, slider_y: f32) -> bool {
        self.update_active(|layer| {
            layer.slider_x = slider_x;
            layer.slider_y = slider_y;
        })
        .is_some()
    }

    pub fn set_filters(&mut self, filters: SurfaceFilters) {
        self.filters = filters;
        self.revision += 1;
    }

    /// Return to the initial state: no images, one default layer.
    pub fn reset(&mut self) {
        let revision = self.revision;
        *self = Self::new();
        self.revision = revision + 1;
    }

    /// Recompute every layer's position from its sliders and the image size.
    ///
    /// Without an image the surface is treated as zero-sized, so positions
    /// collapse to the origin until one is loaded.
    fn recompute_positions(&mut self) {
        self.revision += 1;
        let (width, height) = self.surface_size().unwrap_or((0, 0));
        for layer in &mut self.layers {
            layer.position = to_absolute(layer.slider_x, layer.slider_y, width, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backdrop_api::Point;

    fn loaded(width: u32, height: u32) -> EditorSession {
        let mut s = EditorSession::new();
        s.load_images(RgbaImage::new(width, height), RgbaImage::new(width, height));
        s
    }

    #[test]
    fn starts_with_one_selected_layer() {
        let s = EditorSession::new();
        assert_eq!(s.layers().len(), 1);
        assert_eq!(s.active_index(), 0);
        assert_eq!(s.active_id(), Some(LayerId(1)));
        assert!(s.surface_size().is_none());
    }

    #[test]
    fn add_selects_new_layer() {
        let mut s = loaded(100, 100);
        let id = s.add_text();
        assert_eq!(s.layers().len(), 2);
        assert_eq!(s.active_id(), Some(id));
        assert_eq!(s.active_layer().unwrap().position, Point::new(50.0, 50.0));
    }

    #[test]
    fn delete_clamps_active_index() {
        let mut s = loaded(100, 100);
        s.add_text();
        s.add_text();
        assert_eq!(s.active_index(), 2);
        assert!(s.delete_text());
        assert_eq!(s.active_index(), 1);
        assert!(s.delete_text());
        assert_eq!(s.active_index(), 0);
        assert!(!s.delete_text());
        assert_eq!(s.layers().len(), 1);
        assert_eq!(s.active_index(), 0);
    }

    #[test]
    fn delete_from_middle_keeps_index() {
        let mut s = loaded(100, 100);
        let second = s.add_text();
        let third = s.add_text();
        s.select_id(second);
        assert!(s.delete_text());
        assert_eq!(s.active_id(), Some(third));
    }

    #[test]
    fn reorder_moves_selection_with_layer() {
        let mut s = loaded(100, 100);
        let first = s.active_id().unwrap();
        s.add_text();
        s.select_layer(0);
        assert!(s.move_layer_up());
        assert_eq!(s.active_index(), 1);
        assert_eq!(s.active_id(), Some(first));
        assert!(!s.move_layer_up());
        assert!(s.move_layer_down());
        assert_eq!(s.active_index(), 0);
        assert_eq!(s.active_id(), Some(first));
        assert!(!s.move_layer_down());
    }

    #[test]
    fn duplicate_copies_style_with_new_id() {
        let mut s = loaded(100, 100);
        s.update_active(|l| {
            l.content = "copy me".into();
            l.opacity = 0.4;
        });
        let original = s.active_id().unwrap();
        let copy = s.duplicate_text().unwrap();
        assert_ne!(copy, original);
        assert_eq!(s.active_index(), 1);
        let layer = s.active_layer().unwrap();
        assert_eq!(layer.content, "copy me");
        assert_eq!(layer.opacity, 0.4);
    }

    #[test]
    fn update_cannot_change_identity() {
        let mut s = loaded(100, 100);
        let id = s.active_id().unwrap();
        s.update_active(|l| l.id = LayerId(999));
        assert_eq!(s.active_id(), Some(id));
    }

    #[test]
    fn slider_updates_position_and_clamps() {
        let mut s = loaded(200, 100);
        s.set_slider(50.0, 500.0);
        let layer = s.active_layer().unwrap();
        assert_eq!(layer.slider_y, 100.0);
        assert_eq!(layer.position, Point::new(150.0, 100.0));
    }

    #[test]
    fn positions_follow_new_image() {
        let mut s = loaded(100, 100);
        s.set_slider(-50.0, 0.0);
        s.load_images(RgbaImage::new(400, 200), RgbaImage::new(400, 200));
        assert_eq!(s.active_layer().unwrap().position, Point::new(100.0, 100.0));
    }

    #[test]
    fn refused_mutations_keep_revision() {
        let mut s = loaded(100, 100);
        let before = s.revision();
        assert!(!s.delete_text());
        assert!(!s.move_layer_down());
        assert!(!s.select_layer(7));
        assert_eq!(s.revision(), before);
        s.add_text();
        assert!(s.revision() > before);
        let before = s.revision();
        s.reset();
        assert!(s.revision() > before);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut s = loaded(100, 100);
        s.add_text();
        s.set_slider(10.0, 10.0);
        s.reset();
        assert!(s.base().is_none());
        assert_eq!(s.layers().len(), 1);
        assert_eq!(s.layers()[0], TextLayer::new(LayerId(1)));
    }
}
