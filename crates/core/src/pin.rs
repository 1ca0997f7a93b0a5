//! Pin annotation geometry.
//!
//! The review viewport renders a creative under
//! `translate(pan_x, pan_y) scale(zoom)` with the transform origin at the
//! viewport centre. Pins are stored as percentages of the unscaled image box
//! so they stay attached to the same spot at any zoom level.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Smallest zoom reachable through [`ViewTransform::zoom_out`].
pub const MIN_ZOOM: f64 = 0.3;

/// Largest zoom reachable through [`ViewTransform::zoom_in`].
pub const MAX_ZOOM: f64 = 6.0;

/// Multiplier applied per zoom step.
pub const ZOOM_STEP: f64 = 1.2;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Pin position as percentages (0..=100) of the image box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PinAnnotation {
    pub x: f64,
    pub y: f64,
}

impl PinAnnotation {
    /// Build a pin, rejecting coordinates outside `0..=100`.
    pub fn new(x: f64, y: f64) -> Result<Self, CoreError> {
        let pin = Self { x, y };
        pin.validate()?;
        Ok(pin)
    }

    /// Check that both coordinates are finite and within `0..=100`.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (axis, value) in [("x", self.x), ("y", self.y)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(CoreError::Validation(format!(
                    "pin {axis} must be a percentage between 0 and 100, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Result of mapping a click to image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinPlacement {
    Placed(PinAnnotation),
    /// The click landed outside the rendered image; pin placement is cancelled.
    OutOfBounds,
}

/// Size of a box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Current zoom and pan of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewTransform {
    zoom: f64,
    pan_x: f64,
    pan_y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
        }
    }
}

impl ViewTransform {
    /// `zoom` must be finite and positive; pan offsets must be finite.
    pub fn new(zoom: f64, pan_x: f64, pan_y: f64) -> Result<Self, CoreError> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(CoreError::Validation(format!(
                "zoom must be a positive finite number, got {zoom}"
            )));
        }
        if !pan_x.is_finite() || !pan_y.is_finite() {
            return Err(CoreError::Validation(format!(
                "pan offsets must be finite, got ({pan_x}, {pan_y})"
            )));
        }
        Ok(Self { zoom, pan_x, pan_y })
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> (f64, f64) {
        (self.pan_x, self.pan_y)
    }

    /// One zoom step in, capped at [`MAX_ZOOM`].
    pub fn zoom_in(self) -> Self {
        Self {
            zoom: (self.zoom * ZOOM_STEP).min(MAX_ZOOM),
            ..self
        }
    }

    /// One zoom step out, floored at [`MIN_ZOOM`].
    pub fn zoom_out(self) -> Self {
        Self {
            zoom: (self.zoom / ZOOM_STEP).max(MIN_ZOOM),
            ..self
        }
    }

    /// Shift the pan offset by a drag delta. The resulting offset must stay
    /// finite.
    pub fn pan_by(self, dx: f64, dy: f64) -> Result<Self, CoreError> {
        Self::new(self.zoom, self.pan_x + dx, self.pan_y + dy)
    }

    pub fn reset(self) -> Self {
        Self::default()
    }

    /// Clamp the pan so the scaled content cannot be dragged past its edges.
    ///
    /// At `zoom <= 1` the content fits and pan is forced to `(0, 0)`.
    pub fn clamp_pan(self, content: Size, viewport: Size) -> Self {
        if self.zoom <= 1.0 {
            return Self {
                pan_x: 0.0,
                pan_y: 0.0,
                ..self
            };
        }

        let max_x = ((content.width * self.zoom - viewport.width) / 2.0).max(0.0);
        let max_y = ((content.height * self.zoom - viewport.height) / 2.0).max(0.0);

        Self {
            pan_x: self.pan_x.clamp(-max_x, max_x),
            pan_y: self.pan_y.clamp(-max_y, max_y),
            ..self
        }
    }
}

/// Where a marker goes inside the transformed viewport, as CSS percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkerPosition {
    pub left_percent: f64,
    pub top_percent: f64,
}

// ---------------------------------------------------------------------------
// Mapping
// ---------------------------------------------------------------------------

/// Round half up to one decimal place.
fn round_tenth(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

/// Map a click in viewport pixels to image percentages.
pub fn to_percent(
    click_x: f64,
    click_y: f64,
    viewport: Size,
    transform: &ViewTransform,
) -> PinPlacement {
    let cx = viewport.width / 2.0;
    let cy = viewport.height / 2.0;

    let ux = click_x - transform.pan_x;
    let uy = click_y - transform.pan_y;

    let img_x = (ux - cx) / transform.zoom + cx;
    let img_y = (uy - cy) / transform.zoom + cy;

    let x = round_tenth(img_x / viewport.width * 100.0);
    let y = round_tenth(img_y / viewport.height * 100.0);

    if !(0.0..=100.0).contains(&x) || !(0.0..=100.0).contains(&y) {
        return PinPlacement::OutOfBounds;
    }

    PinPlacement::Placed(PinAnnotation { x, y })
}

/// Marker placement for a stored pin.
///
/// The marker is a child of the transformed viewport, so it inherits pan and
/// zoom and is positioned at the stored percentages unchanged.
pub fn marker_position(pin: &PinAnnotation) -> MarkerPosition {
    MarkerPosition {
        left_percent: pin.x,
        top_percent: pin.y,
    }
}

/// Screen position of a stored pin in viewport pixels, for hit-testing.
pub fn to_viewport_pixels(
    pin: &PinAnnotation,
    viewport: Size,
    transform: &ViewTransform,
) -> (f64, f64) {
    let cx = viewport.width / 2.0;
    let cy = viewport.height / 2.0;

    let img_x = pin.x / 100.0 * viewport.width;
    let img_y = pin.y / 100.0 * viewport.height;

    (
        (img_x - cx) * transform.zoom + cx + transform.pan_x,
        (img_y - cy) * transform.zoom + cy + transform.pan_y,
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const VIEWPORT: Size = Size {
        width: 800.0,
        height: 600.0,
    };

    fn placed(placement: PinPlacement) -> PinAnnotation {
        match placement {
            PinPlacement::Placed(pin) => pin,
            PinPlacement::OutOfBounds => panic!("expected a placed pin"),
        }
    }

    // -- to_percent ---------------------------------------------------------

    #[test]
    fn centre_click_at_identity_is_fifty_fifty() {
        let pin = placed(to_percent(400.0, 300.0, VIEWPORT, &ViewTransform::default()));
        assert_eq!(pin, PinAnnotation { x: 50.0, y: 50.0 });
    }

    #[test]
    fn click_left_of_viewport_is_out_of_bounds() {
        let placement = to_percent(-5.0, 10.0, VIEWPORT, &ViewTransform::default());
        assert_matches!(placement, PinPlacement::OutOfBounds);
    }

    #[test]
    fn click_below_viewport_is_out_of_bounds() {
        let placement = to_percent(10.0, 650.0, VIEWPORT, &ViewTransform::default());
        assert_matches!(placement, PinPlacement::OutOfBounds);
    }

    #[test]
    fn corners_are_in_bounds() {
        let t = ViewTransform::default();
        assert_eq!(
            placed(to_percent(0.0, 0.0, VIEWPORT, &t)),
            PinAnnotation { x: 0.0, y: 0.0 }
        );
        assert_eq!(
            placed(to_percent(800.0, 600.0, VIEWPORT, &t)),
            PinAnnotation { x: 100.0, y: 100.0 }
        );
    }

    #[test]
    fn zoom_scales_about_the_centre() {
        let t = ViewTransform::new(2.0, 0.0, 0.0).unwrap();
        // Viewport corner at 2x zoom shows the image point a quarter in.
        let pin = placed(to_percent(0.0, 0.0, VIEWPORT, &t));
        assert_eq!(pin, PinAnnotation { x: 25.0, y: 25.0 });
        // The centre is a fixed point of the scale.
        let pin = placed(to_percent(400.0, 300.0, VIEWPORT, &t));
        assert_eq!(pin, PinAnnotation { x: 50.0, y: 50.0 });
    }

    #[test]
    fn pan_is_removed_before_unscaling() {
        let t = ViewTransform::new(2.0, 100.0, -60.0).unwrap();
        // (500, 240) - pan = (400, 300), the centre.
        let pin = placed(to_percent(500.0, 240.0, VIEWPORT, &t));
        assert_eq!(pin, PinAnnotation { x: 50.0, y: 50.0 });
    }

    #[test]
    fn zoomed_out_click_outside_image_is_out_of_bounds() {
        let t = ViewTransform::new(0.5, 0.0, 0.0).unwrap();
        // The image occupies 200..600 horizontally at half zoom.
        assert_matches!(to_percent(150.0, 300.0, VIEWPORT, &t), PinPlacement::OutOfBounds);
        assert_matches!(to_percent(250.0, 300.0, VIEWPORT, &t), PinPlacement::Placed(_));
    }

    #[test]
    fn percentages_are_rounded_to_one_decimal() {
        let pin = placed(to_percent(123.0, 77.0, VIEWPORT, &ViewTransform::default()));
        // 123 / 800 = 15.375%, 77 / 600 = 12.8333%
        assert_eq!(pin, PinAnnotation { x: 15.4, y: 12.8 });
    }

    #[test]
    fn tiny_negative_rounds_into_bounds() {
        // -0.04% rounds to 0.0 rather than being rejected.
        let pin = placed(to_percent(-0.32, 300.0, VIEWPORT, &ViewTransform::default()));
        assert_eq!(pin.x, 0.0);
    }

    // -- to_viewport_pixels -------------------------------------------------

    #[test]
    fn viewport_pixels_invert_to_percent() {
        let t = ViewTransform::new(1.8, -40.0, 25.0).unwrap();
        let pin = PinAnnotation { x: 62.5, y: 40.0 };
        let (px, py) = to_viewport_pixels(&pin, VIEWPORT, &t);
        assert_eq!(placed(to_percent(px, py, VIEWPORT, &t)), pin);
    }

    #[test]
    fn marker_position_is_identity() {
        let pin = PinAnnotation { x: 12.3, y: 45.6 };
        assert_eq!(
            marker_position(&pin),
            MarkerPosition {
                left_percent: 12.3,
                top_percent: 45.6
            }
        );
    }

    // -- ViewTransform ------------------------------------------------------

    #[test]
    fn zero_zoom_rejected() {
        assert!(ViewTransform::new(0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn nan_zoom_rejected() {
        assert!(ViewTransform::new(f64::NAN, 0.0, 0.0).is_err());
    }

    #[test]
    fn infinite_pan_rejected() {
        assert!(ViewTransform::new(1.0, f64::INFINITY, 0.0).is_err());
    }

    #[test]
    fn zoom_steps_are_bounded() {
        let mut t = ViewTransform::default();
        for _ in 0..50 {
            t = t.zoom_in();
        }
        assert_eq!(t.zoom(), MAX_ZOOM);
        for _ in 0..50 {
            t = t.zoom_out();
        }
        assert_eq!(t.zoom(), MIN_ZOOM);
    }

    #[test]
    fn pan_by_accumulates_drag() {
        let t = ViewTransform::new(2.0, 5.0, -5.0)
            .unwrap()
            .pan_by(10.0, 20.0)
            .unwrap();
        assert_eq!(t.pan(), (15.0, 15.0));
        assert_eq!(t.zoom(), 2.0);
    }

    #[test]
    fn pan_by_rejects_non_finite_delta() {
        let t = ViewTransform::new(2.0, 0.0, 0.0).unwrap();
        assert_matches!(t.pan_by(f64::NAN, 0.0), Err(CoreError::Validation(_)));
        assert!(t.pan_by(0.0, f64::INFINITY).is_err());
        assert!(t.pan_by(f64::MAX, 0.0).unwrap().pan_by(f64::MAX, 0.0).is_err());
    }

    #[test]
    fn reset_restores_identity() {
        let t = ViewTransform::new(3.0, 10.0, 10.0).unwrap().reset();
        assert_eq!(t, ViewTransform::default());
    }

    // -- clamp_pan ----------------------------------------------------------

    #[test]
    fn clamp_pan_forces_origin_when_not_zoomed_in() {
        let t = ViewTransform::new(1.0, 50.0, -50.0).unwrap();
        assert_eq!(t.clamp_pan(VIEWPORT, VIEWPORT).pan(), (0.0, 0.0));
        let t = ViewTransform::new(0.5, 50.0, -50.0).unwrap();
        assert_eq!(t.clamp_pan(VIEWPORT, VIEWPORT).pan(), (0.0, 0.0));
    }

    #[test]
    fn clamp_pan_limits_excursion() {
        // At 2x an 800x600 image is 1600x1200: 400px / 300px of slack per side.
        let t = ViewTransform::new(2.0, 1000.0, -1000.0).unwrap();
        assert_eq!(t.clamp_pan(VIEWPORT, VIEWPORT).pan(), (400.0, -300.0));
    }

    #[test]
    fn clamp_pan_keeps_pan_within_limits() {
        let t = ViewTransform::new(2.0, 120.0, -80.0).unwrap();
        assert_eq!(t.clamp_pan(VIEWPORT, VIEWPORT).pan(), (120.0, -80.0));
    }

    #[test]
    fn clamp_pan_with_small_content_allows_no_pan() {
        let content = Size::new(200.0, 100.0);
        let t = ViewTransform::new(2.0, 30.0, 30.0).unwrap();
        assert_eq!(t.clamp_pan(content, VIEWPORT).pan(), (0.0, 0.0));
    }

    // -- PinAnnotation ------------------------------------------------------

    #[test]
    fn pin_bounds_are_inclusive() {
        assert!(PinAnnotation::new(0.0, 100.0).is_ok());
    }

    #[test]
    fn pin_outside_range_rejected() {
        let err = PinAnnotation::new(100.1, 50.0).unwrap_err();
        assert!(err.to_string().contains("pin x"));
        assert!(PinAnnotation::new(50.0, -1.0).is_err());
        assert!(PinAnnotation::new(f64::NAN, 50.0).is_err());
    }
}
