//! Normalized center-format bounding boxes.

use serde::{Deserialize, Serialize};

/// A bounding box in normalized `(x_center, y_center, width, height)` form.
///
/// Like the rest of the model this type is permissive: it will hold values
/// outside `[0, 1]` so that request validation can report them instead of
/// panicking. Use [`NormalizedBox::is_within_unit`] before persisting.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedBox {
    #[inline]
    pub fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Components in label-file column order.
    #[inline]
    pub fn components(&self) -> [f64; 4] {
        [self.x_center, self.y_center, self.width, self.height]
    }

    /// Returns true if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|v| v.is_finite())
    }

    /// Returns true if every component lies in `[0.0, 1.0]`.
    pub fn is_within_unit(&self) -> bool {
        self.components()
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }

    /// Returns true if the box has positive width and height.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}
