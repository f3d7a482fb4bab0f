//! Page coordinate normalization.
//!
//! Maps PDF native space (bottom-left origin) to the visible page's
//! top-left origin space and back.

use papersplit_core::BBox;

/// Visible page box and the transform to top-left coordinates.
///
/// Built from the raw MediaBox and optional CropBox arrays, both given as
/// `[x0, y0, x1, y1]` in PDF native space. The visible box is the CropBox
/// clipped to the MediaBox, or the MediaBox when there is no CropBox.
///
/// ```
/// use papersplit_parse::page_geometry::PageGeometry;
///
/// let geo = PageGeometry::new([0.0, 0.0, 612.0, 792.0], None);
/// assert_eq!(geo.height(), 792.0);
/// let (x, y) = geo.normalize_point(72.0, 720.0);
/// assert_eq!((x, y), (72.0, 72.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl PageGeometry {
    pub fn new(media_box: [f64; 4], crop_box: Option<[f64; 4]>) -> Self {
        let media = normalize_rect(media_box);
        let visible = match crop_box.map(normalize_rect) {
            Some(crop) => [
                crop[0].max(media[0]),
                crop[1].max(media[1]),
                crop[2].min(media[2]),
                crop[3].min(media[3]),
            ],
            None => media,
        };
        // A CropBox entirely outside the MediaBox is ignored.
        let [x0, y0, x1, y1] = if visible[2] > visible[0] && visible[3] > visible[1] {
            visible
        } else {
            media
        };
        Self { x0, y0, x1, y1 }
    }

    /// Visible page width.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// Visible page height.
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Transform a point from PDF native space to top-left display space.
    pub fn normalize_point(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.x0, self.y1 - y)
    }

    /// Transform native min/max corners into a top-left [`BBox`].
    pub fn normalize_bbox(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BBox {
        let (x0, y0) = self.normalize_point(min_x, min_y);
        let (x1, y1) = self.normalize_point(max_x, max_y);
        BBox::new(x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
    }

    /// Native-space rectangle `[x0, y0, x1, y1]` covering the full visible
    /// width between two display-space vertical coordinates.
    pub fn native_band(&self, top: f64, bottom: f64) -> [f64; 4] {
        let top = top.clamp(0.0, self.height());
        let bottom = bottom.clamp(top, self.height());
        [self.x0, self.y1 - bottom, self.x1, self.y1 - top]
    }
}

fn normalize_rect(r: [f64; 4]) -> [f64; 4] {
    [r[0].min(r[2]), r[1].min(r[3]), r[0].max(r[2]), r[1].max(r[3])]
}
