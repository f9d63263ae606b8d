//! Range, intensity and noise images
//!
//! Pixel (beam, column) comes from the sample of that beam in the column with
//! that measurement index. Pixels of absent columns keep the sentinel 0.

use std::sync::Arc;

use contracts::{
    DriverMessage, Frame, Header, Image, Metadata, PixelSample, RawColumn, Topic,
};

use tracing::debug;

use crate::metrics::ProcessorMetrics;
use crate::FrameProcessor;

/// Whether a column can be placed in a `beams` x `width` grid
pub(crate) fn column_fits(column: &RawColumn, beams: usize, width: usize) -> bool {
    column.pixels.len() == beams && (column.measurement_id as usize) < width
}

/// Build an image by mapping every pixel sample through `value`
pub fn build_image<T, F>(
    frame: &Frame,
    metadata: &Metadata,
    header: &Header,
    metrics: &ProcessorMetrics,
    value: F,
) -> Image<T>
where
    T: Copy + Default,
    F: Fn(&PixelSample) -> T,
{
    let beams = metadata.beams();
    let width = metadata.columns_per_frame();
    let mut image = Image::new(header.clone(), beams, width);

    let mut placed = vec![false; width];
    let mut skipped = 0u64;
    for column in &frame.columns {
        if !column_fits(column, beams, width) || placed[column.measurement_id as usize] {
            skipped += 1;
            continue;
        }
        let col = column.measurement_id as usize;
        for (beam, px) in column.pixels.iter().enumerate() {
            image.set(beam, col, value(px));
        }
        placed[col] = true;
    }

    let missing = placed.iter().filter(|&&p| !p).count();
    if skipped > 0 {
        debug!(frame_id = frame.id, skipped, "columns left out of image");
    }
    metrics.add_skipped_columns(skipped);
    metrics.add_sentinel_pixels((missing * beams) as u64);
    image
}

/// Range image, millimetres
pub struct RangeImageProcessor {
    metrics: Arc<ProcessorMetrics>,
}

impl RangeImageProcessor {
    pub fn new(metrics: Arc<ProcessorMetrics>) -> Self {
        Self { metrics }
    }
}

impl FrameProcessor for RangeImageProcessor {
    fn topic(&self) -> Topic {
        Topic::RangeImage
    }

    fn process(&self, frame: &Frame, metadata: &Metadata, header: &Header) -> DriverMessage {
        let image = build_image(frame, metadata, header, &self.metrics, |px| px.range_mm);
        DriverMessage::RangeImage(Arc::new(image))
    }
}

/// Intensity image, signal photons
pub struct IntensityImageProcessor {
    metrics: Arc<ProcessorMetrics>,
}

impl IntensityImageProcessor {
    pub fn new(metrics: Arc<ProcessorMetrics>) -> Self {
        Self { metrics }
    }
}

impl FrameProcessor for IntensityImageProcessor {
    fn topic(&self) -> Topic {
        Topic::IntensityImage
    }

    fn process(&self, frame: &Frame, metadata: &Metadata, header: &Header) -> DriverMessage {
        let image = build_image(frame, metadata, header, &self.metrics, |px| px.signal);
        DriverMessage::IntensityImage(Arc::new(image))
    }
}

/// Noise image, ambient photons
pub struct NoiseImageProcessor {
    metrics: Arc<ProcessorMetrics>,
}

impl NoiseImageProcessor {
    pub fn new(metrics: Arc<ProcessorMetrics>) -> Self {
        Self { metrics }
    }
}

impl FrameProcessor for NoiseImageProcessor {
    fn topic(&self) -> Topic {
        Topic::NoiseImage
    }

    fn process(&self, frame: &Frame, metadata: &Metadata, header: &Header) -> DriverMessage {
        let image = build_image(frame, metadata, header, &self.metrics, |px| px.noise);
        DriverMessage::NoiseImage(Arc::new(image))
    }
}
