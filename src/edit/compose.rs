//! Two-image compositing for the combine stage

use image::{imageops, DynamicImage, GenericImageView, RgbImage};

use crate::codec::{CodecError, ImageCodec, ResampleFilter};
use crate::combine::Direction;

/// Place `first` then `second` side by side or stacked.
///
/// The dimension across the merge axis is reconciled first: by default the
/// larger image is scaled down to the smaller one (`shrink_larger`), else
/// the smaller is scaled up. The result is always RGB.
pub fn combine_images(
    codec: &dyn ImageCodec,
    first: &DynamicImage,
    second: &DynamicImage,
    direction: Direction,
    filter: ResampleFilter,
    shrink_larger: bool,
) -> Result<DynamicImage, CodecError> {
    let (first, second) = match_cross_axis(codec, first, second, direction, filter, shrink_larger)?;
    let (w1, h1) = first.dimensions();
    let (w2, h2) = second.dimensions();

    let (width, height, offset) = match direction {
        Direction::Horizontal => (w1 + w2, h1, (w1 as i64, 0)),
        Direction::Vertical => (w1, h1 + h2, (0, h1 as i64)),
    };

    let mut canvas = RgbImage::new(width, height);
    imageops::replace(&mut canvas, &first.to_rgb8(), 0, 0);
    imageops::replace(&mut canvas, &second.to_rgb8(), offset.0, offset.1);

    Ok(DynamicImage::ImageRgb8(canvas))
}

/// Scale one image so both share a height (horizontal) or width (vertical)
fn match_cross_axis(
    codec: &dyn ImageCodec,
    first: &DynamicImage,
    second: &DynamicImage,
    direction: Direction,
    filter: ResampleFilter,
    shrink_larger: bool,
) -> Result<(DynamicImage, DynamicImage), CodecError> {
    let cross = |img: &DynamicImage| match direction {
        Direction::Horizontal => img.height(),
        Direction::Vertical => img.width(),
    };
    let (c1, c2) = (cross(first), cross(second));
    if c1 == c2 {
        return Ok((first.clone(), second.clone()));
    }

    let scale_first = (c1 > c2) == shrink_larger;
    let (target, other) = if scale_first {
        (first, second)
    } else {
        (second, first)
    };

    let (tw, th) = target.dimensions();
    let (ow, oh) = other.dimensions();
    let (new_w, new_h) = match direction {
        Direction::Horizontal => (scaled(tw, oh, th), oh),
        Direction::Vertical => (ow, scaled(th, ow, tw)),
    };
    let resized = codec.resize(target, new_w, new_h, filter)?;

    if scale_first {
        Ok((resized, second.clone()))
    } else {
        Ok((first.clone(), resized))
    }
}

/// `along * new_cross / old_cross`, truncated, at least one pixel
fn scaled(along: u32, new_cross: u32, old_cross: u32) -> u32 {
    let value = along as u64 * new_cross as u64 / old_cross.max(1) as u64;
    value.clamp(1, u32::MAX as u64) as u32
}
