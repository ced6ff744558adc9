//! Target size computation for the resize stage

use super::types::SizeChange;

/// Compute the new `(width, height)` of an image.
///
/// With `keep_aspect_ratio`, a dimension left at [`SizeChange::NoChange`]
/// follows the other one proportionally. When both or neither change the
/// ratio is not touched. Results are rounded to the nearest pixel and must
/// be at least one pixel.
pub fn compute_target_size(
    current: (u32, u32),
    width: SizeChange,
    height: SizeChange,
    keep_aspect_ratio: bool,
) -> Result<(u32, u32), String> {
    let (org_w, org_h) = current;
    if org_w == 0 || org_h == 0 {
        return Err(format!("source image has no area ({}x{})", org_w, org_h));
    }

    let mut new_w = width.apply(org_w);
    let mut new_h = height.apply(org_h);

    if keep_aspect_ratio {
        match (width.is_change(), height.is_change()) {
            (false, true) => new_w = new_h * org_w as f64 / org_h as f64,
            (true, false) => new_h = new_w * org_h as f64 / org_w as f64,
            _ => {}
        }
    }

    let new_w = new_w.round();
    let new_h = new_h.round();
    if !(new_w >= 1.0 && new_h >= 1.0) {
        return Err(format!(
            "new size {}x{} is not positive (from {}x{})",
            new_w, new_h, org_w, org_h
        ));
    }
    if new_w > u32::MAX as f64 || new_h > u32::MAX as f64 {
        return Err(format!("new size {}x{} is too large", new_w, new_h));
    }

    Ok((new_w as u32, new_h as u32))
}
