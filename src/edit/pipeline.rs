//! Resize → rotate → combine stage runner

use image::{DynamicImage, GenericImageView};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::compose::combine_images;
use super::size::compute_target_size;
use super::types::{CombineSpec, EditError, EditOptions, SelectionError};
use crate::codec::ImageCodec;
use crate::page_spec::{resolve_clamped, resolve_exact};
use crate::progress::{ProcessingStage, ProgressCallback, SilentProgress};
use crate::record::{ArchivePages, EditKind, EditRecord};

/// Decoded images of one archive keyed by page index.
///
/// After a combine only the survivor keeps an entry.
pub type WorkingImageSet = BTreeMap<usize, DynamicImage>;

/// Applies the configured edits to one archive's working images
pub struct EditPipeline<'a> {
    options: &'a EditOptions,
    codec: &'a dyn ImageCodec,
}

impl<'a> EditPipeline<'a> {
    pub fn new(options: &'a EditOptions, codec: &'a dyn ImageCodec) -> Self {
        Self { options, codec }
    }

    pub fn options(&self) -> &EditOptions {
        self.options
    }

    /// Run every stage without progress reporting
    pub fn run(&self, pages: &mut ArchivePages, images: &mut WorkingImageSet) {
        self.run_with_progress(pages, images, &SilentProgress);
    }

    /// Run resize, rotate and combine in order.
    ///
    /// Failures are recorded on the affected pages and never stop the run.
    pub fn run_with_progress(
        &self,
        pages: &mut ArchivePages,
        images: &mut WorkingImageSet,
        progress: &dyn ProgressCallback,
    ) {
        if self.options.has_resize() {
            let stage = ProcessingStage::Resizing;
            progress.on_step_start(&stage.to_string());
            self.resize_stage(pages, images, progress);
            progress.on_step_complete(stage.name(), &format!("{} pages", images.len()));
        }

        if !self.options.rotate.is_empty() {
            let stage = ProcessingStage::Rotating;
            progress.on_step_start(&stage.to_string());
            self.rotate_stage(pages, images, progress);
            progress.on_step_complete(stage.name(), "done");
        }

        if !self.options.combine.is_empty() {
            let stage = ProcessingStage::Combining;
            progress.on_step_start(&stage.to_string());
            self.combine_stage(pages, images, progress);
            progress.on_step_complete(stage.name(), &format!("{} pages remain", images.len()));
        }
    }

    // ============ Resize ============

    fn resize_stage(
        &self,
        pages: &mut ArchivePages,
        images: &mut WorkingImageSet,
        progress: &dyn ProgressCallback,
    ) {
        let selection = pages.selection.clone();
        let total = selection.len();

        for (done, &index) in selection.iter().enumerate() {
            progress.on_step_progress(done + 1, total);

            let Some(image) = images.get(&index) else {
                continue;
            };
            let Some(record) = pages.record_mut(index) else {
                continue;
            };
            if record.is_blocked_for(EditKind::Resize) {
                continue;
            }

            let from = image.dimensions();
            let result = compute_target_size(
                from,
                self.options.width,
                self.options.height,
                self.options.keep_aspect_ratio,
            )
            .and_then(|(w, h)| {
                self.codec
                    .resize(image, w, h, self.options.resample)
                    .map_err(|e| e.to_string())
            });

            match result {
                Ok(resized) => {
                    let to = resized.dimensions();
                    progress.on_debug(&format!(
                        "page {}: {}x{} -> {}x{}",
                        index + 1,
                        from.0,
                        from.1,
                        to.0,
                        to.1
                    ));
                    if to != from {
                        record.record_edit(EditKind::Resize, EditRecord::Resized { from, to });
                    }
                    images.insert(index, resized);
                }
                Err(message) => {
                    let error = EditError::new(EditKind::Resize, message);
                    warn!("Page {}: {}", index + 1, error);
                    record.record_edit_error(EditKind::Resize, error.to_string());
                }
            }
        }
    }

    // ============ Rotate ============

    fn rotate_stage(
        &self,
        pages: &mut ArchivePages,
        images: &mut WorkingImageSet,
        progress: &dyn ProgressCallback,
    ) {
        let total_pages = pages.total_pages();
        let all_angle = self.options.rotate.all_angle();

        let mut specific: BTreeMap<usize, f32> = BTreeMap::new();
        for (page, degrees) in self.options.rotate.targets() {
            if page.is_disabled() {
                debug!("Rotate target {} is disabled", page);
                continue;
            }
            let Some(index) = resolve_clamped(total_pages, &page) else {
                continue;
            };
            if !pages.is_selected(index) {
                let error = SelectionError::RotateTarget {
                    page: index as i64 + 1,
                };
                warn!("{}: {}", pages.archive_path.display(), error);
                pages.selection_errors.push(error);
                continue;
            }
            specific.insert(index, degrees);
        }

        let selection = pages.selection.clone();
        let total = selection.len();
        for (done, &index) in selection.iter().enumerate() {
            progress.on_step_progress(done + 1, total);

            let degrees = match specific.get(&index).copied().or(all_angle) {
                Some(d) if d != 0.0 => d,
                _ => continue,
            };
            let Some(image) = images.get(&index) else {
                continue;
            };
            let Some(record) = pages.record_mut(index) else {
                continue;
            };
            if record.is_blocked_for(EditKind::Rotate) {
                debug!("Page {}: rotate skipped after earlier failure", index + 1);
                continue;
            }

            info!("Rotate page {} by {} degrees", index + 1, degrees);
            match self.codec.rotate(image, degrees, self.options.resample) {
                Ok(rotated) => {
                    record.record_edit(EditKind::Rotate, EditRecord::Rotated { degrees });
                    images.insert(index, rotated);
                }
                Err(e) => {
                    let error = EditError::new(EditKind::Rotate, e.to_string());
                    warn!("Page {}: {}", index + 1, error);
                    record.record_edit_error(EditKind::Rotate, error.to_string());
                }
            }
        }
    }

    // ============ Combine ============

    fn combine_stage(
        &self,
        pages: &mut ArchivePages,
        images: &mut WorkingImageSet,
        progress: &dyn ProgressCallback,
    ) {
        let total = self.options.combine.len();
        for (done, spec) in self.options.combine.iter().enumerate() {
            progress.on_step_progress(done + 1, total);
            self.combine_one(pages, images, spec);
        }
    }

    fn combine_one(&self, pages: &mut ArchivePages, images: &mut WorkingImageSet, spec: &CombineSpec) {
        if spec.is_disabled() {
            debug!("Combine {} + {} is disabled", spec.a, spec.b);
            return;
        }

        let Some((a, b)) = self.combine_targets(pages, spec) else {
            return;
        };

        let survivor_a = pages.combine_graph.resolve_survivor(a);
        let survivor_b = pages.combine_graph.resolve_survivor(b);

        let blocked = [a, b, survivor_a, survivor_b].iter().any(|&i| {
            pages
                .record(i)
                .is_some_and(|r| r.is_blocked_for(EditKind::Combine))
        });
        if blocked {
            debug!("Combine {} + {} skipped after earlier failure", a + 1, b + 1);
            return;
        }

        if survivor_a == survivor_b {
            warn!(
                "Combine {} + {} skipped: both pages are already page {}",
                a + 1,
                b + 1,
                pages.combine_graph.label(survivor_a)
            );
            return;
        }

        let (Some(first), Some(second)) = (images.get(&survivor_a), images.get(&survivor_b)) else {
            // A page without an image failed extraction and is already reported
            return;
        };

        info!(
            "Combine {} page {} and {}",
            spec.direction.adverb(),
            a + 1,
            b + 1
        );
        let result = combine_images(
            self.codec,
            first,
            second,
            spec.direction,
            self.options.resample,
            self.options.shrink_larger,
        );

        let survivor = survivor_a.min(survivor_b);
        let absorbed = survivor_a.max(survivor_b);

        // The image follows the requested order, so a > b puts b's page first
        let absorbed_first = survivor_a > survivor_b;
        let outcome = result.map_err(|e| e.to_string()).and_then(|combined| {
            pages
                .combine_graph
                .absorb_placed(survivor, absorbed, spec.direction, absorbed_first)
                .map(|()| combined)
                .map_err(|e| e.to_string())
        });

        match outcome {
            Ok(combined) => {
                images.insert(survivor, combined);
                images.remove(&absorbed);
                if let Some(record) = pages.record_mut(survivor) {
                    record.record_edit(
                        EditKind::Combine,
                        EditRecord::Combined {
                            partners: vec![(absorbed, spec.direction)],
                        },
                    );
                }
            }
            Err(message) => {
                let error = EditError::new(EditKind::Combine, message);
                warn!("Pages {} and {}: {}", a + 1, b + 1, error);
                for index in [survivor_a, survivor_b] {
                    if let Some(record) = pages.record_mut(index) {
                        record.record_edit_error(EditKind::Combine, error.to_string());
                    }
                }
            }
        }
    }

    /// Resolve both partners without clamping; missing pages are recorded
    fn combine_targets(&self, pages: &mut ArchivePages, spec: &CombineSpec) -> Option<(usize, usize)> {
        let total_pages = pages.total_pages();
        let mut missing = Vec::new();
        let mut resolved = Vec::with_capacity(2);

        for page in [&spec.a, &spec.b] {
            match resolve_exact(total_pages, page) {
                Ok(Some(index)) if pages.is_selected(index) => resolved.push(index),
                Ok(Some(index)) => missing.push(index as i64 + 1),
                Ok(None) => return None,
                Err(number) => missing.push(number),
            }
        }

        if !missing.is_empty() {
            let error = SelectionError::CombineTargets { pages: missing };
            warn!("{}: {}", pages.archive_path.display(), error);
            pages.selection_errors.push(error);
            return None;
        }

        match resolved.as_slice() {
            [a, b] => Some((*a, *b)),
            _ => None,
        }
    }
}
