// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page model — the working order of pages plus the descriptor pool it points
// into.
//
// All operations are synchronous and run on the owner's task; they only ever
// change the order or a descriptor's rotation. Invariants, checked after
// every mutation:
//   * no page id appears twice in the order;
//   * every id in the order resolves to a `Ready` descriptor.

use std::collections::{HashMap, HashSet};

use folio_core::error::{FolioError, Result};
use folio_core::types::{BatchId, PageDescriptor, PageId, RotateDirection, Rotation};
use tracing::{debug, instrument};

/// In-progress drag. Never part of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DragState {
    pub page: PageId,
    /// Index the page would land on if dropped now.
    pub over: Option<usize>,
}

/// Ordered copy of the pages handed to reassembly. Thumbnails are shared,
/// not copied.
#[derive(Debug, Clone, Default)]
pub struct OrderSnapshot {
    pub batch: Option<BatchId>,
    pub pages: Vec<PageDescriptor>,
}

impl OrderSnapshot {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PageModel {
    /// Batch whose completion may seed the model.
    expected_batch: Option<BatchId>,
    /// Every extracted descriptor (ready and error) in source order.
    descriptors: Vec<PageDescriptor>,
    index: HashMap<PageId, usize>,
    order: Vec<PageId>,
    drag: Option<DragState>,
}

impl PageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the order and the descriptor pool; only `batch` may seed the
    /// model from now on.
    pub fn reset(&mut self, batch: Option<BatchId>) {
        self.expected_batch = batch;
        self.descriptors.clear();
        self.index.clear();
        self.order.clear();
        self.drag = None;
    }

    pub fn expected_batch(&self) -> Option<BatchId> {
        self.expected_batch
    }

    /// Take over the descriptors of a finished batch and append its ready
    /// pages to the order, in source order. Pages already in the order are
    /// skipped. Returns how many pages were appended.
    #[instrument(skip(self, descriptors), fields(count = descriptors.len()))]
    pub fn seed(&mut self, batch: BatchId, descriptors: Vec<PageDescriptor>) -> Result<usize> {
        if self.expected_batch != Some(batch) {
            return Err(FolioError::StaleBatch);
        }

        self.index = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id, i))
            .collect();
        self.descriptors = descriptors;
        // Anything that no longer resolves to a ready page cannot stay.
        let index = &self.index;
        let pool = &self.descriptors;
        self.order
            .retain(|id| index.get(id).is_some_and(|&i| pool[i].is_ready()));

        let present: HashSet<PageId> = self.order.iter().copied().collect();
        let before = self.order.len();
        self.order.extend(
            self.descriptors
                .iter()
                .filter(|d| d.is_ready() && !present.contains(&d.id))
                .map(|d| d.id),
        );
        let added = self.order.len() - before;
        debug!(added, len = self.order.len(), "order seeded");
        self.verify();
        Ok(added)
    }

    /// Move `id` to `target_index`, clamped to the order without `id`.
    /// Returns `false` (and changes nothing) if `id` is not in the order.
    pub fn move_page(&mut self, id: PageId, target_index: usize) -> bool {
        let Some(from) = self.position(id) else {
            return false;
        };
        self.order.remove(from);
        let to = target_index.min(self.order.len());
        self.order.insert(to, id);
        debug!(page = %id, from, to, "page moved");
        self.verify();
        true
    }

    /// Insert `id` directly before `anchor`. `Ok(false)` if `anchor` is not
    /// in the order.
    pub fn insert_before(&mut self, anchor: PageId, id: PageId) -> Result<bool> {
        self.insert_relative(anchor, id, 0)
    }

    /// Insert `id` directly after `anchor`. `Ok(false)` if `anchor` is not
    /// in the order.
    pub fn insert_after(&mut self, anchor: PageId, id: PageId) -> Result<bool> {
        self.insert_relative(anchor, id, 1)
    }

    fn insert_relative(&mut self, anchor: PageId, id: PageId, offset: usize) -> Result<bool> {
        let Some(at) = self.position(anchor) else {
            return Ok(false);
        };
        if self.order.contains(&id) {
            return Err(FolioError::OrderInvariantViolation(format!(
                "{id} is already in the order"
            )));
        }
        if !self.descriptor(id).is_some_and(PageDescriptor::is_ready) {
            return Err(FolioError::OrderInvariantViolation(format!(
                "{id} is not a ready page"
            )));
        }
        self.order.insert(at + offset, id);
        self.verify();
        Ok(true)
    }

    /// Take `id` out of the order. The descriptor is kept so the page can be
    /// inserted again.
    pub fn remove(&mut self, id: PageId) -> bool {
        let Some(at) = self.position(id) else {
            return false;
        };
        self.order.remove(at);
        if self.drag.is_some_and(|drag| drag.page == id) {
            self.drag = None;
        }
        self.verify();
        true
    }

    /// Remove several pages at once. Returns how many were in the order.
    pub fn remove_many(&mut self, ids: &[PageId]) -> usize {
        let doomed: HashSet<PageId> = ids.iter().copied().collect();
        let before = self.order.len();
        self.order.retain(|id| !doomed.contains(id));
        if self.drag.is_some_and(|drag| doomed.contains(&drag.page)) {
            self.drag = None;
        }
        self.verify();
        before - self.order.len()
    }

    /// Turn a page a quarter turn. The order is untouched.
    pub fn rotate(&mut self, id: PageId, direction: RotateDirection) -> Result<Rotation> {
        let &i = self.index.get(&id).ok_or(FolioError::UnknownPage(id))?;
        let descriptor = &mut self.descriptors[i];
        descriptor.rotation = descriptor.rotation.rotated(direction);
        debug!(page = %id, degrees = descriptor.rotation.degrees(), "page rotated");
        Ok(descriptor.rotation)
    }

    // -- Drag -----------------------------------------------------------------

    /// Start dragging a page of the order. Replaces any previous drag.
    pub fn begin_drag(&mut self, id: PageId) -> bool {
        if self.position(id).is_none() {
            return false;
        }
        self.drag = Some(DragState { page: id, over: None });
        true
    }

    pub fn drag_over(&mut self, index: usize) {
        if let Some(drag) = self.drag.as_mut() {
            drag.over = Some(index);
        }
    }

    /// Drop the dragged page at the last hovered index. Returns whether the
    /// order changed.
    pub fn end_drag(&mut self) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        let Some(target) = drag.over else {
            return false;
        };
        let before = self.position(drag.page);
        self.move_page(drag.page, target) && before != self.position(drag.page)
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub fn drag(&self) -> Option<DragState> {
        self.drag
    }

    // -- Invariants & snapshot ------------------------------------------------

    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.order.len());
        for id in &self.order {
            if !seen.insert(*id) {
                return Err(FolioError::OrderInvariantViolation(format!(
                    "{id} appears twice"
                )));
            }
            if !self.descriptor(*id).is_some_and(PageDescriptor::is_ready) {
                return Err(FolioError::OrderInvariantViolation(format!(
                    "{id} does not resolve to a ready page"
                )));
            }
        }
        Ok(())
    }

    fn verify(&self) {
        debug_assert!(
            self.check_invariants().is_ok(),
            "page order invariant broken: {:?}",
            self.check_invariants()
        );
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            batch: self.expected_batch,
            pages: self.ordered_descriptors().into_iter().cloned().collect(),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn order(&self) -> &[PageId] {
        &self.order
    }

    pub fn descriptor(&self, id: PageId) -> Option<&PageDescriptor> {
        self.index.get(&id).map(|&i| &self.descriptors[i])
    }

    /// All descriptors of the current batch in source order, error pages
    /// included.
    pub fn descriptors(&self) -> &[PageDescriptor] {
        &self.descriptors
    }

    pub fn ordered_descriptors(&self) -> Vec<&PageDescriptor> {
        self.order.iter().filter_map(|id| self.descriptor(*id)).collect()
    }

    /// Ready pages that are not in the order (candidates for re-insertion).
    pub fn removed(&self) -> Vec<&PageDescriptor> {
        let present: HashSet<&PageId> = self.order.iter().collect();
        self.descriptors
            .iter()
            .filter(|d| d.is_ready() && !present.contains(&d.id))
            .collect()
    }

    pub fn position(&self, id: PageId) -> Option<usize> {
        self.order.iter().position(|p| *p == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
