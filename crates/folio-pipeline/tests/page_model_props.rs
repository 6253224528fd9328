// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Property tests: random edit sequences on the page model.

use std::collections::HashSet;

use folio_core::types::{
    BatchId, Dimensions, PageDescriptor, PageId, PageStatus, RotateDirection, Rotation, SourceIndex,
};
use folio_pipeline::PageModel;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Move(u64, usize),
    InsertBefore(u64, u64),
    InsertAfter(u64, u64),
    Remove(u64),
    RemoveMany(Vec<u64>),
    Rotate(u64, bool),
    Drag(u64, usize, bool),
}

const PAGES: u64 = 12;

fn op() -> impl Strategy<Value = Op> {
    let id = 0..PAGES + 2;
    prop_oneof![
        (id.clone(), 0usize..20).prop_map(|(p, i)| Op::Move(p, i)),
        (id.clone(), id.clone()).prop_map(|(a, p)| Op::InsertBefore(a, p)),
        (id.clone(), id.clone()).prop_map(|(a, p)| Op::InsertAfter(a, p)),
        id.clone().prop_map(Op::Remove),
        prop::collection::vec(id.clone(), 0..4).prop_map(Op::RemoveMany),
        (id.clone(), any::<bool>()).prop_map(|(p, cw)| Op::Rotate(p, cw)),
        (id, 0usize..20, any::<bool>()).prop_map(|(p, i, drop)| Op::Drag(p, i, drop)),
    ]
}

/// Pages 0..PAGES; every fourth page failed to render.
fn model() -> PageModel {
    let descriptors = (0..PAGES)
        .map(|i| PageDescriptor {
            id: PageId(i),
            source_index: SourceIndex((i / 5) as u32),
            original_page_index: (i % 5) as u32,
            thumbnail: None,
            dimensions: Dimensions::new(100.0, 140.0),
            rotation: Rotation::Deg0,
            status: if i % 4 == 3 { PageStatus::Error } else { PageStatus::Ready },
            error: None,
        })
        .collect();
    let mut model = PageModel::new();
    model.reset(Some(BatchId(0)));
    model.seed(BatchId(0), descriptors).expect("seed");
    model
}

fn apply(model: &mut PageModel, op: &Op) {
    match op {
        Op::Move(p, i) => {
            model.move_page(PageId(*p), *i);
        }
        Op::InsertBefore(a, p) => {
            let _ = model.insert_before(PageId(*a), PageId(*p));
        }
        Op::InsertAfter(a, p) => {
            let _ = model.insert_after(PageId(*a), PageId(*p));
        }
        Op::Remove(p) => {
            model.remove(PageId(*p));
        }
        Op::RemoveMany(ps) => {
            let ids: Vec<PageId> = ps.iter().map(|p| PageId(*p)).collect();
            model.remove_many(&ids);
        }
        Op::Rotate(p, cw) => {
            let direction = if *cw {
                RotateDirection::Clockwise
            } else {
                RotateDirection::CounterClockwise
            };
            let _ = model.rotate(PageId(*p), direction);
        }
        Op::Drag(p, i, drop) => {
            if model.begin_drag(PageId(*p)) {
                model.drag_over(*i);
                if *drop {
                    model.end_drag();
                } else {
                    model.cancel_drag();
                }
            }
        }
    }
}

proptest! {
    #[test]
    fn invariants_hold_after_any_edit_sequence(ops in prop::collection::vec(op(), 0..60)) {
        let mut model = model();
        for op in &ops {
            apply(&mut model, op);
            prop_assert!(model.check_invariants().is_ok());

            let unique: HashSet<PageId> = model.order().iter().copied().collect();
            prop_assert_eq!(unique.len(), model.len());
            prop_assert!(model.len() <= PAGES as usize);
            for id in model.order() {
                prop_assert!(id.0 % 4 != 3, "error page {} entered the order", id);
            }
        }
        // Every ready page is either ordered or available for re-insertion.
        prop_assert_eq!(model.len() + model.removed().len(), 9);
    }

    #[test]
    fn move_keeps_relative_order_of_others(p in 0..PAGES, target in 0usize..20) {
        let mut model = model();
        let before: Vec<PageId> = model.order().iter().copied().filter(|id| id.0 != p).collect();
        let moved = model.move_page(PageId(p), target);
        let after: Vec<PageId> = model.order().iter().copied().filter(|id| id.0 != p).collect();

        prop_assert_eq!(before, after);
        prop_assert_eq!(moved, p % 4 != 3);
        if moved {
            prop_assert_eq!(model.position(PageId(p)), Some(target.min(model.len() - 1)));
        }
    }

    #[test]
    fn moving_back_to_the_original_index_restores_the_order(
        ops in prop::collection::vec(op(), 0..20),
        p in 0..PAGES,
        target in 0usize..20,
    ) {
        let mut model = model();
        for op in &ops {
            apply(&mut model, op);
        }
        let original = model.order().to_vec();

        match model.position(PageId(p)) {
            Some(index) => {
                prop_assert!(model.move_page(PageId(p), target));
                prop_assert!(model.move_page(PageId(p), index));
                prop_assert_eq!(model.order(), original.as_slice());
            }
            None => {
                prop_assert!(!model.move_page(PageId(p), target));
                prop_assert_eq!(model.order(), original.as_slice());
            }
        }
    }

    #[test]
    fn reinserting_next_to_a_neighbour_restores_the_order(
        ops in prop::collection::vec(op(), 0..20),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut model = model();
        for op in &ops {
            apply(&mut model, op);
        }
        let original = model.order().to_vec();
        prop_assume!(original.len() >= 2);

        let at = pick.index(original.len());
        let id = original[at];
        prop_assert!(model.remove(id));
        prop_assert!(model.position(id).is_none());

        // The first page has no previous neighbour; anchor on the next one.
        let reinserted = match at.checked_sub(1) {
            Some(prev) => model.insert_after(original[prev], id),
            None => model.insert_before(original[at + 1], id),
        };
        prop_assert_eq!(reinserted.ok(), Some(true));
        prop_assert_eq!(model.order(), original.as_slice());
        prop_assert!(model.check_invariants().is_ok());
    }

    #[test]
    fn four_turns_restore_rotation(p in 0..PAGES, cw in any::<bool>()) {
        let mut model = model();
        let direction = if cw {
            RotateDirection::Clockwise
        } else {
            RotateDirection::CounterClockwise
        };
        let order = model.order().to_vec();
        for _ in 0..4 {
            model.rotate(PageId(p), direction).expect("known page");
        }
        prop_assert_eq!(model.descriptor(PageId(p)).map(|d| d.rotation), Some(Rotation::Deg0));
        prop_assert_eq!(model.order(), order.as_slice());
    }
}
