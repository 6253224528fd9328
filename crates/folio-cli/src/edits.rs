// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page edits given on the command line.
//
//   --order  "1:0,0:0,0:2"    pages as source:page (0-based), in output order;
//                             pages not listed are removed
//   --rotate "0:1=90,1:0=-90" clockwise degrees, multiples of 90

use std::collections::HashSet;

use folio_core::error::{FolioError, Result};
use folio_core::types::{PageId, RotateDirection, Rotation};
use folio_pipeline::PageModel;

/// A page addressed by upload position and page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub source: u32,
    pub page: u32,
}

impl std::fmt::Display for PageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.source, self.page)
    }
}

fn parse_ref(text: &str) -> Result<PageRef> {
    let invalid = || FolioError::Config(format!("expected source:page, got {text:?}"));
    let (source, page) = text.trim().split_once(':').ok_or_else(invalid)?;
    Ok(PageRef {
        source: source.trim().parse().map_err(|_| invalid())?,
        page: page.trim().parse().map_err(|_| invalid())?,
    })
}

pub fn parse_order(spec: &str) -> Result<Vec<PageRef>> {
    let refs = spec
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_ref)
        .collect::<Result<Vec<_>>>()?;
    let mut seen = HashSet::new();
    if let Some(dup) = refs.iter().find(|r| !seen.insert(**r)) {
        return Err(FolioError::Config(format!("page {dup} listed twice")));
    }
    Ok(refs)
}

pub fn parse_rotations(spec: &str) -> Result<Vec<(PageRef, Rotation)>> {
    spec.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(|part| {
            let (page, degrees) = part
                .split_once('=')
                .ok_or_else(|| {
                    FolioError::Config(format!("expected source:page=degrees, got {part:?}"))
                })?;
            let degrees: i64 = degrees
                .trim()
                .parse()
                .map_err(|_| FolioError::Config(format!("not a number: {degrees:?}")))?;
            let rotation = Rotation::from_degrees(degrees)
                .ok_or_else(|| FolioError::Config(format!("{degrees} is not a multiple of 90")))?;
            Ok((parse_ref(page)?, rotation))
        })
        .collect()
}

fn resolve(model: &PageModel, page: PageRef) -> Result<PageId> {
    model
        .descriptors()
        .iter()
        .find(|d| {
            d.source_index.0 == page.source && d.original_page_index == page.page && d.is_ready()
        })
        .map(|d| d.id)
        .ok_or_else(|| FolioError::OrderInvariantViolation(format!("no ready page {page}")))
}

/// Rearrange the model so it holds exactly `order`.
pub fn apply_order(model: &mut PageModel, order: &[PageRef]) -> Result<()> {
    let ids = order
        .iter()
        .map(|page| resolve(model, *page))
        .collect::<Result<Vec<_>>>()?;
    for (index, id) in ids.iter().enumerate() {
        if !model.move_page(*id, index) {
            return Err(FolioError::OrderInvariantViolation(format!(
                "{id} is not in the order"
            )));
        }
    }
    let keep: HashSet<PageId> = ids.into_iter().collect();
    let dropped: Vec<PageId> = model
        .order()
        .iter()
        .copied()
        .filter(|id| !keep.contains(id))
        .collect();
    model.remove_many(&dropped);
    Ok(())
}

pub fn apply_rotations(model: &mut PageModel, rotations: &[(PageRef, Rotation)]) -> Result<()> {
    for (page, rotation) in rotations {
        let id = resolve(model, *page)?;
        for _ in 0..rotation.degrees() / 90 {
            model.rotate(id, RotateDirection::Clockwise)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::types::{BatchId, Dimensions, PageDescriptor, PageStatus, SourceIndex};

    fn model() -> PageModel {
        // Source 0 has pages 0..3, source 1 a single page.
        let pages = [(0, 0), (0, 1), (0, 2), (1, 0)];
        let descriptors = pages
            .iter()
            .enumerate()
            .map(|(i, (source, page))| PageDescriptor {
                id: PageId(i as u64),
                source_index: SourceIndex(*source),
                original_page_index: *page,
                thumbnail: None,
                dimensions: Dimensions::default(),
                rotation: Rotation::Deg0,
                status: PageStatus::Ready,
                error: None,
            })
            .collect();
        let mut model = PageModel::new();
        model.reset(Some(BatchId(0)));
        model.seed(BatchId(0), descriptors).unwrap();
        model
    }

    #[test]
    fn parses_order_and_rejects_duplicates() {
        let order = parse_order("1:0, 0:2,0:0").unwrap();
        assert_eq!(order[0], PageRef { source: 1, page: 0 });
        assert_eq!(order.len(), 3);
        assert!(parse_order("0:1,0:1").is_err());
        assert!(parse_order("0-1").is_err());
    }

    #[test]
    fn parses_rotations() {
        let rotations = parse_rotations("0:1=90,1:0=-90").unwrap();
        assert_eq!(rotations[0], (PageRef { source: 0, page: 1 }, Rotation::Deg90));
        assert_eq!(rotations[1].1, Rotation::Deg270);
        assert!(parse_rotations("0:1=45").is_err());
        assert!(parse_rotations("0:1").is_err());
    }

    #[test]
    fn order_reorders_and_drops_unlisted() {
        let mut model = model();
        apply_order(&mut model, &parse_order("1:0,0:0,0:2").unwrap()).unwrap();
        let ids: Vec<u64> = model.order().iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![3, 0, 2]);
    }

    #[test]
    fn unknown_page_in_order_is_an_error() {
        let mut model = model();
        assert!(apply_order(&mut model, &parse_order("4:0").unwrap()).is_err());
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn rotations_turn_clockwise() {
        let mut model = model();
        apply_rotations(&mut model, &parse_rotations("0:1=-90").unwrap()).unwrap();
        assert_eq!(model.descriptor(PageId(1)).unwrap().rotation, Rotation::Deg270);
    }
}
