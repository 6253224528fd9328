// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — page inspection and rasterisation of sources, and reassembly
// of the output.

pub mod assemble;
mod glyphs;
pub mod raster;
pub mod reader;

pub use assemble::{AssembledDocument, Assembler, AssemblyOptions};
pub use reader::PdfReader;
