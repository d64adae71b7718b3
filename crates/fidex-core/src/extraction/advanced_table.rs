//! Lattice tables: grids delimited by drawn ruling lines.

use tracing::{debug, trace};

use super::{BackendOutput, ExtractionBackend, RawTable};
use crate::document::{DocumentKind, SourceDocument};
use crate::error::BackendError;
use crate::models::{BackendId, PdfConfig};
use crate::pdf::{LoadedPdf, PageGeometry, Rule};

/// Rule coordinates closer than this are the same grid line.
const SNAP: f32 = 2.0;

/// Detects bordered tables in PDFs from the horizontal and vertical rules
/// drawn in the page content.
pub struct AdvancedTableBackend {
    config: PdfConfig,
}

impl AdvancedTableBackend {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }
}

impl Default for AdvancedTableBackend {
    fn default() -> Self {
        Self::new(PdfConfig::default())
    }
}

impl ExtractionBackend for AdvancedTableBackend {
    fn id(&self) -> BackendId {
        BackendId::AdvancedTable
    }

    fn try_extract(&self, doc: &SourceDocument<'_>) -> Result<BackendOutput, BackendError> {
        if doc.kind != DocumentKind::Pdf {
            return Err(BackendError::Unsupported(doc.kind));
        }

        let pdf = LoadedPdf::load(doc.bytes)?;
        let mut tables = Vec::new();

        for (page_num, page_id) in pdf.pages(self.config.max_pages) {
            match pdf.geometry(page_id) {
                Ok(geometry) => {
                    if let Some(grid) = lattice(&geometry) {
                        trace!("Lattice on page {}: {}x{}", page_num, grid.len(), grid[0].len());
                        tables.push(RawTable::new(Some(page_num), grid));
                    }
                }
                Err(e) => debug!("Skipping lattice detection on page {}: {}", page_num, e),
            }
        }

        debug!("Advanced tables: {} lattices", tables.len());

        Ok(BackendOutput {
            text: String::new(),
            tables,
            page_count: pdf.page_count(),
        })
    }
}

/// Sorted distinct coordinates, merging values within [`SNAP`].
fn snap(mut values: Vec<f32>) -> Vec<f32> {
    values.sort_by(f32::total_cmp);
    let mut lines: Vec<f32> = Vec::new();
    for v in values {
        match lines.last() {
            Some(&last) if v - last <= SNAP => {}
            _ => lines.push(v),
        }
    }
    lines
}

/// Index of the band `[edges[i], edges[i + 1])` containing `v`.
fn band(edges: &[f32], v: f32) -> Option<usize> {
    edges.windows(2).position(|w| v >= w[0] && v < w[1])
}

/// Cell text of the page's rule grid, top row first. `None` when the rules
/// do not form at least two rows and two columns.
fn lattice(geometry: &PageGeometry) -> Option<Vec<Vec<String>>> {
    let mut ys = Vec::new();
    let mut xs = Vec::new();
    for rule in &geometry.rules {
        match *rule {
            Rule::Horizontal { y, .. } => ys.push(y),
            Rule::Vertical { x, .. } => xs.push(x),
        }
    }

    let ys = snap(ys);
    let xs = snap(xs);
    if ys.len() < 3 || xs.len() < 3 {
        return None;
    }

    let (rows, cols) = (ys.len() - 1, xs.len() - 1);
    let mut grid = vec![vec![String::new(); cols]; rows];

    for fragment in &geometry.fragments {
        let (Some(col), Some(band_from_bottom)) = (band(&xs, fragment.x), band(&ys, fragment.y)) else {
            continue;
        };
        let cell = &mut grid[rows - 1 - band_from_bottom][col];
        if !cell.is_empty() {
            cell.push(' ');
        }
        cell.push_str(fragment.text.trim());
    }

    Some(grid)
}
