//! Per-page assembly accounting.

use crate::grid::TileSpec;

/// A tile that failed after all attempts.
#[derive(Debug, Clone)]
pub struct TileFailure {
    /// The region that could not be filled.
    pub spec: TileSpec,
    /// Number of fetch attempts made.
    pub attempts: u32,
    /// Last error message.
    pub error: String,
}

/// Outcome ledger for one page assembly.
///
/// Tracks pasted and failed tiles separately so a page with skipped
/// regions can still be saved best-effort and reported as partial.
#[derive(Debug, Clone)]
pub struct TileReport {
    /// Number of tiles the planner emitted for this page.
    total: usize,
    /// Tiles fetched, decoded, and pasted.
    pasted: usize,
    /// Tiles that failed after all attempts.
    failures: Vec<TileFailure>,
    /// True when the whole page was retrieved in a single request.
    fast_path: bool,
}

impl TileReport {
    /// Creates a ledger for a tiled assembly of `total` planned tiles.
    pub fn tiled(total: usize) -> Self {
        Self {
            total,
            pasted: 0,
            failures: Vec::new(),
            fast_path: false,
        }
    }

    /// Creates the ledger for a page satisfied by the whole-image fast path.
    pub fn fast_path() -> Self {
        Self {
            total: 0,
            pasted: 0,
            failures: Vec::new(),
            fast_path: true,
        }
    }

    /// Records one pasted tile.
    pub fn add_pasted(&mut self) {
        self.pasted += 1;
    }

    /// Records one failed tile.
    pub fn add_failure(&mut self, failure: TileFailure) {
        self.failures.push(failure);
    }

    /// Number of tiles the planner emitted.
    #[inline]
    pub fn total_count(&self) -> usize {
        self.total
    }

    /// Number of tiles pasted into the canvas.
    #[inline]
    pub fn pasted_count(&self) -> usize {
        self.pasted
    }

    /// Number of tiles that failed after all attempts.
    #[inline]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// The failed tiles, with attempt counts and last errors.
    pub fn failures(&self) -> &[TileFailure] {
        &self.failures
    }

    /// True when the page was retrieved in a single whole-image request.
    pub fn used_fast_path(&self) -> bool {
        self.fast_path
    }

    /// True when every planned tile was pasted (trivially true on the
    /// fast path).
    pub fn is_complete(&self) -> bool {
        self.fast_path || (self.pasted == self.total && self.failures.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiled_report_accounting() {
        let mut report = TileReport::tiled(4);
        assert!(!report.is_complete());
        assert!(!report.used_fast_path());

        for _ in 0..3 {
            report.add_pasted();
        }
        report.add_failure(TileFailure {
            spec: TileSpec::new(0, 0, 256, 256),
            attempts: 3,
            error: "HTTP 503".to_string(),
        });

        assert_eq!(report.total_count(), 4);
        assert_eq!(report.pasted_count(), 3);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_complete_when_all_pasted() {
        let mut report = TileReport::tiled(2);
        report.add_pasted();
        report.add_pasted();
        assert!(report.is_complete());
    }

    #[test]
    fn test_fast_path_is_complete() {
        let report = TileReport::fast_path();
        assert!(report.used_fast_path());
        assert!(report.is_complete());
        assert_eq!(report.total_count(), 0);
    }
}
