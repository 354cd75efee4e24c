//! Minimum-cost bipartite assignment on top of the LAPJV solver.

use nalgebra::DMatrix;

/// Cost of any cell outside the real matrix. Every full assignment of the
/// padded square uses the same number of these, so the value only has to
/// keep the tie-break nudges representable.
const PAD_COST: f64 = 1e3;
/// Per-step nudge away from the diagonal, far below any meaningful cost gap.
const TIE_BREAK: f64 = 1e-9;

/// Solve the rectangular assignment problem over `cost`.
///
/// Returns `(row, col)` pairs sorted by row; every row is assigned when
/// `rows <= cols`, otherwise every column is. Entries must be finite.
/// Among equally cheap assignments the one pairing low rows with low
/// columns wins, so a given matrix always yields the same result.
pub fn solve(cost: &DMatrix<f64>) -> Vec<(usize, usize)> {
    let (rows, cols) = cost.shape();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    debug_assert!(cost.iter().all(|c| c.is_finite()), "assignment costs must be finite");

    let size = rows.max(cols);
    let padded = lapjv::Matrix::<f64>::from_shape_fn((size, size), |(i, j)| {
        let base = if i < rows && j < cols {
            cost[(i, j)]
        } else {
            PAD_COST
        };
        base + TIE_BREAK * i.abs_diff(j) as f64
    });

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => row_to_col
            .into_iter()
            .enumerate()
            .filter(|&(r, c)| r < rows && c < cols)
            .collect(),
        Err(e) => {
            tracing::warn!("assignment solver failed, leaving frame unmatched: {:?}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total(cost: &DMatrix<f64>, pairs: &[(usize, usize)]) -> f64 {
        pairs.iter().map(|&(r, c)| cost[(r, c)]).sum()
    }

    #[test]
    fn test_empty() {
        assert!(solve(&DMatrix::<f64>::zeros(0, 3)).is_empty());
        assert!(solve(&DMatrix::<f64>::zeros(2, 0)).is_empty());
    }

    #[test]
    fn test_square_optimum_beats_greedy() {
        // greedy row-by-row would take (0,0) then be forced into (1,1) = 10
        let cost = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 10.0]);
        let pairs = solve(&cost);
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(total(&cost, &pairs), 4.0);
    }

    #[test]
    fn test_three_by_three() {
        let cost = DMatrix::from_row_slice(
            3,
            3,
            &[4.0, 1.0, 3.0, 2.0, 0.0, 5.0, 3.0, 2.0, 2.0],
        );
        let pairs = solve(&cost);
        assert_eq!(pairs.len(), 3);
        assert_eq!(total(&cost, &pairs), 5.0);
    }

    #[test]
    fn test_wide_and_tall() {
        let wide = DMatrix::from_row_slice(2, 3, &[0.9, 0.1, 0.8, 0.2, 0.7, 0.9]);
        assert_eq!(solve(&wide), vec![(0, 1), (1, 0)]);

        let tall = wide.transpose();
        assert_eq!(solve(&tall), vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_ties_resolve_to_lowest_indices() {
        let cost = DMatrix::from_element(2, 2, 0.5);
        assert_eq!(solve(&cost), vec![(0, 0), (1, 1)]);
        assert_eq!(solve(&cost), solve(&cost.clone()));
    }
}
