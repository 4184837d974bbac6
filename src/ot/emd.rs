//! Exact EMD via the transportation simplex
//!
//! Solves min ⟨P, C⟩ subject to P1 = a, Pᵀ1 = b, P ≥ 0 for discrete
//! marginals a and b. The basis starts from the northwest-corner rule and
//! pivots with Bland's rule (first negative reduced cost in row-major
//! order), which guarantees termination without cycling.

use super::TransportError;
use ndarray::{Array1, Array2};

/// Marginals must sum to 1 within this tolerance.
const MARGINAL_TOL: f64 = 1e-6;

/// Reduced costs above -RC_TOL count as non-negative (optimal).
const RC_TOL: f64 = 1e-9;

/// Uniform distribution over `n` points.
pub fn uniform(n: usize) -> Array1<f64> {
    Array1::from_elem(n, 1.0 / n as f64)
}

/// Compute the exact optimal transport plan between `a` and `b` under
/// `cost`.
///
/// `cost` is rows×cols where rows index `a` and cols index `b`. The
/// returned plan has the same shape, with row sums `a` and column sums `b`.
pub fn emd(
    a: &Array1<f64>,
    b: &Array1<f64>,
    cost: &Array2<f64>,
) -> Result<Array2<f64>, TransportError> {
    let (rows, cols) = cost.dim();
    if rows != a.len() || cols != b.len() {
        return Err(TransportError::ShapeMismatch {
            rows,
            cols,
            a_len: a.len(),
            b_len: b.len(),
        });
    }

    validate_marginal(a, "row")?;
    validate_marginal(b, "column")?;

    let mut c_min = f64::INFINITY;
    let mut c_max = f64::NEG_INFINITY;
    for ((i, j), &c) in cost.indexed_iter() {
        if !c.is_finite() {
            return Err(TransportError::NonFiniteCost { row: i, col: j });
        }
        c_min = c_min.min(c);
        c_max = c_max.max(c);
    }

    // A constant cost surface makes every feasible plan optimal; return the
    // independent coupling a ⊗ b rather than an arbitrary basic solution.
    if c_max - c_min < 1e-12 {
        let mut plan = Array2::zeros((rows, cols));
        for i in 0..rows {
            for j in 0..cols {
                plan[[i, j]] = a[i] * b[j];
            }
        }
        return Ok(plan);
    }

    let mut tableau = Tableau::northwest_corner(a, b, rows, cols);
    let pivot_limit = 100 * rows * cols + 1000;

    for _ in 0..pivot_limit {
        let (u, v) = tableau.potentials(cost);
        match tableau.entering_cell(cost, &u, &v) {
            None => return Ok(tableau.flow),
            Some((ei, ej)) => tableau.pivot(ei, ej)?,
        }
    }

    Err(TransportError::PivotLimit(pivot_limit))
}

fn validate_marginal(w: &Array1<f64>, side: &'static str) -> Result<(), TransportError> {
    for (index, &value) in w.iter().enumerate() {
        if value < 0.0 {
            return Err(TransportError::NegativeWeight { side, index, value });
        }
    }
    let sum: f64 = w.sum();
    if !sum.is_finite() || (sum - 1.0).abs() > MARGINAL_TOL {
        return Err(TransportError::BadMarginal { side, sum });
    }
    Ok(())
}

/// Basic feasible solution for the transportation problem.
struct Tableau {
    flow: Array2<f64>,
    basic: Vec<Vec<bool>>,
    rows: usize,
    cols: usize,
}

impl Tableau {
    /// Northwest-corner initial basis with exactly rows + cols - 1 basic
    /// cells (degenerate cells carry zero flow).
    fn northwest_corner(a: &Array1<f64>, b: &Array1<f64>, rows: usize, cols: usize) -> Self {
        let mut flow = Array2::zeros((rows, cols));
        let mut basic = vec![vec![false; cols]; rows];
        let mut a_rem = a.to_vec();
        let mut b_rem = b.to_vec();

        let (mut i, mut j) = (0, 0);
        loop {
            let f = a_rem[i].min(b_rem[j]);
            flow[[i, j]] = f;
            basic[i][j] = true;
            a_rem[i] -= f;
            b_rem[j] -= f;

            if i == rows - 1 && j == cols - 1 {
                break;
            }
            // On a tie advance only the row, leaving a zero basic cell in
            // the next row so the basis stays a spanning tree. Rounding
            // residue must never walk past either boundary.
            if i == rows - 1 {
                j += 1;
            } else if j == cols - 1 {
                i += 1;
            } else if a_rem[i] <= b_rem[j] {
                i += 1;
            } else {
                j += 1;
            }
        }

        Self {
            flow,
            basic,
            rows,
            cols,
        }
    }

    /// Solve u_i + v_j = c_ij over the basic cells, anchoring u[0] = 0.
    /// The basis is a spanning tree so a single BFS settles every node.
    fn potentials(&self, cost: &Array2<f64>) -> (Vec<f64>, Vec<f64>) {
        let mut u = vec![f64::NAN; self.rows];
        let mut v = vec![f64::NAN; self.cols];
        u[0] = 0.0;

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(Node::Row(0));
        while let Some(node) = queue.pop_front() {
            match node {
                Node::Row(i) => {
                    for j in 0..self.cols {
                        if self.basic[i][j] && v[j].is_nan() {
                            v[j] = cost[[i, j]] - u[i];
                            queue.push_back(Node::Col(j));
                        }
                    }
                }
                Node::Col(j) => {
                    for i in 0..self.rows {
                        if self.basic[i][j] && u[i].is_nan() {
                            u[i] = cost[[i, j]] - v[j];
                            queue.push_back(Node::Row(i));
                        }
                    }
                }
            }
        }

        (u, v)
    }

    /// First non-basic cell (row-major) with negative reduced cost.
    fn entering_cell(
        &self,
        cost: &Array2<f64>,
        u: &[f64],
        v: &[f64],
    ) -> Option<(usize, usize)> {
        for i in 0..self.rows {
            for j in 0..self.cols {
                if !self.basic[i][j] && cost[[i, j]] - u[i] - v[j] < -RC_TOL {
                    return Some((i, j));
                }
            }
        }
        None
    }

    /// Bring (ei, ej) into the basis, rebalancing flow around the unique
    /// cycle it closes in the basis tree.
    fn pivot(&mut self, ei: usize, ej: usize) -> Result<(), TransportError> {
        let cycle = self
            .find_cycle(ei, ej)
            .ok_or(TransportError::BasisDisconnected { row: ei, col: ej })?;

        // Odd positions lose flow; theta is the tightest of them.
        let mut theta = f64::INFINITY;
        let mut leaving = cycle[1];
        for (pos, &(i, j)) in cycle.iter().enumerate() {
            if pos % 2 == 1 && self.flow[[i, j]] < theta {
                theta = self.flow[[i, j]];
                leaving = (i, j);
            }
        }

        for (pos, &(i, j)) in cycle.iter().enumerate() {
            if pos % 2 == 0 {
                self.flow[[i, j]] += theta;
            } else {
                self.flow[[i, j]] -= theta;
            }
        }

        self.basic[ei][ej] = true;
        self.basic[leaving.0][leaving.1] = false;
        self.flow[[leaving.0, leaving.1]] = 0.0;
        Ok(())
    }

    /// The cycle closed by the entering cell: the entering cell followed by
    /// the basic cells along the tree path from column ej back to row ei.
    /// Consecutive cells alternate sharing a row and a column.
    fn find_cycle(&self, ei: usize, ej: usize) -> Option<Vec<(usize, usize)>> {
        // BFS over basis-tree nodes from Row(ei) to Col(ej), recording the
        // basic cell used to reach each node.
        let mut prev_row: Vec<Option<(usize, usize)>> = vec![None; self.rows];
        let mut prev_col: Vec<Option<(usize, usize)>> = vec![None; self.cols];
        let mut seen_rows = vec![false; self.rows];
        let mut seen_cols = vec![false; self.cols];
        seen_rows[ei] = true;

        let mut queue = std::collections::VecDeque::new();
        queue.push_back(Node::Row(ei));
        'bfs: while let Some(node) = queue.pop_front() {
            match node {
                Node::Row(i) => {
                    for j in 0..self.cols {
                        if self.basic[i][j] && !seen_cols[j] {
                            seen_cols[j] = true;
                            prev_col[j] = Some((i, j));
                            if j == ej {
                                break 'bfs;
                            }
                            queue.push_back(Node::Col(j));
                        }
                    }
                }
                Node::Col(j) => {
                    for i in 0..self.rows {
                        if self.basic[i][j] && !seen_rows[i] {
                            seen_rows[i] = true;
                            prev_row[i] = Some((i, j));
                            queue.push_back(Node::Row(i));
                        }
                    }
                }
            }
        }

        // Walk the path backwards from Col(ej) to Row(ei); prepending the
        // entering cell gives the alternating cycle in sign order.
        let mut path = Vec::new();
        let mut node = Node::Col(ej);
        loop {
            match node {
                Node::Col(j) => {
                    let (pi, pj) = prev_col[j]?;
                    path.push((pi, pj));
                    if pi == ei {
                        break;
                    }
                    node = Node::Row(pi);
                }
                Node::Row(i) => {
                    let (pi, pj) = prev_row[i]?;
                    path.push((pi, pj));
                    node = Node::Col(pj);
                }
            }
        }

        let mut cycle = Vec::with_capacity(path.len() + 1);
        cycle.push((ei, ej));
        cycle.extend(path);
        Some(cycle)
    }
}

#[derive(Clone, Copy)]
enum Node {
    Row(usize),
    Col(usize),
}
