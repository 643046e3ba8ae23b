//! Dense f64 linear algebra throughput: multiply, invert, solve.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde_json::json;
use tracing::info;

use crate::error::{BenchError, Result};
use crate::harness::{run_trials, BenchConfig, Profile, TrialConfig};
use crate::schema::Measurement;

/// Row-major square matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    n: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Entries uniform in `[0, 1)`.
    pub fn random(n: usize, rng: &mut ChaCha8Rng) -> Self {
        Self {
            n,
            data: (0..n * n).map(|_| rng.gen::<f64>()).collect(),
        }
    }

    pub fn from_rows(rows: &[&[f64]]) -> Self {
        let n = rows.len();
        let data = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Self { n, data }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        (0..self.n)
            .map(|i| self.row(i).iter().zip(x).map(|(a, b)| a * b).sum())
            .collect()
    }
}

/// `a * b`, rows computed in parallel.
pub fn matmul(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    if a.n != b.n {
        return Err(BenchError::invalid(format!(
            "cannot multiply {0}x{0} by {1}x{1}",
            a.n, b.n
        )));
    }
    let n = a.n;
    let mut c = Matrix::zeros(n);
    if n == 0 {
        return Ok(c);
    }
    c.data
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(i, out_row)| {
            for (k, &aik) in a.row(i).iter().enumerate() {
                for (o, &bkj) in out_row.iter_mut().zip(b.row(k)) {
                    *o += aik * bkj;
                }
            }
        });
    Ok(c)
}

fn pivot_row(m: &[f64], n: usize, col: usize) -> Result<usize> {
    let (p, max) = (col..n)
        .map(|r| (r, m[r * n + col].abs()))
        .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if max < f64::EPSILON {
        return Err(BenchError::invalid("matrix is singular"));
    }
    Ok(p)
}

fn swap_rows(m: &mut [f64], n: usize, a: usize, b: usize) {
    if a != b {
        for j in 0..n {
            m.swap(a * n + j, b * n + j);
        }
    }
}

/// Gauss-Jordan elimination with partial pivoting.
pub fn invert(a: &Matrix) -> Result<Matrix> {
    let n = a.n;
    let mut m = a.data.clone();
    let mut inv = Matrix::identity(n);

    for col in 0..n {
        let p = pivot_row(&m, n, col)?;
        swap_rows(&mut m, n, col, p);
        swap_rows(&mut inv.data, n, col, p);

        let d = m[col * n + col];
        for j in 0..n {
            m[col * n + j] /= d;
            inv.data[col * n + j] /= d;
        }

        for r in 0..n {
            if r == col {
                continue;
            }
            let f = m[r * n + col];
            if f == 0.0 {
                continue;
            }
            for j in 0..n {
                m[r * n + j] -= f * m[col * n + j];
                inv.data[r * n + j] -= f * inv.data[col * n + j];
            }
        }
    }
    Ok(inv)
}

/// Solve `a x = b` by LU factorisation with partial pivoting.
pub fn solve(a: &Matrix, b: &[f64]) -> Result<Vec<f64>> {
    let n = a.n;
    if b.len() != n {
        return Err(BenchError::invalid(format!(
            "right-hand side has {} entries, expected {n}",
            b.len()
        )));
    }
    let mut lu = a.data.clone();
    let mut x = b.to_vec();

    for col in 0..n {
        let p = pivot_row(&lu, n, col)?;
        swap_rows(&mut lu, n, col, p);
        x.swap(col, p);

        let d = lu[col * n + col];
        for r in col + 1..n {
            let f = lu[r * n + col] / d;
            lu[r * n + col] = f;
            for j in col + 1..n {
                lu[r * n + j] -= f * lu[col * n + j];
            }
            x[r] -= f * x[col];
        }
    }

    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|j| lu[i * n + j] * x[j]).sum();
        x[i] = (x[i] - s) / lu[i * n + i];
    }
    Ok(x)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinalgOp {
    Multiply,
    Invert,
    Solve,
}

impl LinalgOp {
    pub const ALL: [LinalgOp; 3] = [LinalgOp::Multiply, LinalgOp::Invert, LinalgOp::Solve];

    pub fn as_str(&self) -> &'static str {
        match self {
            LinalgOp::Multiply => "matmul",
            LinalgOp::Invert => "inverse",
            LinalgOp::Solve => "solve",
        }
    }

    /// Nominal floating-point operation count used for GFLOP/s.
    pub fn flops(&self, n: usize) -> f64 {
        let n3 = (n as f64).powi(3);
        match self {
            LinalgOp::Multiply => 2.0 * n3,
            LinalgOp::Invert => n3 / 3.0,
            LinalgOp::Solve => 2.0 * n3,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LinalgConfig {
    pub size: usize,
    pub trials: TrialConfig,
}

impl LinalgConfig {
    pub fn for_bench(cfg: &BenchConfig) -> Self {
        let size = match cfg.profile {
            Profile::Quick => 256,
            Profile::Full => 1024,
        };
        Self {
            size,
            trials: cfg.linalg_trials(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.trials.validate()?;
        if self.size == 0 {
            return Err(BenchError::invalid("matrix size must be at least 1"));
        }
        Ok(())
    }
}

pub fn run(cfg: &BenchConfig, la: &LinalgConfig) -> Result<Vec<Measurement>> {
    la.validate()?;
    let mut rng = cfg.rng();
    let n = la.size;
    let a = Matrix::random(n, &mut rng);
    let b = Matrix::random(n, &mut rng);
    let rhs: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();

    let mut out = Vec::with_capacity(LinalgOp::ALL.len());
    for op in LinalgOp::ALL {
        let trials = match op {
            LinalgOp::Multiply => run_trials(&la.trials, || matmul(&a, &b))?,
            LinalgOp::Invert => run_trials(&la.trials, || invert(&a))?,
            LinalgOp::Solve => run_trials(&la.trials, || solve(&a, &rhs))?,
        };
        let mean_s = trials.mean_secs();
        let gflops = if mean_s > 0.0 {
            op.flops(n) / (mean_s * 1e9)
        } else {
            0.0
        };
        info!(op = op.as_str(), n, mean_s, gflops, "linear algebra");
        out.push(
            Measurement::from_trials(format!("cpu.{}.n{n}", op.as_str()), &trials).with_extra(
                json!({
                    "size": n,
                    "mean_s": mean_s,
                    "gflops": gflops,
                }),
            ),
        );
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::rand_core::SeedableRng;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn matmul_small() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0]]);
        let b = Matrix::from_rows(&[&[5.0, 6.0], &[7.0, 8.0]]);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c, Matrix::from_rows(&[&[19.0, 22.0], &[43.0, 50.0]]));
    }

    #[test]
    fn inverse_times_matrix_is_identity() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let a = Matrix::random(24, &mut rng);
        let prod = matmul(&a, &invert(&a).unwrap()).unwrap();
        for i in 0..24 {
            for j in 0..24 {
                let want = if i == j { 1.0 } else { 0.0 };
                assert!(close(prod.get(i, j), want), "({i},{j}) = {}", prod.get(i, j));
            }
        }
    }

    #[test]
    fn solve_satisfies_system() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a = Matrix::random(32, &mut rng);
        let b: Vec<f64> = (0..32).map(|i| i as f64).collect();
        let x = solve(&a, &b).unwrap();
        for (got, want) in a.mul_vec(&x).iter().zip(&b) {
            assert!(close(*got, *want));
        }
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let a = Matrix::from_rows(&[&[1.0, 2.0], &[2.0, 4.0]]);
        assert!(matches!(invert(&a), Err(BenchError::InvalidConfiguration(_))));
        assert!(solve(&a, &[1.0, 1.0]).is_err());
    }

    #[test]
    fn run_reports_gflops_per_op() {
        let cfg = BenchConfig {
            profile: Profile::Quick,
            seed: 2,
        };
        let la = LinalgConfig {
            size: 32,
            trials: TrialConfig::new(1, 2),
        };
        let out = run(&cfg, &la).unwrap();
        let names: Vec<&str> = out.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["cpu.matmul.n32", "cpu.inverse.n32", "cpu.solve.n32"]);
        for m in &out {
            assert_eq!(m.iters, 2);
            assert!(m.extra["gflops"].as_f64().unwrap() >= 0.0);
        }
    }
}
