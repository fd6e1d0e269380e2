//! Linear stability of planar equilibria.
//!
//! Eigenvalues come from the closed 2×2 form; the topological type follows
//! from whether they are complex, their signs and whether they coincide.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Magnitudes below this count as zero when classifying.
pub const ZERO_TOLERANCE: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex64> for ComplexNumber {
    fn from(value: Complex64) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

impl From<ComplexNumber> for Complex64 {
    fn from(value: ComplexNumber) -> Self {
        Complex64::new(value.re, value.im)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenPair {
    pub value: ComplexNumber,
    /// Unit-norm eigenvector.
    pub vector: Vec<ComplexNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Unstable,
    Neutral,
    /// Zero eigenvalue: linearization does not decide.
    Undetermined,
}

impl Stability {
    pub fn label(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Unstable => "unstable",
            Self::Neutral => "neutral",
            Self::Undetermined => "undetermined",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyType {
    Center,
    Spiral,
    Degenerate,
    StarNode,
    Node,
    Saddle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub topology: TopologyType,
    pub stability: Stability,
}

impl Classification {
    /// One of the nine labels `Center`, `Spiral-stable`, `Spiral-unstable`,
    /// `Degenerate`, `Star-stable`, `Star-unstable`, `Node-stable`,
    /// `Node-unstable`, `Saddle`.
    pub fn label(&self) -> &'static str {
        match (self.topology, self.stability) {
            (TopologyType::Center, _) => "Center",
            (TopologyType::Spiral, Stability::Stable) => "Spiral-stable",
            (TopologyType::Spiral, _) => "Spiral-unstable",
            (TopologyType::Degenerate, _) => "Degenerate",
            (TopologyType::StarNode, Stability::Stable) => "Star-stable",
            (TopologyType::StarNode, _) => "Star-unstable",
            (TopologyType::Node, Stability::Stable) => "Node-stable",
            (TopologyType::Node, _) => "Node-unstable",
            (TopologyType::Saddle, _) => "Saddle",
        }
    }

    /// Longer text for display next to a phase portrait.
    pub fn description(&self) -> &'static str {
        match (self.topology, self.stability) {
            (TopologyType::Center, _) => "Center (closed orbits)",
            (TopologyType::Spiral, Stability::Stable) => "Stable spiral (attracting focus)",
            (TopologyType::Spiral, _) => "Unstable spiral (repelling focus)",
            (TopologyType::Degenerate, _) => "Degenerate (zero eigenvalue)",
            (TopologyType::StarNode, Stability::Stable) => "Stable star node",
            (TopologyType::StarNode, _) => "Unstable star node",
            (TopologyType::Node, Stability::Stable) => "Stable node (attracting)",
            (TopologyType::Node, _) => "Unstable node (repelling)",
            (TopologyType::Saddle, _) => "Saddle point (hyperbolic)",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A 2×2 Jacobian with its invariants and eigen-decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JacobianResult {
    /// Row-major: `matrix[i][j] = ∂f_i/∂x_j`.
    pub matrix: [[f64; 2]; 2],
    pub trace: f64,
    pub determinant: f64,
    pub eigenpairs: Vec<EigenPair>,
}

impl JacobianResult {
    pub fn new(matrix: [[f64; 2]; 2]) -> Self {
        let [[a, b], [c, d]] = matrix;
        let eigenpairs = eigenvalues(matrix)
            .iter()
            .enumerate()
            .map(|(k, &lambda)| EigenPair {
                value: lambda.into(),
                vector: eigenvector(matrix, lambda, k)
                    .into_iter()
                    .map(ComplexNumber::from)
                    .collect(),
            })
            .collect();
        Self {
            matrix,
            trace: a + d,
            determinant: a * d - b * c,
            eigenpairs,
        }
    }

    pub fn eigenvalues(&self) -> [Complex64; 2] {
        let value = |k: usize| {
            self.eigenpairs
                .get(k)
                .map_or(Complex64::new(f64::NAN, 0.0), |p| p.value.into())
        };
        [value(0), value(1)]
    }

    pub fn classification(&self) -> Classification {
        classify_eigenvalues(self.eigenvalues())
    }
}

/// Roots of `λ² - tr·λ + det = 0`.
///
/// Real pairs are returned ascending; complex pairs with the positive
/// imaginary part first.
pub fn eigenvalues(matrix: [[f64; 2]; 2]) -> [Complex64; 2] {
    let [[a, b], [c, d]] = matrix;
    let trace = a + d;
    // (a - d)² + 4bc avoids cancelling tr² against 4·det.
    let discriminant = (a - d) * (a - d) + 4.0 * b * c;

    if discriminant < 0.0 {
        let re = trace / 2.0;
        let im = (-discriminant).sqrt() / 2.0;
        return [Complex64::new(re, im), Complex64::new(re, -im)];
    }

    let root = discriminant.sqrt();
    let big = (trace + trace.signum() * root) / 2.0;
    let (l1, l2) = if big == 0.0 {
        (0.0, 0.0)
    } else {
        (big, (a * d - b * c) / big)
    };
    let (lo, hi) = if l1 <= l2 { (l1, l2) } else { (l2, l1) };
    [Complex64::new(lo, 0.0), Complex64::new(hi, 0.0)]
}

/// Unit eigenvector for `lambda`. When `A = λI` every vector qualifies and
/// the `k`-th basis vector is returned.
fn eigenvector(matrix: [[f64; 2]; 2], lambda: Complex64, k: usize) -> [Complex64; 2] {
    let [[a, b], [c, d]] = matrix;
    let from_first_row = [Complex64::new(b, 0.0), lambda - a];
    let from_second_row = [lambda - d, Complex64::new(c, 0.0)];
    let norm = |v: &[Complex64; 2]| (v[0].norm_sqr() + v[1].norm_sqr()).sqrt();

    let (candidate, size) = if norm(&from_first_row) >= norm(&from_second_row) {
        (from_first_row, norm(&from_first_row))
    } else {
        (from_second_row, norm(&from_second_row))
    };
    let scale = 1.0 + a.abs() + b.abs() + c.abs() + d.abs();
    if size <= ZERO_TOLERANCE * scale {
        let mut basis = [Complex64::new(0.0, 0.0); 2];
        basis[k.min(1)] = Complex64::new(1.0, 0.0);
        return basis;
    }
    [candidate[0] / size, candidate[1] / size]
}

/// Classifies the equilibrium whose Jacobian is `matrix`.
pub fn classify(matrix: [[f64; 2]; 2]) -> Classification {
    classify_eigenvalues(eigenvalues(matrix))
}

/// Maps an eigenvalue pair to its topological type, checking in order:
/// center, spiral, zero eigenvalue, star node, node, saddle.
pub fn classify_eigenvalues(lambdas: [Complex64; 2]) -> Classification {
    let [l1, l2] = lambdas;
    let of = |topology, stability| Classification {
        topology,
        stability,
    };
    let by_sign = |value: f64| {
        if value < 0.0 {
            Stability::Stable
        } else {
            Stability::Unstable
        }
    };

    if l1.im != 0.0 || l2.im != 0.0 {
        let re = l1.re;
        if re.abs() < ZERO_TOLERANCE {
            return of(TopologyType::Center, Stability::Neutral);
        }
        return of(TopologyType::Spiral, by_sign(re));
    }

    let (r1, r2) = (l1.re, l2.re);
    if r1.abs() < ZERO_TOLERANCE || r2.abs() < ZERO_TOLERANCE {
        return of(TopologyType::Degenerate, Stability::Undetermined);
    }
    if r1.signum() == r2.signum() {
        if (r1 - r2).abs() < ZERO_TOLERANCE {
            return of(TopologyType::StarNode, by_sign(r1));
        }
        return of(TopologyType::Node, by_sign(r1));
    }
    of(TopologyType::Saddle, Stability::Unstable)
}
