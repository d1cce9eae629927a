//! Quadrature rules on the reference elements.
//!
//! Lines, quadrilaterals and hexahedra use (tensor products of) Gauss-Legendre rules
//! with up to five points per axis, exact for polynomials of degree `2n-1` in each variable.
//!
//! Triangles and tetrahedra use the symmetric centroid and vertex-adjacent rules
//! for degrees 1 and 2, and collapsed Gauss-Legendre products
//! (Gauss-Legendre on the unit square or cube pulled onto the simplex)
//! for everything above that.
//!
//! Rules are pure functions of the family and requested degree;
//! an [`ElementLibrary`][crate::ElementLibrary] tabulates them once for reuse.

use itertools::iproduct;
use nalgebra as na;

use crate::element::{ElementError, ElementFamily};

/// Which quadrature rule to use for an element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QuadratureOrder {
    /// A degree that integrates the family's own shape functions exactly.
    #[default]
    Default,
    /// A rule exact for polynomials up to at least this total degree.
    Degree(usize),
}

impl QuadratureOrder {
    /// Resolve to a concrete exactness degree for a family.
    pub fn degree_for(self, family: ElementFamily) -> usize {
        match self {
            QuadratureOrder::Degree(d) => d,
            QuadratureOrder::Default => default_degree(family),
        }
    }
}

/// Degree used by [`QuadratureOrder::Default`].
pub fn default_degree(family: ElementFamily) -> usize {
    match family {
        ElementFamily::Point => 0,
        ElementFamily::Line | ElementFamily::Quadrilateral | ElementFamily::Hexahedron => 5,
        ElementFamily::Triangle | ElementFamily::Tetrahedron => 4,
    }
}

/// Highest exactness degree available for a family.
pub fn max_degree(family: ElementFamily) -> usize {
    match family {
        ElementFamily::Point => usize::MAX,
        ElementFamily::Line | ElementFamily::Quadrilateral | ElementFamily::Hexahedron => {
            2 * MAX_GL_POINTS - 1
        }
        ElementFamily::Triangle => 2 * MAX_GL_POINTS - 2,
        ElementFamily::Tetrahedron => 2 * MAX_GL_POINTS - 3,
    }
}

// Gauss-Legendre points on [-1, 1]. Mapped to [0, 1] when used.
//
// source for the weights:
// https://pomax.github.io/bezierinfo/legendre-gauss.html

#[derive(Clone, Copy)]
struct GLPoint {
    weight: f64,
    abscissa: f64,
}

const MAX_GL_POINTS: usize = 5;

const WEIGHTS_GL_1: [GLPoint; 1] = [GLPoint {
    weight: 2.0,
    abscissa: 0.0,
}];

const WEIGHTS_GL_2: [GLPoint; 2] = [
    GLPoint {
        weight: 1.0,
        abscissa: -0.5773502691896257,
    },
    GLPoint {
        weight: 1.0,
        abscissa: 0.5773502691896257,
    },
];

const WEIGHTS_GL_3: [GLPoint; 3] = [
    GLPoint {
        weight: 0.5555555555555556,
        abscissa: -0.7745966692414834,
    },
    GLPoint {
        weight: 0.8888888888888888,
        abscissa: 0.0000000000000000,
    },
    GLPoint {
        weight: 0.5555555555555556,
        abscissa: 0.7745966692414834,
    },
];

const WEIGHTS_GL_4: [GLPoint; 4] = [
    GLPoint {
        weight: 0.3478548451374538,
        abscissa: -0.8611363115940526,
    },
    GLPoint {
        weight: 0.6521451548625461,
        abscissa: -0.3399810435848563,
    },
    GLPoint {
        weight: 0.6521451548625461,
        abscissa: 0.3399810435848563,
    },
    GLPoint {
        weight: 0.3478548451374538,
        abscissa: 0.8611363115940526,
    },
];

const WEIGHTS_GL_5: [GLPoint; 5] = [
    GLPoint {
        weight: 0.2369268850561891,
        abscissa: -0.9061798459386640,
    },
    GLPoint {
        weight: 0.4786286704993665,
        abscissa: -0.5384693101056831,
    },
    GLPoint {
        weight: 0.5688888888888889,
        abscissa: 0.0000000000000000,
    },
    GLPoint {
        weight: 0.4786286704993665,
        abscissa: 0.5384693101056831,
    },
    GLPoint {
        weight: 0.2369268850561891,
        abscissa: 0.9061798459386640,
    },
];

/// Gauss-Legendre rule with `n` points on [0, 1] as (abscissa, weight) pairs.
fn gauss_legendre_unit(n: usize) -> Vec<(f64, f64)> {
    let table: &[GLPoint] = match n {
        0 | 1 => &WEIGHTS_GL_1,
        2 => &WEIGHTS_GL_2,
        3 => &WEIGHTS_GL_3,
        4 => &WEIGHTS_GL_4,
        _ => &WEIGHTS_GL_5,
    };
    table
        .iter()
        .map(|p| (0.5 * (p.abscissa + 1.0), 0.5 * p.weight))
        .collect()
}

/// Integration points and weights on a reference element.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadratureRule {
    family: ElementFamily,
    degree: usize,
    points: Vec<na::Vector3<f64>>,
    weights: Vec<f64>,
}

impl QuadratureRule {
    /// Build the rule for a family at the requested order.
    ///
    /// The delivered degree (see [`degree`][Self::degree]) may exceed the request.
    pub fn new(family: ElementFamily, order: QuadratureOrder) -> Result<Self, ElementError> {
        let requested = order.degree_for(family);
        if requested > max_degree(family) {
            return Err(ElementError::UnsupportedQuadrature {
                family,
                degree: requested,
            });
        }

        let mut rule = Self {
            family,
            degree: requested,
            points: Vec::new(),
            weights: Vec::new(),
        };
        match family {
            ElementFamily::Point => rule.push([0.0, 0.0, 0.0], 1.0),
            ElementFamily::Line | ElementFamily::Quadrilateral | ElementFamily::Hexahedron => {
                rule.fill_tensor(requested)
            }
            ElementFamily::Triangle => rule.fill_triangle(requested),
            ElementFamily::Tetrahedron => rule.fill_tetrahedron(requested),
        }
        Ok(rule)
    }

    #[inline]
    fn push(&mut self, point: [f64; 3], weight: f64) {
        self.points.push(na::Vector3::from(point));
        self.weights.push(weight);
    }

    fn fill_tensor(&mut self, degree: usize) {
        let n = gl_points_for(degree + 1);
        self.degree = 2 * n - 1;
        let gl = gauss_legendre_unit(n);
        let dim = self.family.dim();
        // axes beyond the element's dimension get a single unit-weight point at 0
        let axis = |d: usize| if d < dim { gl.clone() } else { vec![(0.0, 1.0)] };
        let (ax, ay, az) = (axis(0), axis(1), axis(2));
        for (&(z, wz), &(y, wy), &(x, wx)) in iproduct!(&az, &ay, &ax) {
            self.push([x, y, z], wx * wy * wz);
        }
    }

    fn fill_triangle(&mut self, degree: usize) {
        match degree {
            0 | 1 => {
                self.degree = 1;
                self.push([1.0 / 3.0, 1.0 / 3.0, 0.0], 0.5);
            }
            2 => {
                let (a, b) = (1.0 / 6.0, 2.0 / 3.0);
                for p in [[a, a, 0.0], [b, a, 0.0], [a, b, 0.0]] {
                    self.push(p, 1.0 / 6.0);
                }
            }
            _ => {
                // the collapse adds one power of (1 - u) to the integrand
                let n = gl_points_for(degree + 2);
                self.degree = 2 * n - 2;
                let gl = gauss_legendre_unit(n);
                for (&(u, wu), &(v, wv)) in iproduct!(&gl, &gl) {
                    self.push([u, (1.0 - u) * v, 0.0], wu * wv * (1.0 - u));
                }
            }
        }
    }

    fn fill_tetrahedron(&mut self, degree: usize) {
        match degree {
            0 | 1 => {
                self.degree = 1;
                self.push([0.25, 0.25, 0.25], 1.0 / 6.0);
            }
            2 => {
                let a = (5.0 - 5.0_f64.sqrt()) / 20.0;
                let b = (5.0 + 3.0 * 5.0_f64.sqrt()) / 20.0;
                for p in [[a, a, a], [b, a, a], [a, b, a], [a, a, b]] {
                    self.push(p, 1.0 / 24.0);
                }
            }
            _ => {
                // two powers of (1 - u) and one of (1 - v) from the collapse
                let n = gl_points_for(degree + 3);
                self.degree = 2 * n - 3;
                let gl = gauss_legendre_unit(n);
                for (&(u, wu), &(v, wv), &(w, ww)) in iproduct!(&gl, &gl, &gl) {
                    let point = [u, (1.0 - u) * v, (1.0 - u) * (1.0 - v) * w];
                    let jacobian = (1.0 - u).powi(2) * (1.0 - v);
                    self.push(point, wu * wv * ww * jacobian);
                }
            }
        }
    }

    /// The family this rule integrates over.
    #[inline]
    pub fn family(&self) -> ElementFamily {
        self.family
    }

    /// Highest total degree of polynomial this rule integrates exactly.
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of integration points.
    #[inline]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// Whether the rule has no points (never true for a constructed rule).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Reference coordinates of an integration point, padded with zeros.
    #[inline]
    pub fn point(&self, i: usize) -> na::Vector3<f64> {
        self.points[i]
    }

    /// Weight of an integration point.
    #[inline]
    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    /// All integration points.
    #[inline]
    pub fn points(&self) -> &[na::Vector3<f64>] {
        &self.points
    }

    /// All weights.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Iterate over (point, weight) pairs.
    pub fn iter(&self) -> impl '_ + Iterator<Item = (na::Vector3<f64>, f64)> {
        self.points.iter().copied().zip(self.weights.iter().copied())
    }

    /// Apply the rule to a function of reference coordinates.
    pub fn integrate(&self, f: impl Fn(&na::Vector3<f64>) -> f64) -> f64 {
        self.iter().map(|(p, w)| w * f(&p)).sum()
    }
}

/// Number of Gauss-Legendre points needed to integrate
/// a univariate polynomial of degree `required - 1` exactly.
#[inline]
fn gl_points_for(required: usize) -> usize {
    ((required + 1) / 2).clamp(1, MAX_GL_POINTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::reference_measure;
    use approx::assert_relative_eq;

    fn factorial(n: u32) -> f64 {
        (1..=n).map(|k| k as f64).product()
    }

    /// Closed-form integral of `x^a y^b z^c` over a reference domain.
    fn exact_monomial_integral(family: ElementFamily, [a, b, c]: [u32; 3]) -> f64 {
        match family {
            ElementFamily::Point => 1.0,
            ElementFamily::Line | ElementFamily::Quadrilateral | ElementFamily::Hexahedron => {
                1.0 / ((a + 1) * (b + 1) * (c + 1)) as f64
            }
            ElementFamily::Triangle => factorial(a) * factorial(b) / factorial(a + b + 2),
            ElementFamily::Tetrahedron => {
                factorial(a) * factorial(b) * factorial(c) / factorial(a + b + c + 3)
            }
        }
    }

    fn monomials_up_to(family: ElementFamily, degree: u32) -> Vec<[u32; 3]> {
        let dim = family.dim();
        iproduct!(0..=degree, 0..=degree, 0..=degree)
            .map(|(a, b, c)| [a, b, c])
            .filter(|e| e.iter().sum::<u32>() <= degree)
            .filter(|e| e.iter().skip(dim).all(|&x| x == 0))
            .collect()
    }

    #[test]
    fn rules_are_exact_to_their_degree() {
        for family in ElementFamily::ALL.into_iter().skip(1) {
            for requested in 0..=max_degree(family) {
                let rule = QuadratureRule::new(family, QuadratureOrder::Degree(requested)).unwrap();
                assert!(rule.degree() >= requested);
                for exps in monomials_up_to(family, rule.degree() as u32) {
                    let numeric = rule.integrate(|p| {
                        p.x.powi(exps[0] as i32) * p.y.powi(exps[1] as i32) * p.z.powi(exps[2] as i32)
                    });
                    let exact = exact_monomial_integral(family, exps);
                    assert!(
                        (numeric - exact).abs() < 1e-12,
                        "{family:?} degree {} rule: ∫x^{}y^{}z^{} = {numeric}, expected {exact}",
                        rule.degree(),
                        exps[0],
                        exps[1],
                        exps[2],
                    );
                }
            }
        }
    }

    #[test]
    fn weights_sum_to_reference_measure() {
        for family in ElementFamily::ALL {
            let rule = QuadratureRule::new(family, QuadratureOrder::Default).unwrap();
            assert_relative_eq!(
                rule.weights().iter().sum::<f64>(),
                reference_measure(family),
                epsilon = 1e-14
            );
        }
    }

    #[test]
    fn points_lie_inside_reference_domain() {
        for family in ElementFamily::ALL {
            for requested in [1, 2, 3, 5] {
                let Ok(rule) = QuadratureRule::new(family, QuadratureOrder::Degree(requested))
                else {
                    continue;
                };
                for p in rule.points() {
                    assert!(p.iter().all(|c| (0.0..=1.0).contains(c)));
                    assert!(p.iter().skip(family.dim()).all(|&c| c == 0.0));
                    if family.is_simplex() {
                        assert!(p.sum() <= 1.0);
                    }
                }
            }
        }
    }

    #[test]
    fn too_high_degrees_are_rejected() {
        assert_eq!(
            QuadratureRule::new(ElementFamily::Tetrahedron, QuadratureOrder::Degree(8)),
            Err(ElementError::UnsupportedQuadrature {
                family: ElementFamily::Tetrahedron,
                degree: 8
            })
        );
        assert!(QuadratureRule::new(ElementFamily::Hexahedron, QuadratureOrder::Degree(9)).is_ok());
        assert!(QuadratureRule::new(ElementFamily::Line, QuadratureOrder::Degree(10)).is_err());
        let point = QuadratureRule::new(ElementFamily::Point, QuadratureOrder::Degree(40)).unwrap();
        assert_eq!(point.len(), 1);
        assert_eq!(point.weight(0), 1.0);
    }

    #[test]
    fn rules_are_deterministic() {
        let a = QuadratureRule::new(ElementFamily::Hexahedron, QuadratureOrder::Default).unwrap();
        let b = QuadratureRule::new(ElementFamily::Hexahedron, QuadratureOrder::Degree(5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 27);
    }
}
