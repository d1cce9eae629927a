//! Polynomials in up to three reference coordinates.
//!
//! These are only as general as shape functions need:
//! real coefficients on monomials `ξ^a η^b ζ^c` with small exponents.

use nalgebra as na;

/// A monomial `ξ^a η^b ζ^c`, stored as its exponents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Monomial(pub [u8; 3]);

impl Monomial {
    /// The constant monomial 1.
    pub const ONE: Monomial = Monomial([0, 0, 0]);

    /// Evaluate the monomial at a point.
    #[inline]
    pub fn evaluate(&self, point: &na::Vector3<f64>) -> f64 {
        self.0
            .iter()
            .zip(point.iter())
            .map(|(&exp, &x)| x.powi(exp as i32))
            .product()
    }

    /// Total degree of the monomial.
    #[inline]
    pub fn degree(&self) -> u32 {
        self.0.iter().map(|&e| e as u32).sum()
    }

    /// Differentiate with respect to one coordinate.
    ///
    /// Returns the factor brought down by the derivative and the remaining monomial,
    /// or `None` if the derivative vanishes.
    pub fn derivative(&self, axis: usize) -> Option<(f64, Monomial)> {
        let exp = self.0[axis];
        if exp == 0 {
            return None;
        }
        let mut lowered = self.0;
        lowered[axis] -= 1;
        Some((exp as f64, Monomial(lowered)))
    }
}

/// A single term of a polynomial.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Term {
    /// Multiplier of the monomial.
    pub coefficient: f64,
    /// The monomial.
    pub monomial: Monomial,
}

/// A polynomial as a sum of terms with distinct monomials.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polynomial {
    terms: Vec<Term>,
}

impl Polynomial {
    /// The zero polynomial.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Build a polynomial from coefficients on a list of monomials.
    ///
    /// Coefficients with magnitude at or below `threshold` are dropped.
    /// Repeated monomials are combined.
    pub fn from_coefficients(
        monomials: &[Monomial],
        coefficients: impl IntoIterator<Item = f64>,
        threshold: f64,
    ) -> Self {
        let mut poly = Self::zero();
        for (&monomial, coefficient) in monomials.iter().zip(coefficients) {
            poly.add_term(coefficient, monomial);
        }
        poly.terms.retain(|t| t.coefficient.abs() > threshold);
        poly
    }

    fn add_term(&mut self, coefficient: f64, monomial: Monomial) {
        match self.terms.iter_mut().find(|t| t.monomial == monomial) {
            Some(t) => t.coefficient += coefficient,
            None => self.terms.push(Term {
                coefficient,
                monomial,
            }),
        }
    }

    /// The terms of the polynomial.
    #[inline]
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Whether the polynomial has no terms.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Highest total degree of any term, 0 for the zero polynomial.
    pub fn degree(&self) -> u32 {
        self.terms
            .iter()
            .map(|t| t.monomial.degree())
            .max()
            .unwrap_or(0)
    }

    /// Evaluate at a point in reference coordinates.
    pub fn evaluate(&self, point: &na::Vector3<f64>) -> f64 {
        self.terms
            .iter()
            .map(|t| t.coefficient * t.monomial.evaluate(point))
            .sum()
    }

    /// Partial derivative with respect to one reference coordinate.
    pub fn derivative(&self, axis: usize) -> Polynomial {
        let mut result = Polynomial::zero();
        for term in &self.terms {
            if let Some((factor, monomial)) = term.monomial.derivative(axis) {
                result.add_term(factor * term.coefficient, monomial);
            }
        }
        result
    }
}
