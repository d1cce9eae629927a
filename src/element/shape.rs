//! Derivation of nodal shape functions.
//!
//! For each supported element a set of monomials with as many members as there are nodes
//! is chosen. Evaluating every monomial at every node gives a square matrix `A`
//! with `A[j, k] = m_k(x_j)`, and the coefficients of the shape function belonging
//! to node `i` are column `i` of `A⁻¹`. This guarantees the interpolation property
//! `N_i(x_j) = δ_ij`.
//!
//! Quadratic quadrilaterals and hexahedra are serendipity elements:
//! their monomial sets stop short of the full tensor product,
//! leaving out the interior bubble terms that would need interior nodes.

use log::debug;
use nalgebra as na;

use super::{
    polynomial::{Monomial, Polynomial},
    ElementError, ElementFamily, ElementOrder, ReferenceElement,
};

/// Coefficients of this magnitude or smaller are round-off from the inversion.
const COEFFICIENT_TOLERANCE: f64 = 1e-10;

/// Nodal basis functions of one element and their reference-coordinate gradients.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeFunctionSet {
    reference: ReferenceElement,
    functions: Vec<Polynomial>,
    /// partial derivatives of each function with respect to ξ, η and ζ
    gradients: Vec<[Polynomial; 3]>,
}

impl ShapeFunctionSet {
    /// Derive the shape functions of an element.
    ///
    /// This solves a small dense linear system,
    /// so prefer looking sets up from an [`ElementLibrary`][crate::ElementLibrary]
    /// over calling this repeatedly.
    pub fn derive(family: ElementFamily, order: ElementOrder) -> Result<Self, ElementError> {
        let reference = ReferenceElement::new(family, order)?;
        let monomials = monomial_set(family, order);
        let functions = solve_interpolation(&reference, &monomials)?;
        debug!(
            "derived {} shape functions for {family:?} of order {order}",
            functions.len()
        );
        Ok(Self::from_functions(reference, functions))
    }

    /// Assemble a set from already derived basis polynomials,
    /// e.g. ones loaded from a cache.
    ///
    /// Fails if the number of functions doesn't match the element.
    pub fn from_polynomials(
        family: ElementFamily,
        order: ElementOrder,
        functions: Vec<Polynomial>,
    ) -> Result<Self, ElementError> {
        let reference = ReferenceElement::new(family, order)?;
        if functions.len() != reference.nne() {
            return Err(ElementError::NodeCountMismatch {
                expected: reference.nne(),
                actual: functions.len(),
            });
        }
        Ok(Self::from_functions(reference, functions))
    }

    fn from_functions(reference: ReferenceElement, functions: Vec<Polynomial>) -> Self {
        let gradients = functions
            .iter()
            .map(|f| [f.derivative(0), f.derivative(1), f.derivative(2)])
            .collect();
        Self {
            reference,
            functions,
            gradients,
        }
    }

    /// The element family.
    #[inline]
    pub fn family(&self) -> ElementFamily {
        self.reference.family
    }

    /// The element order.
    #[inline]
    pub fn order(&self) -> ElementOrder {
        self.reference.order
    }

    /// The reference element the functions interpolate on.
    #[inline]
    pub fn reference(&self) -> &ReferenceElement {
        &self.reference
    }

    /// Number of nodes (and functions).
    #[inline]
    pub fn nne(&self) -> usize {
        self.functions.len()
    }

    /// The basis polynomials in node order.
    #[inline]
    pub fn functions(&self) -> &[Polynomial] {
        &self.functions
    }

    /// Evaluate every shape function at a reference point.
    pub fn values(&self, xi: &na::Vector3<f64>) -> na::DVector<f64> {
        na::DVector::from_iterator(self.nne(), self.functions.iter().map(|f| f.evaluate(xi)))
    }

    /// Evaluate every shape function gradient at a reference point.
    ///
    /// Row `i` holds the gradient of `N_i`;
    /// there is one column per dimension of the reference element.
    pub fn gradients(&self, xi: &na::Vector3<f64>) -> na::DMatrix<f64> {
        let dim = self.family().dim();
        na::DMatrix::from_fn(self.nne(), dim, |i, axis| {
            self.gradients[i][axis].evaluate(xi)
        })
    }
}

/// Solve for the coefficients of the nodal basis on the given monomials.
fn solve_interpolation(
    reference: &ReferenceElement,
    monomials: &[Monomial],
) -> Result<Vec<Polynomial>, ElementError> {
    let nne = reference.nne();
    let singular = || ElementError::SingularInterpolationMatrix {
        family: reference.family,
        order: reference.order,
    };
    if monomials.len() != nne {
        return Err(singular());
    }

    let a = na::DMatrix::from_fn(nne, nne, |node, k| {
        monomials[k].evaluate(&reference.nodes[node])
    });
    let coefs = a.lu().try_inverse().ok_or_else(singular)?;

    Ok(coefs
        .column_iter()
        .map(|col| {
            Polynomial::from_coefficients(monomials, col.iter().copied(), COEFFICIENT_TOLERANCE)
        })
        .collect())
}

/// The monomials spanning the shape functions of an element.
///
/// Only valid for supported combinations.
fn monomial_set(family: ElementFamily, order: ElementOrder) -> Vec<Monomial> {
    let exps: &[[u8; 3]] = match (family, order.0) {
        (ElementFamily::Point, _) => &[[0, 0, 0]],
        (ElementFamily::Line, 0) => &[[0, 0, 0], [1, 0, 0]],
        (ElementFamily::Line, 1) => &[[0, 0, 0], [1, 0, 0], [2, 0, 0]],
        (ElementFamily::Line, _) => &[[0, 0, 0], [1, 0, 0], [2, 0, 0], [3, 0, 0]],
        (ElementFamily::Triangle, 0) => &[[0, 0, 0], [1, 0, 0], [0, 1, 0]],
        (ElementFamily::Triangle, _) => &[
            [0, 0, 0],
            [1, 0, 0],
            [0, 1, 0],
            [2, 0, 0],
            [1, 1, 0],
            [0, 2, 0],
        ],
        (ElementFamily::Quadrilateral, 0) => &[[0, 0, 0], [1, 0, 0], [0, 1, 0], [1, 1, 0]],
        (ElementFamily::Quadrilateral, _) => &[
            [0, 0, 0],
            [1, 0, 0],
            [0, 1, 0],
            [2, 0, 0],
            [1, 1, 0],
            [0, 2, 0],
            [2, 1, 0],
            [1, 2, 0],
        ],
        (ElementFamily::Tetrahedron, 0) => &[[0, 0, 0], [1, 0, 0], [0, 1, 0], [0, 0, 1]],
        (ElementFamily::Tetrahedron, _) => &[
            [0, 0, 0],
            [1, 0, 0],
            [0, 1, 0],
            [0, 0, 1],
            [2, 0, 0],
            [0, 2, 0],
            [0, 0, 2],
            [1, 1, 0],
            [0, 1, 1],
            [1, 0, 1],
        ],
        (ElementFamily::Hexahedron, 0) => &[
            [0, 0, 0],
            [1, 0, 0],
            [0, 1, 0],
            [0, 0, 1],
            [1, 1, 0],
            [0, 1, 1],
            [1, 0, 1],
            [1, 1, 1],
        ],
        (ElementFamily::Hexahedron, _) => &[
            [0, 0, 0],
            [1, 0, 0],
            [0, 1, 0],
            [0, 0, 1],
            [2, 0, 0],
            [0, 2, 0],
            [0, 0, 2],
            [1, 1, 0],
            [0, 1, 1],
            [1, 0, 1],
            [2, 1, 0],
            [2, 0, 1],
            [1, 2, 0],
            [0, 2, 1],
            [1, 0, 2],
            [0, 1, 2],
            [1, 1, 1],
            [2, 1, 1],
            [1, 2, 1],
            [1, 1, 2],
        ],
    };
    exps.iter().map(|&e| Monomial(e)).collect()
}
