//! Evaluating shape functions and the isoparametric map on concrete elements.
//!
//! An evaluator is bound to one element's physical node coordinates
//! and borrows its shape functions and quadrature rule from an [`ElementLibrary`].
//! Evaluating an integration point produces a self-contained [`PointEvaluation`];
//! the evaluator itself holds no per-point state and can be shared freely.
//!
//! ```
//! # use isoparam::{ElementEvaluator, ElementFamily, ElementLibrary, ElementOrder, QuadratureOrder};
//! # use nalgebra::Vector2;
//! let nodes = [Vector2::new(1., 1.), Vector2::new(3., 1.), Vector2::new(1., 3.)];
//! let eval = ElementEvaluator::bind(
//!     ElementLibrary::global(),
//!     &nodes,
//!     0,
//!     ElementFamily::Triangle,
//!     ElementOrder::LINEAR,
//!     QuadratureOrder::Default,
//! )?;
//! let area = eval.integrate(|_| 1.0)?;
//! assert!((area - 2.0).abs() < 1e-12);
//! # Ok::<(), isoparam::ElementError>(())
//! ```

mod boundary;
pub use boundary::{BoundaryElementEvaluator, BoundaryPointEvaluation};

use nalgebra as na;

use crate::{
    element::{shape::ShapeFunctionSet, ElementError, ElementFamily, ElementOrder},
    quadrature::{QuadratureOrder, QuadratureRule},
    ElementLibrary,
};

/// An element bound to its physical node coordinates, ready for integration.
#[derive(Clone, Debug)]
pub struct ElementEvaluator<'a> {
    shape: &'a ShapeFunctionSet,
    rule: &'a QuadratureRule,
    /// physical node coordinates padded to 3D with zeros
    nodes: Vec<na::Vector3<f64>>,
    ambient_dim: usize,
    element: usize,
}

/// Everything computed at one integration point of an element.
#[derive(Clone, Debug, PartialEq)]
pub struct PointEvaluation {
    /// Index of the integration point in the quadrature rule.
    pub point: usize,
    /// Reference coordinates of the integration point.
    pub xi: na::Vector3<f64>,
    /// Quadrature weight of the point.
    pub weight: f64,
    /// Shape function values, one per node.
    pub n: na::DVector<f64>,
    /// Shape function gradients in reference coordinates,
    /// one row per node and one column per reference dimension.
    pub dn_dxi: na::DMatrix<f64>,
    /// Shape function gradients in physical coordinates,
    /// one row per node and one column per physical dimension.
    pub dn_dx: na::DMatrix<f64>,
    /// Physical position of the point, padded to 3D.
    pub position: na::Vector3<f64>,
    /// Determinant of the isoparametric map
    /// (or its length/area scale factor on a lower-dimensional manifold).
    pub det_j: f64,
    /// `det_j` times the quadrature weight; the point's integration contribution.
    pub det_jxw: f64,
}

impl PointEvaluation {
    /// Interpolate a nodal scalar field at this point.
    ///
    /// # Panics
    ///
    /// If `nodal_values` doesn't have one value per node of the element.
    #[inline]
    pub fn interpolate(&self, nodal_values: &[f64]) -> f64 {
        assert_eq!(
            nodal_values.len(),
            self.n.len(),
            "Nodal values must have one entry per element node"
        );
        self.n.iter().zip(nodal_values).map(|(n, v)| n * v).sum()
    }

    /// Physical gradient of a nodal scalar field at this point.
    ///
    /// # Panics
    ///
    /// If `nodal_values` doesn't have one value per node of the element.
    pub fn gradient(&self, nodal_values: &[f64]) -> na::DVector<f64> {
        assert_eq!(
            nodal_values.len(),
            self.dn_dx.nrows(),
            "Nodal values must have one entry per element node"
        );
        self.dn_dx.tr_mul(&na::DVector::from_column_slice(nodal_values))
    }
}

impl<'a> ElementEvaluator<'a> {
    /// Bind an element's physical nodes to its shape functions and quadrature rule.
    ///
    /// `nodes` lists the element's nodes in reference element order.
    /// `element` is only used to identify the element in errors.
    pub fn bind<const D: usize>(
        library: &'a ElementLibrary,
        nodes: &[na::SVector<f64, D>],
        element: usize,
        family: ElementFamily,
        order: ElementOrder,
        quadrature: QuadratureOrder,
    ) -> Result<Self, ElementError> {
        let shape = library.shape_functions(family, order)?;
        let rule = library.quadrature(family, quadrature)?;
        let nodes = pad_nodes(nodes, shape.nne(), family.dim())?;
        Ok(Self {
            shape,
            rule,
            nodes,
            ambient_dim: D,
            element,
        })
    }

    /// The element's family.
    #[inline]
    pub fn family(&self) -> ElementFamily {
        self.shape.family()
    }

    /// Number of integration points.
    #[inline]
    pub fn len(&self) -> usize {
        self.rule.len()
    }

    /// Whether there are no integration points (never true for a bound evaluator).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rule.is_empty()
    }

    /// The quadrature rule in use.
    #[inline]
    pub fn rule(&self) -> &QuadratureRule {
        self.rule
    }

    /// Evaluate shape functions and the isoparametric map at one integration point.
    ///
    /// Fails with [`ElementError::InvalidGeometry`]
    /// if the element is inverted or degenerate at the point.
    pub fn evaluate_at(&self, point: usize) -> Result<PointEvaluation, ElementError> {
        if point >= self.rule.len() {
            return Err(ElementError::PointOutOfRange {
                point,
                count: self.rule.len(),
            });
        }
        let xi = self.rule.point(point);
        let weight = self.rule.weight(point);
        let n = self.shape.values(&xi);
        let dn_dxi = self.shape.gradients(&xi);
        let position = interpolate_position(&self.nodes, &n);

        let jacobian = map_jacobian(&self.nodes, &self.shape.reference().nodes, &dn_dxi);
        let invalid = |det_j: f64| ElementError::InvalidGeometry {
            element: self.element,
            point,
            det_j,
        };

        let ref_dim = self.family().dim();
        let (det_j, dn_dx) = if ref_dim == self.ambient_dim {
            let det_j = jacobian.determinant();
            if det_j <= 0.0 {
                return Err(invalid(det_j));
            }
            let inverse = jacobian.try_inverse().ok_or_else(|| invalid(det_j))?;
            // ∂N/∂x = ∂N/∂ξ · ∂ξ/∂x, restricted to the element's own axes
            let inverse = inverse.view((0, 0), (ref_dim, ref_dim));
            (det_j, &dn_dxi * inverse)
        } else {
            manifold_gradients(&jacobian, &dn_dxi, self.ambient_dim).ok_or_else(|| {
                invalid(0.0)
            })?
        };

        Ok(PointEvaluation {
            point,
            xi,
            weight,
            n,
            dn_dxi,
            dn_dx,
            position,
            det_j,
            det_jxw: det_j * weight,
        })
    }

    /// Evaluate every integration point in order.
    pub fn points(&self) -> impl '_ + Iterator<Item = Result<PointEvaluation, ElementError>> {
        (0..self.len()).map(|i| self.evaluate_at(i))
    }

    /// Integrate a function of the point data over the element.
    ///
    /// Stops at the first invalid integration point.
    pub fn integrate(
        &self,
        mut integrand: impl FnMut(&PointEvaluation) -> f64,
    ) -> Result<f64, ElementError> {
        let mut total = 0.0;
        for p in self.points() {
            let p = p?;
            total += integrand(&p) * p.det_jxw;
        }
        Ok(total)
    }

    /// Physical length, area or volume of the element.
    pub fn measure(&self) -> Result<f64, ElementError> {
        self.integrate(|_| 1.0)
    }
}

/// Check the node count and dimension of an element and pad its nodes to 3D.
pub(crate) fn pad_nodes<const D: usize>(
    nodes: &[na::SVector<f64, D>],
    expected: usize,
    reference_dim: usize,
) -> Result<Vec<na::Vector3<f64>>, ElementError> {
    if nodes.len() != expected {
        return Err(ElementError::NodeCountMismatch {
            expected,
            actual: nodes.len(),
        });
    }
    if D < reference_dim || D > 3 {
        return Err(ElementError::DimensionMismatch {
            reference_dim,
            ambient_dim: D,
        });
    }
    Ok(nodes
        .iter()
        .map(|node| {
            let mut padded = na::Vector3::zeros();
            padded.fixed_rows_mut::<D>(0).copy_from(node);
            padded
        })
        .collect())
}

/// Physical position of a point given its shape function values.
pub(crate) fn interpolate_position(
    nodes: &[na::Vector3<f64>],
    n: &na::DVector<f64>,
) -> na::Vector3<f64> {
    nodes
        .iter()
        .zip(n.iter())
        .fold(na::Vector3::zeros(), |acc, (x, n)| acc + x * *n)
}

/// The isoparametric map's Jacobian as a perturbation of the identity map,
/// `J = I + (X - X_ref)ᵀ · ∂N/∂ξ`.
///
/// Axes beyond the element's reference dimension contribute identity columns,
/// so the 3x3 determinant is the true one for elements filling their space.
/// For elements on a lower-dimensional manifold,
/// the first `dim` columns are the tangent vectors of the manifold.
pub(crate) fn map_jacobian(
    nodes: &[na::Vector3<f64>],
    reference_nodes: &[na::Vector3<f64>],
    dn_dxi: &na::DMatrix<f64>,
) -> na::Matrix3<f64> {
    let mut jacobian = na::Matrix3::identity();
    for (i, (x, x_ref)) in nodes.iter().zip(reference_nodes).enumerate() {
        let offset = x - x_ref;
        for axis in 0..dn_dxi.ncols() {
            let mut col = jacobian.column_mut(axis);
            col += offset * dn_dxi[(i, axis)];
        }
    }
    jacobian
}

/// Scale factor and tangential gradients of an element
/// embedded in a space of higher dimension than itself.
///
/// The scale factor is the length (1D) or area (2D) spanned by the tangent vectors,
/// and gradients are projected onto the tangent space
/// through the pseudo-inverse of the tangent matrix.
/// Returns `None` for a degenerate element.
fn manifold_gradients(
    jacobian: &na::Matrix3<f64>,
    dn_dxi: &na::DMatrix<f64>,
    ambient_dim: usize,
) -> Option<(f64, na::DMatrix<f64>)> {
    let ref_dim = dn_dxi.ncols();
    let nne = dn_dxi.nrows();
    let tangents = na::DMatrix::from_fn(3, ref_dim, |row, col| jacobian[(row, col)]);

    let det_j = match ref_dim {
        0 => 1.0,
        1 => tangents.column(0).norm(),
        _ => {
            let t1 = na::Vector3::new(tangents[(0, 0)], tangents[(1, 0)], tangents[(2, 0)]);
            let t2 = na::Vector3::new(tangents[(0, 1)], tangents[(1, 1)], tangents[(2, 1)]);
            t1.cross(&t2).norm()
        }
    };
    if det_j <= 0.0 {
        return None;
    }
    if ref_dim == 0 {
        return Some((det_j, na::DMatrix::zeros(nne, ambient_dim)));
    }

    let metric = tangents.tr_mul(&tangents);
    let metric_inv = metric.try_inverse()?;
    let full = dn_dxi * metric_inv * tangents.transpose();
    Some((det_j, full.columns(0, ambient_dim).into_owned()))
}
