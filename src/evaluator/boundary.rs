use nalgebra as na;

use super::{interpolate_position, pad_nodes};
use crate::{
    element::{
        shape::ShapeFunctionSet,
        topology::{line_side_sign, side_map, side_nodes, SideMap},
        ElementError, ElementFamily, ElementOrder,
    },
    quadrature::{QuadratureOrder, QuadratureRule},
    ElementLibrary,
};

/// One side of an element bound to the element's physical nodes,
/// ready for integration over that side.
///
/// Integration points come from the quadrature rule of the side's own family
/// and are mapped into the volume element's reference domain
/// to evaluate volume gradients there.
#[derive(Clone, Debug)]
pub struct BoundaryElementEvaluator<'a> {
    volume: &'a ShapeFunctionSet,
    side_shape: &'a ShapeFunctionSet,
    rule: &'a QuadratureRule,
    side: usize,
    side_nodes: &'static [usize],
    side_map: SideMap,
    nodes: Vec<na::Vector3<f64>>,
    ambient_dim: usize,
    element: usize,
}

/// Everything computed at one integration point on a side of an element.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundaryPointEvaluation {
    /// Index of the integration point in the side's quadrature rule.
    pub point: usize,
    /// Coordinates of the point in the volume element's reference domain.
    pub xi: na::Vector3<f64>,
    /// Quadrature weight of the point.
    pub weight: f64,
    /// Values of the side's own shape functions,
    /// in the order of [`BoundaryElementEvaluator::side_nodes`].
    pub n: na::DVector<f64>,
    /// Reference gradients of the volume shape functions of the side's nodes,
    /// one row per side node and one column per volume reference dimension.
    pub dn_dxi: na::DMatrix<f64>,
    /// Physical position of the point, padded to 3D.
    pub position: na::Vector3<f64>,
    /// Outward unit normal, padded to 3D.
    pub normal: na::Vector3<f64>,
    /// Length or area scale factor of the side's map to physical space
    /// (1 on the end points of a line).
    pub det_j: f64,
    /// `det_j` times the quadrature weight.
    pub det_jxw: f64,
}

impl BoundaryPointEvaluation {
    /// Interpolate a scalar field given at the side's nodes.
    ///
    /// # Panics
    ///
    /// If `side_values` doesn't have one value per node of the side.
    #[inline]
    pub fn interpolate(&self, side_values: &[f64]) -> f64 {
        assert_eq!(
            side_values.len(),
            self.n.len(),
            "Side values must have one entry per side node"
        );
        self.n.iter().zip(side_values).map(|(n, v)| n * v).sum()
    }
}

impl<'a> BoundaryElementEvaluator<'a> {
    /// Bind one side of an element.
    ///
    /// `volume_nodes` are the physical nodes of the whole element
    /// in reference element order.
    pub fn bind<const D: usize>(
        library: &'a ElementLibrary,
        volume_nodes: &[na::SVector<f64, D>],
        element: usize,
        family: ElementFamily,
        side: usize,
        order: ElementOrder,
        quadrature: QuadratureOrder,
    ) -> Result<Self, ElementError> {
        let volume = library.shape_functions(family, order)?;
        let side_family = family
            .boundary_family()
            .ok_or(ElementError::InvalidSide { family, side })?;
        let side_nodes = side_nodes(family, order, side)?;
        let side_map = side_map(family, side)?;
        let side_shape = library.shape_functions(side_family, order)?;
        let rule = library.quadrature(side_family, quadrature)?;
        let nodes = pad_nodes(volume_nodes, volume.nne(), family.dim())?;

        Ok(Self {
            volume,
            side_shape,
            rule,
            side,
            side_nodes,
            side_map,
            nodes,
            ambient_dim: D,
            element,
        })
    }

    /// The volume element's family.
    #[inline]
    pub fn family(&self) -> ElementFamily {
        self.volume.family()
    }

    /// Index of the bound side within its element.
    #[inline]
    pub fn side(&self) -> usize {
        self.side
    }

    /// Element-local indices of the side's nodes,
    /// in the order used by [`BoundaryPointEvaluation::n`].
    #[inline]
    pub fn side_nodes(&self) -> &'static [usize] {
        self.side_nodes
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

    /// Evaluate shape functions, the side's surface map and its normal
    /// at one integration point of the side.
    pub fn evaluate_at(&self, point: usize) -> Result<BoundaryPointEvaluation, ElementError> {
        if point >= self.rule.len() {
            return Err(ElementError::PointOutOfRange {
                point,
                count: self.rule.len(),
            });
        }
        let s = self.rule.point(point);
        let weight = self.rule.weight(point);
        let xi = self.side_map.apply(&s);

        let n = self.side_shape.values(&s);
        let volume_gradients = self.volume.gradients(&xi);
        let dn_dxi = na::DMatrix::from_fn(self.side_nodes.len(), volume_gradients.ncols(), |r, c| {
            volume_gradients[(self.side_nodes[r], c)]
        });
        let side_coords: Vec<na::Vector3<f64>> =
            self.side_nodes.iter().map(|&i| self.nodes[i]).collect();
        let position = interpolate_position(&side_coords, &n);

        let invalid = |det_j: f64| ElementError::InvalidGeometry {
            element: self.element,
            point,
            det_j,
        };

        let ref_dim = self.family().dim();
        // physical derivative of position along a direction in the volume's reference domain,
        // using only the side's nodes since the other shape functions vanish on the side
        let directional = |direction: na::Vector3<f64>| -> na::Vector3<f64> {
            let rates = &dn_dxi * direction.rows(0, ref_dim);
            side_coords
                .iter()
                .zip(rates.iter())
                .fold(na::Vector3::zeros(), |acc, (x, r)| acc + x * *r)
        };
        // tangent of the whole element along one reference axis
        let element_tangent = |axis: usize| -> na::Vector3<f64> {
            self.nodes
                .iter()
                .zip(volume_gradients.column(axis).iter())
                .fold(na::Vector3::zeros(), |acc, (x, g)| acc + x * *g)
        };

        let (normal, det_j) = match ref_dim {
            1 => {
                let sign = line_side_sign(self.side)?;
                let tangent = element_tangent(0);
                let len = tangent.norm();
                if len <= 0.0 {
                    return Err(invalid(len));
                }
                (tangent * (sign / len), 1.0)
            }
            2 => {
                let t = directional(self.side_map.axis(0));
                let det_j = t.norm();
                let normal = if self.ambient_dim <= 2 {
                    na::Vector3::new(t.y, -t.x, 0.0)
                } else {
                    // element lies on a surface in 3D; the outward normal stays in its tangent plane
                    t.cross(&element_tangent(0).cross(&element_tangent(1)))
                };
                let normal_len = normal.norm();
                if det_j <= 0.0 || normal_len <= 0.0 {
                    return Err(invalid(det_j));
                }
                (normal / normal_len, det_j)
            }
            _ => {
                let t1 = directional(self.side_map.axis(0));
                let t2 = directional(self.side_map.axis(1));
                let normal = t1.cross(&t2);
                let det_j = normal.norm();
                if det_j <= 0.0 {
                    return Err(invalid(det_j));
                }
                (normal / det_j, det_j)
            }
        };

        Ok(BoundaryPointEvaluation {
            point,
            xi,
            weight,
            n,
            dn_dxi,
            position,
            normal,
            det_j,
            det_jxw: det_j * weight,
        })
    }

    /// Evaluate every integration point in order.
    pub fn points(
        &self,
    ) -> impl '_ + Iterator<Item = Result<BoundaryPointEvaluation, ElementError>> {
        (0..self.len()).map(|i| self.evaluate_at(i))
    }

    /// Integrate a function of the point data over the side.
    pub fn integrate(
        &self,
        mut integrand: impl FnMut(&BoundaryPointEvaluation) -> f64,
    ) -> Result<f64, ElementError> {
        let mut total = 0.0;
        for p in self.points() {
            let p = p?;
            total += integrand(&p) * p.det_jxw;
        }
        Ok(total)
    }

    /// Physical length or area of the side (1 for the end point of a line).
    pub fn measure(&self) -> Result<f64, ElementError> {
        self.integrate(|_| 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementEvaluator;
    use approx::assert_relative_eq;

    type Vec1 = na::SVector<f64, 1>;
    type Vec2 = na::Vector2<f64>;
    type Vec3 = na::Vector3<f64>;

    fn lib() -> &'static ElementLibrary {
        ElementLibrary::global()
    }

    #[test]
    fn triangle_side_length() {
        let vertices = [Vec2::new(1.0, 1.0), Vec2::new(3.0, 1.0), Vec2::new(1.0, 3.0)];
        let mut quadratic = vertices.to_vec();
        quadratic.extend([Vec2::new(2.0, 1.0), Vec2::new(2.0, 2.0), Vec2::new(1.0, 2.0)]);

        for (order, nodes) in [
            (ElementOrder::LINEAR, vertices.to_vec()),
            (ElementOrder::QUADRATIC, quadratic),
        ] {
            let eval = BoundaryElementEvaluator::bind(
                lib(),
                &nodes,
                0,
                ElementFamily::Triangle,
                1,
                order,
                QuadratureOrder::Default,
            )
            .unwrap();
            assert_relative_eq!(eval.measure().unwrap(), 8.0_f64.sqrt(), epsilon = 1e-13);
            for p in eval.points() {
                let p = p.unwrap();
                let diag = 0.5_f64.sqrt();
                assert_relative_eq!(p.normal, Vec3::new(diag, diag, 0.0), epsilon = 1e-13);
                assert_relative_eq!(p.position.x + p.position.y, 4.0, epsilon = 1e-13);
                assert_relative_eq!(p.n.sum(), 1.0, epsilon = 1e-13);
                assert_eq!(p.dn_dxi.shape(), (eval.side_nodes().len(), 2));
            }
        }
    }

    #[test]
    fn side_interpolation() {
        let nodes = [Vec2::new(1.0, 1.0), Vec2::new(3.0, 1.0), Vec2::new(1.0, 3.0)];
        let eval = BoundaryElementEvaluator::bind(
            lib(),
            &nodes,
            0,
            ElementFamily::Triangle,
            1,
            ElementOrder::LINEAR,
            QuadratureOrder::Default,
        )
        .unwrap();
        let xs: Vec<f64> = eval.side_nodes().iter().map(|&i| nodes[i].x).collect();
        for p in eval.points() {
            let p = p.unwrap();
            assert_relative_eq!(p.interpolate(&xs), p.position.x, epsilon = 1e-13);
        }

        let p = eval.evaluate_at(0).unwrap();
        let all_nodes = [1.0, 3.0, 1.0];
        let result = std::panic::catch_unwind(|| p.interpolate(&all_nodes));
        assert!(result.is_err(), "interpolating element values on a side should panic");
    }

    #[test]
    fn tetrahedron_slanted_face_area() {
        let vertices = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(0.0, 0.0, 2.0),
        ];
        let mut quadratic = vertices.to_vec();
        quadratic.extend([
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        ]);
        let expected_area = 4.0 * (2.0 * std::f64::consts::PI / 3.0).sin();

        for (order, nodes) in [
            (ElementOrder::LINEAR, vertices.to_vec()),
            (ElementOrder::QUADRATIC, quadratic),
        ] {
            let eval = BoundaryElementEvaluator::bind(
                lib(),
                &nodes,
                0,
                ElementFamily::Tetrahedron,
                2,
                order,
                QuadratureOrder::Default,
            )
            .unwrap();
            assert_relative_eq!(eval.measure().unwrap(), expected_area, epsilon = 1e-13);
            let outward = Vec3::repeat(1.0 / 3.0_f64.sqrt());
            for p in eval.points() {
                assert_relative_eq!(p.unwrap().normal, outward, epsilon = 1e-13);
            }
        }
    }

    #[test]
    fn line_end_points() {
        let nodes = [Vec1::new(1.0), Vec1::new(4.0), Vec1::new(2.5)];
        for (side, sign, x) in [(0, -1.0, 1.0), (1, 1.0, 4.0)] {
            let eval = BoundaryElementEvaluator::bind(
                lib(),
                &nodes,
                0,
                ElementFamily::Line,
                side,
                ElementOrder::QUADRATIC,
                QuadratureOrder::Default,
            )
            .unwrap();
            assert_eq!(eval.len(), 1);
            let p = eval.evaluate_at(0).unwrap();
            assert_relative_eq!(p.normal, Vec3::new(sign, 0.0, 0.0), epsilon = 1e-13);
            assert_eq!(p.det_j, 1.0);
            assert_eq!(p.det_jxw, 1.0);
            assert_relative_eq!(p.position.x, x, epsilon = 1e-14);
            assert_eq!(p.dn_dxi.shape(), (1, 1));
        }
    }

    /// Outward normals integrate to zero over a closed surface,
    /// and the side areas add up to the surface area.
    #[test]
    fn hexahedron_closed_surface() {
        for order in ElementFamily::Hexahedron.orders() {
            let shape = lib()
                .shape_functions(ElementFamily::Hexahedron, order)
                .unwrap();
            let nodes: Vec<Vec3> = shape
                .reference()
                .nodes
                .iter()
                .map(|n| n.component_mul(&Vec3::new(2.0, 3.0, 4.0)))
                .collect();
            let mut total_area = 0.0;
            let mut flux = Vec3::zeros();
            for side in 0..ElementFamily::Hexahedron.side_count() {
                let eval = BoundaryElementEvaluator::bind(
                    lib(),
                    &nodes,
                    0,
                    ElementFamily::Hexahedron,
                    side,
                    order,
                    QuadratureOrder::Default,
                )
                .unwrap();
                total_area += eval.measure().unwrap();
                for p in eval.points() {
                    let p = p.unwrap();
                    flux += p.normal * p.det_jxw;
                }
            }
            assert_relative_eq!(total_area, 2.0 * (6.0 + 8.0 + 12.0), epsilon = 1e-12);
            assert_relative_eq!(flux.norm(), 0.0, epsilon = 1e-12);
        }
    }

    /// ∫ div F dΩ = ∮ F·n dΓ with F = (x, 0) on a curved quadratic triangle.
    #[test]
    fn divergence_theorem_on_curved_triangle() {
        let nodes = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.2),
            Vec2::new(0.1, 1.5),
            Vec2::new(1.0, -0.1),
            Vec2::new(1.1, 0.9),
            Vec2::new(0.1, 0.7),
        ];
        let area = ElementEvaluator::bind(
            lib(),
            &nodes,
            0,
            ElementFamily::Triangle,
            ElementOrder::QUADRATIC,
            QuadratureOrder::Default,
        )
        .and_then(|e| e.measure())
        .unwrap();

        let mut flux = 0.0;
        for side in 0..3 {
            let eval = BoundaryElementEvaluator::bind(
                lib(),
                &nodes,
                0,
                ElementFamily::Triangle,
                side,
                ElementOrder::QUADRATIC,
                QuadratureOrder::Default,
            )
            .unwrap();
            flux += eval.integrate(|p| p.position.x * p.normal.x).unwrap();
        }
        assert_relative_eq!(flux, area, epsilon = 1e-12);
    }

    #[test]
    fn surface_triangle_normals_stay_in_plane() {
        let nodes = [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0), Vec3::new(0.0, 1.0, 0.0)];
        let eval = BoundaryElementEvaluator::bind(
            lib(),
            &nodes,
            0,
            ElementFamily::Triangle,
            0,
            ElementOrder::LINEAR,
            QuadratureOrder::Default,
        )
        .unwrap();
        assert_relative_eq!(eval.measure().unwrap(), 2.0_f64.sqrt(), epsilon = 1e-13);
        let p = eval.evaluate_at(0).unwrap();
        assert_relative_eq!(p.normal, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-13);
    }

    #[test]
    fn sides_are_validated() {
        let tri = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        let bind = |family, side| {
            BoundaryElementEvaluator::bind(
                lib(),
                &tri,
                0,
                family,
                side,
                ElementOrder::LINEAR,
                QuadratureOrder::Default,
            )
            .err()
        };
        assert_eq!(
            bind(ElementFamily::Triangle, 3),
            Some(ElementError::InvalidSide {
                family: ElementFamily::Triangle,
                side: 3
            })
        );
        assert!(matches!(
            bind(ElementFamily::Point, 0),
            Some(ElementError::InvalidSide { .. })
        ));
        assert!(matches!(
            bind(ElementFamily::Quadrilateral, 0),
            Some(ElementError::NodeCountMismatch { .. })
        ));
    }
}
