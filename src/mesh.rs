//! Meshes of isoparametric elements and their boundaries.

pub mod boundary;
pub use boundary::BoundaryMesh;

/// Structured box meshes for tests and doctests.
mod box_mesh;
#[doc(hidden)]
pub use box_mesh::box_mesh;

//

use nalgebra as na;
use rayon::prelude::*;

use itertools::izip;
use std::sync::OnceLock;

use crate::{
    element::{check_supported, node_count, topology, ElementError, ElementFamily, ElementOrder},
    evaluator::{BoundaryElementEvaluator, BoundaryPointEvaluation, ElementEvaluator, PointEvaluation},
    quadrature::QuadratureOrder,
    ElementLibrary,
};

/// A mesh of elements of a single family and order.
///
/// The boundary of the mesh is extracted lazily on first access
/// and discarded whenever the connectivity changes.
#[derive(Clone, Debug)]
pub struct Mesh<const DIM: usize> {
    nodes: Vec<na::SVector<f64, DIM>>,
    /// node indices of every element in a flat Vec, `nne` per element
    connectivity: Vec<usize>,
    family: ElementFamily,
    order: ElementOrder,
    nne: usize,
    bounds: BoundingBox<DIM>,
    boundary: OnceLock<BoundaryMesh>,
}

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox<const DIM: usize> {
    /// The minimum (bottom left in 2D) corner of the box.
    pub min: na::SVector<f64, DIM>,
    /// The maximum (top right in 2D) corner of the box.
    pub max: na::SVector<f64, DIM>,
}

/// Errors in constructing a mesh or extracting its boundary.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum MeshError {
    /// The element type of the mesh is invalid.
    #[error(transparent)]
    Element(#[from] ElementError),
    /// The connectivity doesn't divide evenly into elements.
    #[error("Connectivity of length {len} is not a whole number of {nne}-node elements")]
    ConnectivityLength {
        /// Length of the connectivity array.
        len: usize,
        /// Nodes per element.
        nne: usize,
    },
    /// An element refers to a node that doesn't exist.
    #[error("Element {element} refers to node {node} but the mesh has {node_count} nodes")]
    NodeOutOfRange {
        /// Index of the offending element.
        element: usize,
        /// The nonexistent node index.
        node: usize,
        /// Number of nodes in the mesh.
        node_count: usize,
    },
    /// An element index past the end of the mesh.
    #[error("Element {element} requested but the mesh has {element_count} elements")]
    ElementOutOfRange {
        /// The requested element.
        element: usize,
        /// Number of elements in the mesh.
        element_count: usize,
    },
    /// A facet index past the end of the boundary.
    #[error("Boundary facet {facet} requested but the boundary has {facet_count} facets")]
    FacetOutOfRange {
        /// The requested facet.
        facet: usize,
        /// Number of facets on the boundary.
        facet_count: usize,
    },
    /// A face is shared by more than two elements.
    ///
    /// Reported as a diagnostic on the [`BoundaryMesh`];
    /// the face is left out of the boundary and extraction continues.
    #[error("Face with nodes {nodes:?} occurs in {occurrences} elements")]
    InconsistentBoundaryTopology {
        /// Sorted global node indices of the face.
        nodes: Vec<usize>,
        /// How many elements the face was found in.
        occurrences: usize,
    },
}

impl<const DIM: usize> Mesh<DIM> {
    /// Construct a mesh from node coordinates and flat element connectivity,
    /// where every `nne` consecutive indices make up one element
    /// with nodes in reference element order.
    pub fn new(
        nodes: Vec<na::SVector<f64, DIM>>,
        connectivity: Vec<usize>,
        family: ElementFamily,
        order: ElementOrder,
    ) -> Result<Self, MeshError> {
        check_supported(family, order)?;
        if DIM == 0 || DIM > 3 || DIM < family.dim() {
            return Err(ElementError::DimensionMismatch {
                reference_dim: family.dim(),
                ambient_dim: DIM,
            }
            .into());
        }
        let nne = node_count(family, order)?;
        validate_connectivity(&connectivity, nne, nodes.len())?;

        let mut bounds: BoundingBox<DIM> = BoundingBox {
            min: na::SVector::from_element(f64::MAX),
            max: na::SVector::from_element(f64::MIN),
        };
        for node in &nodes {
            for (coord, min, max) in izip!(
                node.as_slice(),
                bounds.min.as_mut_slice(),
                bounds.max.as_mut_slice()
            ) {
                if coord < min {
                    *min = *coord;
                }
                if coord > max {
                    *max = *coord;
                }
            }
        }

        Ok(Self {
            nodes,
            connectivity,
            family,
            order,
            nne,
            bounds,
            boundary: OnceLock::new(),
        })
    }

    /// Replace the element connectivity, keeping nodes, family and order.
    ///
    /// The boundary is extracted again on next access.
    pub fn set_connectivity(&mut self, connectivity: Vec<usize>) -> Result<(), MeshError> {
        validate_connectivity(&connectivity, self.nne, self.nodes.len())?;
        self.connectivity = connectivity;
        self.boundary = OnceLock::new();
        Ok(())
    }

    /// The element family of every element in the mesh.
    #[inline]
    pub fn family(&self) -> ElementFamily {
        self.family
    }

    /// The element order of every element in the mesh.
    #[inline]
    pub fn order(&self) -> ElementOrder {
        self.order
    }

    /// Number of nodes per element.
    #[inline]
    pub fn nne(&self) -> usize {
        self.nne
    }

    /// Get a slice of all node coordinates in the mesh.
    #[inline]
    pub fn nodes(&self) -> &[na::SVector<f64, DIM>] {
        &self.nodes
    }

    /// Number of elements in the mesh.
    #[inline]
    pub fn element_count(&self) -> usize {
        self.connectivity.len() / self.nne
    }

    /// Global node indices of one element.
    ///
    /// # Panics
    ///
    /// If `element >= self.element_count()`.
    #[inline]
    pub fn element(&self, element: usize) -> &[usize] {
        let start = element * self.nne;
        &self.connectivity[start..start + self.nne]
    }

    /// Iterate over the global node indices of every element.
    #[inline]
    pub fn elements(&self) -> std::slice::ChunksExact<'_, usize> {
        self.connectivity.chunks_exact(self.nne)
    }

    /// Node coordinates of one element in reference element order.
    ///
    /// # Panics
    ///
    /// If `element >= self.element_count()`.
    pub fn element_coordinates(&self, element: usize) -> Vec<na::SVector<f64, DIM>> {
        self.element(element).iter().map(|&n| self.nodes[n]).collect()
    }

    /// Get a bounding box enclosing the entire mesh.
    #[inline]
    pub fn bounds(&self) -> BoundingBox<DIM> {
        self.bounds
    }

    /// Local node lists of the sides of this mesh's elements.
    #[inline]
    pub(crate) fn side_table(&self) -> &'static [&'static [usize]] {
        // family and order were checked on construction
        topology::faces(self.family, self.order)
            .expect("Mesh element type not in the catalogue. This is a bug in isoparam")
    }

    /// The boundary of the mesh, tagged by bounding box sides.
    ///
    /// Extracted on first access.
    pub fn boundary(&self) -> &BoundaryMesh {
        self.boundary.get_or_init(|| {
            let mut boundary = boundary::extract(self);
            boundary::tag_by_bounding_box(self, &mut boundary);
            boundary
        })
    }

    /// Tag every boundary facet whose nodes all satisfy a predicate,
    /// overriding any previous tag.
    ///
    /// Tags set this way are lost if the connectivity changes.
    pub fn tag_boundary_where(
        &mut self,
        tag: u32,
        pred: impl Fn(&na::SVector<f64, DIM>) -> bool,
    ) {
        let matching: Vec<usize> = {
            let boundary = self.boundary();
            (0..boundary.len())
                .filter(|&f| boundary.facet(f).iter().all(|&n| pred(&self.nodes[n])))
                .collect()
        };
        if let Some(boundary) = self.boundary.get_mut() {
            for facet in matching {
                boundary.set_tag(facet, Some(tag));
            }
        }
    }

    /// Bind an evaluator to one element of the mesh.
    pub fn evaluator<'a>(
        &self,
        library: &'a ElementLibrary,
        element: usize,
        quadrature: QuadratureOrder,
    ) -> Result<ElementEvaluator<'a>, MeshError> {
        let element_count = self.element_count();
        if element >= element_count {
            return Err(MeshError::ElementOutOfRange {
                element,
                element_count,
            });
        }
        let eval = ElementEvaluator::bind(
            library,
            &self.element_coordinates(element),
            element,
            self.family,
            self.order,
            quadrature,
        )?;
        Ok(eval)
    }

    /// Bind an evaluator to one facet of the mesh boundary.
    pub fn boundary_evaluator<'a>(
        &self,
        library: &'a ElementLibrary,
        facet: usize,
        quadrature: QuadratureOrder,
    ) -> Result<BoundaryElementEvaluator<'a>, MeshError> {
        let boundary = self.boundary();
        if facet >= boundary.len() {
            return Err(MeshError::FacetOutOfRange {
                facet,
                facet_count: boundary.len(),
            });
        }
        let element = boundary.element(facet);
        let eval = BoundaryElementEvaluator::bind(
            library,
            &self.element_coordinates(element),
            element,
            self.family,
            boundary.side(facet),
            self.order,
            quadrature,
        )?;
        Ok(eval)
    }

    /// Integrate a function of the point data over the whole mesh.
    ///
    /// Elements are evaluated in parallel.
    /// Fails if any element is inverted or degenerate.
    pub fn integrate(
        &self,
        library: &ElementLibrary,
        quadrature: QuadratureOrder,
        integrand: impl Fn(&PointEvaluation) -> f64 + Sync,
    ) -> Result<f64, MeshError> {
        let per_element: Vec<f64> = (0..self.element_count())
            .into_par_iter()
            .map(|element| -> Result<f64, MeshError> {
                Ok(self
                    .evaluator(library, element, quadrature)?
                    .integrate(&integrand)?)
            })
            .collect::<Result<_, _>>()?;
        Ok(per_element.iter().sum())
    }

    /// Total length, area or volume of the mesh.
    pub fn measure(&self, library: &ElementLibrary) -> Result<f64, MeshError> {
        self.integrate(library, QuadratureOrder::Default, |_| 1.0)
    }

    /// Integrate a function of the point data over the boundary facets with a tag,
    /// or over the whole boundary if `tag` is `None`.
    pub fn integrate_boundary(
        &self,
        library: &ElementLibrary,
        quadrature: QuadratureOrder,
        tag: Option<u32>,
        integrand: impl Fn(&BoundaryPointEvaluation) -> f64 + Sync,
    ) -> Result<f64, MeshError> {
        let boundary = self.boundary();
        let facets: Vec<usize> = match tag {
            Some(tag) => boundary.facets_with_tag(tag).collect(),
            None => (0..boundary.len()).collect(),
        };
        let per_facet: Vec<f64> = facets
            .into_par_iter()
            .map(|facet| -> Result<f64, MeshError> {
                Ok(self
                    .boundary_evaluator(library, facet, quadrature)?
                    .integrate(&integrand)?)
            })
            .collect::<Result<_, _>>()?;
        Ok(per_facet.iter().sum())
    }
}

fn validate_connectivity(
    connectivity: &[usize],
    nne: usize,
    node_count: usize,
) -> Result<(), MeshError> {
    if connectivity.len() % nne != 0 {
        return Err(MeshError::ConnectivityLength {
            len: connectivity.len(),
            nne,
        });
    }
    for (element, nodes) in connectivity.chunks_exact(nne).enumerate() {
        if let Some(&node) = nodes.iter().find(|&&n| n >= node_count) {
            return Err(MeshError::NodeOutOfRange {
                element,
                node,
                node_count,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    type Vec2 = na::Vector2<f64>;

    fn lib() -> &'static ElementLibrary {
        ElementLibrary::global()
    }

    /// Every element type tiling the box [0,2]x[0,1]x[0,1]
    /// (or its 1D and 2D projections) integrates to its measure.
    #[test]
    fn box_volume() {
        for order in ElementFamily::Line.orders() {
            let mesh = box_mesh(ElementFamily::Line, order, [2.0], [4]).unwrap();
            assert_relative_eq!(mesh.measure(lib()).unwrap(), 2.0, epsilon = 1e-12);
        }
        for family in [ElementFamily::Triangle, ElementFamily::Quadrilateral] {
            for order in family.orders() {
                let mesh = box_mesh(family, order, [2.0, 1.0], [4, 4]).unwrap();
                assert_relative_eq!(mesh.measure(lib()).unwrap(), 2.0, epsilon = 1e-12);
            }
        }
        for family in [ElementFamily::Tetrahedron, ElementFamily::Hexahedron] {
            for order in family.orders() {
                let mesh = box_mesh(family, order, [2.0, 1.0, 1.0], [4, 4, 4]).unwrap();
                assert_relative_eq!(mesh.measure(lib()).unwrap(), 2.0, epsilon = 1e-12);
            }
        }
    }

    /// Integrating over the tagged sides of the box gives their areas.
    #[test]
    fn box_side_areas() {
        // tags: 1 min-x, 2 max-x, 3 min-y, 4 max-y, 5 min-z, 6 max-z
        for family in [ElementFamily::Tetrahedron, ElementFamily::Hexahedron] {
            for order in family.orders() {
                let mesh = box_mesh(family, order, [2.0, 1.0, 1.0], [4, 4, 4]).unwrap();
                for (tag, area) in [(1, 1.0), (2, 1.0), (3, 2.0), (4, 2.0), (5, 2.0), (6, 2.0)] {
                    let integral = mesh
                        .integrate_boundary(lib(), QuadratureOrder::Default, Some(tag), |_| 1.0)
                        .unwrap();
                    assert_relative_eq!(integral, area, epsilon = 1e-12);
                }
            }
        }
        for family in [ElementFamily::Triangle, ElementFamily::Quadrilateral] {
            for order in family.orders() {
                let mesh = box_mesh(family, order, [2.0, 1.0], [4, 4]).unwrap();
                for (tag, length) in [(1, 1.0), (2, 1.0), (3, 2.0), (4, 2.0)] {
                    let integral = mesh
                        .integrate_boundary(lib(), QuadratureOrder::Default, Some(tag), |_| 1.0)
                        .unwrap();
                    assert_relative_eq!(integral, length, epsilon = 1e-12);
                }
            }
        }
        for order in ElementFamily::Line.orders() {
            let mesh = box_mesh(ElementFamily::Line, order, [2.0], [4]).unwrap();
            let flux = mesh
                .integrate_boundary(lib(), QuadratureOrder::Default, None, |p| p.normal.x)
                .unwrap();
            assert_relative_eq!(flux, 0.0, epsilon = 1e-12);
            let end = mesh
                .integrate_boundary(lib(), QuadratureOrder::Default, Some(2), |p| p.position.x)
                .unwrap();
            assert_relative_eq!(end, 2.0, epsilon = 1e-12);
        }
    }

    /// Divergence theorem with F = x on a quadratic tetrahedral box:
    /// the outward flux equals the volume.
    #[test]
    fn boundary_flux_matches_volume() {
        let mesh = box_mesh(
            ElementFamily::Tetrahedron,
            ElementOrder::QUADRATIC,
            [2.0, 1.0, 1.0],
            [2, 2, 2],
        )
        .unwrap();
        let flux = mesh
            .integrate_boundary(lib(), QuadratureOrder::Default, None, |p| {
                p.position.x * p.normal.x
            })
            .unwrap();
        assert_relative_eq!(flux, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn bounds_enclose_nodes() {
        let mesh = box_mesh(
            ElementFamily::Quadrilateral,
            ElementOrder::QUADRATIC,
            [2.0, 1.0],
            [3, 5],
        )
        .unwrap();
        let bounds = mesh.bounds();
        assert_eq!(bounds.min, Vec2::new(0.0, 0.0));
        assert_relative_eq!(bounds.max, Vec2::new(2.0, 1.0), epsilon = 1e-15);
    }

    #[test]
    fn invalid_meshes_are_rejected() {
        let nodes = vec![Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)];
        assert_eq!(
            Mesh::new(
                nodes.clone(),
                vec![0, 1, 2, 0],
                ElementFamily::Triangle,
                ElementOrder::LINEAR
            )
            .err(),
            Some(MeshError::ConnectivityLength { len: 4, nne: 3 })
        );
        assert_eq!(
            Mesh::new(
                nodes.clone(),
                vec![0, 1, 3],
                ElementFamily::Triangle,
                ElementOrder::LINEAR
            )
            .err(),
            Some(MeshError::NodeOutOfRange {
                element: 0,
                node: 3,
                node_count: 3
            })
        );
        assert!(matches!(
            Mesh::new(
                nodes.clone(),
                vec![0, 1, 2],
                ElementFamily::Tetrahedron,
                ElementOrder::LINEAR
            ),
            Err(MeshError::Element(ElementError::DimensionMismatch { .. }))
        ));
        assert!(matches!(
            Mesh::new(nodes, vec![0, 1, 2], ElementFamily::Triangle, ElementOrder::CUBIC),
            Err(MeshError::Element(ElementError::UnsupportedElement { .. }))
        ));
    }

    #[test]
    fn inverted_element_fails_integration() {
        let nodes = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        ];
        // second triangle is clockwise
        let mesh = Mesh::new(
            nodes,
            vec![0, 1, 2, 1, 2, 3],
            ElementFamily::Triangle,
            ElementOrder::LINEAR,
        )
        .unwrap();
        assert!(matches!(
            mesh.measure(lib()),
            Err(MeshError::Element(ElementError::InvalidGeometry { element: 1, .. }))
        ));
    }

    #[test]
    fn out_of_range_ids_are_errors() {
        let mesh = box_mesh(
            ElementFamily::Triangle,
            ElementOrder::LINEAR,
            [1.0, 1.0],
            [1, 1],
        )
        .unwrap();
        assert_eq!(mesh.element_count(), 2);
        assert!(matches!(
            mesh.evaluator(lib(), 5, QuadratureOrder::Default),
            Err(MeshError::ElementOutOfRange {
                element: 5,
                element_count: 2
            })
        ));
        assert!(mesh.evaluator(lib(), 1, QuadratureOrder::Default).is_ok());

        let facet_count = mesh.boundary().len();
        assert_eq!(facet_count, 4);
        assert!(matches!(
            mesh.boundary_evaluator(lib(), facet_count, QuadratureOrder::Default),
            Err(MeshError::FacetOutOfRange {
                facet: 4,
                facet_count: 4
            })
        ));
    }

    #[test]
    fn changing_connectivity_rebuilds_boundary() {
        let nodes = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
        ];
        let mut mesh = Mesh::new(
            nodes,
            vec![0, 1, 2],
            ElementFamily::Triangle,
            ElementOrder::LINEAR,
        )
        .unwrap();
        assert_eq!(mesh.boundary().len(), 3);
        mesh.set_connectivity(vec![0, 1, 3, 0, 3, 2]).unwrap();
        assert_eq!(mesh.boundary().len(), 4);
        assert!(mesh.set_connectivity(vec![0, 1, 4]).is_err());
        assert_eq!(mesh.element_count(), 2);
    }

    #[test]
    fn custom_tags_override_box_tags() {
        let mut mesh = box_mesh(
            ElementFamily::Quadrilateral,
            ElementOrder::LINEAR,
            [2.0, 1.0],
            [4, 2],
        )
        .unwrap();
        // left half of the bottom edge
        mesh.tag_boundary_where(10, |p| p.y == 0.0 && p.x <= 1.0);
        let boundary = mesh.boundary();
        assert_eq!(boundary.facets_with_tag(10).count(), 2);
        assert_eq!(boundary.facets_with_tag(3).count(), 2);
        let length = mesh
            .integrate_boundary(lib(), QuadratureOrder::Default, Some(10), |_| 1.0)
            .unwrap();
        assert_relative_eq!(length, 1.0, epsilon = 1e-12);
    }
}
