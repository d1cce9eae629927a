//! The catalogue of supported reference elements.
//!
//! An element is identified by its [`ElementFamily`] and [`ElementOrder`].
//! Together these key into every derived table in the crate:
//! the topology tables in [`topology`],
//! the shape functions in [`shape`],
//! and (through the family alone) the quadrature rules in [`crate::quadrature`].
//!
//! All reference domains live in the unit cube:
//! lines on `[0, 1]`, quadrilaterals on `[0, 1]²`, hexahedra on `[0, 1]³`,
//! and triangles and tetrahedra on the corresponding unit simplices.

pub mod polynomial;
pub mod shape;
pub mod topology;

use nalgebra as na;

/// The shape of a reference element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementFamily {
    /// A single vertex. Only appears as the boundary of a line.
    Point,
    /// A line segment.
    Line,
    /// A triangle.
    Triangle,
    /// A quadrilateral.
    Quadrilateral,
    /// A tetrahedron.
    Tetrahedron,
    /// A hexahedron.
    Hexahedron,
}

impl ElementFamily {
    /// Every element family, in order of increasing dimension.
    pub const ALL: [ElementFamily; 6] = [
        ElementFamily::Point,
        ElementFamily::Line,
        ElementFamily::Triangle,
        ElementFamily::Quadrilateral,
        ElementFamily::Tetrahedron,
        ElementFamily::Hexahedron,
    ];

    /// The topological dimension of the reference element.
    #[inline]
    pub fn dim(self) -> usize {
        match self {
            ElementFamily::Point => 0,
            ElementFamily::Line => 1,
            ElementFamily::Triangle | ElementFamily::Quadrilateral => 2,
            ElementFamily::Tetrahedron | ElementFamily::Hexahedron => 3,
        }
    }

    /// The family of the sides of this element, if it has any.
    #[inline]
    pub fn boundary_family(self) -> Option<ElementFamily> {
        match self {
            ElementFamily::Point => None,
            ElementFamily::Line => Some(ElementFamily::Point),
            ElementFamily::Triangle | ElementFamily::Quadrilateral => Some(ElementFamily::Line),
            ElementFamily::Tetrahedron => Some(ElementFamily::Triangle),
            ElementFamily::Hexahedron => Some(ElementFamily::Quadrilateral),
        }
    }

    /// The number of sides (codimension 1 entities) of this element.
    #[inline]
    pub fn side_count(self) -> usize {
        match self {
            ElementFamily::Point => 0,
            ElementFamily::Line => 2,
            ElementFamily::Triangle => 3,
            ElementFamily::Quadrilateral | ElementFamily::Tetrahedron => 4,
            ElementFamily::Hexahedron => 6,
        }
    }

    /// Whether this is a simplex (as opposed to a tensor product) element.
    #[inline]
    pub fn is_simplex(self) -> bool {
        matches!(
            self,
            ElementFamily::Point
                | ElementFamily::Line
                | ElementFamily::Triangle
                | ElementFamily::Tetrahedron
        )
    }

    /// The highest element order available for this family.
    #[inline]
    pub fn max_order(self) -> ElementOrder {
        match self {
            ElementFamily::Point | ElementFamily::Line => ElementOrder(2),
            _ => ElementOrder(1),
        }
    }

    /// Iterate over all orders supported by this family.
    pub fn orders(self) -> impl Iterator<Item = ElementOrder> {
        (0..=self.max_order().0).map(ElementOrder)
    }
}

/// Polynomial order of an element.
///
/// Order 0 is the linear element and order 1 the quadratic one.
/// Lines additionally support order 2, the cubic element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementOrder(pub u8);

impl ElementOrder {
    /// The linear element.
    pub const LINEAR: ElementOrder = ElementOrder(0);
    /// The quadratic element (serendipity for quadrilaterals and hexahedra).
    pub const QUADRATIC: ElementOrder = ElementOrder(1);
    /// The cubic element, only available for lines.
    pub const CUBIC: ElementOrder = ElementOrder(2);
}

impl std::fmt::Display for ElementOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error in evaluating or looking up an element.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum ElementError {
    /// The combination of family and order is not in the supported catalogue.
    #[error("Unsupported element: {family:?} of order {order}")]
    UnsupportedElement {
        /// Requested family.
        family: ElementFamily,
        /// Requested order.
        order: ElementOrder,
    },
    /// No quadrature rule of the requested degree exists for the family.
    #[error("No quadrature rule of degree {degree} for {family:?}")]
    UnsupportedQuadrature {
        /// Requested family.
        family: ElementFamily,
        /// Requested exactness degree.
        degree: usize,
    },
    /// The monomial set chosen for an element cannot interpolate its nodes.
    ///
    /// This never happens for the supported catalogue.
    #[error("Interpolation matrix of {family:?} of order {order} is singular")]
    SingularInterpolationMatrix {
        /// Family being derived.
        family: ElementFamily,
        /// Order being derived.
        order: ElementOrder,
    },
    /// The element is inverted or degenerate at an integration point.
    #[error("Non-positive Jacobian determinant {det_j} in element {element} at integration point {point}")]
    InvalidGeometry {
        /// Caller-supplied id of the element.
        element: usize,
        /// Index of the integration point.
        point: usize,
        /// The offending determinant.
        det_j: f64,
    },
    /// The number of physical nodes does not match the element.
    #[error("Expected {expected} nodes for the element, got {actual}")]
    NodeCountMismatch {
        /// Nodes required by the element.
        expected: usize,
        /// Nodes given.
        actual: usize,
    },
    /// The element cannot be embedded in a space of lower dimension.
    #[error("Cannot embed a {reference_dim}-dimensional element in {ambient_dim}-dimensional space")]
    DimensionMismatch {
        /// Dimension of the reference element.
        reference_dim: usize,
        /// Dimension of the physical coordinates.
        ambient_dim: usize,
    },
    /// The side id is out of range for the family.
    #[error("{family:?} has no side {side}")]
    InvalidSide {
        /// Volume family.
        family: ElementFamily,
        /// Requested side.
        side: usize,
    },
    /// The integration point index is out of range for the rule.
    #[error("Integration point {point} out of range ({count} points)")]
    PointOutOfRange {
        /// Requested index.
        point: usize,
        /// Number of points in the rule.
        count: usize,
    },
}

/// Check that a family and order form a supported element.
#[inline]
pub fn check_supported(family: ElementFamily, order: ElementOrder) -> Result<(), ElementError> {
    if order <= family.max_order() {
        Ok(())
    } else {
        Err(ElementError::UnsupportedElement { family, order })
    }
}

/// Nodes of a reference element in reference coordinates.
///
/// The node ordering here is the contract every other table respects:
/// vertices first (counterclockwise in 2D, bottom layer then top layer for hexahedra),
/// followed by the mid-edge nodes of quadratic elements in edge order.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceElement {
    /// The element family.
    pub family: ElementFamily,
    /// The element order.
    pub order: ElementOrder,
    /// Node positions, padded with zeros beyond the element's dimension.
    pub nodes: Vec<na::Vector3<f64>>,
}

impl ReferenceElement {
    /// Look up the reference element for a family and order.
    pub fn new(family: ElementFamily, order: ElementOrder) -> Result<Self, ElementError> {
        check_supported(family, order)?;
        let nodes = reference_nodes(family, order)
            .iter()
            .map(|p| na::Vector3::new(p[0], p[1], p[2]))
            .collect();
        Ok(Self {
            family,
            order,
            nodes,
        })
    }

    /// Number of spatial dimensions of the reference domain.
    #[inline]
    pub fn nsd(&self) -> usize {
        self.family.dim()
    }

    /// Number of nodes in the element.
    #[inline]
    pub fn nne(&self) -> usize {
        self.nodes.len()
    }

    /// Measure (length, area or volume) of the reference domain.
    pub fn measure(&self) -> f64 {
        reference_measure(self.family)
    }
}

/// Number of nodes of a supported element.
pub fn node_count(family: ElementFamily, order: ElementOrder) -> Result<usize, ElementError> {
    check_supported(family, order)?;
    Ok(reference_nodes(family, order).len())
}

/// Measure of the reference domain of a family.
pub fn reference_measure(family: ElementFamily) -> f64 {
    match family {
        ElementFamily::Point | ElementFamily::Line => 1.0,
        ElementFamily::Quadrilateral | ElementFamily::Hexahedron => 1.0,
        ElementFamily::Triangle => 0.5,
        ElementFamily::Tetrahedron => 1.0 / 6.0,
    }
}

/// Raw node tables. Only valid for supported combinations.
fn reference_nodes(family: ElementFamily, order: ElementOrder) -> &'static [[f64; 3]] {
    const THIRD: f64 = 1.0 / 3.0;
    match (family, order.0) {
        (ElementFamily::Point, _) => &[[0.0, 0.0, 0.0]],
        (ElementFamily::Line, 0) => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
        (ElementFamily::Line, 1) => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.5, 0.0, 0.0]],
        (ElementFamily::Line, _) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [THIRD, 0.0, 0.0],
            [2.0 * THIRD, 0.0, 0.0],
        ],
        (ElementFamily::Triangle, 0) => &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        (ElementFamily::Triangle, _) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.0, 0.0],
            [0.5, 0.5, 0.0],
            [0.0, 0.5, 0.0],
        ],
        (ElementFamily::Quadrilateral, 0) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        (ElementFamily::Quadrilateral, _) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.0, 0.0],
            [1.0, 0.5, 0.0],
            [0.5, 1.0, 0.0],
            [0.0, 0.5, 0.0],
        ],
        (ElementFamily::Tetrahedron, 0) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ],
        (ElementFamily::Tetrahedron, _) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            // edges 0-1, 1-2, 2-0
            [0.5, 0.0, 0.0],
            [0.5, 0.5, 0.0],
            [0.0, 0.5, 0.0],
            // edges 0-3, 1-3, 2-3
            [0.0, 0.0, 0.5],
            [0.5, 0.0, 0.5],
            [0.0, 0.5, 0.5],
        ],
        (ElementFamily::Hexahedron, 0) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
        ],
        (ElementFamily::Hexahedron, _) => &[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 1.0],
            // bottom edges
            [0.5, 0.0, 0.0],
            [1.0, 0.5, 0.0],
            [0.5, 1.0, 0.0],
            [0.0, 0.5, 0.0],
            // top edges
            [0.5, 0.0, 1.0],
            [1.0, 0.5, 1.0],
            [0.5, 1.0, 1.0],
            [0.0, 0.5, 1.0],
            // vertical edges
            [0.0, 0.0, 0.5],
            [1.0, 0.0, 0.5],
            [1.0, 1.0, 0.5],
            [0.0, 1.0, 0.5],
        ],
    }
}
