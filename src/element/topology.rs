//! Static topology tables: which local nodes make up each side and edge of an element.
//!
//! Sides are the codimension 1 entities of an element
//! (end points of a line, edges of a 2D element, faces of a 3D element).
//! Node lists are ordered so that the right-hand rule gives the outward normal:
//! counterclockwise seen from outside for faces of 3D elements,
//! counterclockwise around the element for edges of 2D elements.
//! For quadratic elements the mid-edge nodes trail the vertices,
//! in the same order the side's own reference element lists them.

use nalgebra as na;

use super::{check_supported, ElementError, ElementFamily, ElementOrder};

/// Get the local node lists of every side of an element.
pub fn faces(
    family: ElementFamily,
    order: ElementOrder,
) -> Result<&'static [&'static [usize]], ElementError> {
    check_supported(family, order)?;
    let linear = order == ElementOrder::LINEAR;
    let table: &'static [&'static [usize]] = match family {
        ElementFamily::Point => &[],
        ElementFamily::Line => &[&[0], &[1]],
        ElementFamily::Triangle if linear => &[&[0, 1], &[1, 2], &[2, 0]],
        ElementFamily::Triangle => &[&[0, 1, 3], &[1, 2, 4], &[2, 0, 5]],
        ElementFamily::Quadrilateral if linear => &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]],
        ElementFamily::Quadrilateral => &[&[0, 1, 4], &[1, 2, 5], &[2, 3, 6], &[3, 0, 7]],
        ElementFamily::Tetrahedron if linear => &[&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]],
        ElementFamily::Tetrahedron => &[
            &[0, 2, 1, 6, 5, 4],
            &[0, 1, 3, 4, 8, 7],
            &[1, 2, 3, 5, 9, 8],
            &[0, 3, 2, 7, 9, 6],
        ],
        ElementFamily::Hexahedron if linear => &[
            &[0, 3, 2, 1],
            &[0, 1, 5, 4],
            &[1, 2, 6, 5],
            &[2, 3, 7, 6],
            &[3, 0, 4, 7],
            &[4, 5, 6, 7],
        ],
        ElementFamily::Hexahedron => &[
            &[0, 3, 2, 1, 11, 10, 9, 8],
            &[0, 1, 5, 4, 8, 17, 12, 16],
            &[1, 2, 6, 5, 9, 18, 13, 17],
            &[2, 3, 7, 6, 10, 19, 14, 18],
            &[3, 0, 4, 7, 11, 16, 15, 19],
            &[4, 5, 6, 7, 12, 13, 14, 15],
        ],
    };
    Ok(table)
}

/// Get the local node lists of every edge (1-dimensional entity) of an element.
///
/// For 2D elements these are the same lists as [`faces`].
pub fn edges(
    family: ElementFamily,
    order: ElementOrder,
) -> Result<&'static [&'static [usize]], ElementError> {
    check_supported(family, order)?;
    let table: &'static [&'static [usize]] = match (family, order.0) {
        (ElementFamily::Point, _) => &[],
        (ElementFamily::Line, 0) => &[&[0, 1]],
        (ElementFamily::Line, 1) => &[&[0, 1, 2]],
        (ElementFamily::Line, _) => &[&[0, 1, 2, 3]],
        (ElementFamily::Triangle | ElementFamily::Quadrilateral, _) => faces(family, order)?,
        (ElementFamily::Tetrahedron, 0) => &[&[0, 1], &[1, 2], &[2, 0], &[0, 3], &[1, 3], &[2, 3]],
        (ElementFamily::Tetrahedron, _) => &[
            &[0, 1, 4],
            &[1, 2, 5],
            &[2, 0, 6],
            &[0, 3, 7],
            &[1, 3, 8],
            &[2, 3, 9],
        ],
        (ElementFamily::Hexahedron, 0) => &[
            &[0, 1],
            &[1, 2],
            &[2, 3],
            &[3, 0],
            &[4, 5],
            &[5, 6],
            &[6, 7],
            &[7, 4],
            &[0, 4],
            &[1, 5],
            &[2, 6],
            &[3, 7],
        ],
        (ElementFamily::Hexahedron, _) => &[
            &[0, 1, 8],
            &[1, 2, 9],
            &[2, 3, 10],
            &[3, 0, 11],
            &[4, 5, 12],
            &[5, 6, 13],
            &[6, 7, 14],
            &[7, 4, 15],
            &[0, 4, 16],
            &[1, 5, 17],
            &[2, 6, 18],
            &[3, 7, 19],
        ],
    };
    Ok(table)
}

/// Get the local node list of a single side.
pub fn side_nodes(
    family: ElementFamily,
    order: ElementOrder,
    side: usize,
) -> Result<&'static [usize], ElementError> {
    faces(family, order)?
        .get(side)
        .copied()
        .ok_or(ElementError::InvalidSide { family, side })
}

/// Affine parametrisation of one side of a reference element.
///
/// A point `(s, t)` in the reference domain of the side's family
/// lies at `origin + s * axes[0] + t * axes[1]`
/// in the reference domain of the volume element.
/// Unused axes are zero.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideMap {
    /// Image of the side's reference origin.
    pub origin: [f64; 3],
    /// Images of the side's reference unit vectors.
    pub axes: [[f64; 3]; 2],
}

impl SideMap {
    const fn new(origin: [f64; 3], s: [f64; 3], t: [f64; 3]) -> Self {
        Self {
            origin,
            axes: [s, t],
        }
    }

    /// Map a point on the side's reference domain into the volume's reference domain.
    pub fn apply(&self, side_point: &na::Vector3<f64>) -> na::Vector3<f64> {
        self.origin() + side_point[0] * self.axis(0) + side_point[1] * self.axis(1)
    }

    /// The image of the side's reference origin as a vector.
    #[inline]
    pub fn origin(&self) -> na::Vector3<f64> {
        na::Vector3::from(self.origin)
    }

    /// Derivative of the map with respect to one side coordinate.
    #[inline]
    pub fn axis(&self, i: usize) -> na::Vector3<f64> {
        na::Vector3::from(self.axes[i])
    }
}

const O: [f64; 3] = [0.0, 0.0, 0.0];
const X: [f64; 3] = [1.0, 0.0, 0.0];
const Y: [f64; 3] = [0.0, 1.0, 0.0];
const Z: [f64; 3] = [0.0, 0.0, 1.0];
const NEG_X: [f64; 3] = [-1.0, 0.0, 0.0];
const NEG_Y: [f64; 3] = [0.0, -1.0, 0.0];

const LINE_SIDES: [SideMap; 2] = [SideMap::new(O, O, O), SideMap::new(X, O, O)];

const TRIANGLE_SIDES: [SideMap; 3] = [
    SideMap::new(O, X, O),
    SideMap::new(X, [-1.0, 1.0, 0.0], O),
    SideMap::new(Y, NEG_Y, O),
];

const QUADRILATERAL_SIDES: [SideMap; 4] = [
    SideMap::new(O, X, O),
    SideMap::new(X, Y, O),
    SideMap::new([1.0, 1.0, 0.0], NEG_X, O),
    SideMap::new(Y, NEG_Y, O),
];

const TETRAHEDRON_SIDES: [SideMap; 4] = [
    SideMap::new(O, Y, X),
    SideMap::new(O, X, Z),
    SideMap::new(X, [-1.0, 1.0, 0.0], [-1.0, 0.0, 1.0]),
    SideMap::new(O, Z, Y),
];

const HEXAHEDRON_SIDES: [SideMap; 6] = [
    SideMap::new(O, Y, X),
    SideMap::new(O, X, Z),
    SideMap::new(X, Y, Z),
    SideMap::new([1.0, 1.0, 0.0], NEG_X, Z),
    SideMap::new(Y, NEG_Y, Z),
    SideMap::new(Z, X, Y),
];

/// Get the parametrisation of one side of a reference element.
///
/// Side maps only depend on the family;
/// the same affine map serves every order.
pub fn side_map(family: ElementFamily, side: usize) -> Result<SideMap, ElementError> {
    let table: &[SideMap] = match family {
        ElementFamily::Point => &[],
        ElementFamily::Line => &LINE_SIDES,
        ElementFamily::Triangle => &TRIANGLE_SIDES,
        ElementFamily::Quadrilateral => &QUADRILATERAL_SIDES,
        ElementFamily::Tetrahedron => &TETRAHEDRON_SIDES,
        ElementFamily::Hexahedron => &HEXAHEDRON_SIDES,
    };
    table
        .get(side)
        .copied()
        .ok_or(ElementError::InvalidSide { family, side })
}

/// Outward direction of the two sides of a line element.
///
/// There is no Jacobian on a 0-dimensional side, only an orientation.
pub fn line_side_sign(side: usize) -> Result<f64, ElementError> {
    match side {
        0 => Ok(-1.0),
        1 => Ok(1.0),
        _ => Err(ElementError::InvalidSide {
            family: ElementFamily::Line,
            side,
        }),
    }
}
