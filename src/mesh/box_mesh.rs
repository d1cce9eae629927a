use nalgebra as na;

use itertools::Itertools;

use super::{Mesh, MeshError};
use crate::element::{ElementError, ElementFamily, ElementOrder, ReferenceElement};

/// Generate a structured mesh of the box `[0, lengths[0]] x ... x [0, lengths[DIM - 1]]`.
///
/// The box is divided into `subdivisions` cells along each axis.
/// Lines, quadrilaterals and hexahedra fill one cell each;
/// triangles split a cell in two along its diagonal
/// and tetrahedra split it into six around its main diagonal.
///
/// This is public for visibility in doctests and tests, which frequently need a mesh.
/// It is not meant to be used by users and thus hidden from docs.
pub fn box_mesh<const DIM: usize>(
    family: ElementFamily,
    order: ElementOrder,
    lengths: [f64; DIM],
    subdivisions: [usize; DIM],
) -> Result<Mesh<DIM>, MeshError> {
    if family.dim() != DIM || DIM == 0 {
        return Err(ElementError::DimensionMismatch {
            reference_dim: family.dim(),
            ambient_dim: DIM,
        }
        .into());
    }
    let reference = ReferenceElement::new(family, order)?;

    // nodes live on a lattice `steps` times finer than the cell grid,
    // fine enough for every node of the reference element to land on it
    let steps = order.0 as usize + 1;
    let lattice_size: [usize; DIM] = std::array::from_fn(|d| subdivisions[d] * steps + 1);
    let mut lattice_stride = [1; DIM];
    for d in 1..DIM {
        lattice_stride[d] = lattice_stride[d - 1] * lattice_size[d - 1];
    }
    let mut cell_stride = [1; DIM];
    for d in 1..DIM {
        cell_stride[d] = cell_stride[d - 1] * subdivisions[d - 1];
    }
    let cell_count: usize = subdivisions.iter().product();

    let pieces = cell_pieces(family);
    let mut connectivity = Vec::with_capacity(cell_count * pieces.len() * reference.nne());
    for cell in 0..cell_count {
        let cell_origin: [usize; DIM] =
            std::array::from_fn(|d| (cell / cell_stride[d]) % subdivisions[d] * steps);
        for (origin, axes) in &pieces {
            for node in &reference.nodes {
                let local = origin + axes * node;
                let lattice_idx: usize = (0..DIM)
                    .map(|d| {
                        let offset = (local[d] * steps as f64).round() as usize;
                        (cell_origin[d] + offset) * lattice_stride[d]
                    })
                    .sum();
                connectivity.push(lattice_idx);
            }
        }
    }

    // number nodes in order of first use,
    // dropping lattice points no element touches (cell centers of serendipity elements)
    let lattice_len: usize = lattice_size.iter().product();
    let mut renumbering = vec![usize::MAX; lattice_len];
    let mut nodes = Vec::new();
    for idx in &mut connectivity {
        if renumbering[*idx] == usize::MAX {
            renumbering[*idx] = nodes.len();
            let pos = na::SVector::<f64, DIM>::from_fn(|d, _| {
                let coord = (*idx / lattice_stride[d]) % lattice_size[d];
                coord as f64 * lengths[d] / (lattice_size[d] - 1) as f64
            });
            nodes.push(pos);
        }
        *idx = renumbering[*idx];
    }

    Mesh::new(nodes, connectivity, family, order)
}

/// Affine maps from an element's reference domain into the unit cell
/// for each element the cell is split into.
fn cell_pieces(family: ElementFamily) -> Vec<(na::Vector3<f64>, na::Matrix3<f64>)> {
    fn simplex(vertices: &[na::Vector3<f64>]) -> (na::Vector3<f64>, na::Matrix3<f64>) {
        let origin = vertices[0];
        let mut axes = na::Matrix3::zeros();
        for (col, v) in vertices[1..].iter().enumerate() {
            axes.set_column(col, &(v - origin));
        }
        (origin, axes)
    }
    let corner = |x: f64, y: f64| na::Vector3::new(x, y, 0.0);

    match family {
        ElementFamily::Triangle => vec![
            simplex(&[corner(0., 0.), corner(1., 0.), corner(1., 1.)]),
            simplex(&[corner(0., 0.), corner(1., 1.), corner(0., 1.)]),
        ],
        // Kuhn split: one tetrahedron per path from the origin to the far corner
        // along the coordinate axes in some order
        ElementFamily::Tetrahedron => (0..3)
            .permutations(3)
            .map(|perm| {
                let v0 = na::Vector3::<f64>::zeros();
                let v1 = v0 + na::Vector3::ith(perm[0], 1.0);
                let v2 = v1 + na::Vector3::ith(perm[1], 1.0);
                let v3 = na::Vector3::repeat(1.0);
                if permutation_is_even(&perm) {
                    simplex(&[v0, v1, v2, v3])
                } else {
                    simplex(&[v0, v2, v1, v3])
                }
            })
            .collect(),
        _ => vec![(na::Vector3::zeros(), na::Matrix3::identity())],
    }
}

fn permutation_is_even(perm: &[usize]) -> bool {
    let inversions = perm
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| a > b)
        .count();
    inversions % 2 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElementLibrary;

    #[test]
    fn node_and_element_counts() {
        let mesh = box_mesh(
            ElementFamily::Hexahedron,
            ElementOrder::LINEAR,
            [1.0, 1.0, 1.0],
            [2, 3, 4],
        )
        .unwrap();
        assert_eq!(mesh.element_count(), 24);
        assert_eq!(mesh.nodes().len(), 3 * 4 * 5);

        // serendipity elements leave face and cell centers out
        let mesh = box_mesh(
            ElementFamily::Quadrilateral,
            ElementOrder::QUADRATIC,
            [1.0, 1.0],
            [2, 2],
        )
        .unwrap();
        assert_eq!(mesh.element_count(), 4);
        assert_eq!(mesh.nodes().len(), 5 * 5 - 4);

        let mesh = box_mesh(
            ElementFamily::Tetrahedron,
            ElementOrder::QUADRATIC,
            [1.0, 1.0, 1.0],
            [2, 2, 2],
        )
        .unwrap();
        assert_eq!(mesh.element_count(), 48);
        assert_eq!(mesh.nodes().len(), 5 * 5 * 5);

        let mesh = box_mesh(ElementFamily::Line, ElementOrder::CUBIC, [3.0], [4]).unwrap();
        assert_eq!(mesh.nodes().len(), 13);
    }

    #[test]
    fn elements_are_positively_oriented() {
        let lib = ElementLibrary::global();
        for family in [ElementFamily::Tetrahedron, ElementFamily::Hexahedron] {
            for order in family.orders() {
                let mesh = box_mesh(family, order, [1.0, 2.0, 3.0], [2, 1, 1]).unwrap();
                for element in 0..mesh.element_count() {
                    let eval = mesh
                        .evaluator(lib, element, crate::QuadratureOrder::Default)
                        .unwrap();
                    for p in eval.points() {
                        assert!(p.unwrap().det_j > 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn dimension_must_match_family() {
        assert!(matches!(
            box_mesh(ElementFamily::Triangle, ElementOrder::LINEAR, [1.0], [1]),
            Err(MeshError::Element(ElementError::DimensionMismatch { .. }))
        ));
    }
}
