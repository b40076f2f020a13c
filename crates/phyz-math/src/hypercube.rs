//! Corner enumeration for D-dimensional boxes (quads in 2D, hexahedra in 3D).
//!
//! Corner `c` sits on the low side of axis `d` when bit `d` of `c` is clear
//! and on the high side when it is set.

use crate::Vector;

/// Number of corners of a D-dimensional box: 2^D.
#[inline]
pub const fn corner_count<const D: usize>() -> usize {
    1 << D
}

/// Reference-element signs of corner `corner`: -1 on the low side, +1 on the high side.
#[inline]
pub fn corner_signs<const D: usize>(corner: usize) -> Vector<D> {
    Vector::<D>::from_fn(|d, _| if corner >> d & 1 == 1 { 1.0 } else { -1.0 })
}

/// Integer offsets {0,1}^D of corner `corner`.
#[inline]
pub fn corner_offsets<const D: usize>(corner: usize) -> [usize; D] {
    std::array::from_fn(|d| corner >> d & 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corner_count() {
        assert_eq!(corner_count::<2>(), 4);
        assert_eq!(corner_count::<3>(), 8);
    }

    #[test]
    fn test_corner_signs_cover_all_combinations() {
        let signs: Vec<Vector<2>> = (0..4).map(corner_signs::<2>).collect();
        assert_eq!(signs[0], Vector::<2>::new(-1.0, -1.0));
        assert_eq!(signs[1], Vector::<2>::new(1.0, -1.0));
        assert_eq!(signs[2], Vector::<2>::new(-1.0, 1.0));
        assert_eq!(signs[3], Vector::<2>::new(1.0, 1.0));
    }

    #[test]
    fn test_corner_offsets() {
        assert_eq!(corner_offsets::<3>(5), [1, 0, 1]);
    }
}
