use crate::err::SectionError;
use crate::protocol_types::compound::Position;

pub mod packed_array;
pub mod palette;
pub mod section;
pub mod snapshot;

pub type BlockState = u32;

pub const SECTION_WIDTH: usize = 16;
pub const SECTION_HEIGHT: usize = 16;
pub const SECTION_VOLUME: usize = SECTION_WIDTH * SECTION_WIDTH * SECTION_HEIGHT;

pub const AIR: BlockState = 0;

/// Linear offset of a cell: y-major, then z, then x.
pub fn block_index(pos: Position) -> Result<usize, SectionError> {
    let in_range = |v: i32, edge: usize| v >= 0 && (v as usize) < edge;
    if !in_range(pos.x, SECTION_WIDTH) || !in_range(pos.y, SECTION_HEIGHT) || !in_range(pos.z, SECTION_WIDTH) {
        return Err(SectionError::PositionOutOfBounds(pos));
    }
    Ok((pos.y as usize) * SECTION_WIDTH * SECTION_WIDTH + (pos.z as usize) * SECTION_WIDTH + pos.x as usize)
}

/// Iterates every cell position of a section, in linear index order.
pub fn positions() -> impl Iterator<Item = Position> {
    (0..SECTION_HEIGHT as i32).flat_map(|y| {
        (0..SECTION_WIDTH as i32)
            .flat_map(move |z| (0..SECTION_WIDTH as i32).map(move |x| Position::new(x, y, z)))
    })
}

/// Smallest bit count able to represent `max_index`; `needed_bits(0) == 0`.
pub fn needed_bits(max_index: u32) -> u8 {
    (u32::BITS - max_index.leading_zeros()) as u8
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn index_layout() {
        assert_eq!(block_index(Position::new(0, 0, 0)).unwrap(), 0);
        assert_eq!(block_index(Position::new(1, 0, 0)).unwrap(), 1);
        assert_eq!(block_index(Position::new(0, 0, 1)).unwrap(), 16);
        assert_eq!(block_index(Position::new(0, 1, 0)).unwrap(), 256);
        assert_eq!(block_index(Position::new(15, 15, 15)).unwrap(), 4095);
    }

    #[test]
    fn index_is_bijective() {
        let mut seen = vec![false; SECTION_VOLUME];
        for pos in positions() {
            let index = block_index(pos).unwrap();
            assert!(!seen[index]);
            seen[index] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn positions_follow_index_order() {
        for (i, pos) in positions().enumerate() {
            assert_eq!(block_index(pos).unwrap(), i);
        }
    }

    #[test]
    fn index_out_of_bounds() {
        for pos in [
            Position::new(16, 0, 0),
            Position::new(0, 16, 0),
            Position::new(0, 0, 16),
            Position::new(-1, 0, 0),
        ] {
            assert!(matches!(block_index(pos), Err(SectionError::PositionOutOfBounds(p)) if p == pos));
        }
    }

    #[test]
    fn test_needed_bits() {
        assert_eq!(needed_bits(0), 0);
        assert_eq!(needed_bits(1), 1);
        assert_eq!(needed_bits(2), 2);
        assert_eq!(needed_bits(3), 2);
        assert_eq!(needed_bits(4), 3);
        assert_eq!(needed_bits(15), 4);
        assert_eq!(needed_bits(16), 5);
        assert_eq!(needed_bits(255), 8);
        assert_eq!(needed_bits(256), 9);
        assert_eq!(needed_bits(u32::MAX), 32);
    }
}
