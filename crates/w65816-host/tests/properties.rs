//! Property test for invariant 8 ("the mapper rejects every overlap;
//! accepts every adjacent pair"). The other universally-quantified
//! invariants (1, 2, 5, 6, 9) are core-processor concerns and live in
//! `w65816-cpu/tests/properties.rs`.

use proptest::prelude::*;
use w65816_host::device::Ram;
use w65816_host::mapper::{Mapper, MapperError};

proptest! {
    #[test]
    fn mapper_accepts_adjacent_and_rejects_overlapping(
        first_len in 1u32..0x1000,
        second_start_offset in -0x800i64..0x800,
        second_len in 1u32..0x1000,
    ) {
        let first_start: u32 = 0x1000;
        let first_end = first_start + first_len;

        let second_start = (i64::from(first_start) + second_start_offset).max(0) as u32;
        let second_end = second_start.saturating_add(second_len);

        let mut mapper = Mapper::new();
        mapper.add("a", "ram", Box::new(Ram::new(first_len)), first_start, 0, first_len).unwrap();

        let result = mapper.add("b", "ram", Box::new(Ram::new(second_len)), second_start, 0, second_len);

        let overlaps = second_start < first_end && first_start < second_end;
        if overlaps {
            prop_assert!(matches!(result, Err(MapperError::MappingOverlap { .. })));
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn adjacent_mappings_never_overlap(gap in 0u32..0x10, len_a in 1u32..0x1000, len_b in 1u32..0x1000) {
        let mut mapper = Mapper::new();
        mapper.add("a", "ram", Box::new(Ram::new(len_a)), 0x1000, 0, len_a).unwrap();
        let second_start = 0x1000 + len_a + gap;
        let result = mapper.add("b", "ram", Box::new(Ram::new(len_b)), second_start, 0, len_b);
        prop_assert!(result.is_ok());
    }
}
