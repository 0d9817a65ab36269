#![no_main]

use g10_intersection::bounding_volume::hierarchy::fuzzing::{
    ArbitraryPosition, HierarchyOperation, fuzz_test_hierarchy_operations,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Vec<ArbitraryPosition>, Vec<HierarchyOperation>)| {
    fuzz_test_hierarchy_operations(input);
});
