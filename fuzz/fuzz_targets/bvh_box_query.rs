#![no_main]

use g10_intersection::bounding_volume::hierarchy::fuzzing::{
    ArbitraryAABB, ArbitraryPosition, fuzz_test_single_aabb_intersection_query,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (Vec<ArbitraryPosition>, ArbitraryAABB)| {
    fuzz_test_single_aabb_intersection_query(input);
});
