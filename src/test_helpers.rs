use embassy_sync::blocking_mutex::raw::NoopRawMutex;

use crate::config::Config;
use crate::pbuf::{BufferPools, PbufList};

pub const TEST_BLOCK_SIZE: usize = 8;
pub const TEST_PAYLOAD_BLOCKS: usize = 16;
pub const TEST_LIST_NODES: usize = 4;

pub type TestPools = BufferPools<NoopRawMutex, TEST_BLOCK_SIZE, TEST_PAYLOAD_BLOCKS, TEST_LIST_NODES>;

pub fn pools() -> TestPools {
    TestPools::new(Config::new()).unwrap()
}

/// Bytes `1, 2, 3, ...` so misplaced or repeated bytes show up.
pub fn pattern<const N: usize>() -> [u8; N] {
    core::array::from_fn(|i| (i + 1) as u8)
}

/// A list holding `data`, split over as many fragments as needed.
pub fn list_from(pools: &TestPools, data: &[u8]) -> PbufList {
    let mut list = pools.pbuf_list_alloc().unwrap();
    pools.pbuf_list_extend(&mut list, data).unwrap();
    list
}

pub fn assert_all_free(pools: &TestPools) {
    let payload = pools.payload_stats();
    assert_eq!(payload.used_blocks, 0, "payload fragments leaked");
    assert_eq!(payload.free_blocks, payload.total_blocks);

    let lists = pools.list_stats();
    assert_eq!(lists.used_blocks, 0, "pbuf lists leaked");
    assert_eq!(lists.free_blocks, lists.total_blocks);
}
