use crate::pbuf::BufferPools;

/// Data capacity of one EDM payload fragment.
pub const EDM_BLK_SIZE: usize = 64;
/// Number of payload fragments reserved by [`DefaultBufferPools`].
pub const EDM_BLK_COUNT: usize = 80;
/// Number of pbuf lists reserved by [`DefaultBufferPools`].
pub const PBUF_LIST_COUNT: usize = 40;

/// Pools sized for the EDM transport.
pub type DefaultBufferPools<M> = BufferPools<M, EDM_BLK_SIZE, EDM_BLK_COUNT, PBUF_LIST_COUNT>;

/// How much of the reserved storage each pool hands out.
///
/// Unset counts use everything that is reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub(crate) payload_blocks: Option<usize>,
    pub(crate) list_nodes: Option<usize>,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            payload_blocks: None,
            list_nodes: None,
        }
    }

    pub fn payload_blocks(self, count: usize) -> Self {
        Config {
            payload_blocks: Some(count),
            ..self
        }
    }

    pub fn list_nodes(self, count: usize) -> Self {
        Config {
            list_nodes: Some(count),
            ..self
        }
    }
}
