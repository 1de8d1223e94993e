//! Packet buffers for EDM payloads.
//!
//! Received payload bytes are stored in fixed-capacity fragments ([`Pbuf`])
//! drawn from a payload pool. Fragments are chained into a [`PbufList`], one
//! list per EDM payload, whose nodes come from a second pool. Message
//! oriented consumers queue whole lists in a [`PktList`].
//!
//! Both pools live in one [`BufferPools`] value that every operation is
//! called on. Handles are move-only, so a fragment or list can only be owned
//! by one place at a time. Handles that are dropped without being freed leak
//! their blocks until [`BufferPools::free_all`].

mod list;
mod pkt;
mod reader;

pub use pkt::{Packet, PktList};
pub use reader::PbufListReader;

use embassy_sync::blocking_mutex::raw::RawMutex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mem_pool::{BlockId, MemPool, PoolStats};

/// A channel id, identifying the EDM channel a payload arrived on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u8);

/// Payload pool block: one fragment and its chain link.
struct PbufBlock<const BLOCK_SIZE: usize> {
    next: Option<BlockId>,
    length: u16,
    data: [u8; BLOCK_SIZE],
}

impl<const BLOCK_SIZE: usize> Default for PbufBlock<BLOCK_SIZE> {
    fn default() -> Self {
        Self {
            next: None,
            length: 0,
            data: [0; BLOCK_SIZE],
        }
    }
}

/// List pool block: the head/tail of one fragment chain.
#[derive(Default)]
struct PbufListNode {
    head: Option<BlockId>,
    tail: Option<BlockId>,
    /// Link to the next packet while queued in a [`PktList`].
    next: Option<BlockId>,
    total_len: usize,
    edm_channel: Option<ChannelId>,
    /// Bytes of the head fragment already consumed.
    read_offset: usize,
}

/// One fragment of payload data, owned by the holder of this handle.
#[must_use = "a Pbuf must be appended to a list or freed"]
#[derive(Debug, PartialEq, Eq)]
pub struct Pbuf {
    id: BlockId,
}

/// A chain of fragments holding one payload.
#[must_use = "a PbufList must be consumed, queued or freed"]
#[derive(Debug, PartialEq, Eq)]
pub struct PbufList {
    id: BlockId,
}

/// The two pools backing the short range data path.
///
/// `BLOCK_SIZE` is the data capacity of one fragment, `PAYLOAD_BLOCKS` the
/// number of fragments and `LIST_NODES` the number of lists reserved.
pub struct BufferPools<
    M: RawMutex,
    const BLOCK_SIZE: usize,
    const PAYLOAD_BLOCKS: usize,
    const LIST_NODES: usize,
> {
    payload: MemPool<M, PbufBlock<BLOCK_SIZE>, PAYLOAD_BLOCKS>,
    lists: MemPool<M, PbufListNode, LIST_NODES>,
}

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    BufferPools<M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    /// Build both pools.
    ///
    /// Fails with [`Error::NoMemory`] if `config` asks for more blocks than
    /// are reserved.
    pub fn new(config: Config) -> Result<Self> {
        if BLOCK_SIZE == 0 || BLOCK_SIZE > u16::MAX as usize {
            return Err(Error::InvalidParameter);
        }

        let payload = MemPool::new(config.payload_blocks.unwrap_or(PAYLOAD_BLOCKS))?;
        let lists = MemPool::new(config.list_nodes.unwrap_or(LIST_NODES))?;
        debug!(
            "Buffer pools ready: {} x {} byte fragments, {} lists",
            payload.total_block_count(),
            BLOCK_SIZE,
            lists.total_block_count()
        );

        Ok(Self { payload, lists })
    }

    pub fn deinit(self) {
        self.payload.deinit();
        self.lists.deinit();
    }

    /// Return every fragment and list to its pool.
    ///
    /// All outstanding handles, and any [`PktList`] holding them, become
    /// invalid and must be discarded.
    pub fn free_all(&self) {
        self.payload.free_all();
        self.lists.free_all();
    }

    pub fn payload_stats(&self) -> PoolStats {
        self.payload.stats()
    }

    pub fn list_stats(&self) -> PoolStats {
        self.lists.stats()
    }

    /// Allocate an empty fragment.
    ///
    /// Returns the fragment together with its data capacity.
    pub fn pbuf_alloc(&self) -> Result<(Pbuf, usize)> {
        let id = self.payload.alloc().ok_or_else(|| {
            warn!("Out of payload fragments");
            Error::NoMemory
        })?;

        self.payload.with_mut(id, |p| {
            p.next = None;
            p.length = 0;
        })?;

        Ok((Pbuf { id }, BLOCK_SIZE))
    }

    /// Copy `data` into the free room of a fragment.
    ///
    /// Returns the number of bytes taken, which is less than `data.len()`
    /// once the fragment is full.
    pub fn pbuf_write(&self, pbuf: &mut Pbuf, data: &[u8]) -> Result<usize> {
        self.payload.with_mut(pbuf.id, |p| {
            let start = p.length as usize;
            let n = data.len().min(BLOCK_SIZE - start);
            p.data[start..start + n].copy_from_slice(&data[..n]);
            p.length += n as u16;
            n
        })
    }

    pub fn pbuf_len(&self, pbuf: &Pbuf) -> Result<usize> {
        self.payload.with(pbuf.id, |p| p.length as usize)
    }

    /// Release a fragment that was never appended to a list.
    pub fn pbuf_free(&self, pbuf: Pbuf) -> Result<()> {
        self.payload.free(pbuf.id)
    }

    /// Free a chain of fragments starting at `cur`.
    fn free_chain(&self, mut cur: Option<BlockId>) -> Result<()> {
        while let Some(id) = cur {
            cur = self.payload.with(id, |p| p.next)?;
            self.payload.free(id)?;
        }
        Ok(())
    }
}
