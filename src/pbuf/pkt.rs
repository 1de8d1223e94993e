use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{BufferPools, ChannelId, PbufList};
use crate::error::{Error, Result};
use crate::mem_pool::BlockId;

/// A FIFO of whole packets, each one [`PbufList`].
///
/// The queue itself is owned by the caller; only the lists it links are
/// pool allocated.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PktList {
    head: Option<BlockId>,
    tail: Option<BlockId>,
    pkt_count: usize,
}

impl PktList {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            pkt_count: 0,
        }
    }

    /// Number of queued packets.
    pub fn len(&self) -> usize {
        self.pkt_count
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// A packet handed out by [`BufferPools::pkt_list_consume_packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    /// Length of the packet in bytes.
    pub len: usize,
    pub edm_channel: Option<ChannelId>,
}

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    BufferPools<M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    /// Queue a complete packet at the tail of `pkts`.
    pub fn pkt_list_append(&self, pkts: &mut PktList, list: PbufList) -> Result<()> {
        self.lists.with_mut(list.id, |node| node.next = None)?;

        if let Some(tail) = pkts.tail {
            self.lists.with_mut(tail, |node| node.next = Some(list.id))?;
        } else {
            pkts.head = Some(list.id);
        }
        pkts.tail = Some(list.id);
        pkts.pkt_count += 1;
        Ok(())
    }

    /// Length and channel of the oldest packet, without removing it.
    ///
    /// Lets a caller size its destination, or keep the channel of a packet
    /// that [`pkt_list_consume_packet`](Self::pkt_list_consume_packet) is
    /// about to flush. An empty queue gives [`Error::InvalidParameter`].
    pub fn pkt_list_peek(&self, pkts: &PktList) -> Result<Packet> {
        let id = pkts.head.ok_or(Error::InvalidParameter)?;
        self.lists.with(id, |node| Packet {
            len: node.total_len,
            edm_channel: node.edm_channel,
        })
    }

    /// Remove the oldest packet from `pkts` and copy it into `dst`.
    ///
    /// The packet is always removed and freed. If it is larger than `dst`,
    /// `dst` receives its first `dst.len()` bytes, the remainder is
    /// discarded and [`Error::TemporaryFailure`] is returned. An empty queue
    /// gives [`Error::InvalidParameter`]. Use
    /// [`pkt_list_peek`](Self::pkt_list_peek) first to learn the channel of
    /// a packet that may not fit.
    pub fn pkt_list_consume_packet(&self, pkts: &mut PktList, dst: &mut [u8]) -> Result<Packet> {
        let mut list = self.pkt_list_pop(pkts)?;

        let (total_len, edm_channel) = self
            .lists
            .with(list.id, |node| (node.total_len, node.edm_channel))?;
        let len = self.pbuf_list_consume_data(&mut list, dst)?;
        self.pbuf_list_free(list)?;

        if len < total_len {
            warn!(
                "Packet of {} bytes flushed, destination holds {}",
                total_len,
                dst.len()
            );
            return Err(Error::TemporaryFailure);
        }

        Ok(Packet { len, edm_channel })
    }

    /// Free every queued packet.
    pub fn pkt_list_flush(&self, pkts: &mut PktList) -> Result<()> {
        while !pkts.is_empty() {
            let list = self.pkt_list_pop(pkts)?;
            self.pbuf_list_free(list)?;
        }
        Ok(())
    }

    fn pkt_list_pop(&self, pkts: &mut PktList) -> Result<PbufList> {
        let Some(id) = pkts.head else {
            return Err(Error::InvalidParameter);
        };

        let next = self.lists.with_mut(id, |node| node.next.take())?;
        pkts.head = next;
        if next.is_none() {
            pkts.tail = None;
        }
        pkts.pkt_count -= 1;

        Ok(PbufList { id })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::*;

    #[test]
    fn packets_come_out_whole_and_in_order() {
        let pools = pools();
        let mut pkts = PktList::new();

        let first = pattern::<5>();
        let second = [0xA5u8; 30];
        pools.pkt_list_append(&mut pkts, list_from(&pools, &first)).unwrap();
        let mut list = list_from(&pools, &second);
        pools.pbuf_list_set_channel(&mut list, ChannelId(2)).unwrap();
        pools.pkt_list_append(&mut pkts, list).unwrap();
        assert_eq!(pkts.len(), 2);

        let mut buf = [0u8; 64];
        let pkt = pools.pkt_list_consume_packet(&mut pkts, &mut buf).unwrap();
        assert_eq!(pkt, Packet { len: 5, edm_channel: None });
        assert_eq!(&buf[..5], &first);

        let pkt = pools.pkt_list_consume_packet(&mut pkts, &mut buf).unwrap();
        assert_eq!(pkt.len, 30);
        assert_eq!(pkt.edm_channel, Some(ChannelId(2)));
        assert_eq!(&buf[..30], &second);

        assert!(pkts.is_empty());
        assert_eq!(pools.pkt_list_peek(&pkts), Err(Error::InvalidParameter));
        assert_eq!(
            pools.pkt_list_consume_packet(&mut pkts, &mut buf),
            Err(Error::InvalidParameter)
        );
        assert_all_free(&pools);
    }

    #[test]
    fn oversized_packet_is_flushed() {
        let pools = pools();
        let mut pkts = PktList::new();
        let mut big = list_from(&pools, &pattern::<20>());
        pools.pbuf_list_set_channel(&mut big, ChannelId(4)).unwrap();
        pools.pkt_list_append(&mut pkts, big).unwrap();
        pools.pkt_list_append(&mut pkts, list_from(&pools, b"next")).unwrap();

        let front = pools.pkt_list_peek(&pkts).unwrap();
        assert_eq!(front, Packet { len: 20, edm_channel: Some(ChannelId(4)) });

        let mut small = [0u8; 8];
        assert_eq!(
            pools.pkt_list_consume_packet(&mut pkts, &mut small),
            Err(Error::TemporaryFailure)
        );
        assert_eq!(&small, &pattern::<20>()[..8]);
        assert_eq!(pkts.len(), 1);

        // The truncated packet is gone, the next one is intact.
        let mut buf = [0u8; 8];
        let pkt = pools.pkt_list_consume_packet(&mut pkts, &mut buf).unwrap();
        assert_eq!(&buf[..pkt.len], b"next");
        assert_all_free(&pools);
    }

    #[test]
    fn exact_fit_succeeds() {
        let pools = pools();
        let mut pkts = PktList::new();
        pools.pkt_list_append(&mut pkts, list_from(&pools, &pattern::<16>())).unwrap();

        let mut buf = [0u8; 16];
        let pkt = pools.pkt_list_consume_packet(&mut pkts, &mut buf).unwrap();
        assert_eq!(pkt.len, 16);
        assert_all_free(&pools);
    }

    #[test]
    fn flush_releases_everything() {
        let pools = pools();
        let mut pkts = PktList::new();
        for _ in 0..3 {
            pools.pkt_list_append(&mut pkts, list_from(&pools, &pattern::<12>())).unwrap();
        }
        assert_eq!(pkts.len(), 3);

        pools.pkt_list_flush(&mut pkts).unwrap();
        assert_eq!(pkts, PktList::new());
        assert_all_free(&pools);
    }
}
