use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{BufferPools, ChannelId, Pbuf, PbufList, PbufListNode};
use crate::error::{Error, Result};
use crate::mem_pool::BlockId;

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    BufferPools<M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    /// Allocate an empty list.
    pub fn pbuf_list_alloc(&self) -> Result<PbufList> {
        let id = self.lists.alloc().ok_or_else(|| {
            warn!("Out of pbuf lists");
            Error::NoMemory
        })?;

        self.lists
            .with_mut(id, |node| *node = PbufListNode::default())?;

        Ok(PbufList { id })
    }

    /// Number of unread bytes in the list.
    pub fn pbuf_list_len(&self, list: &PbufList) -> Result<usize> {
        self.lists.with(list.id, |node| node.total_len)
    }

    pub fn pbuf_list_channel(&self, list: &PbufList) -> Result<Option<ChannelId>> {
        self.lists.with(list.id, |node| node.edm_channel)
    }

    pub fn pbuf_list_set_channel(&self, list: &mut PbufList, channel: ChannelId) -> Result<()> {
        self.lists
            .with_mut(list.id, |node| node.edm_channel = Some(channel))
    }

    /// Link `pbuf` at the tail of `list`.
    ///
    /// If either handle is not valid the fragment is released and
    /// [`Error::InvalidParameter`] is returned.
    pub fn pbuf_list_append(&self, list: &mut PbufList, pbuf: Pbuf) -> Result<()> {
        let len = self.payload.with_mut(pbuf.id, |p| {
            p.next = None;
            p.length as usize
        })?;

        let tail = match self.lists.with(list.id, |node| node.tail) {
            Ok(tail) => tail,
            Err(e) => {
                self.payload.free(pbuf.id)?;
                return Err(e);
            }
        };

        if let Some(tail) = tail {
            self.payload.with_mut(tail, |p| p.next = Some(pbuf.id))?;
        }

        self.lists.with_mut(list.id, |node| {
            if node.head.is_none() {
                node.head = Some(pbuf.id);
            }
            node.tail = Some(pbuf.id);
            node.total_len += len;
        })
    }

    /// Copy `data` into newly allocated fragments appended to `list`.
    ///
    /// Either all of `data` is appended, or the list is left untouched and
    /// [`Error::NoMemory`] is returned.
    pub fn pbuf_list_extend(&self, list: &mut PbufList, data: &[u8]) -> Result<()> {
        // Validate the list before drawing any fragment.
        self.lists.with(list.id, |_| ())?;

        let mut head: Option<BlockId> = None;
        let mut tail: Option<BlockId> = None;

        for chunk in data.chunks(BLOCK_SIZE) {
            let Ok((pbuf, _)) = self.pbuf_alloc() else {
                debug!(
                    "Dropping {} byte payload, out of fragments",
                    data.len()
                );
                self.free_chain(head)?;
                return Err(Error::NoMemory);
            };

            self.payload.with_mut(pbuf.id, |p| {
                p.data[..chunk.len()].copy_from_slice(chunk);
                p.length = chunk.len() as u16;
            })?;

            match tail {
                Some(t) => self.payload.with_mut(t, |p| p.next = Some(pbuf.id))?,
                None => head = Some(pbuf.id),
            }
            tail = Some(pbuf.id);
        }

        self.splice(list, head, tail, data.len())
    }

    /// Copy up to `dst.len()` bytes out of the list.
    ///
    /// Each fragment is returned to the pool as soon as its last byte has
    /// been read. Returns the number of bytes copied, which is only short of
    /// `dst.len()` when the list ran empty.
    pub fn pbuf_list_consume_data(&self, list: &mut PbufList, dst: &mut [u8]) -> Result<usize> {
        let mut copied = 0;

        while copied < dst.len() {
            let (head, offset) = self.lists.with(list.id, |node| (node.head, node.read_offset))?;
            let Some(head) = head else {
                break;
            };

            let (n, drained, next) = self.payload.with(head, |p| {
                let unread = &p.data[offset..p.length as usize];
                let n = unread.len().min(dst.len() - copied);
                dst[copied..copied + n].copy_from_slice(&unread[..n]);
                (n, n == unread.len(), p.next)
            })?;
            copied += n;

            self.lists.with_mut(list.id, |node| {
                node.total_len -= n;
                if drained {
                    node.head = next;
                    node.read_offset = 0;
                    if next.is_none() {
                        node.tail = None;
                    }
                } else {
                    node.read_offset += n;
                }
            })?;

            if drained {
                self.payload.free(head)?;
            }
        }

        trace!("Consumed {} bytes from pbuf list", copied);
        Ok(copied)
    }

    /// Move every fragment of `new` to the tail of `old`, then release the
    /// `new` list node. No payload data is copied.
    pub fn pbuf_list_merge(&self, old: &mut PbufList, new: PbufList) -> Result<()> {
        self.lists.with(old.id, |_| ())?;
        let (head, tail, len, offset) = self.lists.with(new.id, |node| {
            (node.head, node.tail, node.total_len, node.read_offset)
        })?;

        // Drop already consumed bytes of the head, the cursor lives in `new`.
        if let (Some(head), true) = (head, offset > 0) {
            self.payload.with_mut(head, |p| {
                p.data.copy_within(offset..p.length as usize, 0);
                p.length -= offset as u16;
            })?;
        }

        self.splice(old, head, tail, len)?;
        self.lists.free(new.id)
    }

    /// Release every fragment still held by `list`, then the list itself.
    pub fn pbuf_list_free(&self, list: PbufList) -> Result<()> {
        let head = self.lists.with(list.id, |node| node.head)?;
        self.free_chain(head)?;
        self.lists.free(list.id)
    }

    /// Attach the chain `head..tail` holding `len` bytes after the tail of
    /// `list`.
    fn splice(
        &self,
        list: &mut PbufList,
        head: Option<BlockId>,
        tail: Option<BlockId>,
        len: usize,
    ) -> Result<()> {
        let Some(head) = head else {
            return Ok(());
        };

        let old_tail = self.lists.with(list.id, |node| node.tail)?;
        if let Some(old_tail) = old_tail {
            self.payload.with_mut(old_tail, |p| p.next = Some(head))?;
        }

        self.lists.with_mut(list.id, |node| {
            if node.head.is_none() {
                node.head = Some(head);
                node.read_offset = 0;
            }
            node.tail = tail;
            node.total_len += len;
        })
    }
}
