use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{BufferPools, PbufList};
use crate::error::Error;

/// Reads a [`PbufList`] as a byte stream, freeing fragments as they drain.
///
/// Reads never wait: a read on an exhausted list returns `Ok(0)`. The list
/// itself still has to be freed once the reader is dropped.
pub struct PbufListReader<
    'a,
    M: RawMutex,
    const BLOCK_SIZE: usize,
    const PAYLOAD_BLOCKS: usize,
    const LIST_NODES: usize,
> {
    pools: &'a BufferPools<M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>,
    list: &'a mut PbufList,
}

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    BufferPools<M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    pub fn pbuf_list_reader<'a>(
        &'a self,
        list: &'a mut PbufList,
    ) -> PbufListReader<'a, M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES> {
        PbufListReader { pools: self, list }
    }
}

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    PbufListReader<'_, M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    /// Unread bytes left in the list.
    pub fn remaining(&self) -> Result<usize, Error> {
        self.pools.pbuf_list_len(&*self.list)
    }
}

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    embedded_io_async::ErrorType for PbufListReader<'_, M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    type Error = Error;
}

impl<M: RawMutex, const BLOCK_SIZE: usize, const PAYLOAD_BLOCKS: usize, const LIST_NODES: usize>
    embedded_io_async::Read for PbufListReader<'_, M, BLOCK_SIZE, PAYLOAD_BLOCKS, LIST_NODES>
{
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.pools.pbuf_list_consume_data(&mut *self.list, buf)
    }
}

#[cfg(test)]
mod test {
    use crate::test_helpers::*;
    use embassy_futures::block_on;
    use embedded_io_async::Read;

    #[test]
    fn reads_list_as_stream() {
        let pools = pools();
        let input = pattern::<29>();
        let mut list = list_from(&pools, &input);

        {
            let mut reader = pools.pbuf_list_reader(&mut list);
            assert_eq!(reader.remaining(), Ok(29));

            let mut head = [0u8; 4];
            block_on(reader.read_exact(&mut head)).unwrap();
            assert_eq!(&head, &input[..4]);

            let mut rest = [0u8; 40];
            let n = block_on(reader.read(&mut rest)).unwrap();
            assert_eq!(&rest[..n], &input[4..]);
            assert_eq!(block_on(reader.read(&mut rest)), Ok(0));
        }

        pools.pbuf_list_free(list).unwrap();
        assert_all_free(&pools);
    }
}
