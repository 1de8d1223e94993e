#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod config;
pub mod error;
pub mod mem_pool;
pub mod pbuf;
pub mod ubx;

#[cfg(test)]
mod test_helpers;

pub use config::{Config, DefaultBufferPools};
pub use error::Error;
pub use mem_pool::{BlockId, MemPool, PoolStats};
pub use pbuf::{BufferPools, ChannelId, Packet, Pbuf, PbufList, PbufListReader, PktList};
pub use ubx::types::UbxFrame;
