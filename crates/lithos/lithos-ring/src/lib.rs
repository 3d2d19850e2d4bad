//! Fixed-capacity block ring for one producer thread and one consumer thread.
//!
//! The writer pushes whole blocks and never blocks: when a block does not fit,
//! unread data is overwritten and the write is counted as a lost chunk. The
//! reader registers a threshold, sleeps on the returned [`ReadySignal`] and
//! pulls exactly `threshold` elements per [`BlockRing::get`].
//!
//! ```
//! use lithos_ring::BlockRing;
//! use std::time::Duration;
//!
//! let (mut writer, mut reader) = BlockRing::<u32>::new(8).unwrap().split();
//! let ready = reader.register_threshold(4).unwrap();
//!
//! writer.put(&[1, 2, 3, 4]).unwrap();
//! assert!(ready.wait(Duration::from_millis(10)));
//! assert_eq!(reader.get().unwrap(), vec![1, 2, 3, 4]);
//! ```

mod block_ring;
mod error;
pub mod index;
mod signal;

pub use block_ring::{BlockRing, RingReader, RingStats, RingWriter};
pub use error::{ErrorKind, RingError};
pub use signal::ReadySignal;
