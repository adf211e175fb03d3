use smithay_client_toolkit::shm::{
    CreatePoolError, Shm,
    slot::{ActivateSlotError, Buffer, CreateBufferError, SlotPool},
};
use thiserror::Error;
use wayland_client::protocol::wl_shm::Format::Argb8888;

use crate::geometry::Extent;

/// Buffers kept per pool: one on screen, one being drawn.
const SLOTS: usize = 2;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to allocate shared memory pool")]
    Create(#[from] CreatePoolError),
    #[error("failed to create shm buffer")]
    Buffer(#[from] CreateBufferError),
    #[error("failed to attach shm buffer")]
    Attach(#[from] ActivateSlotError),
    #[error("buffer pool used before it was sized")]
    Unallocated,
    #[error("freshly created buffer is not writable")]
    Busy,
}

/// A mapped memory region that buffers are carved from.
pub trait Region {
    type Handle;

    fn create_handle(&mut self, extent: Extent) -> Result<Self::Handle, PoolError>;

    /// Writable pixels of `handle`, or `None` while the compositor still holds it.
    fn pixels<'a>(&'a mut self, handle: &Self::Handle) -> Option<&'a mut [u8]>;
}

pub trait Allocator {
    type Region: Region;

    /// Maps a new anonymous region able to hold every slot at `extent`.
    fn allocate(&self, extent: Extent) -> Result<Self::Region, PoolError>;
}

impl Region for SlotPool {
    type Handle = Buffer;

    fn create_handle(&mut self, extent: Extent) -> Result<Buffer, PoolError> {
        let (buffer, _) = self.create_buffer(
            extent.width as i32,
            extent.height as i32,
            extent.stride() as i32,
            Argb8888,
        )?;
        Ok(buffer)
    }

    fn pixels<'a>(&'a mut self, handle: &Buffer) -> Option<&'a mut [u8]> {
        self.canvas(handle)
    }
}

impl Allocator for Shm {
    type Region = SlotPool;

    fn allocate(&self, extent: Extent) -> Result<SlotPool, PoolError> {
        Ok(SlotPool::new(extent.byte_len() * SLOTS, self)?)
    }
}

/// The buffer handed to a render pass.
pub struct Frame<'a, H> {
    pub handle: &'a H,
    pub pixels: &'a mut [u8],
    pub extent: Extent,
}

/// Double-buffered pixel storage for one surface.
pub struct BufferPool<R: Region> {
    slots: [Option<R::Handle>; SLOTS],
    region: Option<R>,
    current: usize,
    extent: Option<Extent>,
    allocations: usize,
}

impl<R: Region> BufferPool<R> {
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            region: None,
            current: 0,
            extent: None,
            allocations: 0,
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        self.extent
    }

    pub fn region(&self) -> Option<&R> {
        self.region.as_ref()
    }

    /// How many regions have been mapped over the pool's lifetime.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Reallocates when `extent` differs from the current size. Returns whether it did.
    pub fn ensure_size<A>(&mut self, allocator: &A, extent: Extent) -> Result<bool, PoolError>
    where
        A: Allocator<Region = R>,
    {
        if self.region.is_some() && self.extent == Some(extent) {
            return Ok(false);
        }

        self.destroy();
        self.region = Some(allocator.allocate(extent)?);
        self.extent = Some(extent);
        self.allocations += 1;
        log::debug!(
            "allocated {}x{} buffer pool ({} bytes)",
            extent.width,
            extent.height,
            extent.byte_len() * SLOTS
        );

        Ok(true)
    }

    /// Picks a buffer the compositor is not reading from.
    pub fn next_frame(&mut self) -> Result<Frame<'_, R::Handle>, PoolError> {
        let extent = self.extent.ok_or(PoolError::Unallocated)?;
        let region = self.region.as_mut().ok_or(PoolError::Unallocated)?;

        let other = (self.current + 1) % SLOTS;
        let is_free = |region: &mut R, slot: &Option<R::Handle>| match slot {
            Some(handle) => region.pixels(handle).is_some(),
            None => true,
        };

        let idx = if is_free(region, &self.slots[self.current]) {
            self.current
        } else if is_free(region, &self.slots[other]) {
            other
        } else {
            // Both still on screen; drop the older one, it is destroyed once released
            log::trace!("both buffers busy, replacing slot {other}");
            self.slots[other] = None;
            other
        };

        if self.slots[idx].is_none() {
            self.slots[idx] = Some(region.create_handle(extent)?);
        }
        let handle = self.slots[idx].as_ref().ok_or(PoolError::Unallocated)?;
        let pixels = region.pixels(handle).ok_or(PoolError::Busy)?;
        self.current = idx;

        Ok(Frame {
            handle,
            pixels,
            extent,
        })
    }

    /// Releases every buffer and the mapping. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        // Buffers go before the region they point into
        self.slots = [None, None];
        self.region = None;
        self.extent = None;
        self.current = 0;
    }
}

impl<R: Region> Default for BufferPool<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Region> Drop for BufferPool<R> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
pub(crate) mod heap {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    /// Stand-in for a compositor-held buffer: `busy` is set while "attached".
    #[derive(Debug, Clone)]
    pub struct HeapHandle {
        pub index: usize,
        pub busy: Rc<Cell<bool>>,
    }

    #[derive(Default)]
    pub struct HeapRegion {
        buffers: Vec<Vec<u8>>,
    }

    impl HeapRegion {
        pub fn buffer_count(&self) -> usize {
            self.buffers.len()
        }
    }

    impl Region for HeapRegion {
        type Handle = HeapHandle;

        fn create_handle(&mut self, extent: Extent) -> Result<HeapHandle, PoolError> {
            self.buffers.push(vec![0; extent.byte_len()]);
            Ok(HeapHandle {
                index: self.buffers.len() - 1,
                busy: Rc::default(),
            })
        }

        fn pixels<'a>(&'a mut self, handle: &HeapHandle) -> Option<&'a mut [u8]> {
            if handle.busy.get() {
                return None;
            }
            self.buffers.get_mut(handle.index).map(Vec::as_mut_slice)
        }
    }

    pub struct HeapAllocator;

    impl Allocator for HeapAllocator {
        type Region = HeapRegion;

        fn allocate(&self, _extent: Extent) -> Result<HeapRegion, PoolError> {
            Ok(HeapRegion::default())
        }
    }
}
