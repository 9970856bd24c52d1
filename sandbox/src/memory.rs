//! Guest linear memory helpers and the boundary arena.
//!
//! All read/write functions validate pointer and length arguments against the
//! guest's linear memory before touching it. Strings cross the boundary as
//! nul-terminated UTF-8 in both directions.
//!
//! The `BoundaryArena` hands out host-written buffers in a region appended to
//! guest memory at instantiation. Each buffer is a handle (its guest address)
//! that stays live until the guest calls `buffer_release`.

use std::collections::BTreeMap;

use zina_hostapi::{HostError, StatusCode};

/// WASM page size.
pub const PAGE_SIZE: usize = 65536;

/// Initial host region size in pages (4 pages = 256 KiB).
pub const HOST_ALLOC_PAGES: u64 = 4;

/// Read `len` bytes from guest memory at `ptr`.
pub fn read_bytes(mem: &[u8], ptr: i32, len: i32) -> Result<Vec<u8>, HostError> {
    if ptr < 0 || len < 0 {
        return Err(HostError::BadPointer);
    }
    let start = ptr as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(HostError::BadPointer)?;
    if end > mem.len() {
        return Err(HostError::BadPointer);
    }
    Ok(mem[start..end].to_vec())
}

/// Write `data` to guest memory at `ptr`.
pub fn write_bytes(mem: &mut [u8], ptr: i32, data: &[u8]) -> Result<(), HostError> {
    if ptr < 0 {
        return Err(HostError::BadPointer);
    }
    let start = ptr as usize;
    let end = start
        .checked_add(data.len())
        .ok_or(HostError::BadPointer)?;
    if end > mem.len() {
        return Err(HostError::BadPointer);
    }
    mem[start..end].copy_from_slice(data);
    Ok(())
}

/// Read an i32 value (little-endian) from guest memory at `ptr`.
pub fn read_i32(mem: &[u8], ptr: i32) -> Result<i32, HostError> {
    let bytes = read_bytes(mem, ptr, 4)?;
    Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Write an i32 value (little-endian) to guest memory at `ptr`.
pub fn write_i32(mem: &mut [u8], ptr: i32, value: i32) -> Result<(), HostError> {
    write_bytes(mem, ptr, &value.to_le_bytes())
}

/// Validate that `[ptr, ptr+len)` is within memory bounds.
pub fn validate_range(mem_size: usize, ptr: i32, len: i32) -> Result<(), HostError> {
    if ptr < 0 || len < 0 {
        return Err(HostError::BadPointer);
    }
    let end = (ptr as usize)
        .checked_add(len as usize)
        .ok_or(HostError::BadPointer)?;
    if end > mem_size {
        return Err(HostError::BadPointer);
    }
    Ok(())
}

/// Decode a nul-terminated UTF-8 string at `ptr`.
///
/// The terminator must appear within `max_len` bytes and within memory.
/// Every failure (bad pointer, missing terminator, invalid UTF-8) is an
/// invalid-input rejection, never a trap.
pub fn read_c_string(mem: &[u8], ptr: i32, max_len: usize) -> Result<String, HostError> {
    if ptr < 0 || ptr as usize >= mem.len() {
        return Err(HostError::invalid_input());
    }
    let start = ptr as usize;
    let window_end = start.saturating_add(max_len.saturating_add(1)).min(mem.len());
    let window = &mem[start..window_end];
    let len = window
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(HostError::invalid_input)?;
    std::str::from_utf8(&window[..len])
        .map(str::to_owned)
        .map_err(|_| HostError::invalid_input())
}

/// `s` as it is laid out in guest memory: its bytes plus one terminator.
pub fn terminated(s: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(s.len() + 1);
    buf.extend_from_slice(s);
    buf.push(0);
    buf
}

/// A host-side length as the i32 the guest receives.
///
/// Lengths past `i32::MAX` cannot be reported and become `STATUS_IO_ERROR`.
pub fn guest_len(len: usize) -> Result<i32, HostError> {
    i32::try_from(len).map_err(|_| HostError::Status(StatusCode::IoError))
}

/// Compute how many 8-byte-aligned bytes are needed.
fn align8(size: usize) -> usize {
    (size + 7) & !7
}

/// Planned allocation, applied with [`BoundaryArena::commit`] once the
/// memory has been grown and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Guest address of the buffer.
    pub ptr: usize,
    /// Requested size in bytes (terminator included).
    pub len: usize,
    /// Pages the caller must grow memory by before writing.
    pub grow_pages: u64,
    region: usize,
    base: usize,
    bump: usize,
    capacity: usize,
}

/// A span of guest memory the arena allocates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    base: usize,
    capacity: usize,
}

impl Region {
    fn end(&self) -> usize {
        self.base + self.capacity
    }

    // Address 0 means "no buffer"; never hand it out.
    fn floor(&self) -> usize {
        if self.base == 0 {
            8
        } else {
            0
        }
    }
}

/// Host-side arena for buffers handed to the guest.
///
/// Bump allocation in 8-byte slots, starting in the region appended at
/// instantiation. A full region grows in place while it still ends at the
/// top of memory; otherwise the arena claims a new region above whatever the
/// guest has grown since. Regions are never given up. Once every live handle
/// has been released allocation rewinds to the first region, so space is
/// reused only when no buffer the guest references can be overwritten.
#[derive(Debug, Clone)]
pub struct BoundaryArena {
    regions: Vec<Region>,
    current: usize,
    bump: usize,
    live: BTreeMap<u32, usize>,
}

impl BoundaryArena {
    /// Create an arena over `capacity` bytes starting at `base`.
    pub fn new(base: usize, capacity: usize) -> Self {
        let region = Region { base, capacity };
        Self {
            regions: vec![region],
            current: 0,
            bump: region.floor(),
            live: BTreeMap::new(),
        }
    }

    /// Plan an allocation of `size` bytes in a memory of `mem_size` bytes.
    ///
    /// Tries the current region, then any later region already claimed, then
    /// growing the last region in place, then a fresh region at the current
    /// top of memory. Buffers in earlier regions stay valid throughout.
    pub fn reserve(&self, size: usize, mem_size: usize) -> Reservation {
        let aligned = align8(size.max(1));
        let plan = |region: usize, at: Region, bump: usize, grow_pages: u64| Reservation {
            ptr: at.base + bump,
            len: size,
            grow_pages,
            region,
            base: at.base,
            bump: bump + aligned,
            capacity: at.capacity + (grow_pages as usize) * PAGE_SIZE,
        };

        let current = self.regions[self.current];
        if self.bump + aligned <= current.capacity {
            return plan(self.current, current, self.bump, 0);
        }
        for (idx, region) in self.regions.iter().enumerate().skip(self.current + 1) {
            if region.floor() + aligned <= region.capacity {
                return plan(idx, *region, region.floor(), 0);
            }
        }

        let last = self.regions.len() - 1;
        let top = self.regions[last];
        let (idx, region, bump) = if top.end() == mem_size {
            let bump = if last == self.current {
                self.bump
            } else {
                top.floor()
            };
            (last, top, bump)
        } else {
            let fresh = Region {
                base: mem_size,
                capacity: 0,
            };
            (self.regions.len(), fresh, fresh.floor())
        };
        let deficit = bump + aligned - region.capacity;
        plan(idx, region, bump, deficit.div_ceil(PAGE_SIZE) as u64)
    }

    /// Record a reservation as a live handle.
    pub fn commit(&mut self, reservation: Reservation) -> u32 {
        let region = Region {
            base: reservation.base,
            capacity: reservation.capacity,
        };
        match self.regions.get_mut(reservation.region) {
            Some(existing) => {
                *existing = region;
                self.current = reservation.region;
            }
            None => {
                self.regions.push(region);
                self.current = self.regions.len() - 1;
            }
        }
        self.bump = reservation.bump;
        let handle = reservation.ptr as u32;
        self.live.insert(handle, reservation.len);
        handle
    }

    /// Release a handle. Unknown or already released handles are rejected.
    pub fn release(&mut self, handle: u32) -> Result<usize, HostError> {
        let len = self.live.remove(&handle).ok_or_else(HostError::bad_handle)?;
        if self.live.is_empty() {
            self.current = 0;
            self.bump = self.regions[0].floor();
        }
        Ok(len)
    }

    /// Length (terminator included) of a live handle.
    pub fn len_of(&self, handle: u32) -> Option<usize> {
        self.live.get(&handle).copied()
    }

    /// Number of buffers the guest has not released yet.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Base address of the region currently allocated from.
    pub fn base(&self) -> usize {
        self.regions[self.current].base
    }

    /// Regions claimed so far.
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}
