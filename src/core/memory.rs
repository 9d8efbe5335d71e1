// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Anything the DMA engine can fetch 32-bit words from.
pub trait WordSource {
    /// Fetch the little-endian word at dword address `word_address`.
    fn read_word(&self, word_address: u32) -> u32;
}

impl WordSource for [u8] {
    fn read_word(&self, word_address: u32) -> u32 {
        let start = word_address as usize * 4;
        match self.get(start..start + 4) {
            Some(bytes) => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            // unmapped reads return all ones
            None => u32::MAX,
        }
    }
}

/// Byte-addressable memory shared between the processor side and the video DMA.
///
/// Cloning hands out another handle to the same storage.
#[derive(Clone, Debug)]
pub struct SharedMemory {
    bytes: Arc<RwLock<Vec<u8>>>,
}

impl SharedMemory {
    pub const DEFAULT_SIZE: usize = 0x100000; // 1MB

    pub fn new(size: usize) -> Self {
        Self {
            bytes: Arc::new(RwLock::new(vec![0; size])),
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the whole region for reading, e.g. for the duration of a frame.
    pub fn read(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.bytes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrow the whole region for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.bytes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a byte; unmapped reads return 0xff.
    pub fn read_u8(&self, addr: u32) -> u8 {
        self.read().get(addr as usize).copied().unwrap_or(0xFF)
    }

    /// Write a byte; writes past the end are ignored.
    pub fn write_u8(&self, addr: u32, value: u8) {
        if let Some(cell) = self.write().get_mut(addr as usize) {
            *cell = value;
        }
    }

    /// Read little-endian u32 at a byte address.
    pub fn read_u32(&self, addr: u32) -> u32 {
        let bytes = self.read();
        let a = addr as usize;
        (0..4).fold(0u32, |acc, i| {
            let byte = bytes.get(a + i).copied().unwrap_or(0xFF);
            acc | ((byte as u32) << (8 * i))
        })
    }

    /// Write little-endian u32 at a byte address.
    pub fn write_u32(&self, addr: u32, value: u32) {
        let mut bytes = self.write();
        for (i, byte) in value.to_le_bytes().into_iter().enumerate() {
            if let Some(cell) = bytes.get_mut(addr as usize + i) {
                *cell = byte;
            }
        }
    }

    /// Copy a block in starting at byte address `addr`, clipped at the end of memory.
    pub fn load(&self, addr: u32, data: &[u8]) {
        let mut bytes = self.write();
        let start = (addr as usize).min(bytes.len());
        let end = (start + data.len()).min(bytes.len());
        bytes[start..end].copy_from_slice(&data[..end - start]);
    }
}

impl Default for SharedMemory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl WordSource for SharedMemory {
    fn read_word(&self, word_address: u32) -> u32 {
        self.read().as_slice().read_word(word_address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_read_write_u8() {
        let mem = SharedMemory::default();
        mem.write_u8(0, 0x12);
        assert_eq!(mem.read_u8(0), 0x12);
        mem.write_u8(0x0F_FFFF, 0x34);
        assert_eq!(mem.read_u8(0x0F_FFFF), 0x34);
        // out of range returns 0xff
        assert_eq!(mem.read_u8(0x100000), 0xff);
    }

    #[test]
    fn memory_read_write_u32() {
        let mem = SharedMemory::new(16);
        mem.write_u32(4, 0x1234_5678);
        assert_eq!(mem.read_u8(4), 0x78);
        assert_eq!(mem.read_u32(4), 0x1234_5678);
        assert_eq!(mem.read_word(1), 0x1234_5678);
    }

    #[test]
    fn word_fetch_past_end_is_all_ones() {
        let mem = SharedMemory::new(8);
        assert_eq!(mem.read_word(2), u32::MAX);
    }

    #[test]
    fn clones_share_storage() {
        let mem = SharedMemory::new(8);
        let other = mem.clone();
        other.write_u8(3, 0xAA);
        assert_eq!(mem.read_u8(3), 0xAA);
    }

    #[test]
    fn load_clips_at_end() {
        let mem = SharedMemory::new(4);
        mem.load(2, &[1, 2, 3, 4]);
        assert_eq!(&mem.read()[..], &[0, 0, 1, 2]);
    }
}
