// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Indexed-to-RGB conversion and the display sink seam.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::compositor::Frame;
use crate::palette::{BASE_ENTRIES, Palette, Rgb};

/// Offset of the upper colour bank used on odd columns.
const ODD_BANK: usize = 16;

/// Which palette table a frame is converted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteMode {
    /// 256 interpolated entries, indexed directly (an 8 bpp plane is on).
    Interpolated,
    /// 32 base entries; odd columns are shifted into the upper 16.
    Banked,
}

impl PaletteMode {
    pub fn select(any_plane_bpp8: bool) -> Self {
        if any_plane_bpp8 {
            PaletteMode::Interpolated
        } else {
            PaletteMode::Banked
        }
    }
}

/// Convert `frame` into `out`, reusing its allocation.
pub fn convert(frame: &Frame, palette: &Palette, mode: PaletteMode, out: &mut Vec<Rgb>) {
    out.clear();
    match mode {
        PaletteMode::Interpolated => {
            let table = palette.interpolated();
            out.extend(frame.pixels().iter().map(|&index| table[index as usize]));
        }
        PaletteMode::Banked => {
            let table = palette.base();
            for row in frame.rows() {
                out.extend(row.iter().enumerate().map(|(x, &index)| {
                    let bank = if x % 2 == 1 { ODD_BANK } else { 0 };
                    table[(index as usize + bank) % BASE_ENTRIES]
                }));
            }
        }
    }
}

/// Where rendered frames go.
pub trait DisplaySink {
    /// The latched screen size changed.
    fn resize(&mut self, width: u32, height: u32);
    fn present(&mut self, pixels: &[Rgb], width: u32, height: u32);
}

#[derive(Debug, Default)]
struct Captured {
    resizes: Vec<(u32, u32)>,
    presents: u64,
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

/// Headless sink that keeps the last presented frame.
///
/// Clones share state, so a handle kept outside the core observes what the
/// core presents.
#[derive(Debug, Clone, Default)]
pub struct FrameCapture {
    inner: Arc<Mutex<Captured>>,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Captured> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn resizes(&self) -> Vec<(u32, u32)> {
        self.lock().resizes.clone()
    }

    pub fn present_count(&self) -> u64 {
        self.lock().presents
    }

    /// Width, height and pixels of the last frame.
    pub fn last_frame(&self) -> (u32, u32, Vec<Rgb>) {
        let captured = self.lock();
        (captured.width, captured.height, captured.pixels.clone())
    }

    pub fn write_ppm<W: Write>(&self, writer: W) -> io::Result<()> {
        let captured = self.lock();
        write_ppm(writer, &captured.pixels, captured.width, captured.height)
    }
}

impl DisplaySink for FrameCapture {
    fn resize(&mut self, width: u32, height: u32) {
        self.lock().resizes.push((width, height));
    }

    fn present(&mut self, pixels: &[Rgb], width: u32, height: u32) {
        let mut captured = self.lock();
        captured.presents += 1;
        captured.width = width;
        captured.height = height;
        captured.pixels.clear();
        captured.pixels.extend_from_slice(pixels);
    }
}

/// Binary PPM (P6).
pub fn write_ppm<W: Write>(mut writer: W, pixels: &[Rgb], width: u32, height: u32) -> io::Result<()> {
    write!(writer, "P6\n{width} {height}\n255\n")?;
    let bytes: Vec<u8> = pixels.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
    writer.write_all(&bytes)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn palette() -> Palette {
        let mut palette = Palette::new();
        for index in 0..32u8 {
            palette.set_entry(index, Rgb::new(index, 0, 0));
        }
        palette
    }

    fn frame_of(width: u32, height: u32, pixels: &[u8]) -> Frame {
        let mut frame = Frame::new(width, height);
        for (i, &p) in pixels.iter().enumerate() {
            *frame.get_mut(i as u32 % width, i as u32 / width).unwrap() = p;
        }
        frame
    }

    #[test]
    fn banked_mode_alternates_per_column() {
        let frame = frame_of(4, 2, &[1, 1, 1, 1, 2, 2, 2, 2]);
        let mut out = Vec::new();
        convert(&frame, &palette(), PaletteMode::Banked, &mut out);
        let reds: Vec<u8> = out.iter().map(|c| c.r).collect();
        assert_eq!(reds, vec![1, 17, 1, 17, 2, 18, 2, 18]);
    }

    #[test]
    fn banked_mode_wraps_past_the_base_table() {
        let frame = frame_of(2, 1, &[33, 20]);
        let mut out = Vec::new();
        convert(&frame, &palette(), PaletteMode::Banked, &mut out);
        assert_eq!(out[0].r, 1);
        assert_eq!(out[1].r, 4);
    }

    #[test]
    fn interpolated_mode_indexes_directly() {
        let frame = frame_of(3, 1, &[8, 9, 255]);
        let palette = palette();
        let mut out = Vec::new();
        convert(&frame, &palette, PaletteMode::Interpolated, &mut out);
        assert_eq!(out, vec![
            palette.interpolated()[8],
            palette.interpolated()[9],
            palette.interpolated()[255]
        ]);
        assert_eq!(out[0].r, 1);
    }

    #[test]
    fn capture_keeps_last_frame() {
        let handle = FrameCapture::new();
        let mut sink: Box<dyn DisplaySink> = Box::new(handle.clone());
        sink.resize(2, 1);
        sink.present(&[Rgb::WHITE, Rgb::BLACK], 2, 1);
        sink.present(&[Rgb::BLACK, Rgb::WHITE], 2, 1);
        assert_eq!(handle.resizes(), vec![(2, 1)]);
        assert_eq!(handle.present_count(), 2);
        assert_eq!(handle.last_frame(), (2, 1, vec![Rgb::BLACK, Rgb::WHITE]));
    }

    #[test]
    fn ppm_layout() {
        let mut bytes = Vec::new();
        write_ppm(&mut bytes, &[Rgb::new(1, 2, 3)], 1, 1).unwrap();
        assert_eq!(bytes, b"P6\n1 1\n255\n\x01\x02\x03".to_vec());
    }
}
