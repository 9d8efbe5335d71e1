// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Priority compositor.
//!
//! Every enabled element is placed into the slot named by its draw order, the
//! slots are scanned low to high, and each element is rasterised over the
//! whole scan grid (`0..=max_column` × `0..height`) so its DMA consumes exactly
//! the data a real scan would, blanking included. Only columns right of the
//! active start land in the frame.

use crate::core::WordSource;
use crate::dma::Dma;
use crate::element::{ELEMENT_COUNT, PLANE_COUNT, Renderable, SPRITE_COUNT};
use crate::registers::VideoRegisters;

/// Indexed frame buffer. Index 0 is background.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Resize, clearing to background if the dimensions change.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    pub fn fill(&mut self, index: u8) {
        self.pixels.fill(index);
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        self.offset(x, y).map(|offset| self.pixels[offset])
    }

    pub fn get_mut(&mut self, x: u32, y: u32) -> Option<&mut u8> {
        self.offset(x, y).map(|offset| &mut self.pixels[offset])
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels.chunks(self.width.max(1) as usize)
    }
}

/// Slot reference into the plane or sprite arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRef {
    Plane(usize),
    Sprite(usize),
}

/// Enabled elements in drawing order.
///
/// Two elements claiming the same slot are not an error: sprites are placed
/// after planes and each kind in index order, so the last one placed wins.
///
/// # Panics
///
/// If an enabled element's draw order is past the last slot.
pub fn render_list(regs: &VideoRegisters) -> Vec<ElementRef> {
    let mut slots = [None; ELEMENT_COUNT];
    let mut place = |order: usize, element: ElementRef| {
        assert!(
            order < ELEMENT_COUNT,
            "{element:?} has draw order {order}, only {ELEMENT_COUNT} slots exist"
        );
        slots[order] = Some(element);
    };
    for (index, plane) in regs.planes.iter().enumerate() {
        if plane.enabled() {
            place(plane.draw_order(), ElementRef::Plane(index));
        }
    }
    for (index, sprite) in regs.sprites.iter().enumerate() {
        if sprite.enabled() {
            place(sprite.draw_order(), ElementRef::Sprite(index));
        }
    }
    slots.into_iter().flatten().collect()
}

/// Latched scan geometry of one frame.
#[derive(Debug, Clone, Copy)]
struct Scan {
    height: u32,
    max_column: u32,
    active_start: u32,
    high_res: bool,
}

fn draw_element<E, M>(element: &E, dma: &mut Dma, scan: Scan, memory: &M, frame: &mut Frame)
where
    E: Renderable,
    M: WordSource + ?Sized,
{
    dma.restart(element.dma_config());
    let bounds = element.bounds(scan.high_res);
    let bits = element.bpp().bits();
    let decoder = element.pixel_decoder();
    let last_column = scan.max_column.min(bounds.end_x.saturating_sub(1));

    for y in (0..scan.height).filter(|&y| bounds.contains_row(y)) {
        for x in bounds.start_x..=last_column {
            let pixel = decoder.decode(dma.get_bits(bits, memory));
            if pixel == 0 || x <= scan.active_start {
                continue;
            }
            if let Some(target) = frame.get_mut(x - scan.active_start - 1, y) {
                if *target != 0 {
                    element.collision().raise();
                }
                *target = pixel;
            }
        }
        dma.next_row();
    }
}

/// Rasterise all enabled elements into `frame`. Returns how many were drawn.
///
/// `frame` must already have the latched screen dimensions.
pub fn compose<M: WordSource + ?Sized>(
    regs: &VideoRegisters,
    plane_dma: &mut [Dma; PLANE_COUNT],
    sprite_dma: &mut [Dma; SPRITE_COUNT],
    memory: &M,
    frame: &mut Frame,
) -> usize {
    let elements = render_list(regs);
    frame.fill(0);
    if !regs.is_enabled() {
        return 0;
    }

    let scan = Scan {
        height: frame.height(),
        max_column: regs.max_column(),
        active_start: regs.active_start(),
        high_res: regs.high_res(),
    };
    for element in &elements {
        match *element {
            ElementRef::Plane(index) => {
                let plane = &regs.planes[index];
                draw_element(plane, &mut plane_dma[index], scan, memory, frame);
                plane
                    .current_address
                    .set(plane_dma[index].current_address());
            }
            ElementRef::Sprite(index) => {
                draw_element(&regs.sprites[index], &mut sprite_dma[index], scan, memory, frame);
            }
        }
    }
    elements.len()
}
