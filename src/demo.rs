// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test scene: a gradient plane under three framed planes and a row of
//! sprites, with keyboard controls to move and toggle them.
//!
//! Everything here is written through the register interface, the way a
//! program on the processor side would set the screen up.

use std::sync::Arc;

use crate::builder::{PlaneBuf, ScreenElement, SpriteBuf};
use crate::core::SharedMemory;
use crate::element::{Bpp, PLANE_COUNT, SPRITE_COUNT, SPRITE_HEIGHT};
use crate::error::VideoError;
use crate::input::{Key, KeyEvent};
use crate::palette::Rgb;
use crate::regmap::{PALETTE_BLUE, PALETTE_GREEN, PALETTE_INDEX, PALETTE_RED};
use crate::registers::VideoRegisters;

const SPRITE_STRIDE: u32 = 0x200;

fn plane_bpp(index: usize) -> Bpp {
    if index == 0 { Bpp::Bpp8 } else { Bpp::Bpp4 }
}

/// Plane base addresses packed back to back, then the first sprite's.
fn layout(width: u32, height: u32) -> ([u32; PLANE_COUNT], u32) {
    let mut next = 0u32;
    let planes = std::array::from_fn(|index| {
        let base = next;
        let bytes = width * height * plane_bpp(index).bits() as u32 / 8;
        next = (base + bytes).next_multiple_of(4);
        base
    });
    (planes, next)
}

/// 32-colour base palette (pixeljoint forum palette, TID 16247).
pub const PALETTE: [Rgb; 32] = [
    Rgb::new(0, 0, 0),
    Rgb::new(34, 32, 52),
    Rgb::new(69, 40, 60),
    Rgb::new(102, 57, 49),
    Rgb::new(143, 86, 59),
    Rgb::new(223, 113, 38),
    Rgb::new(217, 160, 102),
    Rgb::new(238, 195, 154),
    Rgb::new(251, 242, 54),
    Rgb::new(153, 229, 80),
    Rgb::new(106, 190, 48),
    Rgb::new(55, 148, 110),
    Rgb::new(75, 105, 47),
    Rgb::new(82, 75, 36),
    Rgb::new(50, 60, 57),
    Rgb::new(63, 63, 116),
    Rgb::new(48, 96, 130),
    Rgb::new(91, 110, 225),
    Rgb::new(99, 155, 255),
    Rgb::new(95, 205, 228),
    Rgb::new(203, 219, 252),
    Rgb::new(255, 255, 255),
    Rgb::new(155, 173, 183),
    Rgb::new(132, 126, 135),
    Rgb::new(105, 106, 106),
    Rgb::new(89, 86, 82),
    Rgb::new(118, 66, 138),
    Rgb::new(172, 50, 50),
    Rgb::new(217, 87, 99),
    Rgb::new(215, 123, 186),
    Rgb::new(143, 151, 74),
    Rgb::new(138, 111, 48),
];

/// Write [`PALETTE`] through the palette index and channel ports.
pub fn load_palette(regs: &VideoRegisters) {
    for (index, color) in PALETTE.iter().enumerate() {
        regs.register_write(PALETTE_INDEX, index as u8);
        regs.register_write(PALETTE_RED, color.r);
        regs.register_write(PALETTE_GREEN, color.g);
        regs.register_write(PALETTE_BLUE, color.b);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Plane(usize),
    Sprite(usize),
}

pub struct DemoScene {
    pub planes: Vec<PlaneBuf>,
    pub sprites: Vec<SpriteBuf>,
    selected: Selection,
}

impl DemoScene {
    /// Draw a `width` x `height` scene into `memory` and program every
    /// element. Pass the size of the programmed mode; the planes are packed
    /// for that size and the sprites follow them.
    pub fn build(
        regs: &Arc<VideoRegisters>,
        memory: &SharedMemory,
        width: u32,
        height: u32,
    ) -> Result<Self, VideoError> {
        let (plane_bases, sprite_base) = layout(width, height);
        let needed = sprite_base as usize + SPRITE_STRIDE as usize * SPRITE_COUNT;
        if needed > memory.len() {
            return Err(VideoError::SceneTooLarge {
                width,
                height,
                needed,
                available: memory.len(),
            });
        }

        let mut planes = Vec::with_capacity(PLANE_COUNT);
        for (index, base) in plane_bases.into_iter().enumerate() {
            let plane = PlaneBuf::new(regs, index, memory, base, width, height, plane_bpp(index))?;
            plane.set_enabled(true);
            plane.set_draw_order(index as u8);
            plane.clear(0);
            if index == 0 {
                for y in 0..height as i32 {
                    for x in 0..width as i32 {
                        plane.set_pixel(x, y, (y - x) as u8);
                    }
                }
            } else {
                let inset = 10 * index as i32;
                plane.set_palette_1(32 * index as u8);
                plane.draw_rect(
                    inset,
                    inset,
                    width as i32 - 2 * inset,
                    height as i32 - 2 * inset,
                    1,
                );
            }
            planes.push(plane);
        }

        let mut sprites = Vec::with_capacity(SPRITE_COUNT);
        for index in 0..SPRITE_COUNT {
            let base = sprite_base + SPRITE_STRIDE * index as u32;
            let mut sprite = SpriteBuf::new(regs, index, memory, base, SPRITE_HEIGHT)?;
            let step = index as u8 * 16;
            sprite.set_enabled(true);
            sprite.set_draw_order(index as u8 + 4);
            sprite.set_palette_1(8 + step);
            sprite.set_palette_2(16 + step);
            sprite.set_palette_3(48 + step);
            sprite.set_x(32 * index as i32);
            sprite.set_y(100 + 10 * index as i32);

            sprite.clear(0);
            sprite.draw_rect(0, 0, 32, 32, 1);
            sprite.fill_rect(12, 12, 8, 8, 2);
            sprite.fill_rect(14, 14, 4, 4, 3);
            sprites.push(sprite);
        }

        load_palette(regs);
        Ok(Self {
            planes,
            sprites,
            selected: Selection::Sprite(0),
        })
    }

    pub fn selected(&self) -> Selection {
        self.selected
    }

    fn selected_mut(&mut self) -> &mut dyn ScreenElement {
        match self.selected {
            Selection::Plane(index) => &mut self.planes[index],
            Selection::Sprite(index) => &mut self.sprites[index],
        }
    }

    /// Apply one key event. Returns `false` when the scene should close.
    ///
    /// Arrows move the selected element by one pixel. Digits 1-8 toggle the
    /// matching sprite, or plane with shift held; with ctrl held they select
    /// it instead.
    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        if !event.down {
            return true;
        }
        match event.key {
            Key::Escape => return false,
            Key::Left => {
                let element = self.selected_mut();
                element.set_x(element.x() - 1);
            }
            Key::Right => {
                let element = self.selected_mut();
                element.set_x(element.x() + 1);
            }
            Key::Up => {
                let element = self.selected_mut();
                element.set_y(element.y() - 1);
            }
            Key::Down => {
                let element = self.selected_mut();
                element.set_y(element.y() + 1);
            }
            Key::Digit(digit @ 1..=8) => {
                let index = digit as usize - 1;
                let target = if event.shift {
                    (index < self.planes.len()).then_some(Selection::Plane(index))
                } else {
                    (index < self.sprites.len()).then_some(Selection::Sprite(index))
                };
                if let Some(target) = target {
                    if event.ctrl {
                        self.selected = target;
                    } else {
                        let element: &dyn ScreenElement = match target {
                            Selection::Plane(i) => &self.planes[i],
                            Selection::Sprite(i) => &self.sprites[i],
                        };
                        element.set_enabled(!element.enabled());
                    }
                }
            }
            Key::Digit(_) | Key::Other => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::VideoTiming;
    use crate::video::VideoCore;
    use pretty_assertions::assert_eq;

    fn scene() -> (VideoCore, DemoScene) {
        let mut core = VideoCore::new();
        let memory = SharedMemory::default();
        core.bind_memory(memory.clone());
        let regs = core.registers();
        VideoTiming::MODE_320X240.program(&regs, true);
        let scene = DemoScene::build(&regs, &memory, 320, 240).unwrap();
        (core, scene)
    }

    #[test]
    fn palette_goes_through_the_ports() {
        let (core, _scene) = scene();
        let regs = core.registers();
        let palette = regs.palette();
        assert_eq!(palette.base(), &PALETTE);
        assert_eq!(palette.interpolated()[21 * 8], Rgb::WHITE);
    }

    #[test]
    fn scene_renders_frames_and_sprites() {
        let (mut core, scene) = scene();
        core.render();
        let frame = core.frame();
        assert_eq!((frame.width(), frame.height()), (320, 240));
        // Outer frame of plane 1 at palette offset 32.
        assert_eq!(frame.get(160, 10), Some(33));
        // Sprite 0 sits at (0, 100): its border uses palette 1, its centre palette 3.
        assert_eq!(frame.get(0, 100), Some(8));
        assert_eq!(frame.get(15, 115), Some(48));
        assert_eq!(scene.sprites[7].x(), 224);
    }

    #[test]
    fn arrows_move_the_selected_sprite() {
        let (_core, mut scene) = scene();
        assert_eq!(scene.selected(), Selection::Sprite(0));
        assert!(scene.handle_key(KeyEvent::press(Key::Right)));
        assert!(scene.handle_key(KeyEvent::press(Key::Up)));
        assert!(scene.handle_key(KeyEvent::release(Key::Up)));
        assert_eq!((scene.sprites[0].x(), scene.sprites[0].y()), (1, 99));
    }

    #[test]
    fn digits_toggle_and_select() {
        let (_core, mut scene) = scene();
        scene.handle_key(KeyEvent::press(Key::Digit(3)));
        assert!(!scene.sprites[2].enabled());
        scene.handle_key(KeyEvent::press(Key::Digit(2)).with_shift());
        assert!(!scene.planes[1].enabled());
        scene.handle_key(KeyEvent::press(Key::Digit(5)).with_shift());
        assert!(scene.planes.iter().enumerate().all(|(i, p)| p.enabled() == (i != 1)));

        scene.handle_key(KeyEvent::press(Key::Digit(4)).with_shift().with_ctrl());
        assert_eq!(scene.selected(), Selection::Plane(3));
        scene.handle_key(KeyEvent::press(Key::Left));
        assert_eq!(scene.planes[3].x(), -1);

        scene.handle_key(KeyEvent::press(Key::Digit(8)).with_ctrl());
        assert_eq!(scene.selected(), Selection::Sprite(7));
        assert!(!scene.handle_key(KeyEvent::press(Key::Escape)));
    }

    #[test]
    fn scene_follows_the_mode_size() {
        let mut core = VideoCore::new();
        let memory = SharedMemory::default();
        core.bind_memory(memory.clone());
        let regs = core.registers();
        let mode = VideoTiming::MODE_640X480;
        mode.program(&regs, true);
        let scene = DemoScene::build(&regs, &memory, mode.width(), mode.height()).unwrap();
        core.render();
        let frame = core.frame();
        assert_eq!((frame.width(), frame.height()), (640, 480));
        // Plane 1 outline reaches the right and bottom insets of the bigger screen.
        assert_eq!(frame.get(629, 240), Some(33));
        assert_eq!(frame.get(320, 469), Some(33));
        assert_eq!(frame.get(15, 115), Some(48));
        assert_eq!(scene.planes.len(), PLANE_COUNT);
    }

    #[test]
    fn oversized_scene_is_rejected() {
        let regs = Arc::new(VideoRegisters::new());
        let memory = SharedMemory::new(0x1000);
        match DemoScene::build(&regs, &memory, 320, 240) {
            Err(VideoError::SceneTooLarge { needed, available, .. }) => {
                assert_eq!(available, 0x1000);
                assert_eq!(needed, 320 * 240 * 5 / 2 + 0x200 * SPRITE_COUNT);
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("scene should not fit"),
        }
    }
}
