// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! SDL2 window output and keyboard input.
//!
//! SDL must be driven from the thread that initialised it, so the sink and
//! the event source are created together and stay on that thread.

use log::warn;
use sdl2::EventPump;
use sdl2::event::Event;
use sdl2::keyboard::{Keycode, Mod};
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, TextureCreator};
use sdl2::video::{Window, WindowContext};

use crate::display::DisplaySink;
use crate::input::{Key, KeyEvent, KeyQueue};
use crate::palette::Rgb;

/// Below these sizes the window shows each pixel twice in that axis.
const DOUBLE_WIDTH_BELOW: u32 = 512;
const DOUBLE_HEIGHT_BELOW: u32 = 384;

const KEYS: [(Keycode, Key); 15] = [
    (Keycode::Escape, Key::Escape),
    (Keycode::Left, Key::Left),
    (Keycode::Right, Key::Right),
    (Keycode::Up, Key::Up),
    (Keycode::Down, Key::Down),
    (Keycode::Num0, Key::Digit(0)),
    (Keycode::Num1, Key::Digit(1)),
    (Keycode::Num2, Key::Digit(2)),
    (Keycode::Num3, Key::Digit(3)),
    (Keycode::Num4, Key::Digit(4)),
    (Keycode::Num5, Key::Digit(5)),
    (Keycode::Num6, Key::Digit(6)),
    (Keycode::Num7, Key::Digit(7)),
    (Keycode::Num8, Key::Digit(8)),
    (Keycode::Num9, Key::Digit(9)),
];

/// Open a window; returns its display sink and its event source.
pub fn open(title: &str) -> Result<(SdlSink, SdlEvents), String> {
    let sdl = sdl2::init()?;
    let video = sdl.video()?;
    let window = video
        .window(title, 640, 480)
        .position_centered()
        .build()
        .map_err(|e| e.to_string())?;
    let canvas = window.into_canvas().build().map_err(|e| e.to_string())?;
    let textures = canvas.texture_creator();
    let pump = sdl.event_pump()?;
    Ok((
        SdlSink {
            canvas,
            textures,
            bytes: Vec::new(),
        },
        SdlEvents { pump },
    ))
}

pub struct SdlSink {
    canvas: Canvas<Window>,
    textures: TextureCreator<WindowContext>,
    bytes: Vec<u8>,
}

impl SdlSink {
    fn show(&mut self, pixels: &[Rgb], width: u32, height: u32) -> Result<(), String> {
        self.bytes.clear();
        self.bytes.extend(pixels.iter().flat_map(|c| [c.r, c.g, c.b]));
        let mut texture = self
            .textures
            .create_texture_streaming(PixelFormatEnum::RGB24, width, height)
            .map_err(|e| e.to_string())?;
        texture
            .update(None, &self.bytes, width as usize * 3)
            .map_err(|e| e.to_string())?;
        self.canvas.clear();
        self.canvas.copy(&texture, None, None)?;
        self.canvas.present();
        Ok(())
    }
}

impl DisplaySink for SdlSink {
    fn resize(&mut self, width: u32, height: u32) {
        let scale_x = if width < DOUBLE_WIDTH_BELOW { 2 } else { 1 };
        let scale_y = if height < DOUBLE_HEIGHT_BELOW { 2 } else { 1 };
        if let Err(e) = self
            .canvas
            .window_mut()
            .set_size(width * scale_x, height * scale_y)
        {
            warn!("failed to resize window to {width}x{height}: {e}");
        }
    }

    fn present(&mut self, pixels: &[Rgb], width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Err(e) = self.show(pixels, width, height) {
            warn!("failed to present frame: {e}");
        }
    }
}

pub struct SdlEvents {
    pump: EventPump,
}

impl SdlEvents {
    /// Move pending window events into `queue`. Returns `false` once the
    /// window was closed.
    pub fn pump(&mut self, queue: &KeyQueue) -> bool {
        let mut open = true;
        let mut events = Vec::new();
        for event in self.pump.poll_iter() {
            match event {
                Event::Quit { .. } => open = false,
                Event::KeyDown {
                    keycode: Some(code),
                    keymod,
                    repeat: false,
                    ..
                } => events.push(key_event(code, keymod, true)),
                Event::KeyUp {
                    keycode: Some(code),
                    keymod,
                    ..
                } => events.push(key_event(code, keymod, false)),
                _ => {}
            }
        }
        queue.push_all(events);
        open
    }
}

fn key_event(code: Keycode, keymod: Mod, down: bool) -> KeyEvent {
    let key = KEYS
        .iter()
        .find(|(keycode, _)| *keycode == code)
        .map_or(Key::Other, |(_, key)| *key);
    KeyEvent {
        key,
        down,
        shift: keymod.intersects(Mod::LSHIFTMOD | Mod::RSHIFTMOD),
        ctrl: keymod.intersects(Mod::LCTRLMOD | Mod::RCTRLMOD),
    }
}
