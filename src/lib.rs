// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Anachron video peripheral model
//!
//! A register-accurate model of the Anachron video compositor: four
//! bitmap planes and eight sprites fetched by per-element DMA engines,
//! composed by draw order into an indexed frame and shown through a
//! 32-entry base palette or its 256-entry interpolated expansion.
//!
//! The processor side talks to [`VideoRegisters`] through byte-wide
//! `register_read`/`register_write`; the render side ([`VideoCore`]) latches
//! the registers once per frame and produces the image.

pub mod builder;
pub mod compositor;
pub mod core;
pub mod demo;
pub mod display;
pub mod dma;
pub mod driver;
pub mod element;
pub mod error;
pub mod input;
pub mod mode;
pub mod palette;
pub mod regmap;
pub mod registers;
#[cfg(feature = "sdl-frontend")]
pub mod sdl_output;
pub mod video;

// Re-export commonly used types
pub use builder::{FrameBuf, PlaneBuf, ScreenElement, SpriteBuf};
pub use compositor::Frame;
pub use crate::core::SharedMemory;
pub use display::{DisplaySink, FrameCapture};
pub use driver::{RenderStats, RenderThread, StopFlag};
pub use element::Bpp;
pub use error::VideoError;
pub use input::{Key, KeyEvent, KeyQueue};
pub use mode::VideoTiming;
pub use palette::{Palette, Rgb};
pub use registers::VideoRegisters;
pub use video::VideoCore;
