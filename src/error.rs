// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

use thiserror::Error;

/// Recoverable errors of the helpers around the video core.
///
/// Register-map and DMA contract violations are not represented here; they
/// panic.
#[derive(Debug, Error)]
pub enum VideoError {
    #[error("unknown video mode {0:?}")]
    UnknownMode(String),
    #[error("invalid plane index {0}")]
    InvalidPlane(usize),
    #[error("invalid sprite index {0}")]
    InvalidSprite(usize),
    #[error("a {width}x{height} scene needs {needed:#x} bytes of video memory, {available:#x} available")]
    SceneTooLarge {
        width: u32,
        height: u32,
        needed: usize,
        available: usize,
    },
    #[cfg(feature = "serde-spec")]
    #[error("malformed YAML timing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[cfg(feature = "serde-spec")]
    #[error("malformed JSON timing config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("render thread panicked")]
    RenderThreadPanicked,
}
