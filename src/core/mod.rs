// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod memory;
pub mod register;

// Re-export commonly used core types here
pub use memory::{SharedMemory, WordSource};
pub use register::{ClearOnWrite, ShadowFlag, ShadowReg, StatusReg};
