// Copyright (C) 2025 Dayton Fishell
// Anachron Video Peripheral Model
// This file is part of Anachron.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Keyboard events handed from the window thread to the program.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Escape,
    Left,
    Right,
    Up,
    Down,
    /// Number row, 0-9.
    Digit(u8),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    /// `true` for a press, `false` for a release.
    pub down: bool,
    pub shift: bool,
    pub ctrl: bool,
}

impl KeyEvent {
    pub fn press(key: Key) -> Self {
        Self {
            key,
            down: true,
            shift: false,
            ctrl: false,
        }
    }

    pub fn release(key: Key) -> Self {
        Self {
            down: false,
            ..Self::press(key)
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

/// FIFO of key events shared between threads. Clones share one queue.
#[derive(Debug, Clone, Default)]
pub struct KeyQueue {
    events: Arc<Mutex<VecDeque<KeyEvent>>>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<KeyEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: KeyEvent) {
        self.lock().push_back(event);
    }

    /// Append a batch under a single lock.
    pub fn push_all<I: IntoIterator<Item = KeyEvent>>(&self, events: I) {
        self.lock().extend(events);
    }

    pub fn pop(&self) -> Option<KeyEvent> {
        self.lock().pop_front()
    }

    pub fn has_event(&self) -> bool {
        !self.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn events_come_out_in_order() {
        let queue = KeyQueue::new();
        assert!(!queue.has_event());
        queue.push(KeyEvent::press(Key::Left));
        queue.push_all([
            KeyEvent::release(Key::Left),
            KeyEvent::press(Key::Digit(3)).with_shift(),
        ]);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(KeyEvent::press(Key::Left)));
        assert_eq!(queue.pop(), Some(KeyEvent::release(Key::Left)));
        let last = queue.pop().unwrap();
        assert_eq!((last.key, last.down, last.shift, last.ctrl), (Key::Digit(3), true, true, false));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn clones_share_the_queue_across_threads() {
        let queue = KeyQueue::new();
        let producer = queue.clone();
        std::thread::spawn(move || {
            for digit in 0..10 {
                producer.push(KeyEvent::press(Key::Digit(digit)).with_ctrl());
            }
        })
        .join()
        .unwrap();
        let keys: Vec<Key> = std::iter::from_fn(|| queue.pop()).map(|e| e.key).collect();
        assert_eq!(keys, (0..10).map(Key::Digit).collect::<Vec<_>>());
    }
}
