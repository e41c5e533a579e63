// Copyright (c) 2019-present Dmitry Stepanov and Fyrox Engine contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Bake log. Writes to the console by default, can mirror messages into a file
//! ([`Log::set_file_name`]) and to any number of channel listeners, which is how hosts observe
//! progress messages of a running bake.
//!
//! Executor threads set a per-thread scope with [`Log::set_thread_scope`], every message written
//! from such thread is prefixed with it, for example `[executor 2 / task 5]`.

use fxhash::FxHashMap;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::io::{self, Write};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

/// A message that could be sent by the logger to all listeners.
#[derive(Clone, Debug)]
pub struct LogMessage {
    pub kind: MessageKind,
    /// Message text with thread scope prefix, but without kind prefix.
    pub content: String,
    /// Time since logger initialization.
    pub time: Duration,
}

static LOG: LazyLock<Mutex<Log>> = LazyLock::new(|| {
    Mutex::new(Log {
        file: None,
        verbosity: MessageKind::Information,
        listeners: Default::default(),
        time_origin: Instant::now(),
        one_shot_sources: Default::default(),
    })
});

thread_local! {
    static THREAD_SCOPE: RefCell<Option<String>> = const { RefCell::new(None) };
}

#[derive(Debug, Default, Copy, Clone, PartialOrd, PartialEq, Eq, Ord, Hash)]
#[repr(u32)]
pub enum MessageKind {
    #[default]
    Information = 0,
    Warning = 1,
    Error = 2,
}

impl MessageKind {
    fn as_str(self) -> &'static str {
        match self {
            MessageKind::Information => "[INFO]: ",
            MessageKind::Warning => "[WARNING]: ",
            MessageKind::Error => "[ERROR]: ",
        }
    }
}

/// See module docs.
pub struct Log {
    file: Option<std::fs::File>,
    verbosity: MessageKind,
    listeners: Vec<Sender<LogMessage>>,
    time_origin: Instant,
    one_shot_sources: FxHashMap<usize, String>,
}

impl Log {
    /// Creates a new log file at the specified path. Failure to create the file is reported to the
    /// console and the log keeps writing to the console only.
    pub fn set_file_name<P: AsRef<Path>>(path: P) {
        let file = std::fs::File::create(path.as_ref());
        let mut guard = LOG.lock();
        match file {
            Ok(file) => guard.file = Some(file),
            Err(e) => {
                guard.file = None;
                guard.write_internal(
                    None,
                    MessageKind::Error,
                    format!(
                        "Unable to create log file {}. Reason: {e}\n",
                        path.as_ref().display()
                    ),
                );
            }
        }
    }

    /// Sets a prefix for every message written from the calling thread. `None` removes it.
    pub fn set_thread_scope(scope: Option<String>) {
        THREAD_SCOPE.with(|s| *s.borrow_mut() = scope);
    }

    fn write_internal(&mut self, id: Option<usize>, kind: MessageKind, message: String) -> bool {
        if kind < self.verbosity {
            return false;
        }

        let mut msg = THREAD_SCOPE.with(|scope| match scope.borrow().as_ref() {
            Some(scope) => format!("[{scope}] {message}"),
            None => message,
        });

        if let Some(id) = id {
            match self.one_shot_sources.entry(id) {
                Entry::Occupied(mut previous) => {
                    if previous.get() == &msg {
                        return false;
                    }
                    previous.insert(msg.clone());
                }
                Entry::Vacant(entry) => {
                    entry.insert(msg.clone());
                }
            }
        }

        let time = self.time_origin.elapsed();
        self.listeners.retain(|listener| {
            listener
                .send(LogMessage {
                    kind,
                    content: msg.trim_end().to_owned(),
                    time,
                })
                .is_ok()
        });

        msg.insert_str(0, kind.as_str());

        let _ = io::stdout().write_all(msg.as_bytes());
        if let Some(log_file) = self.file.as_mut() {
            let _ = log_file.write_all(msg.as_bytes());
            let _ = log_file.flush();
        }

        true
    }

    /// Writes a line to the console and into the file (if set).
    pub fn writeln<S>(kind: MessageKind, msg: S)
    where
        S: AsRef<str>,
    {
        let mut msg = msg.as_ref().to_owned();
        msg.push('\n');
        LOG.lock().write_internal(None, kind, msg);
    }

    /// Same as [`Self::writeln`], but writes the message only once per `id` while the message
    /// stays the same. Used to keep per-texel problems from flooding the log.
    pub fn writeln_once<S>(id: usize, kind: MessageKind, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        let mut msg = msg.as_ref().to_owned();
        msg.push('\n');
        LOG.lock().write_internal(Some(id), kind, msg)
    }

    pub fn info<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Information, msg)
    }

    pub fn warn<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Warning, msg)
    }

    pub fn err<S>(msg: S)
    where
        S: AsRef<str>,
    {
        Self::writeln(MessageKind::Error, msg)
    }

    pub fn warn_once<S>(id: usize, msg: S) -> bool
    where
        S: AsRef<str>,
    {
        Self::writeln_once(id, MessageKind::Warning, msg)
    }

    pub fn set_verbosity(kind: MessageKind) {
        LOG.lock().verbosity = kind;
    }

    pub fn verbosity() -> MessageKind {
        LOG.lock().verbosity
    }

    /// Adds a listener that will receive a copy of every message passed into the log.
    /// Disconnected listeners are dropped on the next write.
    pub fn add_listener(listener: Sender<LogMessage>) {
        LOG.lock().listeners.push(listener)
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::Log::info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::Log::warn(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! err {
    ($($arg:tt)*) => {
        $crate::log::Log::err(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn_once {
    ($id:expr, $($arg:tt)*) => {
        $crate::log::Log::warn_once($id, format!($($arg)*))
    };
}
