//! Serial console. Input is fed by the host. Output is either echoed to
//! host stdout or, without echo, captured so the host (or a test) can
//! inspect what user programs printed.
use crate::filesys::OpenFile;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use sysdefs::constants::fs_const::CONSOLE_NAME;

#[derive(Debug, Default)]
struct ConsoleInner {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
    echo: bool,
}

#[derive(Debug, Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

impl Console {
    pub fn new(echo: bool) -> Self {
        Console {
            inner: Arc::new(ConsoleInner {
                echo,
                ..Default::default()
            }),
        }
    }

    pub fn push_input(&self, bytes: &[u8]) {
        self.inner.input.lock().extend(bytes.iter().copied());
    }

    /// Everything written to the console so far. Always empty when the
    /// console echoes to stdout.
    pub fn output(&self) -> Vec<u8> {
        self.inner.output.lock().clone()
    }

    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.output.lock()).into_owned()
    }

    /// Take the captured output, leaving the buffer empty.
    pub fn drain_output(&self) -> Vec<u8> {
        std::mem::take(&mut *self.inner.output.lock())
    }

    pub fn open_for_reading(&self) -> Box<dyn OpenFile> {
        Box::new(ConsoleFile {
            inner: Arc::clone(&self.inner),
            readable: true,
        })
    }

    pub fn open_for_writing(&self) -> Box<dyn OpenFile> {
        Box::new(ConsoleFile {
            inner: Arc::clone(&self.inner),
            readable: false,
        })
    }
}

#[derive(Debug)]
struct ConsoleFile {
    inner: Arc<ConsoleInner>,
    readable: bool,
}

impl OpenFile for ConsoleFile {
    fn name(&self) -> &str {
        CONSOLE_NAME
    }

    fn read(&self, buf: &mut [u8]) -> i32 {
        if !self.readable {
            return -1;
        }
        let mut input = self.inner.input.lock();
        let amount = buf.len().min(input.len());
        for (slot, byte) in buf.iter_mut().zip(input.drain(..amount)) {
            *slot = byte;
        }
        amount as i32
    }

    fn write(&self, data: &[u8]) -> i32 {
        if self.readable {
            return -1;
        }
        if self.inner.echo {
            let mut stdout = std::io::stdout().lock();
            if stdout.write_all(data).and_then(|_| stdout.flush()).is_err() {
                return -1;
            }
        } else {
            self.inner.output.lock().extend_from_slice(data);
        }
        data.len() as i32
    }
}
