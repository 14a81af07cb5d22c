//! Paging long output
//!
//! History goes through the minus pager when stdout is a terminal and
//! `NO_PAGER` is unset; everything else is written straight to stdout.

use is_terminal::IsTerminal;
use minus::Pager;
use std::io::{self, Write};

pub const NO_PAGER_ENV: &str = "NO_PAGER";

/// `std::io::Write` over a minus pager
pub struct PagerWriter {
    pager: Pager,
}

impl Write for PagerWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s =
            std::str::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.pager.push_str(s).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub enum Output {
    Paged(PagerWriter),
    Plain(io::Stdout),
}

impl Output {
    pub fn for_long_output() -> Self {
        if std::env::var_os(NO_PAGER_ENV).is_none() && io::stdout().is_terminal() {
            Output::Paged(PagerWriter {
                pager: Pager::new(),
            })
        } else {
            Output::Plain(io::stdout())
        }
    }

    /// Hand the buffered text to the pager; a no-op for plain output
    pub fn finish(self) -> anyhow::Result<()> {
        match self {
            Output::Paged(writer) => minus::page_all(writer.pager)?,
            Output::Plain(mut stdout) => stdout.flush()?,
        }

        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Paged(writer) => writer.write(buf),
            Output::Plain(stdout) => stdout.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Paged(writer) => writer.flush(),
            Output::Plain(stdout) => stdout.flush(),
        }
    }
}
