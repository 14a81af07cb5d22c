use crate::artifacts::index::CHECKSUM_SIZE;
use anyhow::Context;
use bytes::Bytes;
use file_guard::FileGuard;
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, Read, Write};
use std::ops::DerefMut;

/// The locked index file, hashing every byte read from or written to it
///
/// The index ends with the SHA-1 of everything before it: readers call
/// [`Checksum::verify`] once the entries are parsed, writers call
/// [`Checksum::finish`] after the last entry.
pub struct Checksum<'f> {
    file: FileGuard<&'f mut File>,
    digest: Sha1,
}

impl<'f> Checksum<'f> {
    pub fn new(file: FileGuard<&'f mut File>) -> Self {
        Checksum {
            file,
            digest: Sha1::new(),
        }
    }

    /// Exactly `size` bytes, or an error naming the truncation
    pub fn read_block(&mut self, size: usize) -> anyhow::Result<Bytes> {
        let mut block = vec![0; size];
        self.read_exact(&mut block)
            .with_context(|| format!("index ends before a {size} byte block"))?;

        Ok(Bytes::from(block))
    }

    pub fn finish(mut self) -> anyhow::Result<()> {
        let checksum = self.digest.clone().finalize();
        self.file
            .deref_mut()
            .write_all(&checksum)
            .context("cannot write the index checksum")?;

        Ok(())
    }

    pub fn verify(mut self) -> anyhow::Result<()> {
        let computed = self.digest.clone().finalize();
        let mut stored = [0u8; CHECKSUM_SIZE];
        self.file
            .deref_mut()
            .read_exact(&mut stored)
            .context("index is truncated before its checksum")?;

        anyhow::ensure!(
            stored.as_slice() == computed.as_slice(),
            "index checksum mismatch: the file is corrupt"
        );
        Ok(())
    }
}

impl Read for Checksum<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.file.deref_mut().read(buf)?;
        self.digest.update(&buf[..read]);

        Ok(read)
    }
}

impl Write for Checksum<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.file.deref_mut().write(buf)?;
        self.digest.update(&buf[..written]);

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.deref_mut().flush()
    }
}
