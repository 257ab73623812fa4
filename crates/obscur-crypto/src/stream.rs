//! MAC and cipher stream decorators.
//!
//! The manifest pipeline is a stack of decorators over the package stream.
//! Writing: the cipher decorator encrypts plaintext into the MAC decorator,
//! which observes the ciphertext on its way to the output (encrypt-then-MAC).
//! Reading mirrors it: the MAC decorator observes raw ciphertext coming off
//! the input, and the cipher decorator above it decrypts.
//!
//! Direction is enforced by the type system — a `MacWriter` cannot read and
//! a `CipherReader` cannot write — replacing the runtime direction checks a
//! class hierarchy would need. Every decorator counts the bytes it forwards.
//!
//! Associated data goes through `update_extra` after the body, in the same
//! order on both sides, before `finalize` emits the authenticator output.

use std::io::{Read, Write};

use obscur_codec::RingBuffer;

use crate::cipher::{BLOCK_SIZE, CipherDecryptor, CipherEncryptor};
use crate::errors::CryptoError;
use crate::mac::Authenticator;

fn crypto_failure(err: CryptoError) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

fn malformed(detail: &'static str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, detail)
}

/// Write decorator updating an authenticator with every byte written through.
pub struct MacWriter<W: Write> {
    inner: W,
    mac: Authenticator,
    bytes_written: u64,
}

impl<W: Write> MacWriter<W> {
    /// Wrap `inner` with the given keyed authenticator.
    pub fn new(inner: W, mac: Authenticator) -> Self {
        Self { inner, mac, bytes_written: 0 }
    }

    /// Bytes forwarded to the inner stream so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Feed associated data that is authenticated but not written.
    pub fn update_extra(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Finalise, returning the authenticator output and the inner stream.
    pub fn finalize(self) -> (Vec<u8>, W) {
        (self.mac.finalize(), self.inner)
    }
}

impl<W: Write> Write for MacWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        // Only bytes that actually reached the inner stream are
        // authenticated.
        self.mac.update(&buf[..written]);
        self.bytes_written += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Read decorator updating an authenticator with every byte delivered.
pub struct MacReader<R: Read> {
    inner: R,
    mac: Authenticator,
    bytes_read: u64,
}

impl<R: Read> MacReader<R> {
    /// Wrap `inner` with the given keyed authenticator.
    pub fn new(inner: R, mac: Authenticator) -> Self {
        Self { inner, mac, bytes_read: 0 }
    }

    /// Bytes delivered to callers so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Feed associated data after the stream body is consumed.
    pub fn update_extra(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Finalise, returning the authenticator output and the inner stream.
    pub fn finalize(self) -> (Vec<u8>, R) {
        (self.mac.finalize(), self.inner)
    }
}

impl<R: Read> Read for MacReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.mac.update(&buf[..read]);
        self.bytes_read += read as u64;
        Ok(read)
    }
}

/// Write decorator encrypting caller bytes into the inner stream.
///
/// Byte-exact transforms pass through one-for-one. Padded CBC accumulates a
/// partial block between writes and emits PKCS7 padding on [`finish`];
/// dropping the decorator without finishing loses the tail, so the manifest
/// writer always finishes explicitly.
///
/// [`finish`]: CipherWriter::finish
pub struct CipherWriter<W: Write> {
    inner: W,
    encryptor: CipherEncryptor,
    partial: Vec<u8>,
    bytes_in: u64,
}

impl<W: Write> CipherWriter<W> {
    /// Wrap `inner` with an initialised encryptor.
    pub fn new(inner: W, encryptor: CipherEncryptor) -> Self {
        Self { inner, encryptor, partial: Vec::with_capacity(BLOCK_SIZE), bytes_in: 0 }
    }

    /// Plaintext bytes accepted so far.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Flush any padded tail and return the inner stream.
    pub fn finish(mut self) -> std::io::Result<W> {
        match &mut self.encryptor {
            CipherEncryptor::Stream(_) => {},
            CipherEncryptor::Block(enc) => {
                // PKCS7 always pads, so an aligned plaintext still gains one
                // full padding block.
                let pad = BLOCK_SIZE - self.partial.len();
                self.partial.resize(BLOCK_SIZE, pad as u8);

                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(&self.partial);
                enc.encrypt_block(&mut block);
                self.inner.write_all(&block)?;
            },
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.encryptor {
            CipherEncryptor::Stream(transform) => {
                let mut scratch = buf.to_vec();
                transform.apply(&mut scratch).map_err(crypto_failure)?;
                self.inner.write_all(&scratch)?;
            },
            CipherEncryptor::Block(enc) => {
                self.partial.extend_from_slice(buf);
                let full = self.partial.len() - self.partial.len() % BLOCK_SIZE;
                if full > 0 {
                    for chunk in self.partial[..full].chunks_exact_mut(BLOCK_SIZE) {
                        let mut block = [0u8; BLOCK_SIZE];
                        block.copy_from_slice(chunk);
                        enc.encrypt_block(&mut block);
                        chunk.copy_from_slice(&block);
                    }
                    self.inner.write_all(&self.partial[..full])?;
                    self.partial.drain(..full);
                }
            },
        }
        self.bytes_in += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Capacity of the decrypted-byte window the block read path holds.
const READER_RING_CAPACITY: usize = 1024;

/// Ciphertext bytes pulled from the inner stream per refill.
const READER_CHUNK: usize = 512;

/// Read decorator decrypting inner bytes into the caller's buffer.
///
/// Byte-exact transforms decrypt in place. Padded CBC withholds one block in
/// a ring buffer until the inner stream ends — the final block carries the
/// padding, and which block is final is only known at end of stream — then
/// strips PKCS7 and serves the remainder. Invalid padding and misaligned
/// ciphertext surface as `InvalidData`, after all ciphertext has been
/// consumed (and therefore observed by any MAC decorator below).
pub struct CipherReader<R: Read> {
    inner: R,
    decryptor: CipherDecryptor,
    ring: RingBuffer,
    ciphertext_tail: Vec<u8>,
    eof: bool,
    bytes_out: u64,
}

impl<R: Read> CipherReader<R> {
    /// Wrap `inner` with an initialised decryptor.
    pub fn new(inner: R, decryptor: CipherDecryptor) -> Self {
        Self {
            inner,
            decryptor,
            ring: RingBuffer::new(READER_RING_CAPACITY),
            ciphertext_tail: Vec::with_capacity(BLOCK_SIZE),
            eof: false,
            bytes_out: 0,
        }
    }

    /// Plaintext bytes delivered so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    /// Return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn refill(&mut self) -> std::io::Result<()> {
        let mut chunk = [0u8; READER_CHUNK];
        let read = self.inner.read(&mut chunk)?;

        if read == 0 {
            if !self.ciphertext_tail.is_empty() {
                return Err(malformed("ciphertext is not block aligned"));
            }
            self.strip_padding()?;
            self.eof = true;
            return Ok(());
        }

        self.ciphertext_tail.extend_from_slice(&chunk[..read]);
        let full = self.ciphertext_tail.len() - self.ciphertext_tail.len() % BLOCK_SIZE;
        let CipherDecryptor::Block(dec) = &mut self.decryptor else {
            return Err(malformed("refill on a byte-exact transform"));
        };
        for chunk in self.ciphertext_tail[..full].chunks_exact(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            dec.decrypt_block(&mut block);
            self.ring.put(&block).map_err(|_| malformed("decrypt window overflow"))?;
        }
        self.ciphertext_tail.drain(..full);
        Ok(())
    }

    fn strip_padding(&mut self) -> std::io::Result<()> {
        // PKCS7 ciphertext is never empty; an empty window here means the
        // stream held zero blocks.
        let mut last = [0u8; 1];
        self.ring.peek_tail(&mut last).map_err(|_| malformed("missing padding block"))?;

        let pad = last[0] as usize;
        if pad == 0 || pad > BLOCK_SIZE || pad > self.ring.len() {
            return Err(malformed("invalid padding"));
        }

        let mut tail = vec![0u8; pad];
        self.ring.peek_tail(&mut tail).map_err(|_| malformed("invalid padding"))?;
        if tail.iter().any(|&byte| byte as usize != pad) {
            return Err(malformed("invalid padding"));
        }

        self.ring
            .truncate(self.ring.len() - pad)
            .map_err(|_| malformed("invalid padding"))?;
        Ok(())
    }

    fn read_block_mode(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            // Until end of stream the last buffered block may be padding and
            // stays withheld.
            let withheld = if self.eof { 0 } else { BLOCK_SIZE };
            let servable = self.ring.len().saturating_sub(withheld);

            if servable > 0 {
                let count = servable.min(buf.len());
                self.ring
                    .take(&mut buf[..count])
                    .map_err(|_| malformed("decrypt window underflow"))?;
                self.bytes_out += count as u64;
                return Ok(count);
            }

            if self.eof {
                return Ok(0);
            }
            self.refill()?;
        }
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.decryptor {
            CipherDecryptor::Stream(transform) => {
                let read = self.inner.read(buf)?;
                transform.apply(&mut buf[..read]).map_err(crypto_failure)?;
                self.bytes_out += read as u64;
                Ok(read)
            },
            CipherDecryptor::Block(_) => self.read_block_mode(buf),
        }
    }
}
