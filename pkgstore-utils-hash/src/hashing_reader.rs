// SPDX-FileCopyrightText: 2026 pkgstore contributors
// SPDX-License-Identifier: MIT

//! An async reader adapter that digests everything read through it.
//!
//! Used to compute the integrity of a tarball while it is being streamed into
//! the store, so the archive never has to be buffered as a whole. The digest
//! state is shared behind an [`Arc<Mutex<…>>`] because the reader is usually
//! moved into a decompressor and a tar parser that never hand it back.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::{Algorithm, Context, Hash};

/// Running digest and byte count shared between a [`HashingReader`] and its
/// creator.
pub struct DigestState {
    ctx: Context,
    bytes_read: u64,
}

impl std::fmt::Debug for DigestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestState")
            .field("algorithm", &self.ctx.algorithm())
            .field("bytes_read", &self.bytes_read)
            .finish_non_exhaustive()
    }
}

impl DigestState {
    fn new(algorithm: Algorithm) -> Self {
        Self {
            ctx: Context::new(algorithm),
            bytes_read: 0,
        }
    }

    fn update(&mut self, data: &[u8]) {
        self.ctx.update(data);
        self.bytes_read += data.len() as u64;
    }

    /// Number of bytes digested so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Digest of everything read so far. The shared state stays usable, so
    /// this can be called while other handles are still alive.
    pub fn snapshot(&self) -> Hash {
        self.ctx.clone().finish()
    }

    /// Take the digest out of a shared handle.
    ///
    /// Works whether or not the reader has been dropped yet.
    pub fn finish_shared(state: &Arc<Mutex<DigestState>>) -> (u64, Hash) {
        let guard = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (guard.bytes_read, guard.snapshot())
    }
}

pin_project! {
    /// Wraps an [`AsyncRead`] and feeds every byte that passes through into a
    /// digest [`Context`].
    pub struct HashingReader<R> {
        #[pin]
        inner: R,
        state: Arc<Mutex<DigestState>>,
    }
}

impl<R> HashingReader<R> {
    /// Create a hashing reader using the default store algorithm.
    pub fn new(inner: R) -> (Self, Arc<Mutex<DigestState>>) {
        Self::with_algorithm(inner, Algorithm::default())
    }

    /// Create a hashing reader with a specific algorithm.
    ///
    /// Returns the reader and a shared handle to the digest state.
    pub fn with_algorithm(inner: R, algorithm: Algorithm) -> (Self, Arc<Mutex<DigestState>>) {
        let state = Arc::new(Mutex::new(DigestState::new(algorithm)));
        let reader = Self {
            inner,
            state: Arc::clone(&state),
        };
        (reader, state)
    }
}

impl<R: AsyncRead> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let result = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let new_bytes = &buf.filled()[before..];
            if !new_bytes.is_empty() {
                this.state
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .update(new_bytes);
            }
        }
        result
    }
}
