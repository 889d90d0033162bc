// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::AppError;
use crate::transport::FileDescriptor;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Cursor, Read};

type CloseHook = Box<dyn FnOnce() -> Result<(), AppError>>;

/// A response body produced chunk by chunk.
pub trait ResponseIter {
    /// Next chunk, `None` when exhausted. Empty chunks are allowed and skipped.
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, AppError>>;

    /// Exact number of chunks still to come, when the body knows it.
    fn remaining_chunks(&self) -> Option<usize> {
        None
    }

    /// Called once after streaming ends, whether or not it succeeded.
    fn close(&mut self) -> Result<(), AppError> {
        Ok(())
    }
}

/// What a handler returns.
pub enum Body {
    /// Generic chunked body
    Iter(Box<dyn ResponseIter>),
    /// File-transfer marker; sent with the transport's zero-copy path when the
    /// wrapped file exposes a descriptor
    File(FileWrapper),
}

impl Body {
    pub fn empty() -> Self {
        Body::Iter(Box::new(ChunkList {
            chunks: VecDeque::new(),
        }))
    }

    pub fn once(chunk: impl Into<Vec<u8>>) -> Self {
        let chunk: Vec<u8> = chunk.into();
        Self::from_chunks([chunk])
    }

    pub fn from_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        Body::Iter(Box::new(ChunkList {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }))
    }

    /// A lazily produced body.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<Vec<u8>, AppError>> + 'static,
    {
        Body::Iter(Box::new(LazyChunks { iter }))
    }

    /// Attach a hook that runs when the body is closed.
    pub fn with_close<F>(self, hook: F) -> Self
    where
        F: FnOnce() -> Result<(), AppError> + 'static,
    {
        match self {
            Body::Iter(inner) => Body::Iter(Box::new(WithClose {
                inner,
                hook: Some(Box::new(hook)),
            })),
            Body::File(mut wrapper) => {
                wrapper.on_close = Some(Box::new(hook));
                Body::File(wrapper)
            }
        }
    }
}

struct ChunkList {
    chunks: VecDeque<Vec<u8>>,
}

impl ResponseIter for ChunkList {
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, AppError>> {
        self.chunks.pop_front().map(Ok)
    }

    fn remaining_chunks(&self) -> Option<usize> {
        Some(self.chunks.len())
    }
}

struct LazyChunks<I> {
    iter: I,
}

impl<I> ResponseIter for LazyChunks<I>
where
    I: Iterator<Item = Result<Vec<u8>, AppError>>,
{
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, AppError>> {
        self.iter.next()
    }
}

struct WithClose {
    inner: Box<dyn ResponseIter>,
    hook: Option<CloseHook>,
}

impl ResponseIter for WithClose {
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, AppError>> {
        self.inner.next_chunk()
    }

    fn remaining_chunks(&self) -> Option<usize> {
        self.inner.remaining_chunks()
    }

    fn close(&mut self) -> Result<(), AppError> {
        let inner = self.inner.close();
        let hook = self.hook.take().map_or(Ok(()), |hook| hook());
        inner.and(hook)
    }
}

/// A readable source that may also expose an OS descriptor for zero-copy send.
pub trait WrappedFile: Read {
    /// Descriptor plus the bytes left from the current offset. `None` forces
    /// the chunked fallback.
    fn descriptor(&mut self) -> Option<FileDescriptor> {
        None
    }
}

impl WrappedFile for File {
    fn descriptor(&mut self) -> Option<FileDescriptor> {
        use std::io::Seek;

        let metadata = self.metadata().ok()?;
        if !metadata.is_file() {
            return None;
        }
        let position = self.stream_position().ok()?;
        Some(FileDescriptor {
            file: self.try_clone().ok()?,
            len: metadata.len().saturating_sub(position),
        })
    }
}

impl WrappedFile for Cursor<Vec<u8>> {}

/// File-transfer marker returned as [`Body::File`].
pub struct FileWrapper {
    file: Box<dyn WrappedFile>,
    block_size: usize,
    on_close: Option<CloseHook>,
}

impl FileWrapper {
    pub fn new(file: impl WrappedFile + 'static, block_size: usize) -> Self {
        Self {
            file: Box::new(file),
            block_size: block_size.max(1),
            on_close: None,
        }
    }

    pub fn descriptor(&mut self) -> Option<FileDescriptor> {
        self.file.descriptor()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl ResponseIter for FileWrapper {
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, AppError>> {
        let mut block = vec![0u8; self.block_size];
        match self.file.read(&mut block) {
            Ok(0) => None,
            Ok(n) => {
                block.truncate(n);
                Some(Ok(block))
            }
            Err(e) => Some(Err(AppError::raised(format!("file read failed: {}", e)))),
        }
    }

    fn close(&mut self) -> Result<(), AppError> {
        self.on_close.take().map_or(Ok(()), |hook| hook())
    }
}

/// The `wsgi.file_wrapper` capability: builds [`FileWrapper`]s with the host's
/// configured block size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileWrapperFactory {
    block_size: usize,
}

impl FileWrapperFactory {
    pub fn new(block_size: usize) -> Self {
        Self { block_size }
    }

    pub fn wrap(&self, file: impl WrappedFile + 'static) -> FileWrapper {
        FileWrapper::new(file, self.block_size)
    }

    pub fn wrap_with_block_size(
        &self,
        file: impl WrappedFile + 'static,
        block_size: usize,
    ) -> FileWrapper {
        FileWrapper::new(file, block_size)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn drain(iter: &mut dyn ResponseIter) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = iter.next_chunk() {
            out.push(chunk.unwrap());
        }
        out
    }

    #[test]
    fn test_chunk_list_reports_remaining() {
        let Body::Iter(mut iter) = Body::from_chunks(["a", "b"]) else {
            panic!("expected iterable body");
        };
        assert_eq!(iter.remaining_chunks(), Some(2));
        assert_eq!(iter.next_chunk().unwrap().unwrap(), b"a".to_vec());
        assert_eq!(iter.remaining_chunks(), Some(1));
    }

    #[test]
    fn test_with_close_runs_hook_once() {
        let closed = Rc::new(Cell::new(0));
        let seen = closed.clone();
        let Body::Iter(mut iter) = Body::once("x").with_close(move || {
            seen.set(seen.get() + 1);
            Ok(())
        }) else {
            panic!("expected iterable body");
        };

        assert_eq!(drain(iter.as_mut()), vec![b"x".to_vec()]);
        iter.close().unwrap();
        iter.close().unwrap();
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_cursor_wrapper_has_no_descriptor() {
        let mut wrapper = FileWrapper::new(Cursor::new(b"abcdefg".to_vec()), 3);
        assert!(wrapper.descriptor().is_none());
        assert_eq!(
            drain(&mut wrapper),
            vec![b"abc".to_vec(), b"def".to_vec(), b"g".to_vec()]
        );
    }

    #[test]
    fn test_file_descriptor_counts_from_offset() {
        use std::io::{Seek, SeekFrom, Write};

        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"hello world").unwrap();
        file.seek(SeekFrom::Start(6)).unwrap();

        let mut wrapper = FileWrapperFactory::new(8192).wrap(file);
        let descriptor = wrapper.descriptor().unwrap();
        assert_eq!(descriptor.len, 5);

        let mut rest = String::new();
        descriptor.file.take(descriptor.len).read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "world");
    }
}
