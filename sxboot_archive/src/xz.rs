// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Pull-based xz decoding over an in-memory compressed buffer.

use std::io::{self, Read};

use sxboot_util_log::{debug, trace};
use xz2::stream::{Action, Status, Stream};

use crate::{Error, Result};

/// Memory limit handed to the liblzma stream decoder.
///
/// Archives are produced with an 8 MiB dictionary; the limit leaves room for that window plus
/// decoder state while still rejecting absurd headers.
pub const DECODER_MEMLIMIT: u64 = 64 * 1024 * 1024;

/// A [`Read`] source that decompresses `input` on demand.
///
/// Each `read` feeds the decoder until the caller's buffer is full or the xz stream ends.
/// Once the stream has ended every further `read` returns `Ok(0)`.
pub struct XzSource<'a> {
    remaining: &'a [u8],
    total: u64,
    stream: Stream,
    finished: bool,
}

impl<'a> XzSource<'a> {
    /// Sets up a decoder over `input`.
    pub fn new(input: &'a [u8]) -> Result<Self> {
        let stream = Stream::new_stream_decoder(DECODER_MEMLIMIT, 0).map_err(Error::DecoderInit)?;
        debug!(compressed_len:? = input.len(); "opened xz source");
        Ok(Self {
            remaining: input,
            total: input.len() as u64,
            stream,
            finished: false,
        })
    }

    /// Compressed bytes consumed so far.
    pub fn total_in(&self) -> u64 {
        self.stream.total_in()
    }

    /// Decompressed bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.stream.total_out()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Read for XzSource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        let mut filled = 0;
        while filled < buf.len() {
            let in_before = self.stream.total_in();
            let out_before = self.stream.total_out();
            let status = self
                .stream
                .process(self.remaining, &mut buf[filled..], Action::Run)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, Error::Decode(e)))?;
            let consumed = usize::try_from(self.stream.total_in() - in_before)
                .map_err(|_| io::Error::other("xz decoder consumed more input than exists"))?;
            let produced = usize::try_from(self.stream.total_out() - out_before)
                .map_err(|_| io::Error::other("xz decoder produced more output than requested"))?;
            self.remaining = self.remaining.get(consumed..).unwrap_or_default();
            filled += produced;

            if let Status::StreamEnd = status {
                trace!(total_out:? = self.stream.total_out(); "xz stream end");
                self.finished = true;
                break;
            }
            if consumed == 0 && produced == 0 {
                if filled > 0 {
                    // Hand back what this call produced; the next call reports the stall.
                    break;
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    Error::Stalled {
                        consumed: self.stream.total_in(),
                        total: self.total,
                    },
                ));
            }
        }
        Ok(filled)
    }
}
