//! Frames [`crate::framer::RawPacket`]s onto `Stream`/`Sink` pairs, for
//! callers that already have an async transport instead of a blocking
//! [`crate::framer::ByteSource`]. Adapted from the primary-header framer
//! (component H) to the buffered, one-shot-decode shape `Decoder`/`Encoder`
//! traits expect.

use bytes::{Buf, BytesMut};

use crate::error::PacketError;
use crate::framer::{PrimaryHeader, RawPacket};

#[derive(Clone, Copy, PartialEq, Eq)]
enum CodecState {
    Sync,
    Data,
}

#[cfg_attr(docsrs, doc(cfg(any(feature = "async-codec", feature = "tokio-codec"))))]
/// A codec to encode/decode [`RawPacket`]s from `Stream`s and `Sink`s.
/// Useful for programs that listen for packets on an async I/O device.
pub struct SpacePacketCodec {
    sync_marker: Box<[u8]>,
    state: CodecState,
}

impl SpacePacketCodec {
    /// Creates a new codec with the given synchronization marker. The codec
    /// sweeps the input byte stream until the marker is found, then parses
    /// one [`RawPacket`]. Pass an empty marker to skip sync scanning.
    pub fn new<T: AsRef<[u8]>>(sync_marker: T) -> Self {
        Self { sync_marker: sync_marker.as_ref().to_owned().into_boxed_slice(), state: CodecState::Sync }
    }

    fn find_sync<B: AsRef<[u8]>>(&mut self, source: &B) -> Option<usize> {
        if self.sync_marker.is_empty() {
            return Some(0);
        }
        source.as_ref().windows(self.sync_marker.len()).position(|window| window == &*self.sync_marker)
    }

    fn decode_helper(&mut self, buffer: &mut BytesMut) -> Result<Option<RawPacket>, PacketError> {
        if self.state == CodecState::Sync {
            if let Some(index) = self.find_sync(buffer) {
                buffer.advance(index + self.sync_marker.len());
                self.state = CodecState::Data;
            } else {
                // No sync marker in the current buffer. Keep the last
                // sync_marker.len() - 1 bytes in case one straddles a
                // buffer boundary, and ask for more data.
                let len = buffer.remaining();
                if len > self.sync_marker.len().saturating_sub(1) {
                    buffer.advance(len - (self.sync_marker.len() - 1));
                }
                return Ok(None);
            }
        }

        if buffer.remaining() < PrimaryHeader::ENCODED_LEN + 1 {
            return Ok(None);
        }

        let header = PrimaryHeader::decode(&mut &buffer.as_ref()[..PrimaryHeader::ENCODED_LEN])
            .expect("fixed-size header decode cannot fail once enough bytes are present");
        let packet_length = header.total_len();

        if buffer.remaining() < packet_length {
            buffer.reserve(packet_length - buffer.remaining());
            return Ok(None);
        }

        let user_data = buffer.as_ref()[PrimaryHeader::ENCODED_LEN..packet_length].to_vec();
        buffer.advance(packet_length);
        // A packet's worth of bytes has left the buffer whether or not the
        // header made sense; resume looking for the next sync marker.
        self.state = CodecState::Sync;

        Ok(Some(RawPacket { header, user_data }))
    }
}

#[cfg(feature = "async-codec")]
mod non_tokio {
    use super::*;

    use asynchronous_codec::{Decoder, Encoder};

    impl Decoder for SpacePacketCodec {
        type Item = RawPacket;
        type Error = PacketError;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            self.decode_helper(src)
        }
    }

    impl Encoder for SpacePacketCodec {
        type Item = RawPacket;
        type Error = PacketError;

        fn encode(&mut self, item: Self::Item, dst: &mut asynchronous_codec::BytesMut) -> Result<(), Self::Error> {
            let bytes = item.encode();
            dst.reserve(bytes.len() + self.sync_marker.len());
            dst.extend(&*self.sync_marker);
            dst.extend(bytes);
            Ok(())
        }
    }
}

#[cfg(feature = "tokio-codec")]
mod tokio_codec {
    use tokio_util::codec::{Decoder, Encoder};

    use super::*;

    impl Decoder for SpacePacketCodec {
        type Item = RawPacket;
        type Error = PacketError;

        fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
            self.decode_helper(src)
        }
    }

    impl Encoder<RawPacket> for SpacePacketCodec {
        type Error = PacketError;

        fn encode(&mut self, item: RawPacket, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
            let bytes = item.encode();
            dst.reserve(bytes.len() + self.sync_marker.len());
            dst.extend(&*self.sync_marker);
            dst.extend(bytes);
            Ok(())
        }
    }
}
