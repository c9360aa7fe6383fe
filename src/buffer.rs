use crate::protocol::packet::PacketHeader;
use zerocopy::IntoBytes;

/// A set of reusable buffers for MySQL protocol communication
///
/// `Conn` uses a single `BufferSet` for everything except row packets, which are read
/// into their own pooled buffers so that rows can outlive the next read.
#[derive(Debug)]
pub struct BufferSet {
    /// General-purpose read buffer
    /// Bytes are valid until the next read.
    pub read_buffer: Vec<u8>,

    /// General-purpose write buffer
    /// It always has at least 4 bytes which is reserved for the first packet header.
    /// It is followed by payload bytes without considering 16MB split.
    /// Layout: [4-byte header space][payload that is possibly larger than 16MB]
    write_buffer: Vec<u8>,
}

impl BufferSet {
    /// Create a new empty buffer set
    pub fn new() -> Self {
        Self {
            read_buffer: Vec::new(),
            write_buffer: vec![0; 4],
        }
    }

    /// Clear the write buffer, reserve 4 bytes for the header, and return mutable access.
    #[inline]
    pub fn new_write_buffer(&mut self) -> &mut Vec<u8> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(&[0u8; 4]);
        &mut self.write_buffer
    }

    /// Get the write buffer for reading.
    #[inline]
    pub fn write_buffer(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Get the payload length (total buffer length minus 4-byte header).
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.write_buffer.len().saturating_sub(4)
    }

    /// Fill the reserved header of a payload that fits in one packet
    ///
    /// Returns the complete packet, or `None` when the payload has to be split.
    pub fn single_packet(&mut self, sequence_id: u8, max_payload: usize) -> Option<&[u8]> {
        let payload_len = self.payload_len();
        if payload_len >= max_payload {
            return None;
        }
        let header = PacketHeader::encode(payload_len, sequence_id);
        self.write_buffer[..4].copy_from_slice(header.as_bytes());
        Some(&self.write_buffer)
    }

    /// Payload bytes after the reserved header
    #[inline]
    pub fn payload(&self) -> &[u8] {
        self.write_buffer.get(4..).unwrap_or_default()
    }

    pub(crate) fn clear(&mut self) {
        self.read_buffer.clear();
        self.new_write_buffer();
    }
}

impl Default for BufferSet {
    fn default() -> Self {
        Self::new()
    }
}
