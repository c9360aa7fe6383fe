use std::sync::Arc;

use crate::buffer::BufferSet;
use crate::buffer_pool::BufferPool;

#[test]
fn test_buffer_set_new() {
    let buffers = BufferSet::new();
    assert!(buffers.read_buffer.is_empty());
    assert_eq!(buffers.write_buffer().len(), 4); // pre-allocated header space
}

#[test]
fn test_new_write_buffer() {
    let mut buffers = BufferSet::new();
    let buf = buffers.new_write_buffer();
    // Should have 4 bytes reserved for header
    assert_eq!(buf.len(), 4);
    assert_eq!(buffers.payload_len(), 0);
}

#[test]
fn test_single_packet_fills_header() {
    let mut buffers = BufferSet::new();
    buffers.new_write_buffer().extend_from_slice(&[0x1C, 1, 0, 0, 0]);
    assert_eq!(buffers.payload(), &[0x1C, 1, 0, 0, 0]);

    let packet = buffers.single_packet(0, 0xFFFFFF).unwrap();
    assert_eq!(packet, &[5, 0, 0, 0, 0x1C, 1, 0, 0, 0]);
}

#[test]
fn test_single_packet_refuses_oversized_payload() {
    let mut buffers = BufferSet::new();
    buffers.new_write_buffer().extend_from_slice(&[0; 8]);
    assert!(buffers.single_packet(0, 8).is_none());
    assert!(buffers.single_packet(0, 9).is_some());
}

#[test]
fn test_buffer_reuse() {
    let mut buffers = BufferSet::new();

    buffers.read_buffer.extend_from_slice(b"test data");
    buffers.new_write_buffer().extend_from_slice(b"fetch");

    assert_eq!(buffers.read_buffer.len(), 9);
    assert_eq!(buffers.payload_len(), 5);

    buffers.read_buffer.clear();
    buffers.new_write_buffer();

    assert_eq!(buffers.read_buffer.len(), 0);
    assert_eq!(buffers.payload_len(), 0);

    // Capacity should be preserved
    assert!(buffers.read_buffer.capacity() >= 9);
}

#[test]
fn test_pooled_buffer_returns_to_pool() {
    let pool = Arc::new(BufferPool::new(2));
    let mut buffer = pool.get_buffer();
    buffer.extend_from_slice(&[1, 2, 3]);
    let capacity = buffer.capacity();
    drop(buffer);

    let buffer = pool.get_buffer();
    assert!(buffer.is_empty());
    assert_eq!(buffer.capacity(), capacity);
}

#[test]
fn test_full_pool_drops_buffers() {
    let pool = Arc::new(BufferPool::new(1));
    let first = pool.get_buffer();
    let second = pool.get_buffer();
    drop(first);
    drop(second);
    assert_eq!(pool.idle_buffers(), 1);
}

#[test]
fn test_pooled_buffer_set_is_cleared() {
    let pool = Arc::new(BufferPool::new(1));
    let mut set = pool.get_buffer_set();
    set.read_buffer.extend_from_slice(b"leftover");
    set.new_write_buffer().extend_from_slice(b"command");
    drop(set);

    let set = pool.get_buffer_set();
    assert!(set.read_buffer.is_empty());
    assert_eq!(set.payload_len(), 0);
}
