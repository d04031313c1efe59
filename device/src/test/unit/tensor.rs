use std::sync::Arc;

use kiln_dtype::DType;
use test_case::test_case;

use crate::{CpuAllocator, Error, TensorView};

use super::CountingAllocator;

#[test_case(DType::Float32, &[2, 3], 24; "f32_matrix")]
#[test_case(DType::Int64, &[4], 32; "i64_vector")]
#[test_case(DType::Float64, &[], 8; "f64_scalar")]
#[test_case(DType::Int32, &[0, 5], 0; "empty")]
fn test_owned_size(dtype: DType, shape: &[usize], expected: usize) {
    let view = TensorView::allocate(dtype, shape, Arc::new(CpuAllocator)).unwrap();
    assert_eq!(view.size_in_bytes(), expected);
    assert_eq!(view.as_bytes().len(), expected);
    assert_eq!(view.shape(), shape);
    assert_eq!(view.dtype(), dtype);
    assert!(!view.is_attached());
}

#[test]
fn test_owned_returned_to_allocator_on_drop() {
    let allocator = CountingAllocator::shared();
    {
        let _view = TensorView::allocate(DType::Float32, &[4], allocator.clone()).unwrap();
        assert_eq!(allocator.allocs(), 1);
        assert_eq!(allocator.frees(), 0);
    }
    assert_eq!(allocator.frees(), 1);
}

#[test]
fn test_attached_uses_caller_memory() {
    let mut memory = vec![0u8; 16];
    let address = memory.as_ptr();
    {
        let mut view = TensorView::attach(DType::Int32, &[4], &mut memory).unwrap();
        assert!(view.is_attached());
        assert_eq!(view.as_ptr(), address);
        view.write(&[1u8; 16]).unwrap();
    }
    assert!(memory.iter().all(|b| *b == 1));
}

#[test]
fn test_attached_larger_memory_uses_prefix() {
    let mut memory = vec![0u8; 32];
    let view = TensorView::attach(DType::Int32, &[2], &mut memory).unwrap();
    assert_eq!(view.size_in_bytes(), 8);
    assert_eq!(view.as_bytes().len(), 8);
}

#[test]
fn test_attached_too_small() {
    let mut memory = vec![0u8; 15];
    let err = TensorView::attach(DType::Int32, &[4], &mut memory).unwrap_err();
    assert!(matches!(err, Error::SizeMismatch { expected: 16, actual: 15 }));
}

#[test]
fn test_read_write_roundtrip() {
    let mut view = TensorView::allocate(DType::Float32, &[2], Arc::new(CpuAllocator)).unwrap();
    let data: Vec<u8> = [1.5f32, -2.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
    view.write(&data).unwrap();

    let mut out = vec![0u8; 8];
    view.read(&mut out).unwrap();
    assert_eq!(out, data);
    assert_eq!(view.to_vec(), data);
}

#[test_case(7; "short")]
#[test_case(9; "long")]
fn test_read_write_size_checked(len: usize) {
    let mut view = TensorView::allocate(DType::Float32, &[2], Arc::new(CpuAllocator)).unwrap();
    assert!(matches!(view.write(&vec![0u8; len]), Err(Error::SizeMismatch { expected: 8, .. })));
    assert!(matches!(view.read(&mut vec![0u8; len]), Err(Error::SizeMismatch { expected: 8, .. })));
}

#[test]
fn test_size_overflow() {
    let err = TensorView::allocate(DType::Float64, &[usize::MAX, 2], Arc::new(CpuAllocator)).unwrap_err();
    assert!(matches!(err, Error::SizeOverflow { .. }));
}
