//! Utilities to manipulate generic memory

#[macro_export]
macro_rules! kb {
    ($val:expr) => {
        $val * 1024
    };
}
#[macro_export]
macro_rules! mb {
    ($val:expr) => {
        $val * 1024 * 1024
    };
}

/// Splits `length` bytes into consecutive `(offset, size)` chunks
/// of at most `chunk_size` bytes.
pub fn chunks(length: usize, chunk_size: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..length).step_by(chunk_size.max(1)).map(move |offset| (offset, chunk_size.min(length - offset)))
}
