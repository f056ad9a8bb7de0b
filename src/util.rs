use bytes::Buf;

pub trait BufReadBytesExt {
    fn get_bytes<const N: usize>(&mut self) -> [u8; N];
}

impl<B: Buf> BufReadBytesExt for B {
    fn get_bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut data: [u8; N] = [0; N];
        self.copy_to_slice(&mut data[..]);
        data
    }
}

/// Returns the offset of the first occurence of `signature` in `buffer`.
pub fn find_signature(buffer: &[u8], signature: &[u8]) -> Option<usize> {
    if signature.is_empty() {
        return Some(0);
    }
    buffer
        .windows(signature.len())
        .position(|window| window == signature)
}
