/// File content. Never inspected; only hashed, stored and packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Vec<u8>,
}

impl From<&[u8]> for Blob {
    fn from(data: &[u8]) -> Self {
        Self { data: data.to_vec() }
    }
}
