//! Uploaded page image

/// One uploaded sheet-music page
///
/// The page index is assigned from upload order at the request boundary and
/// travels with the page through recognition and assembly.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Zero-based position in the request
    pub index: usize,
    /// Filename declared by the client
    pub filename: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl PageImage {
    pub fn new(index: usize, filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            index,
            filename: filename.into(),
            bytes,
        }
    }

    /// One-based page number, as shown to users
    pub fn page_number(&self) -> usize {
        self.index + 1
    }
}
