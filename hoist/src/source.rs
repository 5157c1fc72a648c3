use std::ops::Range;

use bytes::Bytes;

/// The payload to upload: a refcounted byte container with a known total
/// length plus the name and content-type hints the backend stores alongside
/// it. Slicing a part out of it is cheap and copy-free.
#[derive(Debug, Clone)]
pub struct UploadSource {
    name: String,
    content_type: String,
    data: Bytes,
}

impl UploadSource {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn slice(&self, range: Range<u64>) -> Bytes {
        self.data.slice(range.start as usize..range.end as usize)
    }
}
