/// One buffer delivered by a capture callback.
///
/// Borrows the platform buffer for the duration of the callback only; the
/// bytes are copied into the ring buffer before the callback returns.
#[derive(Debug, Clone, Copy)]
pub struct AudioChunk<'a> {
    pub data: &'a [u8],
    pub frames: u32,
    /// The platform flagged this buffer as silence; `data` must be treated as zeros.
    pub silent: bool,
}

impl<'a> AudioChunk<'a> {
    pub fn new(data: &'a [u8], frames: u32) -> Self {
        Self {
            data,
            frames,
            silent: false,
        }
    }

    pub fn silent(data: &'a [u8], frames: u32) -> Self {
        Self {
            data,
            frames,
            silent: true,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
