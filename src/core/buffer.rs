//! Per-connection byte buffers
//!
//! - `InboundBuffer`: daftar chunk hasil `read`, digabung hanya saat dipakai parser
//! - `OutboundBuffer`: bytes yang menunggu di-flush plus cursor bytes yang sudah terkirim

/// Append-only list of received chunks.
///
/// Setiap `read` menghasilkan satu chunk. Penggabungan (copy) hanya terjadi
/// sekali saat [`InboundBuffer::take`], bukan pada setiap partial parse.
#[derive(Debug, Default)]
pub struct InboundBuffer {
    chunks: Vec<Vec<u8>>,
    len: usize,
}

impl InboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tambah chunk baru. Chunk kosong diabaikan.
    #[inline]
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.push(chunk);
    }

    /// Tambah bytes dengan copy
    #[inline]
    pub fn push_slice(&mut self, bytes: &[u8]) {
        if !bytes.is_empty() {
            self.push(bytes.to_vec());
        }
    }

    /// Kembalikan bytes yang belum dikonsumsi ke depan buffer.
    ///
    /// Chunk yang masuk setelah `take` tetap berada di belakangnya.
    pub fn unshift(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.len += chunk.len();
        self.chunks.insert(0, chunk);
    }

    /// Gabungkan semua chunk dan kosongkan buffer.
    pub fn take(&mut self) -> Vec<u8> {
        self.len = 0;
        match self.chunks.len() {
            0 => Vec::new(),
            // Satu chunk: pindahkan tanpa copy
            1 => self.chunks.pop().unwrap_or_default(),
            _ => {
                let chunks = std::mem::take(&mut self.chunks);
                chunks.concat()
            }
        }
    }

    /// Total bytes yang belum diambil
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Pending outbound bytes plus a flush cursor.
#[derive(Debug, Default)]
pub struct OutboundBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl OutboundBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes untuk dikirim
    #[inline]
    pub fn extend(&mut self, bytes: &[u8]) {
        // Compact dulu jika lebih dari separuh buffer sudah terkirim
        if self.cursor > 0 && self.cursor * 2 >= self.data.len() {
            self.data.copy_within(self.cursor.., 0);
            self.data.truncate(self.data.len() - self.cursor);
            self.cursor = 0;
        }
        self.data.extend_from_slice(bytes);
    }

    /// Bytes yang belum terkirim (zero-copy)
    #[inline(always)]
    pub fn pending(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Maju `n` bytes setelah write berhasil. Buffer dikosongkan saat semua terkirim.
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.data.len());
        if self.cursor == self.data.len() {
            self.data.clear();
            self.cursor = 0;
        }
    }

    /// Jumlah bytes yang sudah di-flush dari isi buffer saat ini
    #[inline(always)]
    pub fn flushed(&self) -> usize {
        self.cursor
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.cursor == self.data.len()
    }
}
