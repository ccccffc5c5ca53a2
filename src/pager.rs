//! The page cache mediating between memory and a single backing file.
use crate::node::{Page, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Bounds the working set to roughly 400 KiB; pages are never evicted, so
/// this is also the hard cap on distinct pages a table can ever allocate.
pub const TABLE_MAX_PAGES: usize = 100;

pub struct Pager {
    file: File,
    num_pages: u32,
    pages: heapless::Vec<Option<Arc<Mutex<Page>>>, TABLE_MAX_PAGES>,
}

impl Pager {
    /// Opens (creating if necessary) the backing file. Rejects a file whose
    /// length isn't a whole multiple of [`PAGE_SIZE`] as corrupt.
    pub fn open(path: &Path) -> Result<Self, crate::errors::Error> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_len = file.seek(SeekFrom::End(0))?;
        if file_len % PAGE_SIZE as u64 != 0 {
            return Err(err!(
                Storage,
                "db file is not a whole number of pages, corrupt file (len={})",
                file_len
            ));
        }

        let num_pages = (file_len / PAGE_SIZE as u64) as u32;
        debug!(num_pages, "Opened pager");

        let mut pages = heapless::Vec::new();
        pages
            .resize(TABLE_MAX_PAGES, None)
            .map_err(|_| err!(Storage, "page cache capacity exceeded"))?;

        Ok(Pager {
            file,
            num_pages,
            pages,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// Strictly append-only: freed space is never reclaimed.
    pub fn get_unused_page_num(&self) -> u32 {
        self.num_pages
    }

    /// Returns the cached page, loading it from disk on first access.
    /// Allocates and zeroes a fresh page when `page_num` is beyond the
    /// current on-disk extent, bumping `num_pages`.
    pub fn get_page(&mut self, page_num: u32) -> Result<Arc<Mutex<Page>>, crate::errors::Error> {
        if page_num as usize >= TABLE_MAX_PAGES {
            return Err(err!(
                Storage,
                "tried to fetch page number out of bounds: {} >= {}",
                page_num,
                TABLE_MAX_PAGES
            ));
        }

        if let Some(page) = &self.pages[page_num as usize] {
            return Ok(Arc::clone(page));
        }

        let mut buf = [0u8; PAGE_SIZE];
        if page_num < self.num_pages {
            trace!(page_num, "Loading page from disk");
            self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
            self.file.read_exact(&mut buf)?;
        }

        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }

        let page = Arc::new(Mutex::new(Page::from_bytes(buf)));
        self.pages[page_num as usize] = Some(Arc::clone(&page));
        Ok(page)
    }

    /// Writes exactly [`PAGE_SIZE`] bytes from the cached page to its slot
    /// in the file. Fatal if the page isn't resident.
    pub fn flush(&mut self, page_num: u32) -> Result<(), crate::errors::Error> {
        let page = self.pages[page_num as usize]
            .as_ref()
            .ok_or_else(|| err!(Storage, "tried to flush a page that was never loaded: {}", page_num))?;
        let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;

        self.file.seek(SeekFrom::Start(page_num as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&guard.data)?;
        Ok(())
    }

    /// Flushes every resident page and drops the file descriptor. Pages
    /// that were never loaded are assumed unmodified and skipped.
    pub fn close(&mut self) -> Result<(), crate::errors::Error> {
        let resident: Vec<u32> = (0..self.num_pages)
            .filter(|&n| self.pages[n as usize].is_some())
            .collect();

        for page_num in resident {
            if let Err(e) = self.flush(page_num) {
                warn!(page_num, error = %e, "Failed to flush page on close");
                return Err(e);
            }
        }
        self.file.flush()?;
        debug!(num_pages = self.num_pages, "Closed pager");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn new_file_has_zero_pages() {
        let f = NamedTempFile::new().unwrap();
        let pager = Pager::open(f.path()).unwrap();
        assert_eq!(pager.num_pages(), 0);
    }

    #[test]
    fn get_page_grows_num_pages_and_persists_across_reopen() {
        let f = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(f.path()).unwrap();
            let page = pager.get_page(0).unwrap();
            page.lock().unwrap().data[0] = 42;
            pager.close().unwrap();
        }
        let mut pager = Pager::open(f.path()).unwrap();
        assert_eq!(pager.num_pages(), 1);
        let page = pager.get_page(0).unwrap();
        assert_eq!(page.lock().unwrap().data[0], 42);
    }

    #[test]
    fn rejects_corrupt_file_length() {
        let f = NamedTempFile::new().unwrap();
        {
            let file = OpenOptions::new().write(true).open(f.path()).unwrap();
            file.set_len(100).unwrap();
        }
        assert!(Pager::open(f.path()).is_err());
    }

    #[test]
    fn rejects_page_beyond_table_max_pages() {
        let f = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(f.path()).unwrap();
        assert!(pager.get_page(TABLE_MAX_PAGES as u32).is_err());
    }
}
