//! Random-access local file I/O for transfers.
//!
//! File structure reads chunks; record structure treats each line as one
//! record, stripping terminators on read and appending the platform
//! terminator per record on write. Both sides accept a starting byte offset
//! for resumed transfers.

use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, SeekFrom};

use crate::session::{FileStructure, RestartOffset};

use super::Unit;

#[cfg(windows)]
const RECORD_TERMINATOR: &[u8] = b"\r\n";
#[cfg(not(windows))]
const RECORD_TERMINATOR: &[u8] = b"\n";

pub struct FileSource {
    reader: BufReader<File>,
    structure: FileStructure,
    chunk: Vec<u8>,
}

impl FileSource {
    pub async fn open(
        path: &Path,
        structure: FileStructure,
        offset: u64,
        buffer_size: usize,
    ) -> std::io::Result<Self> {
        let mut file = File::open(path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(Self {
            reader: BufReader::new(file),
            structure,
            chunk: vec![0; buffer_size.max(512)],
        })
    }

    pub async fn read_unit(&mut self) -> std::io::Result<Option<Unit>> {
        match self.structure {
            FileStructure::File => {
                let n = self.reader.read(&mut self.chunk).await?;
                if n == 0 {
                    return Ok(None);
                }
                Ok(Some(Unit::chunk(self.chunk[..n].to_vec())))
            }
            FileStructure::Record => {
                let mut line = Vec::new();
                let n = self.reader.read_until(b'\n', &mut line).await?;
                if n == 0 {
                    return Ok(None);
                }
                if line.last() == Some(&b'\n') {
                    line.pop();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                }
                Ok(Some(Unit::record(line)))
            }
        }
    }
}

pub struct FileSink {
    file: File,
    structure: FileStructure,
}

impl FileSink {
    /// Opens the destination according to the pending restart offset:
    /// `Absent` truncates (overwrite), `At(n)` seeks to `n`, `Append` seeks
    /// to end-of-file.
    pub async fn open(
        path: &Path,
        structure: FileStructure,
        resume: RestartOffset,
    ) -> std::io::Result<Self> {
        let file = match resume {
            RestartOffset::Absent => File::create(path).await?,
            RestartOffset::At(offset) => {
                let mut file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(path)
                    .await?;
                file.seek(SeekFrom::Start(offset)).await?;
                file
            }
            RestartOffset::Append => {
                OpenOptions::new()
                    .append(true)
                    .create(true)
                    .open(path)
                    .await?
            }
        };
        Ok(Self { file, structure })
    }

    pub async fn write_unit(&mut self, data: &[u8], end_of_record: bool) -> std::io::Result<()> {
        self.file.write_all(data).await?;
        if end_of_record && self.structure == FileStructure::Record {
            self.file.write_all(RECORD_TERMINATOR).await?;
        }
        Ok(())
    }

    pub async fn finish(&mut self) -> std::io::Result<()> {
        self.file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_all_at(path: &Path, resume: RestartOffset, data: &[u8]) {
        let mut sink = FileSink::open(path, FileStructure::File, resume)
            .await
            .unwrap();
        sink.write_unit(data, false).await.unwrap();
        sink.finish().await.unwrap();
    }

    #[tokio::test]
    async fn resume_equivalence() {
        // Writing [0, N) then resuming at N must equal a single-pass write,
        // for N at the start, mid-file and end-of-file.
        let content: Vec<u8> = (0..4096u32).map(|i| (i % 256) as u8).collect();
        for split in [0usize, 1500, content.len()] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("out.bin");

            write_all_at(&path, RestartOffset::Absent, &content[..split]).await;
            write_all_at(&path, RestartOffset::At(split as u64), &content[split..]).await;

            assert_eq!(tokio::fs::read(&path).await.unwrap(), content);
        }
    }

    #[tokio::test]
    async fn append_resumes_at_end_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_all_at(&path, RestartOffset::Absent, b"head-").await;
        write_all_at(&path, RestartOffset::Append, b"tail").await;
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"head-tail");
    }

    #[tokio::test]
    async fn absent_offset_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        write_all_at(&path, RestartOffset::Absent, b"old contents here").await;
        write_all_at(&path, RestartOffset::Absent, b"new").await;
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn record_lines_roundtrip_through_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.txt");

        let mut sink = FileSink::open(&path, FileStructure::Record, RestartOffset::Absent)
            .await
            .unwrap();
        sink.write_unit(b"alpha", true).await.unwrap();
        sink.write_unit(b"beta", true).await.unwrap();
        sink.write_unit(b"", true).await.unwrap();
        sink.finish().await.unwrap();

        let mut source = FileSource::open(&path, FileStructure::Record, 0, 4096)
            .await
            .unwrap();
        let mut records = Vec::new();
        while let Some(unit) = source.read_unit().await.unwrap() {
            assert!(unit.end_of_record);
            records.push(unit.data);
        }
        assert_eq!(records, vec![b"alpha".to_vec(), b"beta".to_vec(), Vec::new()]);
    }

    #[tokio::test]
    async fn chunk_source_honors_resume_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, b"0123456789").await.unwrap();

        let mut source = FileSource::open(&path, FileStructure::File, 4, 4096)
            .await
            .unwrap();
        let unit = source.read_unit().await.unwrap().unwrap();
        assert_eq!(unit.data, b"456789");
        assert!(source.read_unit().await.unwrap().is_none());
    }
}
