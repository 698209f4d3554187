// 上传分片读取
//
// 分片规则：
// - 分片大小由后端在创建分片会话时指定
// - 分片按偏移 0 起连续切分，最后一个分片取余量
// - 顺序消费，同一时刻内存中至多缓冲一个分片的数据

use crate::error::UploadError;
use std::ops::Range;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// 计算分片字节范围
///
/// 从偏移 0 开始连续切分，每片长度为 min(part_size, 剩余字节数)。
///
/// # 参数
/// * `total_size` - 文件总大小
/// * `part_size` - 分片大小（必须 > 0）
pub fn calculate_ranges(total_size: u64, part_size: u64) -> Vec<Range<u64>> {
    let mut ranges = Vec::new();
    let mut offset = 0u64;

    while offset < total_size {
        let end = std::cmp::min(offset + part_size, total_size);
        ranges.push(offset..end);
        offset = end;
    }

    ranges
}

/// 计算分片数量
pub fn chunk_count(total_size: u64, part_size: u64) -> u64 {
    total_size.div_ceil(part_size)
}

/// 文件分片
#[derive(Debug)]
pub struct FileChunk {
    /// 分片序号（从 1 开始）
    pub part_number: u32,
    /// 字节范围
    pub range: Range<u64>,
    /// 分片数据
    pub data: Vec<u8>,
}

impl FileChunk {
    /// 分片大小
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }
}

/// 顺序分片读取器
///
/// 持有独占的文件句柄，从偏移 0 开始只进读取，不支持回退。
/// 重新开始只能重新打开文件。句柄随读取器一起释放，
/// 无论上传正常结束、失败还是中途被放弃。
#[derive(Debug)]
pub struct ChunkReader {
    /// 文件句柄
    file: File,
    /// 文件总大小（构造时确定）
    total_size: u64,
    /// 分片大小
    part_size: u64,
    /// 当前读取偏移
    offset: u64,
    /// 下一个分片序号
    next_part_number: u32,
}

impl ChunkReader {
    /// 打开文件并创建分片读取器
    ///
    /// # 参数
    /// * `path` - 本地文件路径
    /// * `total_size` - 文件总大小（来自上传请求，读取时校验）
    /// * `part_size` - 分片大小（必须 > 0）
    pub async fn open(
        path: impl AsRef<Path>,
        total_size: u64,
        part_size: u64,
    ) -> Result<Self, UploadError> {
        if part_size == 0 {
            return Err(UploadError::ProtocolInvariant(
                "分片大小必须为正整数".to_string(),
            ));
        }

        let file = File::open(path.as_ref()).await?;

        Ok(Self {
            file,
            total_size,
            part_size,
            offset: 0,
            next_part_number: 1,
        })
    }

    /// 读取下一个分片
    ///
    /// 累计读取长度达到总大小时返回 `None`。
    /// 文件在上传过程中被截断会导致短读，按 IO 错误返回。
    pub async fn next_chunk(&mut self) -> Result<Option<FileChunk>, UploadError> {
        if self.offset >= self.total_size {
            return Ok(None);
        }

        let len = std::cmp::min(self.part_size, self.total_size - self.offset);
        let range = self.offset..self.offset + len;

        let mut buffer = vec![0u8; len as usize];
        self.file.read_exact(&mut buffer).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                UploadError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "文件在上传过程中被截断: 期望偏移 {}..{}",
                        range.start, range.end
                    ),
                ))
            } else {
                UploadError::Io(e)
            }
        })?;

        let part_number = self.next_part_number;
        self.offset = range.end;
        self.next_part_number += 1;

        debug!(
            "读取分片 #{}: bytes={}-{}, 大小={} bytes",
            part_number,
            range.start,
            range.end - 1,
            len
        );

        Ok(Some(FileChunk {
            part_number,
            range,
            data: buffer,
        }))
    }

    /// 文件总大小
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// 剩余未读取字节数
    pub fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    #[test]
    fn test_range_calculation() {
        // 整除分片
        let ranges = calculate_ranges(16 * 1024 * 1024, 4 * 1024 * 1024);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0], 0..(4 * 1024 * 1024));
        assert_eq!(ranges[3], (12 * 1024 * 1024)..(16 * 1024 * 1024));

        // 不整除分片：最后一片取余量
        let ranges = calculate_ranges(17 * 1024 * 1024, 4 * 1024 * 1024);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges[4], (16 * 1024 * 1024)..(17 * 1024 * 1024));
    }

    #[test]
    fn test_small_file_single_range() {
        let ranges = calculate_ranges(1024, 4 * 1024 * 1024);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0], 0..1024);
    }

    #[test]
    fn test_empty_file_no_ranges() {
        let ranges = calculate_ranges(0, 1024);
        assert!(ranges.is_empty());
        assert_eq!(chunk_count(0, 1024), 0);
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(200, 50), 4);
        assert_eq!(chunk_count(201, 50), 5);
        assert_eq!(chunk_count(1, 50), 1);
        assert_eq!(chunk_count(50, 50), 1);
    }

    proptest! {
        // 任意 total ≥ 1、part_size ≥ 1：范围连续、从 0 起、恰好覆盖全部字节
        #[test]
        fn prop_ranges_contiguous_and_cover(total in 1u64..1_000_000, part in 1u64..100_000) {
            let ranges = calculate_ranges(total, part);
            prop_assert_eq!(ranges.len() as u64, chunk_count(total, part));
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[ranges.len() - 1].end, total);
            for window in ranges.windows(2) {
                prop_assert_eq!(window[0].end, window[1].start);
            }
            for range in &ranges {
                prop_assert!(range.end - range.start <= part);
                prop_assert!(range.end > range.start);
            }
        }
    }

    fn write_temp_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_sequential_read() {
        let file = write_temp_file(1000);
        let mut reader = ChunkReader::open(file.path(), 1000, 400).await.unwrap();

        let chunk1 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk1.part_number, 1);
        assert_eq!(chunk1.range, 0..400);
        assert_eq!(chunk1.data.len(), 400);
        assert_eq!(chunk1.data[0], 0);

        let chunk2 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk2.part_number, 2);
        assert_eq!(chunk2.range, 400..800);
        // 数据内容与偏移一致
        assert_eq!(chunk2.data[0], (400 % 251) as u8);

        let chunk3 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk3.part_number, 3);
        assert_eq!(chunk3.range, 800..1000);
        assert_eq!(chunk3.size(), 200);

        assert!(reader.next_chunk().await.unwrap().is_none());
        assert_eq!(reader.remaining(), 0);
    }

    #[tokio::test]
    async fn test_truncated_file_is_io_error() {
        // 声明 2000 字节但实际只有 1000 字节
        let file = write_temp_file(1000);
        let mut reader = ChunkReader::open(file.path(), 2000, 800).await.unwrap();

        let chunk1 = reader.next_chunk().await.unwrap().unwrap();
        assert_eq!(chunk1.data.len(), 800);

        // 第二个分片需要 800 字节，但文件只剩 200 字节
        let err = reader.next_chunk().await.unwrap_err();
        assert_eq!(err.stage(), crate::error::UploadStage::Io);
    }

    #[tokio::test]
    async fn test_zero_part_size_rejected() {
        let file = write_temp_file(100);
        let err = ChunkReader::open(file.path(), 100, 0).await.unwrap_err();
        assert_eq!(err.stage(), crate::error::UploadStage::Protocol);
    }
}
