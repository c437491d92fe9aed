//! 压缩包读取器 - 基础设施层
//!
//! 打开本地或远程 zip 压缩包，按需逐个产出 `(path, content)`。
//! 远程压缩包会先完整下载到内存再解压（不做流式解压）。

use std::io::{Cursor, Read};
use std::time::Duration;

use tracing::debug;
use zip::ZipArchive;

use crate::config::Config;
use crate::error::{AppError, AppResult, ArchiveError};

/// 压缩包中的一个文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// 压缩包内路径（`/` 分隔）
    pub path: String,
    /// UTF-8 尽力解码后的内容；超限文件为空
    pub content: String,
    /// 解压后大小（字节）
    pub size: u64,
    /// 超过单文件大小上限，内容未读取
    pub oversized: bool,
}

/// 压缩包读取器
///
/// 职责：
/// - 判断位置是本地路径还是 http(s) URL
/// - 下载（带超时）或读取本地文件
/// - 不认识规则，不做任何评估
#[derive(Debug, Clone)]
pub struct ArchiveReader {
    client: reqwest::Client,
    download_timeout: Duration,
    max_file_bytes: u64,
}

impl ArchiveReader {
    /// 创建新的压缩包读取器
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// 读取压缩包原始字节
    pub async fn fetch(&self, location: &str) -> AppResult<Vec<u8>> {
        if is_remote(location) {
            self.download(location).await
        } else {
            debug!("读取本地压缩包: {}", location);
            tokio::fs::read(location)
                .await
                .map_err(|e| AppError::archive_read_failed(location, e))
        }
    }

    /// 打开压缩包
    pub async fn open(&self, location: &str) -> AppResult<Archive> {
        let bytes = self.fetch(location).await?;
        Archive::from_bytes(bytes, self.max_file_bytes)
    }

    async fn download(&self, url: &str) -> AppResult<Vec<u8>> {
        debug!("下载远程压缩包: {}", url);

        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| AppError::download_failed(url, e))?;

            let bytes = response
                .bytes()
                .await
                .map_err(|e| AppError::download_failed(url, e))?;

            Ok::<_, AppError>(bytes.to_vec())
        };

        match tokio::time::timeout(self.download_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ArchiveError::DownloadTimedOut {
                url: url.to_string(),
                secs: self.download_timeout.as_secs(),
            }
            .into()),
        }
    }
}

/// 是否为 http(s) 地址
pub fn is_remote(location: &str) -> bool {
    let lower = location.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// 已加载到内存中的压缩包
pub struct Archive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
    max_file_bytes: u64,
}

impl Archive {
    /// 从内存字节打开压缩包，格式错误时返回 `ArchiveError::Corrupt`
    pub fn from_bytes(bytes: Vec<u8>, max_file_bytes: u64) -> AppResult<Self> {
        let zip = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::Corrupt)?;
        Ok(Self {
            zip,
            max_file_bytes,
        })
    }

    /// 条目总数（包含目录）
    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// 按压缩包顺序惰性产出所有非目录条目
    pub fn entries(&mut self) -> Entries<'_> {
        Entries {
            zip: &mut self.zip,
            index: 0,
            max_file_bytes: self.max_file_bytes,
        }
    }

    /// 读取全部条目
    pub fn read_all(mut self) -> AppResult<Vec<ArchiveEntry>> {
        self.entries().collect()
    }
}

/// 条目迭代器
pub struct Entries<'a> {
    zip: &'a mut ZipArchive<Cursor<Vec<u8>>>,
    index: usize,
    max_file_bytes: u64,
}

impl Iterator for Entries<'_> {
    type Item = AppResult<ArchiveEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.zip.len() {
            let index = self.index;
            self.index += 1;

            let mut file = match self.zip.by_index(index) {
                Ok(file) => file,
                Err(e) => return Some(Err(ArchiveError::Corrupt(e).into())),
            };

            if file.is_dir() {
                continue;
            }

            let path = file.name().to_string();
            let size = file.size();

            if size > self.max_file_bytes {
                debug!("文件超过大小上限，跳过内容: {} ({} 字节)", path, size);
                return Some(Ok(ArchiveEntry {
                    path,
                    content: String::new(),
                    size,
                    oversized: true,
                }));
            }

            // 头部声明的大小不可信，实际读取也受上限约束
            let mut buf = Vec::with_capacity(size as usize);
            if let Err(e) = (&mut file)
                .take(self.max_file_bytes + 1)
                .read_to_end(&mut buf)
            {
                return Some(Err(AppError::archive_read_failed(path, e)));
            }

            let read = buf.len() as u64;
            if read > self.max_file_bytes {
                debug!("文件实际大小超过上限，跳过内容: {} (声明 {} 字节)", path, size);
                return Some(Ok(ArchiveEntry {
                    path,
                    content: String::new(),
                    size: size.max(read),
                    oversized: true,
                }));
            }

            return Some(Ok(ArchiveEntry {
                path,
                content: String::from_utf8_lossy(&buf).into_owned(),
                size: read,
                oversized: false,
            }));
        }

        None
    }
}
