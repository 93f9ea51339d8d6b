use async_trait::async_trait;
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Raw filesystem access used by the project store and attachment resolver.
///
/// The desktop build and tests both run against [`LocalFs`]; the trait exists
/// so tests can observe or fail individual operations.
#[async_trait]
pub trait FileSystem: Send + Sync {
    async fn read_text(&self, path: &Path) -> io::Result<String>;
    async fn write_text(&self, path: &Path, contents: &str) -> io::Result<()>;
    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>>;
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Writes a new file; fails with `AlreadyExists` instead of replacing one.
    async fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl FileSystem for LocalFs {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write_text(&self, path: &Path, contents: &str) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(contents).await?;
        file.flush().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// `LocalFs` wrapper counting reads and optionally failing writes.
    #[derive(Default)]
    pub struct CountingFs {
        pub byte_reads: AtomicUsize,
        pub fail_writes: AtomicBool,
    }

    impl CountingFs {
        pub fn reads(&self) -> usize {
            self.byte_reads.load(Ordering::SeqCst)
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        fn check_write(&self) -> io::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "disk is read-only"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl FileSystem for CountingFs {
        async fn read_text(&self, path: &Path) -> io::Result<String> {
            LocalFs.read_text(path).await
        }

        async fn write_text(&self, path: &Path, contents: &str) -> io::Result<()> {
            self.check_write()?;
            LocalFs.write_text(path, contents).await
        }

        async fn read_bytes(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.byte_reads.fetch_add(1, Ordering::SeqCst);
            // Give concurrent resolvers a chance to pile up on the same key.
            tokio::task::yield_now().await;
            LocalFs.read_bytes(path).await
        }

        async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
            LocalFs.create_dir_all(path).await
        }

        async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
            self.check_write()?;
            LocalFs.rename(from, to).await
        }

        async fn create_new(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            self.check_write()?;
            // Let concurrent writers race for the same name.
            tokio::task::yield_now().await;
            LocalFs.create_new(path, contents).await
        }
    }
}
