//! POSIX shared-memory regions.
//!
//! A [`ShmRegion`] is a named, fixed-size `MAP_SHARED` mapping backed by
//! `shm_open`. Exactly one side *creates* a region (and unlinks it on drop);
//! any number of siblings may *attach* to it by name while it is live. The
//! channel layer owns all interpretation of the bytes; this module only
//! hands out the raw mapping.

use std::ffi::CString;
use std::fmt;
use std::ptr::NonNull;

use crate::error::{ChannelError, ChannelResult};

/// A mapped shared-memory region.
///
/// The creator unlinks the backing object when dropped; attachers only
/// unmap. Both sides address the same physical pages, so concurrent access
/// rules are entirely up to the caller (the channel layer uses atomics plus
/// a single-writer handshake).
pub struct ShmRegion {
    ptr: NonNull<u8>,
    len: usize,
    name: String,
    c_name: CString,
    owner: bool,
}

// The mapping is plain shared memory addressed through atomics and
// handshake-ordered byte copies at the channel layer.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}

impl ShmRegion {
    /// Create and publish a new region of `len` bytes, zero-filled.
    ///
    /// # Errors
    ///
    /// [`ChannelError::AlreadyExists`] if a region of this name is already
    /// live, [`ChannelError::InvalidName`] for names a shm object cannot
    /// carry, or [`ChannelError::Os`] for any other OS failure.
    pub fn create(name: &str, len: usize) -> ChannelResult<Self> {
        let c_name = object_name(name)?;
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o600,
            )
        };
        if fd < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EEXIST) {
                return Err(ChannelError::AlreadyExists(name.to_string()));
            }
            return Err(ChannelError::Os { op: "shm_open", source: err });
        }

        #[allow(clippy::cast_possible_wrap)]
        let rc = unsafe { libc::ftruncate(fd, len as libc::off_t) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(ChannelError::Os { op: "ftruncate", source: err });
        }

        let ptr = map_fd(fd, len).inspect_err(|_| unsafe {
            libc::shm_unlink(c_name.as_ptr());
        })?;

        Ok(Self {
            ptr,
            len,
            name: name.to_string(),
            c_name,
            owner: true,
        })
    }

    /// Attach to a region some creator has already published.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotFound`] if no creator has published this name,
    /// [`ChannelError::Os`] for other OS failures (including a region
    /// shorter than `len`).
    pub fn attach(name: &str, len: usize) -> ChannelResult<Self> {
        let c_name = object_name(name)?;
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENOENT) {
                return Err(ChannelError::NotFound(name.to_string()));
            }
            return Err(ChannelError::Os { op: "shm_open", source: err });
        }

        // The creator published before ftruncate completed if this is short.
        let mut stat: libc::stat = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::fstat(fd, &raw mut stat) };
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let actual = if rc == 0 { stat.st_size.max(0) as usize } else { 0 };
        if rc != 0 || actual < len {
            unsafe { libc::close(fd) };
            return Err(ChannelError::Os {
                op: "fstat",
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("region {name} is {actual} bytes, need {len}"),
                ),
            });
        }

        let ptr = map_fd(fd, len)?;

        Ok(Self {
            ptr,
            len,
            name: name.to_string(),
            c_name,
            owner: false,
        })
    }

    /// Base pointer of the mapping. Valid for `len()` bytes for the life of
    /// this handle; page-aligned.
    #[must_use]
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is empty (never true for a published channel).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Name the region was published under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle created (and will unlink) the region.
    #[must_use]
    pub fn is_creator(&self) -> bool {
        self.owner
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.len);
            if self.owner {
                libc::shm_unlink(self.c_name.as_ptr());
            }
        }
    }
}

impl fmt::Debug for ShmRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShmRegion")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// mmap an fd and close it; the mapping keeps the object alive.
fn map_fd(fd: libc::c_int, len: usize) -> ChannelResult<NonNull<u8>> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    let err = std::io::Error::last_os_error();
    unsafe { libc::close(fd) };
    if std::ptr::eq(ptr, libc::MAP_FAILED) {
        return Err(ChannelError::Os { op: "mmap", source: err });
    }
    NonNull::new(ptr.cast::<u8>()).ok_or(ChannelError::Os {
        op: "mmap",
        source: std::io::Error::other("null mapping"),
    })
}

/// Normalize a channel name into a shm object name (leading slash, no
/// interior slashes or NULs).
fn object_name(name: &str) -> ChannelResult<CString> {
    if name.is_empty() || name.contains('/') {
        return Err(ChannelError::InvalidName(name.to_string()));
    }
    CString::new(format!("/{name}"))
        .map_err(|_| ChannelError::InvalidName(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        use std::sync::atomic::{AtomicU32, Ordering};
        static SEQ: AtomicU32 = AtomicU32::new(0);
        format!(
            "arbiter-test-{}-{}-{}",
            tag,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    #[test]
    fn test_create_attach_shared_bytes() {
        let name = unique("shared");
        let creator = ShmRegion::create(&name, 4096).unwrap();
        let attacher = ShmRegion::attach(&name, 4096).unwrap();

        unsafe {
            *creator.as_ptr().add(100) = 0xAB;
        }
        let seen = unsafe { *attacher.as_ptr().add(100) };
        assert_eq!(seen, 0xAB);
        assert!(creator.is_creator());
        assert!(!attacher.is_creator());
    }

    #[test]
    fn test_create_twice_already_exists() {
        let name = unique("dup");
        let _creator = ShmRegion::create(&name, 1024).unwrap();
        let second = ShmRegion::create(&name, 1024);
        assert!(matches!(second, Err(ChannelError::AlreadyExists(_))));
    }

    #[test]
    fn test_attach_before_create_not_found() {
        let name = unique("orphan");
        let result = ShmRegion::attach(&name, 1024);
        assert!(matches!(result, Err(ChannelError::NotFound(_))));
    }

    #[test]
    fn test_drop_unpublishes() {
        let name = unique("unlink");
        {
            let _creator = ShmRegion::create(&name, 1024).unwrap();
        }
        let result = ShmRegion::attach(&name, 1024);
        assert!(matches!(result, Err(ChannelError::NotFound(_))));
    }

    #[test]
    fn test_invalid_names_rejected() {
        assert!(matches!(
            ShmRegion::create("", 64),
            Err(ChannelError::InvalidName(_))
        ));
        assert!(matches!(
            ShmRegion::create("a/b", 64),
            Err(ChannelError::InvalidName(_))
        ));
    }
}
