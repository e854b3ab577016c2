use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use tracing::{debug, error, info, trace, warn};

use crate::consts::InodePointer;
use crate::driver::DeviceDriver;
use crate::ops::meta::{Attributes, FileKind};
use crate::ops::SimpleFs;
use crate::util::error::{Error, Result};

const TTL: Duration = Duration::from_secs(1);

/// The kernel numbers the root 1; the image numbers it 0.
pub(crate) fn to_fuse_ino(ino: InodePointer) -> u64 {
    ino as u64 + 1
}

pub(crate) fn to_core_ino(ino: u64) -> Result<InodePointer> {
    ino.checked_sub(1)
        .and_then(|ino| InodePointer::try_from(ino).ok())
        .ok_or(Error::NotFound)
}

fn name_str(name: &OsStr) -> Result<&str> {
    name.to_str().ok_or_else(|| Error::InvalidName(name.to_string_lossy().into_owned()))
}

fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::File => FileType::RegularFile,
        FileKind::Directory => FileType::Directory,
    }
}

pub(crate) fn to_file_attr(attributes: &Attributes) -> FileAttr {
    FileAttr {
        ino: to_fuse_ino(attributes.ino),
        size: attributes.size,
        blocks: attributes.blocks,
        atime: attributes.atime,
        mtime: attributes.mtime,
        ctime: attributes.ctime,
        crtime: attributes.ctime,
        kind: file_type(attributes.kind),
        perm: attributes.perm,
        nlink: attributes.nlink,
        uid: attributes.uid,
        gid: attributes.gid,
        rdev: 0,
        blksize: attributes.block_size,
        flags: 0,
    }
}

/// Logs a failed callback and turns it into the errno the kernel gets.
fn errno(op: &'static str, ino: u64, e: Error) -> c_int {
    if matches!(e, Error::NotFound) {
        trace!(op, ino, "not found");
    } else if e.is_internal() {
        error!(op, ino, error = %e, "filesystem inconsistency");
    } else {
        warn!(op, ino, error = %e, "operation failed");
    }
    e.errno()
}

pub struct FuseDriver<D: DeviceDriver> {
    fs: SimpleFs<D>,
}

impl<D: DeviceDriver> FuseDriver<D> {
    pub fn new(fs: SimpleFs<D>) -> FuseDriver<D> {
        FuseDriver { fs }
    }

    fn lookup_entry(&self, parent: u64, name: &OsStr) -> Result<FileAttr> {
        let attributes = self.fs.lookup(to_core_ino(parent)?, name_str(name)?)?;
        Ok(to_file_attr(&attributes))
    }

    fn set_attributes(&self, ino: u64, mode: Option<u32>, size: Option<u64>) -> Result<FileAttr> {
        let ino = to_core_ino(ino)?;
        if let Some(mode) = mode {
            self.fs.chmod(ino, mode)?;
        }
        if let Some(size) = size {
            self.fs.truncate(ino, size)?;
        }
        Ok(to_file_attr(&self.fs.getattr(ino)?))
    }

    /// `.` and `..` first, then the stored entries.
    fn directory_listing(&self, ino: u64) -> Result<Vec<(u64, FileType, String)>> {
        let entries = self.fs.readdir(to_core_ino(ino)?)?;
        let mut listing = Vec::with_capacity(entries.len() + 2);
        listing.push((ino, FileType::Directory, ".".to_string()));
        listing.push((ino, FileType::Directory, "..".to_string()));
        listing.extend(entries.into_iter().map(|entry| (to_fuse_ino(entry.ino), file_type(entry.kind), entry.name)));
        Ok(listing)
    }
}

impl<D: DeviceDriver> Filesystem for FuseDriver<D> {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> std::result::Result<(), c_int> {
        info!(root = self.fs.root(), "filesystem ready");
        Ok(())
    }

    fn destroy(&mut self) {
        match self.fs.sync() {
            Ok(()) => info!("flushed image on unmount"),
            Err(e) => error!(error = %e, "could not flush image on unmount"),
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        match self.lookup_entry(parent, name) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => reply.error(errno("lookup", parent, e)),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match to_core_ino(ino).and_then(|ino| self.fs.getattr(ino)) {
            Ok(attributes) => reply.attr(&TTL, &to_file_attr(&attributes)),
            Err(e) => reply.error(errno("getattr", ino, e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        if uid.is_some() || gid.is_some() {
            debug!(ino, ?uid, ?gid, "ownership is not stored, ignoring");
        }
        match self.set_attributes(ino, mode, size) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(errno("setattr", ino, e)),
        }
    }

    fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, umask: u32, reply: ReplyEntry) {
        let result = to_core_ino(parent)
            .and_then(|parent| self.fs.mkdir(parent, name_str(name)?, mode & !umask));
        match result {
            Ok(attributes) => reply.entry(&TTL, &to_file_attr(&attributes), 0),
            Err(e) => reply.error(errno("mkdir", parent, e)),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match to_core_ino(parent).and_then(|parent| self.fs.unlink(parent, name_str(name)?)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("unlink", parent, e)),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        match to_core_ino(parent).and_then(|parent| self.fs.rmdir(parent, name_str(name)?)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("rmdir", parent, e)),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match to_core_ino(ino).and_then(|ino| self.fs.open(ino)) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(errno("open", ino, e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let result = to_core_ino(ino).and_then(|ino| self.fs.read(ino, offset.max(0) as u64, size as usize));
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno("read", ino, e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let result = to_core_ino(ino).and_then(|ino| self.fs.write(ino, offset.max(0) as u64, data));
        match result {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(errno("write", ino, e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        if let Ok(ino) = to_core_ino(ino) {
            self.fs.release(ino);
        }
        reply.ok();
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match to_core_ino(ino).and_then(|ino| self.fs.opendir(ino)) {
            Ok(()) => reply.opened(0, 0),
            Err(e) => reply.error(errno("opendir", ino, e)),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let listing = match self.directory_listing(ino) {
            Ok(listing) => listing,
            Err(e) => return reply.error(errno("readdir", ino, e)),
        };
        for (index, (entry_ino, kind, name)) in listing.into_iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(entry_ino, (index + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        if let Ok(ino) = to_core_ino(ino) {
            self.fs.releasedir(ino);
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let stats = self.fs.statfs();
        reply.statfs(
            stats.blocks,
            stats.free_blocks,
            stats.free_blocks,
            stats.files,
            stats.free_files,
            stats.block_size,
            stats.name_max,
            stats.block_size,
        );
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let result = to_core_ino(parent)
            .and_then(|parent| self.fs.create(parent, name_str(name)?, mode & !umask));
        match result {
            Ok(attributes) => reply.created(&TTL, &to_file_attr(&attributes), 0, 0, 0),
            Err(e) => reply.error(errno("create", parent, e)),
        }
    }
}
