//! FUSE bridge for FlashFS
//!
//! A thin adapter between `fuser` kernel callbacks and the storage
//! accelerator. Its only duties are argument marshaling (inode-to-path
//! translation, attr projection) and mapping accelerator errors straight
//! through to negative POSIX codes. The root inode is projected specially
//! and never consults the catalog.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};

use crate::accelerator::StorageAccelerator;
use crate::constants::BLOCK_SIZE;
use crate::metadata::types::now_secs;
use crate::metadata::FileRecord;

const TTL: Duration = Duration::from_secs(1);
const GENERATION: u64 = 0;
const ROOT_INO: u64 = 1;

/// FUSE adapter dispatching kernel callbacks onto the accelerator
pub struct FlashFuse {
    accel: Arc<StorageAccelerator>,
    paths: HashMap<u64, String>,  // ino -> path
    inodes: HashMap<String, u64>, // path -> ino
    next_ino: u64,
}

impl FlashFuse {
    pub fn new(accel: Arc<StorageAccelerator>) -> Self {
        let mut paths = HashMap::new();
        let mut inodes = HashMap::new();
        paths.insert(ROOT_INO, "/".to_string());
        inodes.insert("/".to_string(), ROOT_INO);

        Self {
            accel,
            paths,
            inodes,
            next_ino: 2,
        }
    }

    fn path_for(&self, ino: u64) -> Option<String> {
        self.paths.get(&ino).cloned()
    }

    fn ino_for(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.inodes.get(path) {
            return ino;
        }
        let ino = self.next_ino;
        self.next_ino += 1;
        self.paths.insert(ino, path.to_string());
        self.inodes.insert(path.to_string(), ino);
        ino
    }

    fn forget_path(&mut self, path: &str) {
        if let Some(ino) = self.inodes.remove(path) {
            self.paths.remove(&ino);
        }
    }

    fn move_path(&mut self, from: &str, to: &str) {
        if let Some(ino) = self.inodes.remove(from) {
            self.paths.insert(ino, to.to_string());
            self.inodes.insert(to.to_string(), ino);
        }
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Option<String> {
        let parent_path = self.path_for(parent)?;
        let name = name.to_str()?;
        if parent_path == "/" {
            Some(format!("/{}", name))
        } else {
            Some(format!("{}/{}", parent_path, name))
        }
    }

    /// Project a catalog record into a zeroed-out FUSE attr
    fn attr_from_record(ino: u64, record: &FileRecord) -> FileAttr {
        let kind = if record.is_directory() {
            FileType::Directory
        } else {
            FileType::RegularFile
        };

        FileAttr {
            ino,
            size: record.size,
            blocks: (record.size + 511) / 512,
            atime: time_from_secs(record.atime),
            mtime: time_from_secs(record.mtime),
            ctime: time_from_secs(record.ctime),
            crtime: time_from_secs(record.ctime),
            kind,
            perm: record.permissions() as u16,
            nlink: record.nlink,
            uid: record.uid,
            gid: record.gid,
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }

    /// The root attr is synthesized without consulting the catalog
    fn root_attr() -> FileAttr {
        let now = time_from_secs(now_secs());
        FileAttr {
            ino: ROOT_INO,
            size: 0,
            blocks: 0,
            atime: now,
            mtime: now,
            ctime: now,
            crtime: now,
            kind: FileType::Directory,
            perm: 0o755,
            nlink: 2,
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            rdev: 0,
            blksize: BLOCK_SIZE as u32,
            flags: 0,
        }
    }

    fn attr_for(&self, ino: u64, path: &str) -> Option<FileAttr> {
        if ino == ROOT_INO {
            return Some(Self::root_attr());
        }
        self.accel
            .get_metadata(path)
            .map(|record| Self::attr_from_record(ino, &record))
    }
}

fn time_from_secs(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn secs_from_time_or_now(time: TimeOrNow) -> i64 {
    match time {
        TimeOrNow::SpecificTime(time) => time
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        TimeOrNow::Now => now_secs(),
    }
}

impl Filesystem for FlashFuse {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match self.accel.get_metadata(&path) {
            Some(record) => {
                let ino = self.ino_for(&path);
                reply.entry(&TTL, &Self::attr_from_record(ino, &record), GENERATION);
            }
            None => reply.error(libc::ENOENT),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        if ino == ROOT_INO {
            reply.attr(&TTL, &Self::root_attr());
            return;
        }

        match self.path_for(ino).and_then(|p| self.attr_for(ino, &p)) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
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
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let path = match self.path_for(ino) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        if let Some(mode) = mode {
            if let Err(error) = self.accel.chmod_file(&path, mode) {
                reply.error(error.errno());
                return;
            }
        }

        if uid.is_some() || gid.is_some() {
            let record = match self.accel.get_metadata(&path) {
                Some(record) => record,
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            };
            let uid = uid.unwrap_or(record.uid);
            let gid = gid.unwrap_or(record.gid);
            if let Err(error) = self.accel.chown_file(&path, uid, gid) {
                reply.error(error.errno());
                return;
            }
        }

        if let Some(size) = size {
            if let Err(error) = self.accel.truncate_file(&path, size) {
                reply.error(error.errno());
                return;
            }
        }

        if atime.is_some() || mtime.is_some() {
            let record = self.accel.get_metadata(&path);
            let current_atime = record.as_ref().map(|r| r.atime).unwrap_or(0);
            let current_mtime = record.as_ref().map(|r| r.mtime).unwrap_or(0);
            let atime = atime.map(secs_from_time_or_now).unwrap_or(current_atime);
            let mtime = mtime.map(secs_from_time_or_now).unwrap_or(current_mtime);
            if let Err(error) = self.accel.utimens_file(&path, atime, mtime) {
                reply.error(error.errno());
                return;
            }
        }

        match self.attr_for(ino, &path) {
            Some(attr) => reply.attr(&TTL, &attr),
            None => reply.error(libc::ENOENT),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let file_type = mode & libc::S_IFMT;
        if !(file_type == 0 || file_type == libc::S_IFREG) {
            reply.error(libc::EACCES);
            return;
        }

        let path = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        if let Err(error) = self.accel.create_file(&path, mode & 0o777) {
            reply.error(error.errno());
            return;
        }

        let ino = self.ino_for(&path);
        match self.attr_for(ino, &path) {
            Some(attr) => reply.entry(&TTL, &attr, GENERATION),
            None => reply.error(libc::ENOENT),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let path = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        if let Err(error) = self.accel.create_directory(&path, mode & 0o777) {
            reply.error(error.errno());
            return;
        }

        let ino = self.ino_for(&path);
        match self.attr_for(ino, &path) {
            Some(attr) => reply.entry(&TTL, &attr, GENERATION),
            None => reply.error(libc::ENOENT),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match self.accel.delete_file(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(error) => reply.error(error.errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let path = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match self.accel.remove_directory(&path) {
            Ok(()) => {
                self.forget_path(&path);
                reply.ok();
            }
            Err(error) => reply.error(error.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        flags: u32,
        reply: ReplyEmpty,
    ) {
        let from = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };
        let to = match self.child_path(newparent, newname) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match self.accel.rename_file(&from, &to, flags) {
            Ok(()) => {
                self.move_path(&from, &to);
                reply.ok();
            }
            Err(error) => reply.error(error.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let path = match self.path_for(ino) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        // Existence is verified through the catalog before handing out a handle
        if ino != ROOT_INO && self.accel.get_metadata(&path).is_none() {
            reply.error(libc::ENOENT);
            return;
        }
        reply.opened(ino, 0);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let path = match self.child_path(parent, name) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        if let Err(error) = self.accel.create_file(&path, mode & 0o777) {
            reply.error(error.errno());
            return;
        }

        let ino = self.ino_for(&path);
        match self.attr_for(ino, &path) {
            Some(attr) => reply.created(&TTL, &attr, GENERATION, ino, flags as u32),
            None => reply.error(libc::ENOENT),
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
        let path = match self.path_for(ino) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        let mut buf = vec![0u8; size as usize];
        match self.accel.read_file(&path, &mut buf, offset.max(0) as u64) {
            Ok(n) => reply.data(&buf[..n]),
            Err(error) => reply.error(error.errno()),
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
        let path = match self.path_for(ino) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        match self.accel.write_file(&path, data, offset.max(0) as u64) {
            Ok(n) => reply.written(n as u32),
            Err(error) => reply.error(error.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path_for(ino) {
            Some(path) => path,
            None => {
                reply.error(libc::ENOENT);
                return;
            }
        };

        if ino != ROOT_INO {
            match self.accel.get_metadata(&path) {
                Some(record) if record.is_directory() => {}
                Some(_) => {
                    reply.error(libc::ENOTDIR);
                    return;
                }
                None => {
                    reply.error(libc::ENOENT);
                    return;
                }
            }
        }

        let parent_ino = if ino == ROOT_INO {
            ROOT_INO
        } else {
            let parent = match path.rfind('/') {
                Some(0) | None => "/".to_string(),
                Some(pos) => path[..pos].to_string(),
            };
            self.ino_for(&parent)
        };

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];

        for name in self.accel.list_directory(&path) {
            let child = if path == "/" {
                format!("/{}", name)
            } else {
                format!("{}/{}", path, name)
            };
            if let Some(record) = self.accel.get_metadata(&child) {
                let kind = if record.is_directory() {
                    FileType::Directory
                } else {
                    FileType::RegularFile
                };
                let child_ino = self.ino_for(&child);
                entries.push((child_ino, kind, name));
            }
        }

        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        if self.path_for(ino).is_none() {
            reply.error(libc::ENOENT);
            return;
        }
        reply.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> FlashFuse {
        FlashFuse::new(Arc::new(StorageAccelerator::new(4, "test_seed")))
    }

    #[test]
    fn test_root_is_preregistered() {
        let bridge = bridge();
        assert_eq!(bridge.path_for(ROOT_INO).as_deref(), Some("/"));

        let attr = FlashFuse::root_attr();
        assert_eq!(attr.kind, FileType::Directory);
        assert_eq!(attr.perm, 0o755);
        assert_eq!(attr.nlink, 2);
    }

    #[test]
    fn test_child_path_building() {
        let mut bridge = bridge();

        assert_eq!(
            bridge.child_path(ROOT_INO, OsStr::new("a.txt")).as_deref(),
            Some("/a.txt")
        );

        let dir_ino = bridge.ino_for("/dir");
        assert_eq!(
            bridge.child_path(dir_ino, OsStr::new("b.txt")).as_deref(),
            Some("/dir/b.txt")
        );
    }

    #[test]
    fn test_ino_mapping_is_stable() {
        let mut bridge = bridge();

        let first = bridge.ino_for("/f");
        let second = bridge.ino_for("/f");
        assert_eq!(first, second);

        bridge.forget_path("/f");
        let third = bridge.ino_for("/f");
        assert_ne!(first, third);
    }

    #[test]
    fn test_move_path_keeps_ino() {
        let mut bridge = bridge();

        let ino = bridge.ino_for("/old");
        bridge.move_path("/old", "/new");
        assert_eq!(bridge.path_for(ino).as_deref(), Some("/new"));
        assert_eq!(bridge.ino_for("/new"), ino);
    }

    #[test]
    fn test_attr_projection() {
        let bridge = bridge();
        bridge.accel.create_file("/f", 0o640).unwrap();
        bridge.accel.write_file("/f", b"12345", 0).unwrap();

        let record = bridge.accel.get_metadata("/f").unwrap();
        let attr = FlashFuse::attr_from_record(7, &record);
        assert_eq!(attr.ino, 7);
        assert_eq!(attr.size, 5);
        assert_eq!(attr.kind, FileType::RegularFile);
        assert_eq!(attr.perm, 0o640);
        assert_eq!(attr.nlink, 1);
    }
}
