use std::collections::BTreeSet;
use std::fs;
use std::thread;

use sfs::config::Geometry;
use sfs::driver::{FileDrive, MemoryDrive};
use sfs::ops::meta::{FileKind, Owner};
use sfs::{Error, SimpleFs};

const SECTOR: usize = 512;

fn geometry() -> Geometry {
    Geometry { inode_count: 64, data_block_count: 2048 }
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

#[test]
fn image_survives_remount() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("disk.img");
    // reaches into the double-indirect zone
    let big = pattern(512 * 200 + 77, 3);

    {
        let fs = SimpleFs::mount(FileDrive::open(&image, SECTOR).unwrap(), geometry(), Owner::default()).unwrap();
        fs.mkdir_path("/projects", 0o755).unwrap();
        fs.create_path("/projects/big.bin", 0o644).unwrap();
        fs.create_path("/hello.txt", 0o600).unwrap();
        assert_eq!(fs.write_path("/projects/big.bin", 0, &big).unwrap(), big.len());
        fs.write_path("/hello.txt", 0, b"hello, image").unwrap();
        fs.unmount().unwrap();
    }
    assert_eq!(fs::metadata(&image).unwrap().len() % SECTOR as u64, 0);

    // a different requested geometry does not reformat
    let fs = SimpleFs::mount(FileDrive::open(&image, SECTOR).unwrap(), Geometry::default(), Owner::default()).unwrap();
    let stats = fs.statfs();
    assert_eq!((stats.blocks, stats.files), (2048, 64));
    assert_eq!(stats.free_files, 64 - 4);

    let names: BTreeSet<String> = fs.readdir_path("/").unwrap().into_iter().collect();
    assert_eq!(names, ["hello.txt", "projects"].iter().map(|s| s.to_string()).collect());
    assert_eq!(fs.read_path("/projects/big.bin", 0, big.len()).unwrap(), big);
    assert_eq!(fs.read_path("/hello.txt", 7, 100).unwrap(), b"image".to_vec());
    let attributes = fs.getattr_path("/projects/big.bin").unwrap();
    assert_eq!(attributes.blocks, 201);
    assert_eq!(attributes.kind, FileKind::File);

    fs.unlink_path("/projects/big.bin").unwrap();
    fs.rmdir_path("/projects").unwrap();
    fs.unlink_path("/hello.txt").unwrap();
    let stats = fs.statfs();
    // only the reserved block stays allocated
    assert_eq!(stats.free_blocks, 2048 - 1);
    assert_eq!(stats.free_files, 64 - 1);
}

#[test]
fn foreign_image_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("random.img");
    fs::write(&image, vec![0x5a; SECTOR * 4]).unwrap();

    let result = SimpleFs::mount(FileDrive::open(&image, SECTOR).unwrap(), geometry(), Owner::default());
    assert!(matches!(result, Err(Error::InvalidImage(_))));
    // the image is left alone
    assert_eq!(fs::read(&image).unwrap(), vec![0x5a; SECTOR * 4]);
}

#[test]
fn crafted_superblock_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("crafted.img");
    // right magic, inode count far beyond the image
    let mut block = vec![0u8; SECTOR];
    for (i, value) in [518u32, 2, 1, u32::MAX, 1, 0, 0].iter().enumerate() {
        block[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    fs::write(&image, &block).unwrap();

    let result = SimpleFs::mount(FileDrive::open(&image, SECTOR).unwrap(), geometry(), Owner::default());
    assert!(matches!(result, Err(Error::InvalidImage(_))));
    assert_eq!(fs::read(&image).unwrap(), block);
}

#[test]
fn oversized_geometry_is_refused() {
    let geometry = Geometry { inode_count: u32::MAX, data_block_count: 2 };
    assert!(geometry.validate().is_err());
    let result = SimpleFs::mount(MemoryDrive::new(SECTOR), geometry, Owner::default());
    assert!(matches!(result, Err(Error::InvalidImage(_))));
}

#[test]
fn directory_keeps_exactly_the_survivors() {
    let fs = SimpleFs::mount(MemoryDrive::new(SECTOR), geometry(), Owner::default()).unwrap();
    fs.mkdir_path("/d", 0o755).unwrap();
    let mut created = BTreeSet::new();
    for i in 0..50 {
        let name = format!("file-{:02}", i);
        fs.create_path(&format!("/d/{}", name), 0o644).unwrap();
        created.insert(name);
    }
    let removed: Vec<String> = created.iter().filter(|name| name.ends_with('7') || name.ends_with('2')).cloned().collect();
    for name in &removed {
        fs.unlink_path(&format!("/d/{}", name)).unwrap();
        created.remove(name);
    }

    let listed = fs.readdir_path("/d").unwrap();
    assert_eq!(listed.len(), 50 - removed.len());
    assert_eq!(listed.iter().cloned().collect::<BTreeSet<_>>(), created);
    let parent = fs.opendir_path("/d").unwrap();
    for name in &created {
        let by_path = fs.getattr_path(&format!("/d/{}", name)).unwrap();
        assert_eq!(fs.lookup(parent, name).unwrap().ino, by_path.ino);
    }
    for name in &removed {
        assert!(matches!(fs.lookup(parent, name), Err(Error::NotFound)));
    }
}

#[test]
fn writers_on_separate_threads() {
    let fs = SimpleFs::mount(MemoryDrive::new(SECTOR), geometry(), Owner::default()).unwrap();
    thread::scope(|scope| {
        for worker in 0..4u8 {
            let fs = &fs;
            scope.spawn(move || {
                let path = format!("/worker-{}", worker);
                fs.create_path(&path, 0o644).unwrap();
                for chunk in 0..20u64 {
                    fs.write_path(&path, chunk * 300, &pattern(300, worker)).unwrap();
                }
            });
        }
    });

    for worker in 0..4u8 {
        let data = fs.read_path(&format!("/worker-{}", worker), 0, 6000).unwrap();
        assert_eq!(data.len(), 6000);
        assert!(data.chunks(300).all(|chunk| chunk == pattern(300, worker).as_slice()));
    }
}
