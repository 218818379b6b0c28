use std::io;
use std::path::PathBuf;

use memfs::{BitFlags, Error, FsParams, MemFs};

fn init() -> MemFs {
    let _ = env_logger::builder().is_test(true).try_init();
    MemFs::new(FsParams::default()).unwrap()
}

fn fixture(name: &str) -> PathBuf {
    [env!("CARGO_MANIFEST_DIR"), "tests", "data", name]
        .iter()
        .collect()
}

fn read_all(fs: &MemFs, path: &str) -> Vec<u8> {
    let fd = fs.open(path, BitFlags::empty()).unwrap();
    let mut buf = vec![0; fs.params().block_size];
    let read = fs.read(fd, &mut buf).unwrap();
    fs.close(fd).unwrap();
    buf.truncate(read);
    buf
}

#[test]
fn import_text_file() {
    let fs = init();
    fs.copy_in(fixture("text1.txt"), "/f1").unwrap();
    assert_eq!(read_all(&fs, "/f1"), b"Ola Mundo!");

    // 再次导入会覆盖原有内容
    fs.copy_in(fixture("text2.txt"), "/f1").unwrap();
    assert_eq!(read_all(&fs, "/f1"), b"Ciao mondo!");
    assert_eq!(fs.read_dir().len(), 1);
}

#[test]
fn oversized_import_leaves_empty_file() {
    let fs = init();
    assert_eq!(
        fs.copy_in(fixture("oversized_file.txt"), "/f1"),
        Err(Error::Truncated)
    );

    let stat = fs.stat("/f1").unwrap();
    assert_eq!(stat.size, 0);
    assert_eq!(stat.blocks, 0);
    assert!(read_all(&fs, "/f1").is_empty());

    // 失败的导入不会遗留句柄
    fs.unlink("/f1").unwrap();
}

#[test]
fn missing_source() {
    let fs = init();
    assert_eq!(
        fs.copy_in(fixture("no_such_file.txt"), "/f1"),
        Err(Error::NotFound)
    );
    assert_eq!(fs.stat("/f1"), Err(Error::NotFound));
}

#[test]
fn exactly_one_block() {
    let fs = init();
    let block_size = fs.params().block_size;
    let contents: Vec<u8> = (0..block_size).map(|i| (i % 251) as u8).collect();

    fs.copy_from_reader(contents.as_slice(), "/full").unwrap();
    assert_eq!(read_all(&fs, "/full"), contents);

    let mut longer = contents.clone();
    longer.push(0);
    assert_eq!(
        fs.copy_from_reader(longer.as_slice(), "/full"),
        Err(Error::Truncated)
    );
    assert_eq!(fs.stat("/full").unwrap().size, 0);
}

#[test]
fn reader_errors_are_reported() {
    struct Broken;

    impl io::Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::PermissionDenied.into())
        }
    }

    let fs = init();
    assert_eq!(
        fs.copy_from_reader(Broken, "/f1"),
        Err(Error::Io(io::ErrorKind::PermissionDenied))
    );
    assert_eq!(fs.stat("/f1").unwrap().size, 0);
}

#[test]
fn invalid_destination() {
    let fs = init();
    assert_eq!(
        fs.copy_in(fixture("text3.txt"), "f1"),
        Err(Error::InvalidPath)
    );
    assert!(fs.read_dir().is_empty());
}
