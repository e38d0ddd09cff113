use std::fs;
use std::io::Write;

use super::super::*;

use crate::TempGitRepo;

use revstore_core::object::{Kind, Object};

use tempfile::{tempdir, NamedTempFile};

const TEST_CONTENT: &[u8; 13] = b"test content\n";

#[test]
fn matches_command_line_git() {
    let mut test_file = NamedTempFile::new().unwrap();
    test_file.write_all(TEST_CONTENT).unwrap();

    let mut tgr = TempGitRepo::new();
    let output = tgr
        .command("git")
        .args(&["hash-object", test_file.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(
        output.stdout,
        b"d670460b4b4aece5915caf5c68d12f560a9fe3e4\n".to_vec()
    );

    let o = Object::new(Kind::Blob, TEST_CONTENT.to_vec());
    assert_eq!(
        o.id().to_string(),
        "d670460b4b4aece5915caf5c68d12f560a9fe3e4"
    );
}

#[test]
fn readable_by_command_line_git() {
    let mut tgr = TempGitRepo::new();
    let r = OnDiskRepo::new(tgr.path()).unwrap();

    let test_content = "foobar".repeat(1000);
    let o = Object::new(Kind::Blob, test_content.as_bytes().to_vec());
    assert!(r.put_loose_object(&o).unwrap());

    let id = o.id().to_string();
    assert_eq!(tgr.git_stdout(&["cat-file", "-t", &id]), "blob\n");
    assert_eq!(tgr.git_stdout(&["cat-file", "-p", &id]), test_content);
}

#[test]
fn reads_objects_written_by_command_line_git() {
    let mut test_file = NamedTempFile::new().unwrap();
    test_file.write_all(TEST_CONTENT).unwrap();

    let mut tgr = TempGitRepo::new();
    let id = tgr.git_stdout(&["hash-object", "-w", test_file.path().to_str().unwrap()]);
    let id = Id::from_hex(id.trim()).unwrap();

    let r = OnDiskRepo::new(tgr.path()).unwrap();
    assert!(r.has_object(&id));

    let o = r.get_object(&id).unwrap().unwrap();
    assert_eq!(o.kind(), Kind::Blob);
    assert_eq!(o.content(), TEST_CONTENT);
}

#[test]
fn second_write_is_a_no_op() {
    let r_temp = tempdir().unwrap();
    let r = OnDiskRepo::init(r_temp.path()).unwrap();

    let o = Object::new(Kind::Blob, TEST_CONTENT.to_vec());
    assert!(!r.has_object(o.id()));
    assert!(r.put_loose_object(&o).unwrap());
    assert!(r.has_object(o.id()));
    assert!(!r.put_loose_object(&o).unwrap());

    assert_eq!(r.get_object(o.id()).unwrap(), Some(o));
}

#[test]
fn missing_object_is_none() {
    let r_temp = tempdir().unwrap();
    let r = OnDiskRepo::init(r_temp.path()).unwrap();

    let id = Id::from_hex("d670460b4b4aece5915caf5c68d12f560a9fe3e4").unwrap();
    assert_eq!(r.get_object(&id).unwrap(), None);
}

#[test]
fn wrong_kind() {
    let r_temp = tempdir().unwrap();
    let r = OnDiskRepo::init(r_temp.path()).unwrap();

    let o = Object::new(Kind::Blob, TEST_CONTENT.to_vec());
    r.put_loose_object(&o).unwrap();

    assert!(r.get_object_of_kind(o.id(), Kind::Blob).unwrap().is_some());

    match r.get_object_of_kind(o.id(), Kind::Tree).unwrap_err() {
        Error::ObjectKindMismatch {
            expected, actual, ..
        } => {
            assert_eq!(expected, Kind::Tree);
            assert_eq!(actual, Kind::Blob);
        }
        err => panic!("Unexpected error {:?}", err),
    }
}

#[test]
fn corrupt_object_is_detected() {
    let r_temp = tempdir().unwrap();
    let r = OnDiskRepo::init(r_temp.path()).unwrap();

    let o = Object::new(Kind::Blob, TEST_CONTENT.to_vec());
    r.put_loose_object(&o).unwrap();

    let object_path = r_temp
        .path()
        .join(".git/objects/d6/70460b4b4aece5915caf5c68d12f560a9fe3e4");
    fs::write(&object_path, "not zlib").unwrap();

    match r.get_object(o.id()).unwrap_err() {
        Error::CorruptObject(id) => assert_eq!(&id, o.id()),
        err => panic!("Unexpected error {:?}", err),
    }
}

#[test]
fn error_cant_create_objects_dir() {
    let r_temp = tempdir().unwrap();
    let r_path = r_temp.path();
    let r = OnDiskRepo::init(r_path).unwrap();

    let objects_dir = r_path.join(".git/objects/d6");
    fs::write(&objects_dir, "sand in the gears").unwrap();

    let o = Object::new(Kind::Blob, TEST_CONTENT.to_vec());
    let err = r.put_loose_object(&o).unwrap_err();

    match err {
        Error::IoError(err) => assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists),
        _ => panic!("Unexpected error {:?}", err),
    }
}

#[test]
fn write_order_does_not_matter() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let r1 = OnDiskRepo::init(first.path()).unwrap();
    let r2 = OnDiskRepo::init(second.path()).unwrap();

    let objects: Vec<Object> = ["one\n", "two\n", "three\n"]
        .iter()
        .map(|c| Object::new(Kind::Blob, c.as_bytes().to_vec()))
        .collect();

    for o in &objects {
        r1.put_loose_object(o).unwrap();
    }
    for o in objects.iter().rev() {
        r2.put_loose_object(o).unwrap();
    }

    r1.update_ref("refs/heads/master", None, objects[0].id())
        .unwrap();
    r2.update_ref("refs/heads/master", None, objects[0].id())
        .unwrap();

    assert!(!dir_diff::is_different(first.path(), second.path()).unwrap());
}
