use std::collections::HashSet;
use std::thread;

use revstore::{Storage, StorageConfig, StorageError};

mod common;
use common::{history_len, meta, open, put};

#[test]
fn round_trip() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let contents: Vec<(&str, Vec<u8>)> = vec![
        ("plain", b"Hello World".to_vec()),
        ("nested/deeper/path", b"\x00\x01\x02 binary \xff".to_vec()),
        ("empty", Vec::new()),
        ("unicode/caf\u{e9}", "caf\u{e9}".as_bytes().to_vec()),
    ];

    for (path, content) in &contents {
        let record = put(&s, path, content);
        assert_eq!(record.path(), *path);
        assert_eq!(&record.content().unwrap(), content);
    }

    for (path, content) in &contents {
        let record = s.get_object(path, None).unwrap().unwrap();
        assert_eq!(&record.content().unwrap(), content);
        assert_eq!(record.metadata().title(), Some(*path));
    }
}

#[test]
fn canonically_equivalent_paths_are_one_object() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    // "é" precomposed vs. "e" + combining acute accent.
    put(&s, "caf\u{e9}", b"one");
    put(&s, "cafe\u{301}", b"two");

    let all = s.get_all_objects("").unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].content().unwrap(), b"two".to_vec());
}

#[test]
fn revision_pinning() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let c1 = put(&s, "doc", b"first");
    let c2 = put(&s, "doc", b"second");
    assert_ne!(c1.revision(), c2.revision());

    let old = s
        .get_object("doc", Some(&c1.revision().to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(old.content().unwrap(), b"first".to_vec());
    assert_eq!(old.revision(), c1.revision());

    let new = s.get_object("doc", None).unwrap().unwrap();
    assert_eq!(new.content().unwrap(), b"second".to_vec());
}

#[test]
fn pinned_revision_outlives_delete() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let c1 = put(&s, "doc", b"first");
    s.delete_object("doc", &meta("remove doc")).unwrap();

    // HEAD decides existence for unpinned reads.
    assert!(s.get_object("doc", None).unwrap().is_none());

    let old = s
        .get_object("doc", Some(&c1.revision().to_string()))
        .unwrap()
        .unwrap();
    assert_eq!(old.content().unwrap(), b"first".to_vec());
}

#[test]
fn history_completeness() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let n = 5;
    let mut written = Vec::new();
    for i in 0..n {
        written.push(put(&s, "counter", format!("value {}", i).as_bytes()));
        put(&s, &format!("noise/{}", i), b"unrelated");
    }

    let revisions = s.get_revisions("counter").unwrap();
    assert_eq!(revisions.len(), n);

    for (record, expected) in revisions.iter().zip(written.iter().rev()) {
        assert_eq!(record.revision(), expected.revision());

        let pinned = s
            .get_object("counter", Some(&record.revision().to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(pinned.content().unwrap(), expected.content().unwrap());
    }

    assert!(s.get_revisions("never-written").unwrap().is_empty());
}

#[test]
fn delete_idempotence() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());
    put(&s, "keep", b"x");

    let head = s.head();
    let len = history_len(&s);

    s.delete_object("missing", &meta("rm")).unwrap();
    s.delete_object("missing", &meta("rm")).unwrap();
    s.delete_object("keep/under/a/file", &meta("rm")).unwrap();

    assert_eq!(s.head(), head);
    assert_eq!(history_len(&s), len);
}

#[test]
fn delete_prunes_empty_directories() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    put(&s, "a/b/c", b"x");
    s.delete_object("a/b/c", &meta("rm")).unwrap();

    let out = std::process::Command::new("git")
        .current_dir(s.path())
        .args(&["ls-tree", "-r", "-t", s.branch_ref()])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(out.stdout.is_empty(), "{}", String::from_utf8_lossy(&out.stdout));
}

#[test]
fn no_op_append() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let first = put(&s, "doc", b"same");
    let len = history_len(&s);

    let again = put(&s, "doc", b"same");
    assert_eq!(again.revision(), first.revision());
    assert_eq!(history_len(&s), len);
    assert_eq!(s.get_revisions("doc").unwrap().len(), 1);
}

#[test]
fn prefix_listing() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    put(&s, "a/x", b"1");
    put(&s, "a/y", b"2");
    put(&s, "b/z", b"3");
    put(&s, "ab", b"4");

    let paths: HashSet<String> = s
        .get_all_objects("a")
        .unwrap()
        .iter()
        .map(|r| r.path().to_string())
        .collect();
    let expected: HashSet<String> = vec!["a/x".to_string(), "a/y".to_string()]
        .into_iter()
        .collect();
    assert_eq!(paths, expected);

    assert_eq!(s.get_all_objects("").unwrap().len(), 4);
    assert!(s.get_all_objects("c").unwrap().is_empty());
}

#[test]
fn listing_reports_last_change() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let x = put(&s, "a/x", b"1");
    let y = put(&s, "a/y", b"2");

    for record in s.get_all_objects("a").unwrap() {
        match record.path() {
            "a/x" => assert_eq!(record.revision(), x.revision()),
            "a/y" => assert_eq!(record.revision(), y.revision()),
            other => panic!("unexpected path {}", other),
        }
    }
}

#[test]
fn file_and_directory_collide() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());
    put(&s, "a", b"file");

    match s
        .append_object("a/b", &meta("nested"), &mut &b"x"[..], 1)
        .unwrap_err()
    {
        StorageError::PathConflict(_) => (),
        err => panic!("wrong error: {:?}", err),
    }

    // The failed write left nothing behind.
    assert_eq!(s.get_object("a", None).unwrap().unwrap().content().unwrap(), b"file".to_vec());
}

#[test]
fn concurrent_writers_serialize() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());
    let start = history_len(&s);

    let k = 16;
    thread::scope(|scope| {
        for i in 0..k {
            let s = &s;
            scope.spawn(move || {
                put(s, &format!("writer/{}", i), format!("payload {}", i).as_bytes());
            });
        }

        // Readers run alongside the writers and never see a torn tree.
        for _ in 0..4 {
            let s = &s;
            scope.spawn(move || {
                for _ in 0..20 {
                    for record in s.get_all_objects("writer").unwrap() {
                        let n: usize = record.path()["writer/".len()..].parse().unwrap();
                        assert_eq!(
                            record.content().unwrap(),
                            format!("payload {}", n).into_bytes()
                        );
                    }
                }
            });
        }
    });

    assert_eq!(history_len(&s), start + k);
    for i in 0..k {
        let record = s.get_object(&format!("writer/{}", i), None).unwrap().unwrap();
        assert_eq!(record.content().unwrap(), format!("payload {}", i).into_bytes());
    }

    // One linear chain: every commit has at most one parent.
    let out = std::process::Command::new("git")
        .current_dir(s.path())
        .args(&["rev-list", "--min-parents=2", s.branch_ref()])
        .output()
        .unwrap();
    assert!(out.stdout.is_empty());
}

#[test]
fn tag_idempotence() {
    let temp = tempfile::tempdir().unwrap();
    let s = open(temp.path());

    let first = put(&s, "doc", b"1");
    s.tag("HEAD", "release", &meta("release")).unwrap();
    s.tag(&first.revision().to_string(), "release", &meta("release"))
        .unwrap();

    put(&s, "doc", b"2");
    let err = s.tag("HEAD", "release", &meta("release")).unwrap_err();
    assert!(err.is_conflict(), "{:?}", err);

    let tags = s.get_tags().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].commit(), first.revision());
}

#[test]
fn reopen_continues_history() {
    let temp = tempfile::tempdir().unwrap();

    let first = {
        let s = open(temp.path());
        put(&s, "doc", b"1")
    };

    let s = open(temp.path());
    assert_eq!(&s.head(), first.revision());
    put(&s, "doc", b"2");
    assert_eq!(s.get_revisions("doc").unwrap().len(), 2);
}

#[test]
fn read_only_storage() {
    let temp = tempfile::tempdir().unwrap();
    drop(open(temp.path()));

    let s = Storage::open(
        StorageConfig::builder(temp.path())
            .read_only(true)
            .build()
            .unwrap(),
    )
    .unwrap();
    assert!(!s.is_mutable());

    match s
        .append_object("a", &meta("a"), &mut &b"x"[..], 1)
        .unwrap_err()
    {
        StorageError::ReadOnly => (),
        err => panic!("wrong error: {:?}", err),
    }
    match s.delete_object("a", &meta("a")).unwrap_err() {
        StorageError::ReadOnly => (),
        err => panic!("wrong error: {:?}", err),
    }
    assert!(s.get_all_objects("").unwrap().is_empty());
}

#[test]
fn read_only_needs_existing_repository() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent");

    match Storage::open(StorageConfig::builder(&path).read_only(true).build().unwrap()) {
        Err(StorageError::Configuration(_)) => (),
        other => panic!("unexpected result: {:?}", other),
    }
    assert!(!path.exists());
}

#[test]
fn independent_instances_coexist() {
    let one = tempfile::tempdir().unwrap();
    let two = tempfile::tempdir().unwrap();

    let a = open(one.path());
    let b = open(two.path());

    put(&a, "shared/name", b"from a");
    put(&b, "shared/name", b"from b");

    assert_eq!(
        a.get_object("shared/name", None).unwrap().unwrap().content().unwrap(),
        b"from a".to_vec()
    );
    assert_eq!(
        b.get_object("shared/name", None).unwrap().unwrap().content().unwrap(),
        b"from b".to_vec()
    );
}
