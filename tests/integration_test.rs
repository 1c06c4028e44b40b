use discfile::{
    ChunkType, DateStamp, DiscFile, ErrorKind, FormatGeneration, Mode, OptionKind, OptionValue,
    SectionType,
};
use std::path::Path;
use tempfile::NamedTempFile;

fn write_options_file(path: &Path) {
    let mut file = DiscFile::create(path);
    assert_eq!(file.mode(), Mode::Write);
    let section = file.start_section(SectionType::Options, false).unwrap();
    let chunk = file.start_chunk(ChunkType::Config).unwrap();
    assert!(file.write_option_unsigned("HFG", 7));
    assert!(file.end_chunk(chunk));
    assert!(file.end_section(section));
    file.close().unwrap();
}

#[test]
fn test_options_scenario() {
    let temp_file = NamedTempFile::new().unwrap();
    write_options_file(temp_file.path());

    let mut file = DiscFile::open(temp_file.path());
    assert_eq!(file.format(), Some(FormatGeneration::Modern));
    assert_eq!(file.mode(), Mode::Read);
    assert!(file.open_section(SectionType::Options));
    assert!(file.open_chunk(ChunkType::Config));
    assert_eq!(file.read_option_unsigned("HFG"), Some(7));
    assert_eq!(file.read_option_unsigned("ZZZ"), None);
    assert_eq!(file.mode(), Mode::Read);
    file.close().unwrap();
}

#[test]
fn test_every_option_kind_roundtrip() {
    let temp_file = NamedTempFile::new().unwrap();
    let stamp = DateStamp::new(0x12_3456_789A);

    {
        let mut file = DiscFile::create(temp_file.path());
        let section = file.start_section(SectionType::Search, false).unwrap();
        let chunk = file.start_chunk(ChunkType::Dialogue).unwrap();
        assert!(file.write_option_boolean("BO", true));
        assert!(file.write_option_boolean("BF", false));
        assert!(file.write_option_unsigned("U", u32::MAX));
        assert!(file.write_option_string("S", "*.txt,*.c"));
        assert!(file.write_option_string("SE", ""));
        assert!(file.write_option_date("D", stamp));
        assert!(file.write_option_unsigned_array("A", &[1, 2, 3]));
        assert!(file.write_option_unsigned_array("AE", &[]));
        assert!(file.end_chunk(chunk));
        assert!(file.end_section(section));
        file.close().unwrap();
    }

    let mut file = DiscFile::open(temp_file.path());
    assert!(file.open_section(SectionType::Search));
    assert!(file.open_chunk(ChunkType::Dialogue));
    assert_eq!(file.read_option_boolean("BO"), Some(true));
    assert_eq!(file.read_option_boolean("BF"), Some(false));
    assert_eq!(file.read_option_unsigned("U"), Some(u32::MAX));
    assert_eq!(file.read_option_string("S").as_deref(), Some("*.txt,*.c"));
    assert_eq!(file.read_option_string("SE").as_deref(), Some(""));
    assert_eq!(file.read_option_date("D"), Some(stamp));
    assert_eq!(file.read_option_unsigned_array("A", None), Some(vec![1, 2, 3]));
    assert_eq!(file.read_option_unsigned_array("A", Some(u32::MAX)), Some(vec![1, 2, 3, u32::MAX]));
    assert_eq!(file.read_option_unsigned_array("AE", None), Some(vec![]));
    assert_eq!(file.read_option_unsigned_array("AE", Some(0)), Some(vec![0]));
    file.close().unwrap();
}

#[test]
fn test_kind_is_part_of_the_key() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut file = DiscFile::create(temp_file.path());
        let section = file.start_section(SectionType::Options, false).unwrap();
        let chunk = file.start_chunk(ChunkType::Config).unwrap();
        file.write_option_string("TAG", "text");
        file.write_option_unsigned("TAG", 3);
        file.end_chunk(chunk);
        file.end_section(section);
        file.close().unwrap();
    }

    let mut file = DiscFile::open(temp_file.path());
    file.open_section(SectionType::Options);
    file.open_chunk(ChunkType::Config);
    assert_eq!(file.read_option_unsigned("TAG"), Some(3));
    assert_eq!(file.read_option_string("TAG").as_deref(), Some("text"));
    assert_eq!(file.read_option_boolean("TAG"), None);
    assert_eq!(file.read_option(OptionKind::Date, "TAG"), None);

    let entries = file.options().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].value, OptionValue::String("text".into()));
    assert!(entries[0].offset < entries[1].offset);
    file.close().unwrap();
}

#[test]
fn test_raw_chunk_payload_is_padded_but_sized_exactly() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut file = DiscFile::create(temp_file.path());
        let section = file.start_section(SectionType::Results, false).unwrap();
        let chunk = file.start_chunk(ChunkType::TextDump).unwrap();
        assert!(file.write_raw(b"seven!!"));
        assert!(file.end_chunk(chunk));
        let chunk = file.start_chunk(ChunkType::Files).unwrap();
        assert!(file.write_raw(&[9, 8, 7, 6]));
        assert!(file.end_chunk(chunk));
        assert!(file.end_section(section));
        file.close().unwrap();
    }

    // header 12 + section 16 + (16 + 7 → 24) + (16 + 4)
    assert_eq!(std::fs::metadata(temp_file.path()).unwrap().len(), 12 + 16 + 24 + 20);

    let mut file = DiscFile::open(temp_file.path());
    assert!(file.open_section(SectionType::Results));
    assert!(file.open_chunk(ChunkType::TextDump));
    assert_eq!(file.chunk_size(), 7);
    let mut buf = vec![0u8; 7];
    assert!(file.read_raw(&mut buf));
    assert_eq!(buf, b"seven!!");
    assert!(file.close_chunk());
    assert_eq!(file.chunk_size(), 0);

    assert!(file.open_chunk(ChunkType::Files));
    let mut buf = [0u8; 4];
    assert!(file.read_raw(&mut buf));
    assert_eq!(buf, [9, 8, 7, 6]);
    assert!(file.close_chunk());
    assert!(!file.open_chunk(ChunkType::Objects));
    assert_eq!(file.mode(), Mode::Read);
    file.close().unwrap();
}

#[test]
fn test_resumable_iteration_over_repeatable_sections() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut file = DiscFile::create(temp_file.path());
        let section = file.start_section(SectionType::Options, false).unwrap();
        file.end_section(section);
        for i in 0..3 {
            let section = file.start_section(SectionType::Hotlist, true).unwrap();
            let chunk = file.start_chunk(ChunkType::Config).unwrap();
            file.write_option_string("NAM", &format!("entry {i}"));
            file.end_chunk(chunk);
            file.end_section(section);
        }
        file.close().unwrap();
    }

    let mut file = DiscFile::open(temp_file.path());
    let mut offsets = Vec::new();
    for i in 0..3 {
        assert!(file.open_section(SectionType::Hotlist));
        offsets.push(file.current_section().unwrap());
        assert!(file.open_chunk(ChunkType::Config));
        assert_eq!(file.read_option_string("NAM"), Some(format!("entry {i}")));
        assert!(file.close_chunk());
        assert!(file.close_section());
    }
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    assert!(!file.open_section(SectionType::Hotlist));
    assert_eq!(file.mode(), Mode::Read);

    // Singular types resolve to their one instance every time.
    for _ in 0..2 {
        assert!(file.open_section(SectionType::Options));
        assert_eq!(file.current_section(), Some(12));
        assert!(file.close_section());
    }
    file.close().unwrap();
}

#[test]
fn test_two_singular_sections_are_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut file = DiscFile::create(temp_file.path());
        for _ in 0..2 {
            let section = file.start_section(SectionType::Objects, false).unwrap();
            assert!(file.end_section(section));
        }
        file.close().unwrap();
    }

    let mut file = DiscFile::open(temp_file.path());
    assert_eq!(file.mode(), Mode::Error);
    assert_eq!(file.error_kind(), Some(ErrorKind::StructuralViolation));
    assert!(!file.open_section(SectionType::Objects));
    let err = file.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
}

#[test]
fn test_mixed_multiplicity_is_rejected() {
    let temp_file = NamedTempFile::new().unwrap();
    {
        let mut file = DiscFile::create(temp_file.path());
        let section = file.start_section(SectionType::Results, true).unwrap();
        file.end_section(section);
        let section = file.start_section(SectionType::Results, false).unwrap();
        file.end_section(section);
        file.close().unwrap();
    }
    let mut file = DiscFile::open(temp_file.path());
    assert_eq!(file.error_kind(), Some(ErrorKind::StructuralViolation));
    assert!(file.close().is_err());
}

fn write_raw_config(path: &Path, records: &[u32]) {
    let mut file = DiscFile::create(path);
    let section = file.start_section(SectionType::Options, false).unwrap();
    let chunk = file.start_chunk(ChunkType::Config).unwrap();
    let bytes: Vec<u8> = records.iter().flat_map(|r| r.to_ne_bytes()).collect();
    assert!(file.write_raw(&bytes));
    assert!(file.end_chunk(chunk));
    assert!(file.end_section(section));
    file.close().unwrap();
}

#[test]
fn test_newer_option_kinds_do_not_disturb_known_tags() {
    let temp_file = NamedTempFile::new().unwrap();
    let newer = u32::from_le_bytes([6, b'N', b'E', b'W']);
    let hfg = u32::from_le_bytes([OptionKind::Unsigned as u8, b'H', b'F', b'G']);
    write_raw_config(temp_file.path(), &[newer, 4, 0xdead, hfg, 7]);

    let mut file = DiscFile::open(temp_file.path());
    assert!(file.open_section(SectionType::Options));
    assert!(file.open_chunk(ChunkType::Config));
    assert_eq!(file.read_option_unsigned("HFG"), Some(7));
    assert_eq!(file.read_option_unsigned("ZZZ"), None);
    assert_eq!(file.mode(), Mode::Read);
    file.close().unwrap();
}

#[test]
fn test_truncated_option_record_is_structural_for_any_tag() {
    let temp_file = NamedTempFile::new().unwrap();
    let s = u32::from_le_bytes([OptionKind::String as u8, b'S', 0, 0]);
    write_raw_config(temp_file.path(), &[s, 64, 0x41]);

    let mut file = DiscFile::open(temp_file.path());
    assert!(file.open_section(SectionType::Options));
    assert!(file.open_chunk(ChunkType::Config));
    assert_eq!(file.read_option_unsigned("ZZZ"), None);
    assert_eq!(file.mode(), Mode::Error);
    assert_eq!(file.error_kind(), Some(ErrorKind::StructuralViolation));
    assert!(file.close().is_err());
}

#[test]
fn test_close_is_idempotent() {
    let temp_file = NamedTempFile::new().unwrap();
    write_options_file(temp_file.path());

    let mut file = DiscFile::open(temp_file.path());
    assert!(file.close().is_ok());
    assert_eq!(file.mode(), Mode::Closed);
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::Closed);
    assert!(!file.open_section(SectionType::Options));
    assert_eq!(file.read_option_unsigned("HFG"), None);
    assert_eq!(file.chunk_size(), 0);
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::Closed);
}

#[test]
fn test_errors_are_sticky() {
    let temp_file = NamedTempFile::new().unwrap();
    write_options_file(temp_file.path());

    let mut file = DiscFile::open(temp_file.path());
    // Chunk without a section: bad nesting.
    assert!(!file.open_chunk(ChunkType::Config));
    assert_eq!(file.mode(), Mode::Error);
    assert_eq!(file.error_kind(), Some(ErrorKind::StructuralViolation));

    // The file is fine, but the handle refuses to touch it any more.
    assert!(!file.open_section(SectionType::Options));
    assert_eq!(file.current_section(), None);
    file.set_error("ignored: first error wins");
    let err = file.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert_eq!(file.mode(), Mode::Closed);
}

#[test]
fn test_writer_nesting_violations() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut file = DiscFile::create(temp_file.path());
    assert!(file.start_chunk(ChunkType::Config).is_none());
    assert_eq!(file.mode(), Mode::Error);
    assert!(file.start_section(SectionType::Search, false).is_none());
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::StructuralViolation);

    let mut file = DiscFile::create(temp_file.path());
    let section = file.start_section(SectionType::Search, false).unwrap();
    let _chunk = file.start_chunk(ChunkType::Config).unwrap();
    assert!(!file.end_section(section));
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::StructuralViolation);
}

#[test]
fn test_tokens_only_close_their_own_file() {
    let first = NamedTempFile::new().unwrap();
    let second = NamedTempFile::new().unwrap();
    let mut a = DiscFile::create(first.path());
    let mut b = DiscFile::create(second.path());

    let from_a = a.start_section(SectionType::Search, false).unwrap();
    let from_b = b.start_section(SectionType::Search, false).unwrap();
    assert_eq!(from_a.offset(), from_b.offset());

    assert!(!b.end_section(from_a));
    assert_eq!(b.error_kind(), Some(ErrorKind::StructuralViolation));
    assert_eq!(b.close().unwrap_err().kind(), ErrorKind::StructuralViolation);

    drop(from_b);
    assert_eq!(a.mode(), Mode::Write);
    assert_eq!(a.close().unwrap_err().kind(), ErrorKind::StructuralViolation);
}

#[test]
fn test_unclosed_section_is_reported_on_close() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut file = DiscFile::create(temp_file.path());
    let _section = file.start_section(SectionType::Dialogue, false).unwrap();
    let err = file.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
}

#[test]
fn test_read_only_and_write_only_handles() {
    let temp_file = NamedTempFile::new().unwrap();
    write_options_file(temp_file.path());

    let mut file = DiscFile::open(temp_file.path());
    assert!(file.start_section(SectionType::Search, false).is_none());
    assert_eq!(file.mode(), Mode::Error);
    assert!(file.close().is_err());

    let mut file = DiscFile::create(temp_file.path());
    assert!(!file.open_section(SectionType::Options));
    assert_eq!(file.mode(), Mode::Error);
    assert!(file.close().is_err());
}

#[test]
fn test_caller_error() {
    let temp_file = NamedTempFile::new().unwrap();
    write_options_file(temp_file.path());

    let mut file = DiscFile::open(temp_file.path());
    file.set_error("FileOld");
    assert_eq!(file.mode(), Mode::Error);
    let err = file.close().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Caller);
    assert_eq!(err.to_string(), "FileOld");
}

#[test]
fn test_invalid_tag_poisons_the_handle() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut file = DiscFile::create(temp_file.path());
    let section = file.start_section(SectionType::Options, false).unwrap();
    let chunk = file.start_chunk(ChunkType::Config).unwrap();
    assert!(!file.write_option_unsigned("TOOLONG", 1));
    assert!(!file.end_chunk(chunk));
    assert!(!file.end_section(section));
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::StructuralViolation);
}

#[test]
fn test_missing_file_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = DiscFile::open(dir.path().join("absent.dat"));
    assert_eq!(file.mode(), Mode::Error);
    assert_eq!(file.format(), None);
    assert_eq!(file.close().unwrap_err().kind(), ErrorKind::IoFailure);
}
