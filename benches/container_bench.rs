use criterion::{black_box, criterion_group, criterion_main, Criterion};
use discfile::{ChunkType, DiscWriter, ModernReader, OptionKind, OptionTag, OptionValue, SectionType};
use std::io::Cursor;

fn build_hotlist(entries: usize) -> Vec<u8> {
    let mut writer = DiscWriter::new(Cursor::new(Vec::new())).unwrap();
    let tag = OptionTag::new("NAM").unwrap();
    for i in 0..entries {
        let s = writer.start_section(SectionType::Hotlist, true).unwrap();
        let c = writer.start_chunk(ChunkType::Config).unwrap();
        writer.write_option(tag, &OptionValue::String(format!("hotlist entry {i}"))).unwrap();
        writer.write_option(OptionTag::new("CNT").unwrap(), &OptionValue::Unsigned(i as u32)).unwrap();
        writer.end_chunk(c).unwrap();
        writer.end_section(s).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn bench_write(c: &mut Criterion) {
    c.bench_function("write_1000_sections", |b| b.iter(|| build_hotlist(black_box(1000))));
}

fn bench_validate(c: &mut Criterion) {
    let bytes = build_hotlist(1000);
    c.bench_function("validate_1000_sections", |b| {
        b.iter(|| ModernReader::new(Cursor::new(black_box(&bytes[..])), 1024).unwrap())
    });
}

fn bench_enumerate(c: &mut Criterion) {
    let bytes = build_hotlist(1000);
    let tag = OptionTag::new("NAM").unwrap();
    c.bench_function("enumerate_1000_sections", |b| {
        b.iter(|| {
            let mut reader = ModernReader::new(Cursor::new(&bytes[..]), 1024).unwrap();
            while reader.open_section(SectionType::Hotlist).unwrap().is_some() {
                reader.open_chunk(ChunkType::Config).unwrap();
                black_box(reader.read_option(OptionKind::String, tag).unwrap());
                reader.close_chunk().unwrap();
                reader.close_section().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_write, bench_validate, bench_enumerate);
criterion_main!(benches);
