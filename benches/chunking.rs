use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vfstore::engine::{assemble, create_chunks};
use vfstore::types::{Compression, ContentEncoding, FileContent, FileRecord};
use vfstore::vfs::checksum;

const CHUNK_SIZE: u64 = 1024 * 1024;

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn chunked_record(content: &[u8]) -> (FileRecord, Vec<vfstore::types::ChunkRecord>) {
    let chunks = create_chunks(content, CHUNK_SIZE, "bench-file");
    let now = Utc::now();
    let record = FileRecord {
        id: "bench-file".to_string(),
        project_id: "bench".to_string(),
        path: "public/blob.bin".to_string(),
        name: "blob.bin".to_string(),
        directory: "public".to_string(),
        mime_type: "application/octet-stream".to_string(),
        size: content.len() as u64,
        content: FileContent::Chunked(chunks.iter().map(|c| c.id.clone()).collect()),
        compression: Compression::None,
        encoding: ContentEncoding::default(),
        hash: checksum(content),
        created_at: now,
        updated_at: now,
    };
    (record, chunks)
}

fn bench_create_chunks(c: &mut Criterion) {
    let data = payload(16 * 1024 * 1024);
    c.bench_function("create_chunks_16mb", |b| {
        b.iter(|| create_chunks(black_box(&data), CHUNK_SIZE, "bench-file"))
    });
}

fn bench_assemble(c: &mut Criterion) {
    let data = payload(16 * 1024 * 1024);
    let (record, mut chunks) = chunked_record(&data);
    chunks.reverse();

    c.bench_function("assemble_16mb_unordered", |b| {
        b.iter(|| assemble(black_box(&record), chunks.clone()).unwrap())
    });
}

fn bench_checksum(c: &mut Criterion) {
    let data = payload(16 * 1024 * 1024);
    c.bench_function("checksum_16mb", |b| b.iter(|| checksum(black_box(&data))));
}

criterion_group!(benches, bench_create_chunks, bench_assemble, bench_checksum);
criterion_main!(benches);
