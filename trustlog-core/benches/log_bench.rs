use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sha2::Sha256;
use trustlog_core::proof::{valid_audit_proof, valid_consistency_proof};
use trustlog_core::{Bucket, MemoryStorage, StorageExt, VerifiableLog};

const SIZE: u64 = 1024;

fn populated() -> MemoryStorage {
    let store = MemoryStorage::new();
    let bucket = Bucket::new("log");
    store
        .write(|txn| {
            let mut log: VerifiableLog = VerifiableLog::new(bucket.txn(txn), 0);
            for i in 0..SIZE {
                log.append(&i.to_le_bytes())?;
            }
            Ok(())
        })
        .unwrap();
    store
}

fn bench_append(c: &mut Criterion) {
    c.bench_function("append_1024", |b| b.iter(|| black_box(populated())));
}

fn bench_audit_proof(c: &mut Criterion) {
    let store = populated();
    let bucket = Bucket::new("log");

    c.bench_function("audit_proof_generate", |b| {
        b.iter(|| {
            store
                .read(|txn| {
                    let log: VerifiableLog = VerifiableLog::new(bucket.txn(txn), SIZE);
                    log.audit_proof(black_box(517), SIZE)
                })
                .unwrap()
        })
    });

    let (root, proof) = store
        .read(|txn| {
            let log: VerifiableLog = VerifiableLog::new(bucket.txn(txn), SIZE);
            Ok((log.root()?, log.audit_proof(517, SIZE)?))
        })
        .unwrap();
    let leaf = 517u64.to_le_bytes();

    c.bench_function("audit_proof_verify", |b| {
        b.iter(|| valid_audit_proof::<Sha256>(&root, SIZE, 517, black_box(&proof), &leaf))
    });
}

fn bench_consistency_proof(c: &mut Criterion) {
    let store = populated();
    let bucket = Bucket::new("log");

    let (old_root, new_root, proof) = store
        .read(|txn| {
            let old: VerifiableLog = VerifiableLog::new(bucket.txn(txn), 300);
            let new: VerifiableLog = VerifiableLog::new(bucket.txn(txn), SIZE);
            Ok((old.root()?, new.root()?, new.consistency_proof(300, SIZE)?))
        })
        .unwrap();

    c.bench_function("consistency_proof_verify", |b| {
        b.iter(|| {
            valid_consistency_proof::<Sha256>(&old_root, &new_root, 300, SIZE, black_box(&proof))
        })
    });
}

criterion_group!(benches, bench_append, bench_audit_proof, bench_consistency_proof);
criterion_main!(benches);
