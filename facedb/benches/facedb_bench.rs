use criterion::{Criterion, black_box, criterion_group, criterion_main};
use giztoy_facedb::{
    ClusterConfig, Config, EMBEDDING_DIM, Embedding, FaceDb, FaceSample, cluster_embeddings,
};

fn pseudo_vec(seed: u64, scale: f32) -> Vec<f32> {
    let mut v = Vec::with_capacity(EMBEDDING_DIM);
    let mut state = seed;
    for _ in 0..EMBEDDING_DIM {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        v.push((((state >> 33) as f32) / (u32::MAX as f32) - 0.25) * scale);
    }
    v
}

fn make_identity(center: &[f32], n: usize, noise: f32, base_seed: u64) -> Vec<Embedding> {
    (0..n)
        .map(|i| {
            let r = pseudo_vec(base_seed.wrapping_add(i as u64 * 997), noise);
            let v: Vec<f32> = center.iter().zip(r.iter()).map(|(c, d)| c + d).collect();
            Embedding::new(v).unwrap()
        })
        .collect()
}

fn populated(identities: usize, per_identity: usize) -> FaceDb {
    let db = FaceDb::new(Config::default());
    for id in 0..identities {
        let center = pseudo_vec(id as u64 + 1, 1.0);
        for emb in make_identity(&center, per_identity, 0.05, 1000 * id as u64) {
            db.add(&format!("person-{id}"), FaceSample::new(emb));
        }
    }
    db
}

fn bench_find(c: &mut Criterion) {
    let db = populated(50, 20);
    db.rebuild_cache();
    let query = make_identity(&pseudo_vec(8, 1.0), 1, 0.05, 424242).remove(0);

    c.bench_function("facedb_find_fast_50ids_20samples", |b| {
        b.iter(|| black_box(db.find_fast(black_box(&query))));
    });

    c.bench_function("facedb_find_slow_50ids_20samples", |b| {
        b.iter(|| black_box(db.find_slow(black_box(&query))));
    });
}

fn bench_rebuild(c: &mut Criterion) {
    let db = populated(50, 20);

    c.bench_function("facedb_rebuild_cache_50ids_20samples", |b| {
        b.iter(|| db.rebuild_cache());
    });
}

fn bench_cluster(c: &mut Criterion) {
    let mut faces = Vec::new();
    for id in 0..6 {
        let center = pseudo_vec(id + 100, 1.0);
        faces.extend(make_identity(&center, 25, 0.02, 77 * id));
    }
    let refs: Vec<&Embedding> = faces.iter().collect();
    let cfg = ClusterConfig {
        seed: Some(1),
        ..ClusterConfig::default()
    };

    c.bench_function("facedb_cluster_150faces_6groups", |b| {
        b.iter(|| black_box(cluster_embeddings(black_box(&refs), &cfg)));
    });
}

criterion_group!(benches, bench_find, bench_rebuild, bench_cluster);
criterion_main!(benches);
