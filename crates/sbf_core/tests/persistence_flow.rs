use sbf_core::allocator::filter_file_name;
use sbf_core::{
    Backing, Bitmap, BloomFilter, DirAllocator, SbfParams, SbfStore, ScalableBloomFilter,
};
use tempfile::tempdir;

fn params() -> SbfParams {
    SbfParams {
        initial_capacity: 1000,
        fp_probability: 0.001,
        scale_size: 4,
        probability_reduction: 0.9,
    }
}

#[test]
fn reload_from_bitmap_files() {
    let tmp = tempdir().unwrap();
    let keys: Vec<String> = (0..6000).map(|i| format!("session-{i:06}")).collect();

    let alloc = DirAllocator::new(tmp.path(), 0);
    let mut sbf = ScalableBloomFilter::with_allocator(params(), alloc).unwrap();
    for k in &keys {
        sbf.add(k.as_bytes()).unwrap();
    }
    let count = sbf.filter_count();
    let lens: Vec<u64> = sbf.filters().iter().map(|f| f.byte_size()).collect();
    let ks: Vec<u32> = sbf.filters().iter().map(|f| f.k()).collect();
    assert!(count >= 2);
    assert!(sbf.close().unwrap().is_empty());

    let filters: Vec<BloomFilter> = (0..count)
        .map(|i| {
            let path = tmp.path().join(filter_file_name(i));
            let map = Bitmap::from_path(path, lens[i], false, false).unwrap();
            assert_eq!(map.backing(), Backing::Shared);
            BloomFilter::new(map, ks[i], true)
        })
        .collect();
    let sbf = ScalableBloomFilter::new(params(), None, filters).unwrap();
    assert_eq!(sbf.filter_count(), count);
    assert!(keys.iter().all(|k| sbf.contains(k.as_bytes())));
}

#[test]
fn store_survives_many_sessions() {
    let tmp = tempdir().unwrap();
    let dir = tmp.path().join("store");
    SbfStore::create(&dir, params()).unwrap().close().unwrap();

    for session in 0..4u32 {
        let mut store = SbfStore::open(&dir).unwrap();
        for i in 0..1000u32 {
            store.add(format!("{session}:{i}").as_bytes()).unwrap();
        }
        store.close().unwrap();
    }

    let store = SbfStore::open(&dir).unwrap();
    assert!(store.filter().filter_count() >= 2);
    for session in 0..4u32 {
        assert!((0..1000u32).all(|i| store.contains(format!("{session}:{i}").as_bytes())));
    }
    let size = store.size() as f64;
    assert!((size - 4000.0).abs() < 200.0, "size {size}");
}
